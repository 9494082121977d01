//! The Hook Bridge: translates raw [`crate::engine::CpuEngine`] callbacks
//! into the user-facing closures `Emulator::hook_*` registers, and protects
//! every one of them with the same "any escaping error stops the run
//! cleanly" guarantee.
//!
//! A user hook can panic (equivalent to an uncaught exception reaching the
//! original's `hook_code`) or explicitly request a stop. Either way the
//! bridge must never let that unwind past the native engine's FFI boundary,
//! so every call into user code goes through [`guarded`]. The actual
//! wrapping (extracting a user callback from the engine's native shape and
//! constructing the `&Emulator` it's handed) lives in `emulator.rs`, since
//! it needs to upgrade a `Weak` back into an `Emulator` handle.

use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::emulator::Emulator;
use crate::engine::MemAccess;

/// Why a run stopped. Mirrors the distinction the orchestrator's run loop
/// makes between a guest-requested exit and everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The guest called its exit syscall (or the runner's natural end of
    /// entry point was reached).
    ExitGroup(i64),
    /// A user hook panicked, or requested a stop without specifying why.
    Unexpected,
    /// `Emulator::set_timeout` elapsed before the guest finished.
    Timeout,
}

/// User-facing address/instruction-count hook, called with the emulator
/// (so it can read registers/memory or call `stop`), the current PC, and
/// the instruction's size in bytes.
pub type CodeHook = Box<dyn FnMut(&Emulator, u64, u32)>;
/// User-facing basic-block hook.
pub type BlockHook = Box<dyn FnMut(&Emulator, u64, u32)>;
/// User-facing interrupt hook, called with the interrupt number.
pub type IntrHook = Box<dyn FnMut(&Emulator, u32)>;
/// User-facing memory-access hook. Return `false` to veto the access
/// (only meaningful for the `*_invalid`/`unmapped` hook families).
pub type MemHook = Box<dyn FnMut(&Emulator, MemAccess, u64, usize, i64) -> bool>;
/// User-facing instruction-class hook (e.g. `syscall`), or a single-address
/// hook collapsed by `hook_address`.
pub type InsnHook = Box<dyn FnMut(&Emulator)>;

/// Run `f`, catching any panic and turning it into [`StopReason::Unexpected`]
/// instead of letting it unwind into the native engine's callback trampoline.
///
/// This is the Rust analogue of the original's blanket
/// `except BaseException` around every hook invocation: a hook that panics
/// is treated exactly like one that raised, and the run stops rather than
/// corrupting engine state by unwinding through FFI.
pub fn guarded<R>(on_panic: R, f: impl FnOnce() -> R) -> (R, Option<StopReason>) {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => (value, None),
        Err(_) => (on_panic, Some(StopReason::Unexpected)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guarded_passes_through_normal_return() {
        let (value, stop) = guarded(0, || 42);
        assert_eq!(value, 42);
        assert!(stop.is_none());
    }

    #[test]
    fn guarded_catches_panic_as_unexpected_stop() {
        let (value, stop) = guarded(0, || -> i32 { panic!("boom") });
        assert_eq!(value, 0);
        assert_eq!(stop, Some(StopReason::Unexpected));
    }
}
