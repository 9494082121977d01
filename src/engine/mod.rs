//! The native CPU-engine capability surface the orchestrator depends on.
//!
//! This crate never implements a CPU emulator itself — "the CPU engine
//! itself" is explicitly out of scope. [`CpuEngine`] is the narrow contract
//! the orchestrator needs from one; [`unicorn_adapter::UnicornEngine`] backs
//! it with the `unicorn-engine` crate, and `crate::testkit::MockEngine`
//! backs it with a deterministic in-memory stand-in for tests.

pub mod unicorn_adapter;

use crate::memmap::Perms;
use crate::Result;

/// A raw engine register id. Concrete values come from the active
/// [`crate::arch::ArchProfile`]; this crate treats them as opaque.
pub type RegId = u32;

/// Which kind of memory access triggered a memory hook.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemAccess {
    Read,
    Write,
    Fetch,
}

/// Opaque handle to a registered hook, returned by [`CpuEngine::hook_add`]
/// and accepted by [`CpuEngine::hook_del`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle(pub(crate) u64);

/// Which native hook family to register. Mirrors Unicorn's `UC_HOOK_*`
/// family, one variant per row of the Hook Bridge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookType {
    Code,
    Block,
    Intr,
    MemRead,
    MemWrite,
    MemFetch,
    MemReadInvalid,
    MemWriteInvalid,
    MemFetchInvalid,
    MemUnmapped,
    MemInvalid,
    /// Instruction-class hook (e.g. the x86 `syscall` instruction).
    Insn(u32),
}

/// The unbridged callback shapes a native engine invokes. Only
/// [`crate::hooks`] constructs these; application code registers through
/// `Emulator::hook_*`, which wraps a user callback into one of these and a
/// keyboard-interrupt guard.
pub enum RawCallback {
    Code(Box<dyn FnMut(u64, u32)>),
    Block(Box<dyn FnMut(u64, u32)>),
    Intr(Box<dyn FnMut(u32)>),
    Mem(Box<dyn FnMut(MemAccess, u64, usize, i64) -> bool>),
    /// Fires with no arguments (e.g. the x86 syscall instruction hook, or a
    /// single-address code hook collapsed by the bridge).
    Insn(Box<dyn FnMut()>),
}

/// Capability surface the orchestrator needs from a native CPU emulator:
/// map/read/write memory, read/write registers, register hooks with
/// `(begin, end)` address filtering, and start/stop the run loop.
///
/// Not `Send`: an [`crate::Emulator`] is a single-threaded, `Rc`-based
/// handle by design (see `emulator.rs`), and hook callbacks close over
/// `Weak<RefCell<_>>` references into it.
pub trait CpuEngine {
    fn mem_map(&mut self, addr: u64, size: usize, perms: Perms) -> Result<()>;
    fn mem_unmap(&mut self, addr: u64, size: usize) -> Result<()>;
    fn mem_read(&self, addr: u64, size: usize) -> Result<Vec<u8>>;
    fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<()>;

    fn reg_read(&self, reg: RegId) -> Result<u64>;
    fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()>;

    fn hook_add(&mut self, kind: HookType, begin: u64, end: u64, callback: RawCallback) -> Result<HookHandle>;
    fn hook_del(&mut self, handle: HookHandle) -> Result<()>;

    /// Start emulation at `begin`. `until == 0` means run unbounded (the
    /// personality runner decides); `timeout_us == 0` means no deadline.
    fn start(&mut self, begin: u64, until: u64, timeout_us: u64) -> Result<()>;

    /// Stop a running (or about-to-run) engine. Must be safe to call from
    /// inside a hook callback and idempotent if already stopped.
    fn stop(&mut self) -> Result<()>;
}
