//! Cross-platform, multi-architecture binary emulation framework.
//!
//! [`Emulator`] is the orchestrator: construct one via
//! [`EmulatorOptions::builder`], register hooks, then call
//! [`Emulator::run`]. Everything else in this crate (the Arch Profile, the
//! Memory Map Registry, the Patch Set, the Hook Bridge, the OS personality
//! registry) is a collaborator the orchestrator drives through a narrow
//! contract; the CPU engine itself is provided by the `unicorn-engine`
//! crate and is out of this crate's scope to implement.

pub mod arch;
pub mod config;
pub mod emulator;
pub mod engine;
pub mod error;
pub mod fd;
pub mod hooks;
pub mod logging;
pub mod memmap;
pub mod os;
pub mod pack;
pub mod patch;
pub mod testkit;
pub mod thread;

pub use config::{DebuggerSpec, EmulatorOptions, EmulatorOptionsBuilder, OutputMode};
pub use emulator::{Assembler, Emulator, NoAssembler, RunType};
pub use error::{Error, Result};
pub use hooks::StopReason;

/// Install a `tracing_subscriber` registry with an `EnvFilter` (defaulting
/// to `info`, overridable via `RUST_LOG`) and the thread-aware routing
/// layer. Call once per process; host applications that already configure
/// their own subscriber should skip this and construct
/// [`logging::ThreadLogLayer`] directly.
pub fn init_tracing() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(logging::ThreadLogLayer::new(logging::LogSink::Stdout))
        .try_init();
}
