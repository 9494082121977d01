//! Public error type for the orchestrator.

use std::path::PathBuf;

/// Everything that can go wrong constructing or running an [`crate::Emulator`].
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("target binary or rootfs not found: {0}")]
    FileNotFound(PathBuf),

    #[error("invalid architecture: {0}")]
    InvalidArch(String),

    #[error("invalid os type: {0}")]
    InvalidOsType(String),

    #[error("invalid output mode or verbosity: {0}")]
    InvalidOutput(String),

    #[error("debugger backend not supported: {0}")]
    DebuggerUnsupported(String),

    #[error("hook callback panicked: {0}")]
    HookPanicked(String),

    #[error("remote debugging session ended")]
    RemoteDebugSessionEnded,

    #[error("memory fault at {addr:#x} (size {size})")]
    MemoryFault { addr: u64, size: usize },

    #[error("pack/unpack called with unsupported architecture width: {0}")]
    PackWidthUnsupported(u32),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
