//! POSIX-family file descriptor table.
//!
//! Fixed 256-slot shape for ABI fidelity with guest code that assumes small
//! integer fds and may probe slots directly; each slot is an `Option` so
//! "closed" is distinct from "open fd 0".

use std::io::{Read, Write};

use crate::error::{Error, Result};
use crate::logging::LogSink;

pub const FD_TABLE_SIZE: usize = 256;

/// What a guest fd slot is backed by. Real file/socket backends are outside
/// this crate's scope; stdio is bound directly to the emulator's log sinks
/// so shellcode that writes to fd 1 is observable without a host file.
pub enum FdBacking {
    Stdin,
    Stdout(LogSink),
    Stderr(LogSink),
    File(std::fs::File),
}

impl FdBacking {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self {
            FdBacking::Stdin => Ok(std::io::stdin().read(buf)?),
            FdBacking::Stdout(_) | FdBacking::Stderr(_) => Ok(0),
            FdBacking::File(f) => Ok(f.read(buf)?),
        }
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        match self {
            FdBacking::Stdout(sink) | FdBacking::Stderr(sink) => {
                let text = String::from_utf8_lossy(buf);
                match sink {
                    LogSink::Stdout => {
                        print!("{text}");
                        std::io::stdout().flush().ok();
                    }
                    LogSink::Captured(buf_lines) => {
                        buf_lines.lock().unwrap().push(text.into_owned());
                    }
                }
                Ok(buf.len())
            }
            FdBacking::Stdin => Ok(0),
            FdBacking::File(f) => Ok(f.write(buf)?),
        }
    }
}

pub struct FdTable {
    slots: Vec<Option<FdBacking>>,
}

impl FdTable {
    /// Build a fresh table with fds 0/1/2 bound to stdio, everything else closed.
    pub fn new(stdout_sink: LogSink, stderr_sink: LogSink) -> Self {
        let mut slots: Vec<Option<FdBacking>> = (0..FD_TABLE_SIZE).map(|_| None).collect();
        slots[0] = Some(FdBacking::Stdin);
        slots[1] = Some(FdBacking::Stdout(stdout_sink));
        slots[2] = Some(FdBacking::Stderr(stderr_sink));
        Self { slots }
    }

    /// Force-bind a specific fd slot, replacing whatever (if anything) was
    /// there. Used to override the default stdin/stdout/stderr bindings at
    /// construction time.
    pub fn rebind(&mut self, fd: i32, backing: FdBacking) -> Result<()> {
        *self.slot_mut(fd)? = Some(backing);
        Ok(())
    }

    /// Bind the lowest closed slot to `backing`, returning its fd number.
    pub fn open(&mut self, backing: FdBacking) -> Result<i32> {
        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or_else(|| Error::InvalidOutput("fd table exhausted".into()))?;
        self.slots[slot] = Some(backing);
        Ok(slot as i32)
    }

    pub fn close(&mut self, fd: i32) -> Result<()> {
        let slot = self.slot_mut(fd)?;
        *slot = None;
        Ok(())
    }

    pub fn read(&mut self, fd: i32, buf: &mut [u8]) -> Result<usize> {
        self.slot_mut(fd)?.as_mut().ok_or_else(bad_fd)?.read(buf)
    }

    pub fn write(&mut self, fd: i32, buf: &[u8]) -> Result<usize> {
        self.slot_mut(fd)?.as_mut().ok_or_else(bad_fd)?.write(buf)
    }

    fn slot_mut(&mut self, fd: i32) -> Result<&mut Option<FdBacking>> {
        self.slots.get_mut(fd as usize).ok_or_else(bad_fd)
    }
}

fn bad_fd() -> Error {
    Error::InvalidOutput("bad file descriptor".into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdio_is_bound_at_construction() {
        let mut table = FdTable::new(LogSink::captured(), LogSink::captured());
        assert_eq!(table.write(1, b"hi").unwrap(), 2);
    }

    #[test]
    fn open_finds_lowest_closed_slot() {
        let mut table = FdTable::new(LogSink::captured(), LogSink::captured());
        let fd = table.open(FdBacking::File(tempfile_dummy())).unwrap();
        assert_eq!(fd, 3);
    }

    #[test]
    fn close_then_use_is_bad_fd() {
        let mut table = FdTable::new(LogSink::captured(), LogSink::captured());
        table.close(1).unwrap();
        assert!(table.write(1, b"x").is_err());
    }

    fn tempfile_dummy() -> std::fs::File {
        tempfile::tempfile().expect("tempfile")
    }
}
