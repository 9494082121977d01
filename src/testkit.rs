//! Deterministic in-memory [`CpuEngine`] used by unit and integration tests.
//!
//! Real register semantics and instruction execution belong to the native
//! CPU engine, which is out of scope here; `MockEngine` gives tests a
//! flat byte-addressable memory and a register file without pulling in
//! Unicorn, so Memory Map, Patch Set, and Arch Profile logic can be
//! exercised without a real CPU underneath.

use std::collections::HashMap;

use crate::engine::{CpuEngine, HookHandle, HookType, RawCallback, RegId};
use crate::error::{Error, Result};
use crate::memmap::Perms;

struct Region {
    perms: Perms,
    data: Vec<u8>,
}

/// In-memory stand-in for a real CPU engine. `start`/`stop` do not execute
/// any instructions; tests that need run-loop behavior drive registers and
/// hooks directly and call `start` only to exercise the stop/timeout
/// bookkeeping path.
#[derive(Default)]
pub struct MockEngine {
    regions: HashMap<u64, Region>,
    registers: HashMap<RegId, u64>,
    next_handle: u64,
    running: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_region(&self, addr: u64) -> Option<(u64, &Region)> {
        self.regions
            .iter()
            .find(|(&base, region)| addr >= base && addr < base + region.data.len() as u64)
            .map(|(&base, region)| (base, region))
    }
}

impl CpuEngine for MockEngine {
    fn mem_map(&mut self, addr: u64, size: usize, perms: Perms) -> Result<()> {
        self.regions.insert(addr, Region { perms, data: vec![0u8; size] });
        Ok(())
    }

    fn mem_unmap(&mut self, addr: u64, _size: usize) -> Result<()> {
        self.regions.remove(&addr);
        Ok(())
    }

    fn mem_read(&self, addr: u64, size: usize) -> Result<Vec<u8>> {
        let (base, region) = self.find_region(addr).ok_or(Error::MemoryFault { addr, size })?;
        let offset = (addr - base) as usize;
        region.data.get(offset..offset + size).map(<[u8]>::to_vec).ok_or(Error::MemoryFault { addr, size })
    }

    fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        let base = self
            .regions
            .iter()
            .find(|(&b, r)| addr >= b && addr + data.len() as u64 <= b + r.data.len() as u64)
            .map(|(&b, _)| b)
            .ok_or(Error::MemoryFault { addr, size: data.len() })?;
        let region = self.regions.get_mut(&base).unwrap();
        let offset = (addr - base) as usize;
        region.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn reg_read(&self, reg: RegId) -> Result<u64> {
        Ok(self.registers.get(&reg).copied().unwrap_or(0))
    }

    fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()> {
        self.registers.insert(reg, value);
        Ok(())
    }

    fn hook_add(&mut self, _kind: HookType, _begin: u64, _end: u64, _callback: RawCallback) -> Result<HookHandle> {
        self.next_handle += 1;
        Ok(HookHandle(self.next_handle))
    }

    fn hook_del(&mut self, _handle: HookHandle) -> Result<()> {
        Ok(())
    }

    fn start(&mut self, _begin: u64, _until: u64, _timeout_us: u64) -> Result<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut engine = MockEngine::new();
        engine.mem_map(0x1000, 0x100, Perms::RW).unwrap();
        engine.mem_write(0x1000, b"hello").unwrap();
        assert_eq!(engine.mem_read(0x1000, 5).unwrap(), b"hello");
    }

    #[test]
    fn read_outside_any_region_is_a_fault() {
        let engine = MockEngine::new();
        assert!(matches!(engine.mem_read(0x1000, 4), Err(Error::MemoryFault { .. })));
    }

    #[test]
    fn registers_default_to_zero() {
        let engine = MockEngine::new();
        assert_eq!(engine.reg_read(5).unwrap(), 0);
    }
}
