//! Deferred binary/library patch set.
//!
//! Loaders and callers queue byte patches against either the main image or
//! a named library before the guest's first instruction runs;
//! `Emulator::run` flushes the whole set into guest memory in declaration
//! order immediately before handing control to the personality runner.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use crate::engine::CpuEngine;
use crate::error::Result;

/// One pending write: `bytes` replace whatever is at `offset` within the
/// target image once it's mapped.
struct Patch {
    offset: u64,
    bytes: Vec<u8>,
}

/// Patches queued against the main executable, plus any named library
/// loaded alongside it (resolved later via
/// `MemoryMap::lookup_base_by_filename`).
#[derive(Default)]
pub struct PatchSet {
    binary: Vec<Patch>,
    libraries: HashMap<String, Vec<Patch>>,
    applied_libs: RefCell<HashSet<String>>,
}

impl PatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a patch against the main binary at `offset` from its load base.
    pub fn patch_bin(&mut self, offset: u64, bytes: impl Into<Vec<u8>>) {
        self.binary.push(Patch { offset, bytes: bytes.into() });
    }

    /// Queue a patch against `library` at `offset` from its load base.
    pub fn patch_lib(&mut self, library: impl Into<String>, offset: u64, bytes: impl Into<Vec<u8>>) {
        self.libraries.entry(library.into()).or_default().push(Patch { offset, bytes: bytes.into() });
    }

    pub fn is_empty(&self) -> bool {
        self.binary.is_empty() && self.libraries.values().all(Vec::is_empty)
    }

    /// Write every queued patch into guest memory, in declaration order.
    /// `bin_base` is the main image's load address; `lib_base` resolves a
    /// library name to its load address (typically via
    /// `MemoryMap::lookup_base_by_filename`).
    pub fn apply(&self, engine: &mut dyn CpuEngine, bin_base: u64, lib_base: impl Fn(&str) -> Option<u64>) -> Result<()> {
        for patch in &self.binary {
            engine.mem_write(bin_base + patch.offset, &patch.bytes)?;
        }
        self.apply_lib(engine, lib_base)
    }

    /// Apply only the library patches whose base is currently resolvable.
    /// A label already applied is skipped, so calling this again after a
    /// library that was previously unmapped becomes mapped only applies
    /// the newly-resolvable labels.
    pub fn apply_lib(&self, engine: &mut dyn CpuEngine, lib_base: impl Fn(&str) -> Option<u64>) -> Result<()> {
        for (name, patches) in &self.libraries {
            if self.applied_libs.borrow().contains(name) {
                continue;
            }
            let Some(base) = lib_base(name) else { continue };
            for patch in patches {
                engine.mem_write(base + patch.offset, &patch.bytes)?;
            }
            self.applied_libs.borrow_mut().insert(name.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockEngine;

    #[test]
    fn apply_writes_bin_patches_at_base_plus_offset() {
        let mut engine = MockEngine::new();
        engine.mem_map(0x1000, 0x1000, crate::memmap::Perms::RWX).unwrap();
        let mut patches = PatchSet::new();
        patches.patch_bin(4, vec![0x90, 0x90]);
        patches.apply(&mut engine, 0x1000, |_| None).unwrap();
        assert_eq!(engine.mem_read(0x1004, 2).unwrap(), vec![0x90, 0x90]);
    }

    #[test]
    fn apply_skips_library_patches_with_no_resolved_base() {
        let mut engine = MockEngine::new();
        engine.mem_map(0x1000, 0x1000, crate::memmap::Perms::RWX).unwrap();
        let mut patches = PatchSet::new();
        patches.patch_lib("libc.so.6", 0, vec![0xCC]);
        assert!(patches.apply(&mut engine, 0x1000, |_| None).is_ok());
    }
}
