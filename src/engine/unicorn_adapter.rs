//! [`CpuEngine`] backed by the `unicorn-engine` crate (Unicorn2 bindings).
//!
//! This is the production adapter: one [`UnicornEngine`] per [`crate::Emulator`],
//! constructed by the OS/arch personality's `loader_file`/`loader_shellcode`
//! once the architecture and bitness are known.

use std::collections::HashMap;

use unicorn_engine::unicorn_const::{Arch, HookType as UcHookType, MemType, Mode, Permission};
use unicorn_engine::Unicorn;

use crate::error::Error;
use crate::memmap::Perms;
use crate::Result;

use super::{CpuEngine, HookHandle, HookType, MemAccess, RawCallback, RegId};

fn to_uc_perms(perms: Perms) -> Permission {
    let mut p = Permission::NONE;
    if perms.read {
        p |= Permission::READ;
    }
    if perms.write {
        p |= Permission::WRITE;
    }
    if perms.exec {
        p |= Permission::EXEC;
    }
    p
}

fn mem_access_of(t: MemType) -> MemAccess {
    match t {
        MemType::WRITE | MemType::WRITE_UNMAPPED | MemType::WRITE_PROT => MemAccess::Write,
        MemType::FETCH | MemType::FETCH_UNMAPPED | MemType::FETCH_PROT => MemAccess::Fetch,
        _ => MemAccess::Read,
    }
}

/// Concrete [`CpuEngine`] wrapping a Unicorn2 instance.
///
/// Registered hooks own a boxed [`RawCallback`]; Unicorn's own
/// `add_*_hook` closures just dereference and invoke them, translating the
/// native argument shapes into the ones `CpuEngine` promises.
pub struct UnicornEngine {
    uc: Unicorn<'static, ()>,
    next_handle: u64,
    hooks: HashMap<u64, unicorn_engine::uc_handle>,
}

impl UnicornEngine {
    /// Construct an engine for `arch`/`mode` (e.g. `Arch::X86, Mode::MODE_32`).
    pub fn new(arch: Arch, mode: Mode) -> Result<Self> {
        let uc = Unicorn::new(arch, mode).map_err(|_| Error::MemoryFault { addr: 0, size: 0 })?;
        Ok(Self { uc, next_handle: 1, hooks: HashMap::new() })
    }
}

impl CpuEngine for UnicornEngine {
    fn mem_map(&mut self, addr: u64, size: usize, perms: Perms) -> Result<()> {
        self.uc
            .mem_map(addr, size, to_uc_perms(perms))
            .map_err(|_| Error::MemoryFault { addr, size })
    }

    fn mem_unmap(&mut self, addr: u64, size: usize) -> Result<()> {
        self.uc.mem_unmap(addr, size).map_err(|_| Error::MemoryFault { addr, size })
    }

    fn mem_read(&self, addr: u64, size: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; size];
        self.uc.mem_read(addr, &mut buf).map_err(|_| Error::MemoryFault { addr, size })?;
        Ok(buf)
    }

    fn mem_write(&mut self, addr: u64, data: &[u8]) -> Result<()> {
        self.uc
            .mem_write(addr, data)
            .map_err(|_| Error::MemoryFault { addr, size: data.len() })
    }

    fn reg_read(&self, reg: RegId) -> Result<u64> {
        self.uc.reg_read(reg as i32).map_err(|_| Error::MemoryFault { addr: 0, size: 0 })
    }

    fn reg_write(&mut self, reg: RegId, value: u64) -> Result<()> {
        self.uc
            .reg_write(reg as i32, value)
            .map_err(|_| Error::MemoryFault { addr: 0, size: 0 })
    }

    fn hook_add(&mut self, kind: HookType, begin: u64, end: u64, callback: RawCallback) -> Result<HookHandle> {
        let handle_id = self.next_handle;
        self.next_handle += 1;

        let uc_hook = match (kind, callback) {
            (HookType::Code, RawCallback::Code(mut cb)) => self
                .uc
                .add_code_hook(begin, end, move |_uc, addr, size| cb(addr, size))
                .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })?,
            (HookType::Block, RawCallback::Block(mut cb)) => self
                .uc
                .add_block_hook(begin, end, move |_uc, addr, size| cb(addr, size))
                .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })?,
            (HookType::Intr, RawCallback::Intr(mut cb)) => self
                .uc
                .add_intr_hook(move |_uc, intno| cb(intno))
                .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })?,
            (HookType::MemRead, RawCallback::Mem(mut cb))
            | (HookType::MemWrite, RawCallback::Mem(mut cb))
            | (HookType::MemFetch, RawCallback::Mem(mut cb))
            | (HookType::MemReadInvalid, RawCallback::Mem(mut cb))
            | (HookType::MemWriteInvalid, RawCallback::Mem(mut cb))
            | (HookType::MemFetchInvalid, RawCallback::Mem(mut cb))
            | (HookType::MemUnmapped, RawCallback::Mem(mut cb))
            | (HookType::MemInvalid, RawCallback::Mem(mut cb)) => self
                .uc
                .add_mem_hook(uc_hook_type_for(kind), begin, end, move |_uc, t, addr, size, value| {
                    cb(mem_access_of(t), addr, size, value)
                })
                .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })?,
            (HookType::Insn(insn), RawCallback::Insn(mut cb)) => self
                .uc
                .add_insn_sys_hook(insn, begin, end, move |_uc| cb())
                .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })?,
            _ => return Err(Error::InvalidOutput("hook kind/callback mismatch".into())),
        };

        self.hooks.insert(handle_id, uc_hook);
        Ok(HookHandle(handle_id))
    }

    fn hook_del(&mut self, handle: HookHandle) -> Result<()> {
        if let Some(uc_hook) = self.hooks.remove(&handle.0) {
            let _ = self.uc.remove_hook(uc_hook);
        }
        Ok(())
    }

    fn start(&mut self, begin: u64, until: u64, timeout_us: u64) -> Result<()> {
        self.uc
            .emu_start(begin, until, timeout_us, 0)
            .map_err(|_| Error::MemoryFault { addr: begin, size: 0 })
    }

    fn stop(&mut self) -> Result<()> {
        // emu_stop is safe to call redundantly; Unicorn no-ops if not running.
        let _ = self.uc.emu_stop();
        Ok(())
    }
}

fn uc_hook_type_for(kind: HookType) -> UcHookType {
    match kind {
        HookType::MemRead => UcHookType::MEM_READ,
        HookType::MemWrite => UcHookType::MEM_WRITE,
        HookType::MemFetch => UcHookType::MEM_FETCH,
        HookType::MemReadInvalid => UcHookType::MEM_READ_INVALID,
        HookType::MemWriteInvalid => UcHookType::MEM_WRITE_INVALID,
        HookType::MemFetchInvalid => UcHookType::MEM_FETCH_INVALID,
        HookType::MemUnmapped => UcHookType::MEM_UNMAPPED,
        HookType::MemInvalid => UcHookType::MEM_INVALID,
        _ => UcHookType::MEM_READ,
    }
}
