//! POSIX-family syscall override table and the linux/x86(-64) reference
//! personality.

use std::collections::HashMap;

use crate::emulator::Emulator;
use crate::error::Result;

/// A user-registered syscall override, called instead of (or in addition
/// to, if it chooses to delegate) the default table entry.
pub type SyscallCallback = Box<dyn FnMut(&mut Emulator, &[u64]) -> Result<i64>>;

/// How a syscall was identified when overridden: by its raw number or by
/// its conventional name. Mirrors `set_syscall(id_or_name, callback)`.
pub enum SyscallKey {
    Id(i64),
    Name(String),
}

impl From<i64> for SyscallKey {
    fn from(id: i64) -> Self {
        SyscallKey::Id(id)
    }
}

impl From<&str> for SyscallKey {
    fn from(name: &str) -> Self {
        SyscallKey::Name(name.to_string())
    }
}

/// `set_syscall` override map, keyed by id or by name; resolved id-first.
#[derive(Default)]
pub struct SyscallTable {
    by_id: HashMap<i64, SyscallCallback>,
    by_name: HashMap<String, SyscallCallback>,
    names: HashMap<i64, String>,
}

impl SyscallTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_name(&mut self, id: i64, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn set(&mut self, key: impl Into<SyscallKey>, callback: SyscallCallback) {
        match key.into() {
            SyscallKey::Id(id) => {
                self.by_id.insert(id, callback);
            }
            SyscallKey::Name(name) => {
                self.by_name.insert(name, callback);
            }
        }
    }

    pub fn has_override(&self, id: i64) -> bool {
        self.by_id.contains_key(&id) || self.names.get(&id).is_some_and(|name| self.by_name.contains_key(name))
    }

    /// Dispatch to a user override, if one is registered for `id`.
    pub fn dispatch(&mut self, emu: &mut Emulator, id: i64, args: &[u64]) -> Option<Result<i64>> {
        if let Some(cb) = self.by_id.get_mut(&id) {
            return Some(cb(emu, args));
        }
        if let Some(name) = self.names.get(&id).cloned() {
            if let Some(cb) = self.by_name.get_mut(&name) {
                return Some(cb(emu, args));
            }
        }
        None
    }
}

/// Reference linux personality, implemented concretely for x86 and x86-64;
/// every other OS/arch combination in the registry is a stub.
pub mod linux {
    use unicorn_engine::RegisterX86;

    use super::*;
    use crate::hooks::StopReason;

    const LOAD_BASE: u64 = 0x0040_0000;
    const STACK_TOP: u64 = 0x7fff_0000;
    const STACK_SIZE: usize = 0x0010_0000;

    // Linux/x86 `int 0x80` syscall numbers this reference personality
    // wires up directly; anything else falls through to a user override
    // (`set_syscall`) or is ignored.
    const SYS_EXIT: i64 = 1;
    const SYS_WRITE: i64 = 4;
    const SYS_EXIT_GROUP: i64 = 252;

    pub fn loader_shellcode(emu: &mut Emulator) -> Result<()> {
        let (mmap_start, stack_address, stack_size) = {
            let options = emu.options();
            (options.mmap_start, options.stack_address, options.stack_size)
        };
        let load_base = mmap_start.unwrap_or(LOAD_BASE);
        let stack_top = stack_address.unwrap_or(STACK_TOP);
        let stack_size = stack_size.unwrap_or(STACK_SIZE as u64) as usize;

        let code = emu.options().shellcoder.clone().unwrap_or_default();
        let code_size = code.len().max(0x1000).next_multiple_of(0x1000) as u64;
        emu.map_and_write(load_base, code_size as usize, crate::memmap::Perms::RWX, "shellcode", &code)?;
        emu.map_stack(stack_top - stack_size as u64, stack_size)?;
        emu.set_load_base(load_base);
        emu.set_pc(load_base)?;
        emu.set_sp(stack_top - 0x1000)?;
        emu.apply_patches_at(load_base)?;
        emu.hook_intr(Box::new(|emu, intno| {
            if intno == 0x80 {
                handle_int80(emu);
            }
        }))?;
        Ok(())
    }

    /// Service one `int 0x80` trap using the x86 `int 0x80` ABI: syscall
    /// number in `eax`, arguments in `ebx`, `ecx`, `edx`, `esi`, `edi`,
    /// `ebp`, return value written back to `eax`.
    fn handle_int80(emu: &Emulator) {
        let regs = [RegisterX86::EBX, RegisterX86::ECX, RegisterX86::EDX, RegisterX86::ESI, RegisterX86::EDI, RegisterX86::EBP];
        let nr = emu.reg_read(RegisterX86::EAX as crate::engine::RegId).unwrap_or(0) as i64;
        let args: Vec<u64> = regs.iter().map(|r| emu.reg_read(*r as crate::engine::RegId).unwrap_or(0)).collect();

        if let Some(result) = emu.dispatch_syscall(nr, &args) {
            if let Ok(value) = result {
                let _ = emu.reg_write(RegisterX86::EAX as crate::engine::RegId, value as u64);
            }
            return;
        }

        match nr {
            SYS_WRITE => {
                let (fd, buf_addr, count) = (args[0] as i32, args[1], args[2] as usize);
                let written = emu
                    .mem_read(buf_addr, count)
                    .ok()
                    .and_then(|data| emu.fd_write(fd, &data).ok())
                    .unwrap_or(0);
                let _ = emu.reg_write(RegisterX86::EAX as crate::engine::RegId, written as u64);
            }
            SYS_EXIT | SYS_EXIT_GROUP => {
                let code = args[0] as i32;
                emu.set_exit_code(code);
                emu.stop(StopReason::ExitGroup(code as i64));
            }
            _ => {
                let _ = emu.reg_write(RegisterX86::EAX as crate::engine::RegId, (-38i64) as u64); // ENOSYS
            }
        }
    }

    pub fn loader_file(_emu: &mut Emulator) -> Result<()> {
        Err(crate::error::Error::InvalidOsType(
            "ELF loading is an extension point; only shellcode mode is implemented for linux/x86".into(),
        ))
    }

    /// Drive the engine until `exit_addr`/timeout/syscall-exit, dispatching
    /// `int 0x80`/`syscall` through the syscall table. x86 shellcode in this
    /// reference personality is expected to trap via `int 0x80` with the
    /// syscall number in `eax`/`rax` and arguments in the conventional
    /// ebx/ecx/edx... (x86) or rdi/rsi/rdx... (x86-64) registers; this
    /// reference runner only wires up `write` and `exit`/`exit_group`
    /// directly, and otherwise defers to any user override.
    pub fn runner(emu: &mut Emulator) -> Result<()> {
        let until = emu.exit_addr().unwrap_or(0);
        let timeout = emu.timeout_us();
        let started = std::time::Instant::now();
        emu.run_until(until, timeout)?;

        // The engine's `start` returns the same `Ok(())` whether it stopped
        // because `until` was reached, because a hook called `stop`, or
        // because the timeout elapsed; Unicorn doesn't surface which. A
        // hook stop already recorded its own reason, so only classify the
        // remaining case by comparing wall time against the deadline we
        // asked for.
        if emu.stop_reason().is_none() {
            if timeout > 0 && started.elapsed().as_micros() as u64 >= timeout {
                emu.set_stop_reason(StopReason::Timeout);
            } else {
                emu.set_stop_reason(StopReason::ExitGroup(0));
            }
        }
        Ok(())
    }
}
