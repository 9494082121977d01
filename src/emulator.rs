//! The Emulator Orchestrator: the central object every other module plugs
//! into.
//!
//! `Emulator` is a thin `Rc<RefCell<Inner>>` handle. Hook callbacks close
//! over a [`Weak`] reference to the same `Inner` so they can call back into
//! `Emulator` methods (e.g. `stop()`) without creating a reference cycle
//! through the engine they're registered on — unlike the daemon this
//! framework is descended from, which is genuinely multi-threaded and uses
//! `Arc<RwLock<_>>`/`Arc<Mutex<_>>` for its supervisor state, this
//! orchestrator runs one guest at a time on a single host thread, so
//! `Rc<RefCell<_>>` is the right tool.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::instrument;
use uuid::Uuid;

use crate::arch::{ArchProfile, ArchTag};
use crate::config::{DebuggerSpec, EmulatorOptions, EmulatorOptionsBuilder, OutputMode};
use crate::engine::{CpuEngine, HookType, MemAccess, RawCallback};
use crate::error::{Error, Result};
use crate::fd::{FdBacking, FdTable};
use crate::hooks::{guarded, BlockHook, CodeHook, InsnHook, IntrHook, MemHook, StopReason};
use crate::logging::{self, LogSink};
use crate::memmap::{MemoryMap, Perms};
use crate::os::posix::{SyscallCallback, SyscallKey, SyscallTable};
use crate::os::windows::{ApiCallback, ApiTable};
use crate::os::{self, FsMapperList, OsType};
use crate::patch::PatchSet;
use crate::thread::ThreadManager;

/// Assembles source for the current architecture into machine bytes.
/// Out of scope to implement a real assembler here; [`NoAssembler`] is the
/// test double wired in by default.
pub trait Assembler {
    fn assemble(&self, src: &str, arm_thumb: bool) -> Result<Vec<u8>>;
}

/// Default `Assembler`: always reports unimplemented. Swap via
/// `Emulator::set_assembler` in tests or host applications that link a
/// real assembler crate.
pub struct NoAssembler;

impl Assembler for NoAssembler {
    fn assemble(&self, _src: &str, _arm_thumb: bool) -> Result<Vec<u8>> {
        Err(Error::InvalidOutput("no assembler backend configured".into()))
    }
}

/// Which construction path produced this instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunType {
    File,
    Shellcode,
}

struct Inner {
    options: EmulatorOptions,
    arch: ArchTag,
    os: OsType,
    profile: Box<dyn ArchProfile>,
    engine: Box<dyn CpuEngine>,
    map: MemoryMap,
    patches: PatchSet,
    fd_table: Option<FdTable>,
    thread_manager: Option<ThreadManager>,
    root_sink: LogSink,
    internal_exception: Option<Error>,
    exit_code: i32,
    run_type: RunType,
    stop_reason: Option<StopReason>,
    syscalls: SyscallTable,
    apis: ApiTable,
    fs_mappers: FsMapperList,
    assembler: Box<dyn Assembler>,
    timeout_us: u64,
    exit_addr: Option<u64>,
    load_base: u64,
}

/// Central orchestrator object. Cheap to clone (it's a refcounted handle);
/// clones share the same guest state.
#[derive(Clone)]
pub struct Emulator {
    inner: Rc<RefCell<Inner>>,
}

thread_local! {
    /// The engine currently executing a `CpuEngine::start` call, if any.
    ///
    /// A hook fires synchronously from inside `start`, on the same stack,
    /// while `run_until` is still holding `inner` borrowed — a reentrant
    /// `self.inner.borrow()` from the hook's `reg_read`/`stop`/etc. would hit
    /// `RefCell`'s own panic, not a real data race (nothing else touches
    /// `Inner` from another thread; this orchestrator is single-threaded by
    /// construction). `run_until` stashes a raw pointer to the same engine
    /// here for the duration of the call so those reentrant accesses can
    /// reach it without re-borrowing `inner`.
    static ACTIVE_ENGINE: RefCell<Option<*mut dyn CpuEngine>> = RefCell::new(None);
}

impl Emulator {
    pub fn options_builder() -> EmulatorOptionsBuilder {
        EmulatorOptions::builder()
    }

    /// Validate `options`, resolve the OS/arch personality, and run the
    /// appropriate loader. Construction failures are fatal: no partially
    /// constructed instance is returned.
    #[instrument(skip(options, engine))]
    pub fn new(options: EmulatorOptions, engine: Box<dyn CpuEngine>) -> Result<Emulator> {
        let run_type = if options.shellcoder.is_some() { RunType::Shellcode } else { RunType::File };

        if run_type == RunType::File {
            let filename = options.filename.first().cloned().unwrap_or_default();
            if filename.is_empty() {
                return Err(Error::FileNotFound("<empty filename>".into()));
            }
            let rootfs = options.rootfs.clone().ok_or_else(|| Error::FileNotFound("<missing rootfs>".into()))?;
            if !rootfs.exists() {
                return Err(Error::FileNotFound(rootfs));
            }
            let image_path = rootfs.join(&filename);
            if !image_path.exists() {
                return Err(Error::FileNotFound(image_path));
            }
        } else if run_type == RunType::Shellcode && (options.archtype.is_none() || options.ostype.is_none()) {
            return Err(Error::InvalidArch("shellcode mode requires explicit archtype and ostype".into()));
        }

        let arch = options.archtype.ok_or_else(|| Error::InvalidArch("<unset>".into()))?;
        let os_type = options.ostype.ok_or_else(|| Error::InvalidOsType("<unset>".into()))?;
        let profile = arch.profile(options.bigendian);

        let root_sink = LogSink::Stdout;
        let mut fd_table = if os_type.is_posix() { Some(FdTable::new(root_sink.clone(), root_sink.clone())) } else { None };
        if let Some(table) = fd_table.as_mut() {
            rebind_stdio(table, &options)?;
        }
        let thread_manager = if options.multithread { Some(ThreadManager::new()) } else { None };

        let timeout_us = options.timeout_us;
        let exit_addr = options.exit_addr;

        let inner = Inner {
            options,
            arch,
            os: os_type,
            profile,
            engine,
            map: MemoryMap::new(),
            patches: PatchSet::new(),
            fd_table,
            thread_manager,
            root_sink,
            internal_exception: None,
            exit_code: 0,
            run_type,
            stop_reason: None,
            syscalls: SyscallTable::new(),
            apis: ApiTable::new(),
            fs_mappers: FsMapperList::default(),
            assembler: Box::new(NoAssembler),
            timeout_us,
            exit_addr,
            load_base: 0,
        };

        let emu = Emulator { inner: Rc::new(RefCell::new(inner)) };

        if run_type == RunType::Shellcode {
            emu.shellcode()?;
        } else {
            emu.load_exec()?;
        }

        Ok(emu)
    }

    fn weak(&self) -> Weak<RefCell<Inner>> {
        Rc::downgrade(&self.inner)
    }

    /// Apply any pending binary patches, then invoke the OS-specific
    /// `loader_shellcode`.
    pub fn shellcode(&self) -> Result<()> {
        let (os, arch) = {
            let inner = self.inner.borrow();
            (inner.os, inner.arch)
        };
        let personality = os::personality(os, arch);
        let mut emu = self.clone();
        (personality.loader_shellcode)(&mut emu)
    }

    /// Invoke the OS-specific `loader_file`.
    pub fn load_exec(&self) -> Result<()> {
        let (os, arch) = {
            let inner = self.inner.borrow();
            (inner.os, inner.arch)
        };
        let personality = os::personality(os, arch);
        let mut emu = self.clone();
        (personality.loader_file)(&mut emu)
    }

    /// If a debugger spec is set, start its debugger bridge, flush the
    /// Patch Set, then hand control to the personality runner until a stop
    /// condition fires, finally driving the debugger session to completion
    /// if one was started.
    #[instrument(skip(self), fields(run_id = %Uuid::new_v4()))]
    pub fn run(&mut self) -> Result<()> {
        let raw_debugger_spec = {
            let inner = self.inner.borrow();
            inner.options.debugger.clone()
        };
        let debugger = raw_debugger_spec.as_deref().map(DebuggerSpec::parse).transpose()?;
        if let Some(spec) = &debugger {
            self.start_debugger_bridge(spec)?;
        }

        let load_base = {
            let mut inner = self.inner.borrow_mut();
            inner.stop_reason = None;
            inner.load_base
        };
        self.apply_patches_at(load_base)?;

        let (os, arch) = {
            let inner = self.inner.borrow();
            (inner.os, inner.arch)
        };
        let personality = os::personality(os, arch);
        let mut emu = self.clone();
        (personality.runner)(&mut emu)?;

        let inner = self.inner.borrow();
        if let Some(reason) = inner.stop_reason {
            if reason == StopReason::Unexpected && inner.internal_exception.is_some() {
                tracing::warn!("run stopped with internal exception recorded");
            }
        }
        drop(inner);

        if let Some(spec) = &debugger {
            self.drive_debugger_session(spec)?;
        }
        Ok(())
    }

    /// Validate and "start" a remote debugger bridge for `spec`. Actually
    /// hosting a gdbserver-compatible socket is an external collaborator
    /// this crate doesn't implement; what belongs here — parsing, kind
    /// validation, and turning a setup-time panic into
    /// `Error::RemoteDebugSessionEnded` the way a caught keyboard interrupt
    /// would — is.
    fn start_debugger_bridge(&self, spec: &DebuggerSpec) -> Result<()> {
        tracing::info!(kind = %spec.kind, ip = %spec.ip, port = spec.port, "debugger bridge requested");
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            tracing::debug!("debugger bridge setup is a stub in this build");
        })) {
            Ok(()) => Ok(()),
            Err(_) => Err(Error::RemoteDebugSessionEnded),
        }
    }

    /// Drive the (stubbed) debugger session to completion after the guest
    /// run ends. A no-op until a real bridge is wired in.
    fn drive_debugger_session(&self, spec: &DebuggerSpec) -> Result<()> {
        tracing::debug!(kind = %spec.kind, "debugger session complete");
        Ok(())
    }

    /// Stop the engine, optionally marking the current guest thread.
    /// Safe to call from inside a hook callback.
    pub fn stop(&self, reason: StopReason) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(mgr) = inner.thread_manager.as_mut() {
                mgr.stop_current(reason);
            }
            inner.stop_reason = Some(reason);
        }
        let _ = self.with_engine(|engine| engine.stop());
    }

    pub(crate) fn set_stop_reason(&self, reason: StopReason) {
        self.inner.borrow_mut().stop_reason = Some(reason);
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.inner.borrow().stop_reason
    }

    pub fn exit_code(&self) -> i32 {
        self.inner.borrow().exit_code
    }

    pub fn set_exit_code(&self, code: i32) {
        self.inner.borrow_mut().exit_code = code;
    }

    pub fn internal_exception(&self) -> bool {
        self.inner.borrow().internal_exception.is_some()
    }

    pub fn options(&self) -> std::cell::Ref<'_, EmulatorOptions> {
        std::cell::Ref::map(self.inner.borrow(), |i| &i.options)
    }

    pub fn set_timeout(&self, microseconds: u64) {
        self.inner.borrow_mut().timeout_us = microseconds;
    }

    pub fn set_exit(&self, addr: u64) {
        self.inner.borrow_mut().exit_addr = Some(addr);
    }

    pub fn set_assembler(&self, assembler: Box<dyn Assembler>) {
        self.inner.borrow_mut().assembler = assembler;
    }

    pub fn asm2bytes(&self, src: &str, arm_thumb: bool) -> Result<Vec<u8>> {
        self.inner.borrow().assembler.assemble(src, arm_thumb)
    }

    pub fn mem_read(&self, addr: u64, size: usize) -> Result<Vec<u8>> {
        self.with_engine(|engine| engine.mem_read(addr, size))
    }

    pub fn mem_write(&self, addr: u64, data: &[u8]) -> Result<()> {
        self.with_engine(|engine| engine.mem_write(addr, data))
    }

    pub fn reg_read(&self, reg: crate::engine::RegId) -> Result<u64> {
        self.with_engine(|engine| engine.reg_read(reg))
    }

    pub fn reg_write(&self, reg: crate::engine::RegId, value: u64) -> Result<()> {
        self.with_engine(|engine| engine.reg_write(reg, value))
    }

    /// Route an engine access through the reentrant-safe path when called
    /// from inside a hook (see [`ACTIVE_ENGINE`]), or through the normal
    /// `Inner` borrow otherwise.
    fn with_engine<R>(&self, f: impl FnOnce(&mut dyn CpuEngine) -> R) -> R {
        let active = ACTIVE_ENGINE.with(|cell| *cell.borrow());
        match active {
            // SAFETY: only set by `run_until` for the exact duration of the
            // `CpuEngine::start` call it's driving, to the same engine this
            // `Emulator` owns; cleared before `run_until` returns. Sound
            // because a given `Emulator` never has two `start` calls in
            // flight at once.
            Some(ptr) => f(unsafe { &mut *ptr }),
            None => f(self.inner.borrow_mut().engine.as_mut()),
        }
    }

    /// Current program counter, in the active arch profile's register.
    pub fn pc(&self) -> Result<u64> {
        self.get_pc()
    }

    /// Address the active personality mapped the entry image/shellcode at.
    pub fn load_base(&self) -> u64 {
        self.inner.borrow().load_base
    }

    /// Write to a POSIX-family fd. Fails on a Windows personality, which
    /// has no fd table.
    pub(crate) fn fd_write(&self, fd: i32, data: &[u8]) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        inner
            .fd_table
            .as_mut()
            .ok_or_else(|| Error::InvalidOutput("no fd table for this OS personality".into()))?
            .write(fd, data)
    }

    /// Dispatch `id` to a user-registered syscall override, if any. The
    /// table is taken out of `Inner` for the duration of the call so the
    /// override's `&mut Emulator` can freely borrow `self.inner` (e.g. to
    /// read registers or call `stop`) without a double-borrow.
    pub(crate) fn dispatch_syscall(&self, id: i64, args: &[u64]) -> Option<Result<i64>> {
        let mut table = std::mem::take(&mut self.inner.borrow_mut().syscalls);
        let mut emu = self.clone();
        let result = table.dispatch(&mut emu, id, args);
        self.inner.borrow_mut().syscalls = table;
        result
    }

    pub fn pack(&self, value: u64) -> Result<Vec<u8>> {
        let inner = self.inner.borrow();
        crate::pack::pack(inner.profile.bits(), inner.profile.endian(), value)
    }

    pub fn unpack(&self, data: &[u8]) -> Result<u64> {
        let inner = self.inner.borrow();
        crate::pack::unpack(inner.profile.bits(), inner.profile.endian(), data)
    }

    pub fn unpacks(&self, data: &[u8]) -> Result<i64> {
        let inner = self.inner.borrow();
        crate::pack::unpacks(inner.profile.bits(), inner.profile.endian(), data)
    }

    /// Queue a patch against the main binary (empty/absent `label`) or a
    /// named library.
    pub fn patch(&self, addr: u64, bytes: impl Into<Vec<u8>>, label: Option<&str>) {
        let mut inner = self.inner.borrow_mut();
        match label {
            Some(label) if !label.is_empty() => inner.patches.patch_lib(label, addr, bytes),
            _ => inner.patches.patch_bin(addr, bytes),
        }
    }

    pub fn set_syscall(&self, key: impl Into<SyscallKey>, callback: SyscallCallback) {
        self.inner.borrow_mut().syscalls.set(key, callback);
    }

    pub fn set_api(&self, name: impl Into<String>, callback: ApiCallback) {
        self.inner.borrow_mut().apis.set(name, callback);
    }

    pub fn add_fs_mapper(&self, guest_prefix: impl Into<String>, host_target: impl Into<std::path::PathBuf>) {
        self.inner.borrow_mut().fs_mappers.push(guest_prefix, host_target);
    }

    pub fn nprint(&self, msg: impl std::fmt::Display) {
        let inner = self.inner.borrow();
        if inner.options.output == OutputMode::Off {
            return;
        }
        let sink = inner.thread_manager.as_ref().and_then(ThreadManager::current_sink).unwrap_or_else(|| inner.root_sink.clone());
        logging::with_sink(sink, || logging::nprint(msg));
    }

    pub fn dprint(&self, level: u32, msg: impl std::fmt::Display) {
        let inner = self.inner.borrow();
        if inner.options.verbose >= level && matches!(inner.options.output, OutputMode::Debug | OutputMode::Dump) {
            let sink = inner.thread_manager.as_ref().and_then(ThreadManager::current_sink).unwrap_or_else(|| inner.root_sink.clone());
            logging::with_sink(sink, || logging::dprint(msg));
        }
    }

    // -- loader/runner-facing helpers (pub(crate), not part of the public API) --

    pub(crate) fn set_pc(&self, value: u64) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.profile.set_pc(inner.engine.as_mut(), value)
    }

    pub(crate) fn set_sp(&self, value: u64) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.profile.set_sp(inner.engine.as_mut(), value)
    }

    pub(crate) fn get_pc(&self) -> Result<u64> {
        let inner = self.inner.borrow();
        inner.profile.get_pc(inner.engine.as_ref())
    }

    /// Flush queued patches against `base`, resolving library bases via the
    /// current map. Used both by `run()` (bin base) and by loaders that
    /// need patches applied immediately after mapping shellcode.
    pub(crate) fn apply_patches_at(&self, base: u64) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let map = inner.map.clone();
        inner.patches.apply(inner.engine.as_mut(), base, |name| map.lookup_base_by_filename(name))
    }

    pub(crate) fn map_and_write(&self, addr: u64, size: usize, perms: Perms, label: &str, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.engine.mem_map(addr, size, perms)?;
        inner.engine.mem_write(addr, data)?;
        inner.map.insert(addr, addr + size as u64, perms, label);
        Ok(())
    }

    pub(crate) fn set_load_base(&self, base: u64) {
        self.inner.borrow_mut().load_base = base;
    }

    /// Current deadline set by [`Emulator::set_timeout`] (0 = unbounded).
    /// Distinct from `options().timeout_us`, which is only the
    /// construction-time default and doesn't see later `set_timeout` calls.
    pub(crate) fn timeout_us(&self) -> u64 {
        self.inner.borrow().timeout_us
    }

    /// Current exit address set by [`Emulator::set_exit`], if any. Distinct
    /// from `options().exit_addr` for the same reason as `timeout_us`.
    pub(crate) fn exit_addr(&self) -> Option<u64> {
        self.inner.borrow().exit_addr
    }

    pub(crate) fn map_stack(&self, addr: u64, size: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.engine.mem_map(addr, size, Perms::RW)?;
        inner.map.insert(addr, addr + size as u64, Perms::RW, "[stack]");
        Ok(())
    }

    /// Drive the engine from the current PC until `until` (0 = unbounded)
    /// or `timeout_us` (0 = unbounded), consulting `set_exit`/`set_timeout`
    /// if the caller didn't override them.
    pub(crate) fn run_until(&self, until: u64, timeout_us: u64) -> Result<()> {
        let pc = {
            let inner = self.inner.borrow();
            inner.profile.get_pc(inner.engine.as_ref())?
        };
        // `inner` must not still be borrowed once `start` is running: hooks
        // fire synchronously from inside it and reach the engine through
        // `ACTIVE_ENGINE` instead, but anything else they touch (`stop`,
        // `dispatch_syscall`, registers) goes back through `self.inner` the
        // normal way, which only works if this borrow has already ended.
        let engine_ptr: *mut dyn CpuEngine = {
            let mut inner = self.inner.borrow_mut();
            inner.engine.as_mut() as *mut dyn CpuEngine
        };
        ACTIVE_ENGINE.with(|cell| *cell.borrow_mut() = Some(engine_ptr));
        let result = self.with_engine(|engine| engine.start(pc, until, timeout_us));
        ACTIVE_ENGINE.with(|cell| *cell.borrow_mut() = None);
        result
    }

    pub fn hook_code(&self, callback: CodeHook) -> Result<()> {
        self.hook_code_range(callback, 1, 0)
    }

    pub fn hook_block(&self, mut callback: BlockHook) -> Result<()> {
        let weak = self.weak();
        let wrapped: Box<dyn FnMut(u64, u32)> = Box::new(move |addr, size| {
            let Some(emu) = upgrade(&weak) else { return };
            let (_, panicked) = guarded((), || callback(&emu, addr, size));
            record_panic(&weak, panicked);
        });
        self.register_hook(HookType::Block, 1, 0, RawCallback::Block(wrapped))
    }

    pub fn hook_intr(&self, mut callback: IntrHook) -> Result<()> {
        let weak = self.weak();
        let wrapped: Box<dyn FnMut(u32)> = Box::new(move |intno| {
            let Some(emu) = upgrade(&weak) else { return };
            let (_, panicked) = guarded((), || callback(&emu, intno));
            record_panic(&weak, panicked);
        });
        self.register_hook(HookType::Intr, 1, 0, RawCallback::Intr(wrapped))
    }

    /// Fires exactly once per execution of `addr`.
    pub fn hook_address(&self, mut callback: InsnHook, addr: u64) -> Result<()> {
        let weak = self.weak();
        let wrapped: CodeHook = Box::new(move |emu, _pc, _size| {
            let (_, panicked) = guarded((), || callback(emu));
            record_panic(&weak, panicked);
        });
        self.hook_code_range(wrapped, addr, addr + 1)
    }

    pub fn hook_mem_read(&self, callback: MemHook) -> Result<()> {
        self.register_mem_hook(HookType::MemRead, callback)
    }

    pub fn hook_mem_write(&self, callback: MemHook) -> Result<()> {
        self.register_mem_hook(HookType::MemWrite, callback)
    }

    pub fn hook_mem_unmapped(&self, callback: MemHook) -> Result<()> {
        self.register_mem_hook(HookType::MemUnmapped, callback)
    }

    fn hook_code_range(&self, mut callback: CodeHook, begin: u64, end: u64) -> Result<()> {
        let weak = self.weak();
        let wrapped: Box<dyn FnMut(u64, u32)> = Box::new(move |addr, size| {
            let Some(emu) = upgrade(&weak) else { return };
            let (_, panicked) = guarded((), || callback(&emu, addr, size));
            record_panic(&weak, panicked);
        });
        self.register_hook(HookType::Code, begin, end, RawCallback::Code(wrapped))
    }

    fn register_mem_hook(&self, kind: HookType, mut callback: MemHook) -> Result<()> {
        let weak = self.weak();
        let wrapped: Box<dyn FnMut(MemAccess, u64, usize, i64) -> bool> = Box::new(move |access, addr, size, value| {
            let Some(emu) = upgrade(&weak) else { return false };
            let (allow, panicked) = guarded(false, || callback(&emu, access, addr, size, value));
            record_panic(&weak, panicked);
            allow
        });
        self.register_hook(kind, 1, 0, RawCallback::Mem(wrapped))
    }

    fn register_hook(&self, kind: HookType, begin: u64, end: u64, raw: RawCallback) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.engine.hook_add(kind, begin, end, raw)?;
        Ok(())
    }
}

/// Upgrade a hook closure's `Weak` back into a usable `Emulator` handle, or
/// `None` if the emulator has already been dropped.
fn upgrade(weak: &Weak<RefCell<Inner>>) -> Option<Emulator> {
    weak.upgrade().map(|inner| Emulator { inner })
}

/// If a hook panicked, stash the failure in `internal_exception` and halt
/// the engine through the normal `stop` path — setting `stop_reason`
/// directly here would leave `CpuEngine::stop` uncalled, so a real engine
/// would keep running guest instructions past the point the panic should
/// have cut the run off.
fn record_panic(weak: &Weak<RefCell<Inner>>, panicked: Option<StopReason>) {
    let Some(reason) = panicked else { return };
    let Some(emu) = upgrade(weak) else { return };
    {
        let mut inner = emu.inner.borrow_mut();
        if inner.internal_exception.is_none() {
            inner.internal_exception = Some(Error::HookPanicked("hook callback panicked".into()));
        }
    }
    emu.stop(reason);
}

/// Override fd 0/1/2 with host files when `stdin_path`/`stdout_path`/
/// `stderr_path` are set, instead of the default stdin/stdout bindings.
fn rebind_stdio(table: &mut FdTable, options: &EmulatorOptions) -> Result<()> {
    if let Some(path) = &options.stdin_path {
        table.rebind(0, FdBacking::File(std::fs::File::open(path)?))?;
    }
    if let Some(path) = &options.stdout_path {
        table.rebind(1, FdBacking::File(std::fs::File::create(path)?))?;
    }
    if let Some(path) = &options.stderr_path {
        table.rebind(2, FdBacking::File(std::fs::File::create(path)?))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::MockEngine;

    fn shellcode_options(bytes: Vec<u8>) -> EmulatorOptions {
        EmulatorOptions::builder()
            .shellcoder(bytes)
            .archtype("x86")
            .ostype("linux")
            .build()
            .unwrap()
    }

    #[test]
    fn construction_rejects_missing_rootfs_in_file_mode() {
        let options = EmulatorOptions::builder().filename(["a.out"]).build().unwrap();
        let result = Emulator::new(options, Box::new(MockEngine::new()));
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn shellcode_construction_maps_code_and_stack() {
        let options = shellcode_options(vec![0x90, 0x90, 0xF4]);
        let emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        assert!(emu.mem_read(0x0040_0000, 2).is_ok());
    }

    #[test]
    fn mmap_start_and_stack_address_override_the_loaders_defaults() {
        let options = EmulatorOptions::builder()
            .shellcoder(vec![0x90, 0x90])
            .archtype("x86")
            .ostype("linux")
            .mmap_start(0x1000_0000)
            .stack_address(0x2000_0000)
            .stack_size(0x1000)
            .build()
            .unwrap();
        let emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        assert_eq!(emu.load_base(), 0x1000_0000);
        assert!(emu.mem_read(0x1000_0000, 2).is_ok());
        assert!(emu.mem_read(0x2000_0000 - 0x1000, 1).is_ok());
    }

    // `MockEngine::hook_add` doesn't invoke the callbacks it's given (see
    // its doc comment), so a hook registered against it never actually
    // runs — exercising `record_panic` against a real panicking hook needs
    // a real engine and lives in `tests/shellcode_linux_x86.rs` instead.
    // This drives `record_panic` directly to cover its own bookkeeping:
    // `internal_exception` gets set and the stop reaches `stop_reason`.
    #[test]
    fn record_panic_sets_internal_exception_and_stop_reason() {
        let options = shellcode_options(vec![0x90]);
        let emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        let weak = emu.weak();
        record_panic(&weak, Some(StopReason::Unexpected));
        assert!(emu.internal_exception());
        assert_eq!(emu.stop_reason(), Some(StopReason::Unexpected));
    }

    #[test]
    fn run_rejects_a_malformed_debugger_spec_before_executing() {
        let options = EmulatorOptions::builder()
            .shellcoder(vec![0x90])
            .archtype("x86")
            .ostype("linux")
            .debugger("not-a-spec")
            .build()
            .unwrap();
        let mut emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        assert!(matches!(emu.run(), Err(Error::DebuggerUnsupported(_))));
    }

    #[test]
    fn run_accepts_a_valid_debugger_spec_and_completes() {
        let options = EmulatorOptions::builder()
            .shellcoder(vec![0x90])
            .archtype("x86")
            .ostype("linux")
            .debugger("gdb:127.0.0.1:1234")
            .build()
            .unwrap();
        let mut emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        emu.set_exit(0x0040_0001);
        assert!(emu.run().is_ok());
    }

    #[test]
    fn set_exit_and_set_timeout_are_stored() {
        let options = shellcode_options(vec![0x90]);
        let emu = Emulator::new(options, Box::new(MockEngine::new())).expect("construct");
        emu.set_exit(0x1234);
        emu.set_timeout(10_000);
        assert_eq!(emu.inner.borrow().exit_addr, Some(0x1234));
        assert_eq!(emu.inner.borrow().timeout_us, 10_000);
    }
}
