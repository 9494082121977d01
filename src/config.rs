//! Construction-time options for [`crate::Emulator`].
//!
//! `EmulatorOptions` is built through `EmulatorOptions::builder()...build()`
//! the way the daemon this framework is descended from resolves its own
//! startup configuration: every field is named and typed, so an unknown
//! option is a compile error rather than a stringly-typed key that's only
//! caught at runtime.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::arch::ArchTag;
use crate::error::{Error, Result};
use crate::os::OsType;

/// How much (and where) guest-visible trace output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Default,
    Off,
    Disasm,
    Debug,
    Dump,
}

/// Parsed `kind:ip:port` remote-debugger spec (`kind` defaults to `gdb` when
/// the field is omitted, i.e. the spec is just `ip:port`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebuggerSpec {
    pub kind: String,
    pub ip: String,
    pub port: u16,
}

impl DebuggerSpec {
    const SUPPORTED_KINDS: &'static [&'static str] = &["gdb"];

    pub fn parse(spec: &str) -> Result<DebuggerSpec> {
        let parts: Vec<&str> = spec.split(':').collect();
        let (kind, ip, port) = match parts.as_slice() {
            [ip, port] => ("gdb", *ip, *port),
            [kind, ip, port] => (*kind, *ip, *port),
            _ => return Err(Error::DebuggerUnsupported(format!("malformed debugger spec {spec:?}, want kind:ip:port"))),
        };
        if !Self::SUPPORTED_KINDS.contains(&kind) {
            return Err(Error::DebuggerUnsupported(kind.to_string()));
        }
        let port: u16 = port
            .parse()
            .map_err(|_| Error::DebuggerUnsupported(format!("invalid port in debugger spec {spec:?}")))?;
        Ok(DebuggerSpec { kind: kind.to_string(), ip: ip.to_string(), port })
    }
}

impl OutputMode {
    pub fn parse(s: &str) -> Result<OutputMode> {
        match s {
            "default" => Ok(OutputMode::Default),
            "off" => Ok(OutputMode::Off),
            "disasm" => Ok(OutputMode::Disasm),
            "debug" => Ok(OutputMode::Debug),
            "dump" => Ok(OutputMode::Dump),
            other => Err(Error::InvalidOutput(other.to_string())),
        }
    }

    /// `verbose > 0` is only legal alongside `debug`/`dump` output.
    fn allows_verbose(self) -> bool {
        matches!(self, OutputMode::Debug | OutputMode::Dump)
    }
}

/// Fully resolved construction request for an [`crate::Emulator`].
#[derive(Debug, Clone)]
pub struct EmulatorOptions {
    pub filename: Vec<String>,
    pub argv: Vec<String>,
    pub env: HashMap<String, String>,
    pub rootfs: Option<PathBuf>,
    pub shellcoder: Option<Vec<u8>>,
    pub ostype: Option<OsType>,
    pub archtype: Option<ArchTag>,
    pub bigendian: bool,
    pub output: OutputMode,
    pub verbose: u32,
    pub log_dir: Option<PathBuf>,
    pub multithread: bool,
    pub timeout_us: u64,
    pub exit_addr: Option<u64>,
    pub libcache: bool,
    pub stdin_path: Option<PathBuf>,
    pub stdout_path: Option<PathBuf>,
    pub stderr_path: Option<PathBuf>,
    pub log_console: bool,
    pub log_split: bool,
    pub mmap_start: Option<u64>,
    pub stack_address: Option<u64>,
    pub stack_size: Option<u64>,
    pub interp_base: Option<u64>,
    pub debug_file: Option<PathBuf>,
    pub debugger: Option<String>,
}

impl EmulatorOptions {
    pub fn builder() -> EmulatorOptionsBuilder {
        EmulatorOptionsBuilder::default()
    }
}

/// Builder for [`EmulatorOptions`]; `build()` performs the validation the
/// orchestrator would otherwise have to repeat at every call site.
#[derive(Default)]
pub struct EmulatorOptionsBuilder {
    filename: Vec<String>,
    argv: Vec<String>,
    env: HashMap<String, String>,
    rootfs: Option<PathBuf>,
    shellcoder: Option<Vec<u8>>,
    ostype: Option<String>,
    archtype: Option<String>,
    bigendian: bool,
    output: Option<String>,
    verbose: u32,
    log_dir: Option<PathBuf>,
    multithread: bool,
    timeout_us: u64,
    exit_addr: Option<u64>,
    libcache: bool,
    stdin_path: Option<PathBuf>,
    stdout_path: Option<PathBuf>,
    stderr_path: Option<PathBuf>,
    log_console: bool,
    log_split: bool,
    mmap_start: Option<u64>,
    stack_address: Option<u64>,
    stack_size: Option<u64>,
    interp_base: Option<u64>,
    debug_file: Option<PathBuf>,
    debugger: Option<String>,
}

impl EmulatorOptionsBuilder {
    pub fn filename(mut self, filename: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.filename = filename.into_iter().map(Into::into).collect();
        self
    }

    pub fn argv(mut self, argv: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.argv = argv.into_iter().map(Into::into).collect();
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn rootfs(mut self, rootfs: impl Into<PathBuf>) -> Self {
        self.rootfs = Some(rootfs.into());
        self
    }

    pub fn shellcoder(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        self.shellcoder = Some(bytes.into());
        self
    }

    pub fn ostype(mut self, ostype: impl Into<String>) -> Self {
        self.ostype = Some(ostype.into());
        self
    }

    pub fn archtype(mut self, archtype: impl Into<String>) -> Self {
        self.archtype = Some(archtype.into());
        self
    }

    pub fn bigendian(mut self, bigendian: bool) -> Self {
        self.bigendian = bigendian;
        self
    }

    pub fn output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn verbose(mut self, verbose: u32) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn log_dir(mut self, log_dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(log_dir.into());
        self
    }

    pub fn multithread(mut self, multithread: bool) -> Self {
        self.multithread = multithread;
        self
    }

    pub fn timeout_us(mut self, timeout_us: u64) -> Self {
        self.timeout_us = timeout_us;
        self
    }

    pub fn exit_addr(mut self, addr: u64) -> Self {
        self.exit_addr = Some(addr);
        self
    }

    /// Hint to the personality loader to cache parsed libraries.
    pub fn libcache(mut self, libcache: bool) -> Self {
        self.libcache = libcache;
        self
    }

    /// Bind guest fd 0 to a host file instead of the host's stdin.
    pub fn stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin_path = Some(path.into());
        self
    }

    /// Bind guest fd 1 to a host file instead of the root log sink.
    pub fn stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout_path = Some(path.into());
        self
    }

    /// Bind guest fd 2 to a host file instead of the root log sink.
    pub fn stderr(mut self, path: impl Into<PathBuf>) -> Self {
        self.stderr_path = Some(path.into());
        self
    }

    /// Also mirror log output to the host console, even when `log_dir`
    /// routes it to a file sink.
    pub fn log_console(mut self, log_console: bool) -> Self {
        self.log_console = log_console;
        self
    }

    /// Split logging into per-thread files under `log_dir` instead of one
    /// shared sink.
    pub fn log_split(mut self, log_split: bool) -> Self {
        self.log_split = log_split;
        self
    }

    /// Pre-seed the base address the mmap allocator starts handing out from.
    pub fn mmap_start(mut self, addr: u64) -> Self {
        self.mmap_start = Some(addr);
        self
    }

    /// Pre-seed the initial thread's stack address.
    pub fn stack_address(mut self, addr: u64) -> Self {
        self.stack_address = Some(addr);
        self
    }

    /// Pre-seed the initial thread's stack size.
    pub fn stack_size(mut self, size: u64) -> Self {
        self.stack_size = Some(size);
        self
    }

    /// Pre-seed the dynamic linker's load base.
    pub fn interp_base(mut self, addr: u64) -> Self {
        self.interp_base = Some(addr);
        self
    }

    /// Path for the debug log (distinct from `log_dir`'s per-run sink).
    pub fn debug_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_file = Some(path.into());
        self
    }

    /// Remote debugger spec, `kind:ip:port` (`kind` defaults to `gdb`).
    /// Stored raw; `Emulator::run` parses and validates it as the first
    /// step of a run rather than at construction time.
    pub fn debugger(mut self, spec: impl Into<String>) -> Self {
        self.debugger = Some(spec.into());
        self
    }

    /// Validate and freeze the options. Does not touch the filesystem;
    /// `Emulator::new` is responsible for the existence checks that need a
    /// rootfs/filename pair to actually be resolvable.
    pub fn build(self) -> Result<EmulatorOptions> {
        if self.shellcoder.is_none() && self.filename.first().map(String::is_empty).unwrap_or(true) {
            return Err(Error::FileNotFound(PathBuf::from("<missing filename>")));
        }
        let output = match &self.output {
            Some(raw) => OutputMode::parse(raw)?,
            None => OutputMode::Default,
        };
        if self.verbose > 0 && !output.allows_verbose() {
            return Err(Error::InvalidOutput(format!(
                "verbose={} requires output in {{debug,dump}}, got {output:?}",
                self.verbose
            )));
        }
        if self.verbose > 99 {
            return Err(Error::InvalidOutput(format!("verbose={} out of range 0..99", self.verbose)));
        }
        let ostype = self.ostype.as_deref().map(OsType::parse).transpose()?;
        let archtype = self.archtype.as_deref().map(ArchTag::parse).transpose()?;

        Ok(EmulatorOptions {
            filename: self.filename,
            argv: self.argv,
            env: self.env,
            rootfs: self.rootfs,
            shellcoder: self.shellcoder,
            ostype,
            archtype,
            bigendian: self.bigendian,
            output,
            verbose: self.verbose,
            log_dir: self.log_dir,
            multithread: self.multithread,
            timeout_us: self.timeout_us,
            exit_addr: self.exit_addr,
            libcache: self.libcache,
            stdin_path: self.stdin_path,
            stdout_path: self.stdout_path,
            stderr_path: self.stderr_path,
            log_console: self.log_console,
            log_split: self.log_split,
            mmap_start: self.mmap_start,
            stack_address: self.stack_address,
            stack_size: self.stack_size,
            interp_base: self.interp_base,
            debug_file: self.debug_file,
            debugger: self.debugger,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_without_debug_output_is_rejected() {
        let result = EmulatorOptions::builder().shellcoder(vec![0x90]).verbose(1).build();
        assert!(matches!(result, Err(Error::InvalidOutput(_))));
    }

    #[test]
    fn verbose_with_debug_output_is_accepted() {
        let result = EmulatorOptions::builder().shellcoder(vec![0x90]).output("debug").verbose(1).build();
        assert!(result.is_ok());
    }

    #[test]
    fn missing_filename_and_shellcoder_is_rejected() {
        let result = EmulatorOptions::builder().build();
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }

    #[test]
    fn unknown_output_mode_is_rejected() {
        let result = EmulatorOptions::builder().shellcoder(vec![0x90]).output("verbose-dump").build();
        assert!(matches!(result, Err(Error::InvalidOutput(_))));
    }

    #[test]
    fn address_space_and_debugger_options_carry_through_build() {
        let result = EmulatorOptions::builder()
            .shellcoder(vec![0x90])
            .libcache(true)
            .mmap_start(0x4000_0000)
            .stack_address(0x7fff_0000)
            .stack_size(0x2_0000)
            .interp_base(0x5555_0000)
            .debug_file("/tmp/binsim-debug.log")
            .debugger("gdb:127.0.0.1:1234")
            .build()
            .unwrap();

        assert!(result.libcache);
        assert_eq!(result.mmap_start, Some(0x4000_0000));
        assert_eq!(result.stack_address, Some(0x7fff_0000));
        assert_eq!(result.stack_size, Some(0x2_0000));
        assert_eq!(result.interp_base, Some(0x5555_0000));
        assert_eq!(result.debug_file, Some(PathBuf::from("/tmp/binsim-debug.log")));
        assert_eq!(result.debugger.as_deref(), Some("gdb:127.0.0.1:1234"));
    }

    #[test]
    fn debugger_spec_defaults_kind_to_gdb() {
        let spec = DebuggerSpec::parse("127.0.0.1:1234").unwrap();
        assert_eq!(spec, DebuggerSpec { kind: "gdb".into(), ip: "127.0.0.1".into(), port: 1234 });
    }

    #[test]
    fn debugger_spec_honors_explicit_kind() {
        let spec = DebuggerSpec::parse("gdb:0.0.0.0:9000").unwrap();
        assert_eq!(spec, DebuggerSpec { kind: "gdb".into(), ip: "0.0.0.0".into(), port: 9000 });
    }

    #[test]
    fn debugger_spec_rejects_unsupported_kind() {
        assert!(matches!(DebuggerSpec::parse("lldb:127.0.0.1:1234"), Err(Error::DebuggerUnsupported(_))));
    }

    #[test]
    fn debugger_spec_rejects_malformed_input() {
        assert!(matches!(DebuggerSpec::parse("not-a-spec"), Err(Error::DebuggerUnsupported(_))));
    }

    #[test]
    fn debugger_spec_rejects_non_numeric_port() {
        assert!(matches!(DebuggerSpec::parse("gdb:127.0.0.1:not-a-port"), Err(Error::DebuggerUnsupported(_))));
    }
}
