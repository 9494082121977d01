//! OS Personality Dispatch.
//!
//! Given `(ostype, arch)`, resolves the `loader_file`/`loader_shellcode`/
//! `runner` triple that knows how to map a guest image for that personality
//! and drive it to completion. The registry is a `once_cell`-backed static
//! table keyed by `(OsType, ArchTag)`, matching the capability-table
//! dispatch used throughout this crate instead of a runtime string lookup.
//! Only the linux/x86 and linux/x86-64 personalities are implemented as a
//! concrete reference; every other combination is a documented stub.

pub mod posix;
pub mod windows;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

use crate::arch::ArchTag;
use crate::emulator::Emulator;
use crate::error::{Error, Result};

/// OS family a guest image or shellcode targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum OsType {
    Linux,
    FreeBsd,
    MacOs,
    Windows,
}

impl OsType {
    pub fn parse(s: &str) -> Result<OsType> {
        match s.to_ascii_lowercase().as_str() {
            "linux" => Ok(OsType::Linux),
            "freebsd" => Ok(OsType::FreeBsd),
            "macos" | "darwin" => Ok(OsType::MacOs),
            "windows" => Ok(OsType::Windows),
            other => Err(Error::InvalidOsType(other.to_string())),
        }
    }

    pub fn is_posix(self) -> bool {
        !matches!(self, OsType::Windows)
    }

    /// Relative path, under the compiled-in install/config directory, of
    /// this OS personality's configuration file.
    pub fn config_file_name(self) -> &'static str {
        match self {
            OsType::Linux => "linux.yml",
            OsType::FreeBsd => "freebsd.yml",
            OsType::MacOs => "macos.yml",
            OsType::Windows => "windows.yml",
        }
    }
}

/// One entry-point triple a personality must provide.
pub struct Personality {
    pub loader_file: fn(&mut Emulator) -> Result<()>,
    pub loader_shellcode: fn(&mut Emulator) -> Result<()>,
    pub runner: fn(&mut Emulator) -> Result<()>,
}

fn unsupported_loader(_emu: &mut Emulator) -> Result<()> {
    Err(Error::InvalidOsType("personality not implemented; extension point".into()))
}

static REGISTRY: Lazy<HashMap<(OsType, ArchTag), Personality>> = Lazy::new(|| {
    let mut map: HashMap<(OsType, ArchTag), Personality> = HashMap::new();
    map.insert(
        (OsType::Linux, ArchTag::X86),
        Personality {
            loader_file: posix::linux::loader_file,
            loader_shellcode: posix::linux::loader_shellcode,
            runner: posix::linux::runner,
        },
    );
    map.insert(
        (OsType::Linux, ArchTag::X8664),
        Personality {
            loader_file: posix::linux::loader_file,
            loader_shellcode: posix::linux::loader_shellcode,
            runner: posix::linux::runner,
        },
    );
    for arch in [ArchTag::Arm, ArchTag::ArmThumb, ArchTag::Arm64, ArchTag::Mips32] {
        map.insert(
            (OsType::Linux, arch),
            Personality {
                loader_file: unsupported_loader,
                loader_shellcode: unsupported_loader,
                runner: unsupported_loader,
            },
        );
    }
    for os in [OsType::FreeBsd, OsType::MacOs, OsType::Windows] {
        for arch in [ArchTag::X86, ArchTag::X8664, ArchTag::Arm, ArchTag::ArmThumb, ArchTag::Arm64, ArchTag::Mips32] {
            map.insert(
                (os, arch),
                Personality {
                    loader_file: unsupported_loader,
                    loader_shellcode: unsupported_loader,
                    runner: unsupported_loader,
                },
            );
        }
    }
    map
});

/// Resolve the personality for `(os, arch)`. Every combination has an
/// entry; unsupported ones resolve to stubs that return `InvalidOsType`.
pub fn personality(os: OsType, arch: ArchTag) -> &'static Personality {
    REGISTRY.get(&(os, arch)).expect("registry is exhaustive over OsType x ArchTag")
}

/// One `guest_prefix -> host_target` rule. First match, in declaration
/// order, wins; an unmatched guest path falls back to `rootfs`-relative.
pub struct FsMapper {
    guest_prefix: String,
    host_target: PathBuf,
}

#[derive(Default)]
pub struct FsMapperList(Vec<FsMapper>);

impl FsMapperList {
    pub fn push(&mut self, guest_prefix: impl Into<String>, host_target: impl Into<PathBuf>) {
        self.0.push(FsMapper { guest_prefix: guest_prefix.into(), host_target: host_target.into() });
    }

    /// Translate a guest path to a host path, given the emulator's rootfs.
    pub fn resolve(&self, guest_path: &str, rootfs: &Path) -> PathBuf {
        for mapper in &self.0 {
            if let Some(rest) = guest_path.strip_prefix(&mapper.guest_prefix) {
                return mapper.host_target.join(rest.trim_start_matches('/'));
            }
        }
        rootfs.join(guest_path.trim_start_matches('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_covers_every_os_arch_pair() {
        for os in [OsType::Linux, OsType::FreeBsd, OsType::MacOs, OsType::Windows] {
            for arch in [ArchTag::X86, ArchTag::X8664, ArchTag::Arm, ArchTag::ArmThumb, ArchTag::Arm64, ArchTag::Mips32] {
                let _ = personality(os, arch);
            }
        }
    }

    #[test]
    fn fs_mapper_first_match_wins() {
        let mut mappers = FsMapperList::default();
        mappers.push("/proc", "/host/proc");
        mappers.push("/", "/host/root");
        assert_eq!(mappers.resolve("/proc/self", Path::new("/rootfs")), PathBuf::from("/host/proc/self"));
    }

    #[test]
    fn fs_mapper_falls_back_to_rootfs() {
        let mappers = FsMapperList::default();
        assert_eq!(mappers.resolve("/etc/hostname", Path::new("/rootfs")), PathBuf::from("/rootfs/etc/hostname"));
    }
}
