//! Per-architecture register and stack plumbing.
//!
//! [`ArchProfile`] is the only thing in the orchestrator that knows how a
//! given architecture names its PC/SP registers or which way its stack
//! grows; everything above this module talks to an `Arch` enum instead of
//! a concrete profile type, matching the "tagged variant, not runtime
//! attribute lookup" dispatch the orchestrator uses throughout.

mod arm;
mod arm64;
mod arm_thumb;
mod mips32;
mod x86;
mod x86_64;

use crate::engine::{CpuEngine, RegId};
use crate::error::{Error, Result};

/// Byte order of the guest CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

/// Closed set of architectures this framework loads and runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ArchTag {
    X86,
    X8664,
    Arm,
    ArmThumb,
    Arm64,
    Mips32,
}

impl ArchTag {
    /// Parse the canonical lowercase strings accepted by `archtype=`.
    pub fn parse(s: &str) -> Result<ArchTag> {
        match s.to_ascii_lowercase().as_str() {
            "x86" => Ok(ArchTag::X86),
            "x8664" | "x86_64" | "x64" => Ok(ArchTag::X8664),
            "arm" => Ok(ArchTag::Arm),
            "arm_thumb" | "thumb" => Ok(ArchTag::ArmThumb),
            "arm64" | "aarch64" => Ok(ArchTag::Arm64),
            "mips32" | "mips" => Ok(ArchTag::Mips32),
            other => Err(Error::InvalidArch(other.to_string())),
        }
    }

    /// Architectures whose endianness can be selected at construction time
    /// via `bigendian=`; everyone else is forced little-endian.
    pub fn is_endian_switchable(self) -> bool {
        matches!(self, ArchTag::Arm | ArchTag::Arm64 | ArchTag::Mips32)
    }

    pub fn bits(self) -> u32 {
        match self {
            ArchTag::X86 | ArchTag::Arm | ArchTag::ArmThumb | ArchTag::Mips32 => 32,
            ArchTag::X8664 | ArchTag::Arm64 => 64,
        }
    }

    /// Build the concrete, stateless register/stack profile for this tag.
    pub fn profile(self, bigendian: bool) -> Box<dyn ArchProfile> {
        let endian = if self.is_endian_switchable() && bigendian { Endian::Big } else { Endian::Little };
        match self {
            ArchTag::X86 => Box::new(x86::X86Profile),
            ArchTag::X8664 => Box::new(x86_64::X8664Profile),
            ArchTag::Arm => Box::new(arm::ArmProfile { endian }),
            ArchTag::ArmThumb => Box::new(arm_thumb::ArmThumbProfile { endian }),
            ArchTag::Arm64 => Box::new(arm64::Arm64Profile { endian }),
            ArchTag::Mips32 => Box::new(mips32::Mips32Profile { endian }),
        }
    }
}

/// All architecture-specific register and stack operations.
///
/// Stack growth is downward (toward lower addresses) on every architecture
/// this framework supports; width and endianness of pushed/popped words
/// come from the profile, never from the caller.
pub trait ArchProfile: Send + Sync {
    fn bits(&self) -> u32;
    fn endian(&self) -> Endian;

    /// Raw register id for the program counter, for introspection.
    fn reg_pc(&self) -> RegId;
    /// Raw register id for the stack pointer, for introspection.
    fn reg_sp(&self) -> RegId;

    fn get_pc(&self, engine: &dyn CpuEngine) -> Result<u64> {
        engine.reg_read(self.reg_pc())
    }
    fn set_pc(&self, engine: &mut dyn CpuEngine, value: u64) -> Result<()> {
        engine.reg_write(self.reg_pc(), value)
    }
    fn get_sp(&self, engine: &dyn CpuEngine) -> Result<u64> {
        engine.reg_read(self.reg_sp())
    }
    fn set_sp(&self, engine: &mut dyn CpuEngine, value: u64) -> Result<()> {
        engine.reg_write(self.reg_sp(), value)
    }

    /// Push `data` onto the stack, moving SP down by `data.len()` bytes
    /// (rounded by the caller to the architecture's word size as needed).
    fn stack_push(&self, engine: &mut dyn CpuEngine, data: &[u8]) -> Result<()> {
        let sp = self.get_sp(engine)? - data.len() as u64;
        engine.mem_write(sp, data)?;
        self.set_sp(engine, sp)
    }

    /// Pop one machine word off the stack, moving SP up.
    fn stack_pop(&self, engine: &mut dyn CpuEngine) -> Result<u64> {
        let sp = self.get_sp(engine)?;
        let word_size = (self.bits() / 8) as u64;
        let bytes = engine.mem_read(sp, word_size as usize)?;
        let value = crate::pack::unpack(self.bits(), self.endian(), &bytes)?;
        self.set_sp(engine, sp + word_size)?;
        Ok(value)
    }

    /// Read one machine word at `offset` bytes from the current SP, without
    /// moving SP.
    fn stack_read(&self, engine: &dyn CpuEngine, offset: i64) -> Result<u64> {
        let sp = self.get_sp(engine)?;
        let addr = (sp as i64 + offset) as u64;
        let word_size = (self.bits() / 8) as usize;
        let bytes = engine.mem_read(addr, word_size)?;
        crate::pack::unpack(self.bits(), self.endian(), &bytes)
    }

    /// Write one machine word at `offset` bytes from the current SP,
    /// without moving SP.
    fn stack_write(&self, engine: &mut dyn CpuEngine, offset: i64, value: u64) -> Result<()> {
        let sp = self.get_sp(engine)?;
        let addr = (sp as i64 + offset) as u64;
        let bytes = crate::pack::pack(self.bits(), self.endian(), value)?;
        engine.mem_write(addr, &bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_unknown_arch() {
        assert!(matches!(ArchTag::parse("risc-v"), Err(Error::InvalidArch(_))));
    }

    #[test]
    fn non_switchable_arch_is_always_little_endian() {
        let profile = ArchTag::X8664.profile(true);
        assert_eq!(profile.endian(), Endian::Little);
    }

    #[test]
    fn switchable_arch_honors_bigendian() {
        let profile = ArchTag::Mips32.profile(true);
        assert_eq!(profile.endian(), Endian::Big);
    }

    #[test]
    fn bits_match_pointer_width() {
        assert_eq!(ArchTag::X86.bits(), 32);
        assert_eq!(ArchTag::Arm64.bits(), 64);
    }
}
