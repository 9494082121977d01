use unicorn_engine::RegisterARM;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

/// 32-bit ARM in ARM (non-Thumb) mode.
pub struct ArmProfile {
    pub endian: Endian,
}

impl ArchProfile for ArmProfile {
    fn bits(&self) -> u32 {
        32
    }
    fn endian(&self) -> Endian {
        self.endian
    }
    fn reg_pc(&self) -> RegId {
        RegisterARM::PC as RegId
    }
    fn reg_sp(&self) -> RegId {
        RegisterARM::SP as RegId
    }
}
