use unicorn_engine::RegisterARM;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

/// 32-bit ARM in Thumb mode. Register ids are identical to [`super::arm`];
/// what differs is the engine mode flag the loader selects at construction.
pub struct ArmThumbProfile {
    pub endian: Endian,
}

impl ArchProfile for ArmThumbProfile {
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
