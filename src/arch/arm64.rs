use unicorn_engine::RegisterARM64;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

pub struct Arm64Profile {
    pub endian: Endian,
}

impl ArchProfile for Arm64Profile {
    fn bits(&self) -> u32 {
        64
    }
    fn endian(&self) -> Endian {
        self.endian
    }
    fn reg_pc(&self) -> RegId {
        RegisterARM64::PC as RegId
    }
    fn reg_sp(&self) -> RegId {
        RegisterARM64::SP as RegId
    }
}
