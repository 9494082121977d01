use unicorn_engine::RegisterMIPS;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

pub struct Mips32Profile {
    pub endian: Endian,
}

impl ArchProfile for Mips32Profile {
    fn bits(&self) -> u32 {
        32
    }
    fn endian(&self) -> Endian {
        self.endian
    }
    fn reg_pc(&self) -> RegId {
        RegisterMIPS::PC as RegId
    }
    fn reg_sp(&self) -> RegId {
        RegisterMIPS::SP as RegId
    }
}
