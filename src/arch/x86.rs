use unicorn_engine::RegisterX86;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

pub struct X86Profile;

impl ArchProfile for X86Profile {
    fn bits(&self) -> u32 {
        32
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn reg_pc(&self) -> RegId {
        RegisterX86::EIP as RegId
    }
    fn reg_sp(&self) -> RegId {
        RegisterX86::ESP as RegId
    }
}
