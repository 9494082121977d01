use unicorn_engine::RegisterX86;

use super::{ArchProfile, Endian};
use crate::engine::RegId;

pub struct X8664Profile;

impl ArchProfile for X8664Profile {
    fn bits(&self) -> u32 {
        64
    }
    fn endian(&self) -> Endian {
        Endian::Little
    }
    fn reg_pc(&self) -> RegId {
        RegisterX86::RIP as RegId
    }
    fn reg_sp(&self) -> RegId {
        RegisterX86::RSP as RegId
    }
}
