//! Windows API override table. No concrete Windows personality is
//! implemented; this module exists so `set_api` has somewhere to live and
//! the registry's Windows rows type-check against the same `Personality`
//! shape as every other OS.

use std::collections::HashMap;

use crate::emulator::Emulator;
use crate::error::Result;

pub type ApiCallback = Box<dyn FnMut(&mut Emulator, &[u64]) -> Result<i64>>;

#[derive(Default)]
pub struct ApiTable {
    by_name: HashMap<String, ApiCallback>,
}

impl ApiTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, callback: ApiCallback) {
        self.by_name.insert(name.into(), callback);
    }

    pub fn dispatch(&mut self, emu: &mut Emulator, name: &str, args: &[u64]) -> Option<Result<i64>> {
        self.by_name.get_mut(name).map(|cb| cb(emu, args))
    }
}
