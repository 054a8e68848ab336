use crate::core::hw::{soft_read, soft_write, IoDevice};

/// Memory interface. No register is decoded yet; accesses are harmless.
pub struct Mi;

impl Mi {
    pub fn new() -> Self {
        Mi
    }

    pub fn reset(&mut self) {}
}

impl IoDevice for Mi {
    fn name(&self) -> &'static str {
        "MI"
    }

    fn unhandled_read(&mut self, width: u32, addr: u32) -> u64 {
        soft_read(self.name(), width, addr)
    }

    fn unhandled_write(&mut self, width: u32, addr: u32, data: u64) {
        soft_write(self.name(), width, addr, data);
    }
}
