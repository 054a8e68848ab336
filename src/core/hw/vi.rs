use crate::core::hw::{soft_read, soft_write, IoDevice};

/// Video interface. No register is decoded yet; accesses are harmless.
pub struct Vi;

impl Vi {
    pub fn new() -> Self {
        Vi
    }

    pub fn reset(&mut self) {}
}

impl IoDevice for Vi {
    fn name(&self) -> &'static str {
        "VI"
    }

    fn unhandled_read(&mut self, width: u32, addr: u32) -> u64 {
        soft_read(self.name(), width, addr)
    }

    fn unhandled_write(&mut self, width: u32, addr: u32, data: u64) {
        soft_write(self.name(), width, addr, data);
    }
}
