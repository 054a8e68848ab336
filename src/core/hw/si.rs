use crate::core::hw::{soft_read, soft_write, IoDevice};

/// Serial interface (controller ports). No register is decoded yet.
pub struct Si;

impl Si {
    pub fn new() -> Self {
        Si
    }

    pub fn reset(&mut self) {}
}

impl IoDevice for Si {
    fn name(&self) -> &'static str {
        "SI"
    }

    fn unhandled_read(&mut self, width: u32, addr: u32) -> u64 {
        soft_read(self.name(), width, addr)
    }

    fn unhandled_write(&mut self, width: u32, addr: u32, data: u64) {
        soft_write(self.name(), width, addr, data);
    }
}
