use tracing::debug;

use crate::core::hw::{soft_read, soft_write, IoDevice};

const AI_CONTROL: u32 = 0x0D00_6C00;

/// Audio interface. Only AI_CONTROL is backed by state; everything else is a
/// harmless soft stub.
pub struct Ai {
    control: u32,
}

impl Ai {
    pub fn new() -> Self {
        Ai { control: 0 }
    }

    pub fn reset(&mut self) {
        self.control = 0;
    }
}

impl IoDevice for Ai {
    fn name(&self) -> &'static str {
        "AI"
    }

    fn unhandled_read(&mut self, width: u32, addr: u32) -> u64 {
        soft_read(self.name(), width, addr)
    }

    fn unhandled_write(&mut self, width: u32, addr: u32, data: u64) {
        soft_write(self.name(), width, addr, data);
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            AI_CONTROL => {
                debug!("AI_CONTROL read32");
                self.control
            }
            _ => self.unhandled_read(32, addr) as u32,
        }
    }

    fn write32(&mut self, addr: u32, data: u32) {
        match addr {
            AI_CONTROL => {
                debug!("AI_CONTROL write32 (data: {:08X})", data);
                self.control = data;
            }
            _ => self.unhandled_write(32, addr, data as u64),
        }
    }
}
