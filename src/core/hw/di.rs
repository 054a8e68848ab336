use tracing::debug;

use crate::core::hw::IoDevice;

const DI_CFG: u32 = 0x0D00_6024;

/// Drive interface register stub. Disc traffic goes through the HLE `/dev/di`
/// descriptor instead; only the config register is readable here.
pub struct Di;

impl Di {
    pub fn new() -> Self {
        Di
    }

    pub fn reset(&mut self) {}
}

impl IoDevice for Di {
    fn name(&self) -> &'static str {
        "DI"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            DI_CFG => {
                debug!("DI_CFG read32");
                0
            }
            _ => self.unhandled_read(32, addr) as u32,
        }
    }
}
