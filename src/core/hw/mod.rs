use std::process::exit;
use tracing::{error, warn};

pub mod ai;
pub mod di;
pub mod dsp;
pub mod exi;
pub mod hollywood;
pub mod ipc;
pub mod mi;
pub mod pi;
pub mod si;
pub mod vi;

/// One memory-mapped register window. The C ancestry of this interface is a
/// family of textually expanded `read{8,16,32,64}` handlers per device; here
/// the widths funnel through defaults so a stub only overrides what the
/// hardware actually decodes. Unknown offsets and widths land in
/// `unhandled_*`, which is fatal unless a device opts into soft semantics.
pub trait IoDevice {
    fn name(&self) -> &'static str;

    fn unhandled_read(&mut self, width: u32, addr: u32) -> u64 {
        error!("{} Unimplemented read{} (address: {:08X})", self.name(), width, addr);
        exit(1);
    }

    fn unhandled_write(&mut self, width: u32, addr: u32, data: u64) {
        error!(
            "{} Unimplemented write{} (address: {:08X}, data: {:08X})",
            self.name(),
            width,
            addr,
            data
        );
        exit(1);
    }

    fn read8(&mut self, addr: u32) -> u8 {
        self.unhandled_read(8, addr) as u8
    }
    fn read16(&mut self, addr: u32) -> u16 {
        self.unhandled_read(16, addr) as u16
    }
    fn read32(&mut self, addr: u32) -> u32 {
        self.unhandled_read(32, addr) as u32
    }
    fn read64(&mut self, addr: u32) -> u64 {
        self.unhandled_read(64, addr)
    }

    fn write8(&mut self, addr: u32, data: u8) {
        self.unhandled_write(8, addr, data as u64);
    }
    fn write16(&mut self, addr: u32, data: u16) {
        self.unhandled_write(16, addr, data as u64);
    }
    fn write32(&mut self, addr: u32, data: u32) {
        self.unhandled_write(32, addr, data as u64);
    }
    fn write64(&mut self, addr: u32, data: u64) {
        self.unhandled_write(64, addr, data);
    }
}

/// Soft-stub behavior for devices that must not bring the system down:
/// reads warn and return zero, writes warn and are dropped.
pub(crate) fn soft_read(dev: &str, width: u32, addr: u32) -> u64 {
    warn!("{} Unimplemented read{} (address: {:08X})", dev, width, addr);
    0
}

pub(crate) fn soft_write(dev: &str, width: u32, addr: u32, data: u64) {
    warn!(
        "{} Unimplemented write{} (address: {:08X}, data: {:08X})",
        dev, width, addr, data
    );
}
