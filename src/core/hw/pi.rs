use tracing::{debug, info};

use crate::core::hw::IoDevice;

pub const PI_IRQ_HOLLYWOOD: u32 = 14;

const PI_INTFLAG: u32 = 0x0C00_3000;
const PI_INTMASK: u32 = 0x0C00_3004;
const PI_RESET: u32 = 0x0C00_3024;
const PI_CONSOLE_TYPE: u32 = 0x0C00_302C;

const CONSOLE_TYPE: u32 = 2 << 28;

/// Processor interface: the CPU-side interrupt controller. Flag bits are set
/// by device assertion only; the guest controls the mask.
pub struct Pi {
    intflag: u32,
    intmask: u32,
}

impl Pi {
    pub fn new() -> Self {
        Pi {
            intflag: 0,
            intmask: 0,
        }
    }

    pub fn reset(&mut self) {
        self.intflag = 0;
        self.intmask = 0;
    }

    pub fn assert_irq(&mut self, irqn: u32) {
        if self.intflag & (1 << irqn) == 0 {
            info!("PI Interrupt {} asserted", irqn);
        }
        self.intflag |= 1 << irqn;
    }

    pub fn clear_irq(&mut self, irqn: u32) {
        if self.intflag & (1 << irqn) != 0 {
            info!("PI Interrupt {} cleared", irqn);
        }
        self.intflag &= !(1 << irqn);
    }

    pub fn irq_asserted(&self) -> bool {
        self.intflag & self.intmask != 0
    }

    /// `true` when the write may have made an interrupt deliverable; the bus
    /// re-arms the CPU external-interrupt path in that case.
    pub fn write_intmask(&mut self, data: u32) -> bool {
        debug!("PI_INTMASK write32 (data: {:08X})", data);
        self.intmask = data;
        self.irq_asserted()
    }
}

impl IoDevice for Pi {
    fn name(&self) -> &'static str {
        "PI"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            PI_INTFLAG => {
                debug!("PI_INTFLAG read32");
                self.intflag
            }
            PI_INTMASK => {
                debug!("PI_INTMASK read32");
                self.intmask
            }
            PI_RESET => {
                debug!("PI_RESET read32");
                0
            }
            PI_CONSOLE_TYPE => {
                debug!("PI_CONSOLE_TYPE read32");
                CONSOLE_TYPE
            }
            _ => self.unhandled_read(32, addr) as u32,
        }
    }

    // Writes are routed by the bus so a mask widening can re-arm the CPU
    // external-interrupt path; see `Bus::write_pi`.
}
