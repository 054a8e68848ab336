use tracing::{debug, info};

use crate::core::hw::ipc::Ipc;
use crate::core::hw::IoDevice;

pub const HOLLYWOOD_IRQ_BROADWAY_IPC: u32 = 30;

pub const HW_IPCPPCMSG: u32 = 0x0D00_0000;
pub const HW_IPCPPCCTRL: u32 = 0x0D00_0004;
pub const HW_IPCARMMSG: u32 = 0x0D00_0008;
pub const HW_PPCIRQFLAG: u32 = 0x0D00_0030;
pub const HW_PPCIRQMASK: u32 = 0x0D00_0034;

/// I/O bridge interrupt latch plus the IPC mailbox registers. Pending & mask
/// drives PI line 14; the propagation itself lives on the bus.
pub struct Hollywood {
    ppcirqflag: u32,
    ppcirqmask: u32,
    pub ipc: Ipc,
}

impl Hollywood {
    pub fn new() -> Self {
        Hollywood {
            ppcirqflag: 0,
            ppcirqmask: 0,
            ipc: Ipc::new(),
        }
    }

    pub fn reset(&mut self) {
        self.ppcirqflag = 0;
        self.ppcirqmask = 0;
        self.ipc.reset();
    }

    pub fn assert_irq(&mut self, irqn: u32) {
        if self.ppcirqflag & (1 << irqn) == 0 {
            info!("Hollywood Interrupt {} asserted", irqn);
        }
        self.ppcirqflag |= 1 << irqn;
    }

    pub fn clear_irq(&mut self, irqn: u32) {
        if self.ppcirqflag & (1 << irqn) != 0 {
            info!("Hollywood Interrupt {} cleared", irqn);
        }
        self.ppcirqflag &= !(1 << irqn);
    }

    pub fn irq_asserted(&self) -> bool {
        self.ppcirqflag & self.ppcirqmask != 0
    }

    pub fn write_irq_mask(&mut self, data: u32) {
        debug!("HW_PPCIRQMASK write32 (data: {:08X})", data);
        self.ppcirqmask = data;
    }
}

impl IoDevice for Hollywood {
    fn name(&self) -> &'static str {
        "Hollywood"
    }

    fn read32(&mut self, addr: u32) -> u32 {
        match addr {
            HW_IPCPPCCTRL => {
                debug!("HW_IPCPPCCTRL read32");
                self.ipc.read_ppc_control()
            }
            HW_IPCARMMSG => {
                debug!("HW_IPCARMMSG read32");
                self.ipc.read_arm_message()
            }
            HW_PPCIRQFLAG => {
                debug!("HW_PPCIRQFLAG read32");
                self.ppcirqflag
            }
            HW_PPCIRQMASK => {
                debug!("HW_PPCIRQMASK read32");
                self.ppcirqmask
            }
            _ => self.unhandled_read(32, addr) as u32,
        }
    }

    // Writes are routed by the bus: PPCCTRL edges start HLE commands and the
    // flag/mask pair has to re-run the PI propagation. See `Bus::write_hollywood`.
}
