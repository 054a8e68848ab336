use tracing::info;

// Guest-writable PPCCTRL bits: x1 (execute), x2 (relaunch), iy1/iy2
// (interrupt enables). y1/y2 are status latches, cleared write-1-to-clear.
const MASK_PPCCTRL: u32 = 0x0000_0039;

const FLAG_EXECUTE: u32 = 1 << 0;
const FLAG_ACKNOWLEDGE: u32 = 1 << 1;
const FLAG_COMPLETED: u32 = 1 << 2;
const FLAG_RELAUNCH: u32 = 1 << 3;
const FLAG_IY1: u32 = 1 << 4;
const FLAG_IY2: u32 = 1 << 5;

/// Rising edges observed by a PPCCTRL write; the bus turns these into HLE
/// calls so this register file stays free of back-pointers.
pub struct PpcControlWrite {
    pub execute: Option<u32>, // command pointer to run
    pub relaunch: bool,
}

/// Wire-level IPC mailbox between Broadway and the service processor.
pub struct Ipc {
    armmsg: u32,
    ppcmsg: u32,
    ppcctrl: u32,
}

impl Ipc {
    pub fn new() -> Self {
        Ipc {
            armmsg: 0,
            ppcmsg: 0,
            ppcctrl: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Ipc::new();
    }

    pub fn read_arm_message(&self) -> u32 {
        self.armmsg
    }

    pub fn read_ppc_control(&self) -> u32 {
        self.ppcctrl
    }

    pub fn write_ppc_message(&mut self, data: u32) {
        self.ppcmsg = data;
    }

    pub fn write_ppc_control(&mut self, data: u32) -> PpcControlWrite {
        let execute = ((self.ppcctrl & FLAG_EXECUTE == 0) && (data & FLAG_EXECUTE != 0))
            .then_some(self.ppcmsg);
        let relaunch = (self.ppcctrl & FLAG_RELAUNCH == 0) && (data & FLAG_RELAUNCH != 0);

        self.ppcctrl = (self.ppcctrl & !MASK_PPCCTRL) | (data & MASK_PPCCTRL);

        if data & FLAG_ACKNOWLEDGE != 0 {
            self.ppcctrl &= !FLAG_ACKNOWLEDGE;
        }
        if data & FLAG_COMPLETED != 0 {
            self.ppcctrl &= !FLAG_COMPLETED;
        }

        PpcControlWrite { execute, relaunch }
    }

    /// Service-processor side: command packet was picked up.
    pub fn command_acknowledged(&mut self) {
        info!("IPC Acknowledged command");
        self.ppcctrl |= FLAG_ACKNOWLEDGE;
    }

    /// Service-processor side: reply is in memory; mirror the pointer back.
    pub fn command_completed(&mut self) {
        info!("IPC Completed command");
        self.ppcctrl |= FLAG_COMPLETED;
        self.armmsg = self.ppcmsg;
    }

    pub fn irq_pending(&self) -> bool {
        ((self.ppcctrl & FLAG_COMPLETED != 0) && (self.ppcctrl & FLAG_IY1 != 0))
            || ((self.ppcctrl & FLAG_ACKNOWLEDGE != 0) && (self.ppcctrl & FLAG_IY2 != 0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_fires_on_rising_edge_only() {
        let mut ipc = Ipc::new();
        ipc.write_ppc_message(0x1000_0000);

        let w = ipc.write_ppc_control(FLAG_EXECUTE);
        assert_eq!(w.execute, Some(0x1000_0000));

        // still high, no new edge
        let w = ipc.write_ppc_control(FLAG_EXECUTE);
        assert_eq!(w.execute, None);

        ipc.write_ppc_control(0);
        let w = ipc.write_ppc_control(FLAG_EXECUTE);
        assert_eq!(w.execute, Some(0x1000_0000));
    }

    #[test]
    fn status_bits_are_write_one_to_clear() {
        let mut ipc = Ipc::new();
        ipc.command_acknowledged();
        ipc.command_completed();
        assert_eq!(
            ipc.read_ppc_control() & (FLAG_ACKNOWLEDGE | FLAG_COMPLETED),
            FLAG_ACKNOWLEDGE | FLAG_COMPLETED
        );

        ipc.write_ppc_control(FLAG_ACKNOWLEDGE);
        assert_eq!(ipc.read_ppc_control() & FLAG_ACKNOWLEDGE, 0);
        assert_ne!(ipc.read_ppc_control() & FLAG_COMPLETED, 0);

        ipc.write_ppc_control(FLAG_COMPLETED);
        assert_eq!(ipc.read_ppc_control() & FLAG_COMPLETED, 0);
    }

    #[test]
    fn irq_follows_enables() {
        let mut ipc = Ipc::new();
        ipc.command_acknowledged();
        assert!(!ipc.irq_pending());

        ipc.write_ppc_control(FLAG_IY2);
        assert!(ipc.irq_pending());

        // clearing y2 drops the request
        ipc.write_ppc_control(FLAG_IY2 | FLAG_ACKNOWLEDGE);
        assert!(!ipc.irq_pending());
    }

    #[test]
    fn completion_mirrors_message_pointer() {
        let mut ipc = Ipc::new();
        ipc.write_ppc_message(0x1234_5678);
        ipc.command_completed();
        assert_eq!(ipc.read_arm_message(), 0x1234_5678);
    }
}
