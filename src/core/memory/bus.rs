use std::process::exit;

use tracing::{debug, error};

use crate::core::hle::{Hle, NUM_TASK_CYCLES};
use crate::core::hw::ai::Ai;
use crate::core::hw::di::Di;
use crate::core::hw::dsp::Dsp;
use crate::core::hw::exi::Exi;
use crate::core::hw::hollywood::{
    Hollywood, HOLLYWOOD_IRQ_BROADWAY_IPC, HW_IPCPPCCTRL, HW_IPCPPCMSG, HW_PPCIRQMASK,
};
use crate::core::hw::mi::Mi;
use crate::core::hw::pi::{Pi, PI_IRQ_HOLLYWOOD};
use crate::core::hw::si::Si;
use crate::core::hw::vi::Vi;
use crate::core::hw::IoDevice;
use crate::core::memory::Memory;
use crate::core::scheduler::{Event, EventKind, Scheduler};

const BASE_VI: u32 = 0x0C00_2000;
const BASE_PI: u32 = 0x0C00_3000;
const BASE_MI: u32 = 0x0C00_4000;
const BASE_DSP: u32 = 0x0C00_5000;
const BASE_HW: u32 = 0x0D00_0000;
const BASE_DI: u32 = 0x0D00_6000;
const BASE_SI: u32 = 0x0D00_6400;
const BASE_EXI: u32 = 0x0D00_6800;
const BASE_AI: u32 = 0x0D00_6C00;

const SIZE_VI: u32 = 0x100;
const SIZE_PI: u32 = 0x1000;
const SIZE_MI: u32 = 0x80;
const SIZE_DSP: u32 = 0x200;
const SIZE_HW: u32 = 0x400;
const SIZE_DI: u32 = 0x40;
const SIZE_SI: u32 = 0x100;
const SIZE_EXI: u32 = 0x80;
const SIZE_AI: u32 = 0x20;

// The bridge window is mirrored with bit 23 set.
const MIRROR_HW: u32 = 1 << 23;

const PI_INTMASK: u32 = 0x0C00_3004;

/// The system bus: RAM fast path via the page tables, device register router
/// on the fallback path, plus the glue that cycles through the interrupt
/// chain (device -> Hollywood -> PI -> CPU) and the IPC/HLE coupling.
///
/// The bus also owns the scheduler and the CPU cycle budget for the current
/// slice, so HLE command handlers can queue their reply phases while the CPU
/// is in the middle of a store.
pub struct Bus {
    pub mem: Memory,
    pub scheduler: Scheduler,
    pub cycles_to_run: i64,

    // latched by PI assertion/mask widening; consumed by the CPU at the next
    // instruction boundary
    cpu_irq: bool,

    vi: Vi,
    pi: Pi,
    mi: Mi,
    dsp: Dsp,
    hollywood: Hollywood,
    di: Di,
    si: Si,
    exi: Exi,
    ai: Ai,

    hle: Hle,
}

impl Bus {
    pub fn new(fs_root: &str) -> Self {
        Bus {
            mem: Memory::new(),
            scheduler: Scheduler::new(),
            cycles_to_run: 0,
            cpu_irq: false,
            vi: Vi::new(),
            pi: Pi::new(),
            mi: Mi::new(),
            dsp: Dsp::new(),
            hollywood: Hollywood::new(),
            di: Di::new(),
            si: Si::new(),
            exi: Exi::new(),
            ai: Ai::new(),
            hle: Hle::new(fs_root),
        }
    }

    pub fn reset(&mut self) {
        self.mem.reset();
        self.scheduler.reset();
        self.cycles_to_run = 0;
        self.cpu_irq = false;
        self.vi.reset();
        self.pi.reset();
        self.mi.reset();
        self.dsp.reset();
        self.hollywood.reset();
        self.di.reset();
        self.si.reset();
        self.exi.reset();
        self.ai.reset();
        self.hle.reset();
    }

    // ---------------------------------------------------------------- memory

    pub fn read8(&mut self, addr: u32) -> u8 {
        match self.mem.read::<8>(addr) {
            Some(data) => data as u8,
            None => self.route(addr).read8(canonical(addr)),
        }
    }

    pub fn read16(&mut self, addr: u32) -> u16 {
        match self.mem.read::<16>(addr) {
            Some(data) => data as u16,
            None => self.route(addr).read16(canonical(addr)),
        }
    }

    pub fn read32(&mut self, addr: u32) -> u32 {
        match self.mem.read::<32>(addr) {
            Some(data) => data as u32,
            None => self.route(addr).read32(canonical(addr)),
        }
    }

    pub fn read64(&mut self, addr: u32) -> u64 {
        match self.mem.read::<64>(addr) {
            Some(data) => data,
            None => self.route(addr).read64(canonical(addr)),
        }
    }

    pub fn write8(&mut self, addr: u32, data: u8) {
        if !self.mem.write::<8>(addr, data as u64) {
            self.route(addr).write8(canonical(addr), data);
        }
    }

    pub fn write16(&mut self, addr: u32, data: u16) {
        if !self.mem.write::<16>(addr, data as u64) {
            self.route(addr).write16(canonical(addr), data);
        }
    }

    pub fn write32(&mut self, addr: u32, data: u32) {
        if !self.mem.write::<32>(addr, data as u64) {
            self.write_io32(addr, data);
        }
    }

    pub fn write64(&mut self, addr: u32, data: u64) {
        if !self.mem.write::<64>(addr, data) {
            self.route(addr).write64(canonical(addr), data);
        }
    }

    // ---------------------------------------------------------------- router

    fn route(&mut self, addr: u32) -> &mut dyn IoDevice {
        if addr & !(SIZE_VI - 1) == BASE_VI {
            return &mut self.vi;
        }
        if addr & !(SIZE_PI - 1) == BASE_PI {
            return &mut self.pi;
        }
        if addr & !(SIZE_MI - 1) == BASE_MI {
            return &mut self.mi;
        }
        if addr & !(SIZE_DSP - 1) == BASE_DSP {
            return &mut self.dsp;
        }
        if addr & !((SIZE_HW - 1) | MIRROR_HW) == BASE_HW {
            return &mut self.hollywood;
        }
        if addr & !(SIZE_DI - 1) == BASE_DI {
            return &mut self.di;
        }
        if addr & !(SIZE_SI - 1) == BASE_SI {
            return &mut self.si;
        }
        if addr & !(SIZE_EXI - 1) == BASE_EXI {
            return &mut self.exi;
        }
        if addr & !(SIZE_AI - 1) == BASE_AI {
            return &mut self.ai;
        }

        error!("Unmapped access (address: {:08X})", addr);
        exit(1);
    }

    /// 32-bit writes to PI and the bridge have system-level side effects
    /// (interrupt rechecks, IPC command kickoff), so they bypass the plain
    /// device dispatch.
    fn write_io32(&mut self, addr: u32, data: u32) {
        if addr & !(SIZE_PI - 1) == BASE_PI {
            return self.write_pi(addr, data);
        }
        if addr & !((SIZE_HW - 1) | MIRROR_HW) == BASE_HW {
            return self.write_hollywood(addr & !MIRROR_HW, data);
        }

        self.route(addr).write32(canonical(addr), data);
    }

    fn write_pi(&mut self, addr: u32, data: u32) {
        match addr {
            PI_INTMASK => {
                if self.pi.write_intmask(data) {
                    self.cpu_irq = true;
                }
            }
            _ => self.pi.unhandled_write(32, addr, data as u64),
        }
    }

    fn write_hollywood(&mut self, addr: u32, data: u32) {
        match addr {
            HW_IPCPPCMSG => {
                debug!("HW_IPCPPCMSG write32 (data: {:08X})", data);
                self.hollywood.ipc.write_ppc_message(data);
            }
            HW_IPCPPCCTRL => {
                debug!("HW_IPCPPCCTRL write32 (data: {:08X})", data);

                let write = self.hollywood.ipc.write_ppc_control(data);

                if let Some(ppcmsg) = write.execute {
                    self.hle
                        .execute(ppcmsg, &mut self.mem, &mut self.scheduler, self.cycles_to_run);
                }
                if write.relaunch {
                    self.hle.relaunch();
                }

                self.update_ipc_irq();
            }
            HW_PPCIRQMASK => {
                self.hollywood.write_irq_mask(data);
                self.update_hollywood_irq();
            }
            _ => self.hollywood.unhandled_write(32, addr, data as u64),
        }
    }

    // ------------------------------------------------------------ interrupts

    fn update_ipc_irq(&mut self) {
        if self.hollywood.ipc.irq_pending() {
            self.hollywood.assert_irq(HOLLYWOOD_IRQ_BROADWAY_IPC);
        }
        self.update_hollywood_irq();
    }

    fn update_hollywood_irq(&mut self) {
        if self.hollywood.irq_asserted() {
            self.pi.assert_irq(PI_IRQ_HOLLYWOOD);
            if self.pi.irq_asserted() {
                self.cpu_irq = true;
            }
        } else {
            self.pi.clear_irq(PI_IRQ_HOLLYWOOD);
        }
    }

    /// Latched "something may be deliverable" notice; the CPU consumes it at
    /// the next instruction boundary and checks PI + MSR.ee itself.
    pub fn take_irq_notice(&mut self) -> bool {
        std::mem::take(&mut self.cpu_irq)
    }

    pub fn pi_irq_asserted(&self) -> bool {
        self.pi.irq_asserted()
    }

    // -------------------------------------------------------------- schedule

    /// Pops the next event and sets up the CPU budget for the slice ending at
    /// its deadline.
    pub fn begin_slice(&mut self) -> Option<Event> {
        let event = self.scheduler.pop();
        self.cycles_to_run = Scheduler::slice_cycles(event.as_ref());
        event
    }

    pub fn dispatch_event(&mut self, event: Event) {
        debug!("Scheduler firing {}", event.name);

        match event.kind {
            EventKind::IpcAcknowledge => {
                self.hollywood.ipc.command_acknowledged();
                self.update_ipc_irq();

                self.scheduler.schedule(
                    "IPC complete",
                    EventKind::IpcComplete,
                    event.arg,
                    NUM_TASK_CYCLES,
                    self.cycles_to_run,
                );
            }
            EventKind::IpcComplete => {
                self.hollywood.ipc.command_completed();
                self.update_ipc_irq();
            }
        }
    }
}

#[inline(always)]
fn canonical(addr: u32) -> u32 {
    if addr & !((SIZE_HW - 1) | MIRROR_HW) == BASE_HW {
        addr & !MIRROR_HW
    } else {
        addr
    }
}
