use std::process::exit;

use tracing::{debug, error, info};

use crate::core::bits::{get_bits, set_bits};
use crate::core::cpu::fpu::Fpr;
use crate::core::cpu::instruction::{Instruction, Opcode};
use crate::core::memory::bus::Bus;

pub mod instruction;

mod exec;
mod fpu;

/// Reset parks IA at the HLE boot stub address; the loader installs the real
/// entry point before the first slice runs.
pub const RESET_IA: u32 = 0x3400;

const VECTOR_EXTERNAL: u32 = 0x500;
const VECTOR_SYSCALL: u32 = 0xC00;

// MSR bits
const MSR_LE: u32 = 1 << 0;
const MSR_RI: u32 = 1 << 1;
const MSR_DR: u32 = 1 << 4;
const MSR_IR: u32 = 1 << 5;
const MSR_FE1: u32 = 1 << 8;
const MSR_BE: u32 = 1 << 9;
const MSR_SE: u32 = 1 << 10;
const MSR_FE0: u32 = 1 << 11;
const MSR_FP: u32 = 1 << 13;
const MSR_PR: u32 = 1 << 14;
const MSR_EE: u32 = 1 << 15;
const MSR_ILE: u32 = 1 << 16;
const MSR_POW: u32 = 1 << 18;

/// MSR bits carried through SRR1 across the exception save/restore pair.
const MASK_MSR_SAVE: u32 = 0x87C0_FF73;

/// MSR bits forced to zero on exception entry.
const MASK_MSR_CLEAR: u32 = MSR_RI
    | MSR_DR
    | MSR_IR
    | MSR_FE1
    | MSR_BE
    | MSR_SE
    | MSR_FE0
    | MSR_FP
    | MSR_PR
    | MSR_EE
    | MSR_POW;

// XER bits
const XER_SO: u32 = 1 << 31;
const XER_OV: u32 = 1 << 30;
const XER_CA: u32 = 1 << 29;

// SPR numbers
const SPR_XER: u32 = 1;
const SPR_LR: u32 = 8;
const SPR_CTR: u32 = 9;
const SPR_DAR: u32 = 19;
const SPR_DEC: u32 = 22;
const SPR_SRR0: u32 = 26;
const SPR_SRR1: u32 = 27;
const SPR_TBL: u32 = 268;
const SPR_TBU: u32 = 269;
const SPR_SPRG0: u32 = 272;
const SPR_SPRG3: u32 = 275;
const SPR_IBAT0U: u32 = 528;
const SPR_IBAT3L: u32 = 535;
const SPR_DBAT0U: u32 = 536;
const SPR_DBAT3L: u32 = 543;
const SPR_IBAT4U: u32 = 560;
const SPR_IBAT7L: u32 = 567;
const SPR_DBAT4U: u32 = 568;
const SPR_DBAT7L: u32 = 575;
const SPR_GQR0: u32 = 912;
const SPR_GQR7: u32 = 919;
const SPR_HID2: u32 = 920;
const SPR_MMCR0: u32 = 952;
const SPR_PMC4: u32 = 958;
const SPR_HID0: u32 = 1008;
const SPR_HID4: u32 = 1011;
const SPR_L2CR: u32 = 1017;

const HID0_DCFI: u32 = 1 << 10;
const HID0_ICFI: u32 = 1 << 11;
const HID2_PSE: u32 = 1 << 29;
const HID4_SBE: u32 = 1 << 25;
const HID4_H4A: u32 = 1 << 31;
const L2CR_L2I: u32 = 1 << 21;
const L2CR_L2IP: u32 = 1 << 0;

/// The timebase advances once per this many executed instructions.
const TBR_PRESCALER: u32 = 12;

#[derive(Debug, Clone, Copy)]
enum Exception {
    ExternalInterrupt,
    SystemCall,
}

impl Exception {
    fn vector(self) -> u32 {
        match self {
            Exception::ExternalInterrupt => VECTOR_EXTERNAL,
            Exception::SystemCall => VECTOR_SYSCALL,
        }
    }
}

/// Broadway execution context. Register wire formats are bit-exact, so every
/// descriptor is kept as its raw word with named accessors instead of
/// bit-field structs.
pub struct Cpu {
    gprs: [u32; 32],
    fprs: [Fpr; 32],
    cr: u32,
    fpscr: u32,
    msr: u32,
    xer: u32,
    lr: u32,
    ctr: u32,
    dar: u32,
    dec: u32,
    tbr: u64,
    srr0: u32,
    srr1: u32,
    sprg: [u32; 4],
    // [index][0] = upper, [index][1] = lower; 4..7 gated by HID4.sbe
    ibat: [[u32; 2]; 8],
    dbat: [[u32; 2]; 8],
    gqr: [u32; 8],
    hid0: u32,
    hid2: u32,
    hid4: u32,
    l2cr: u32,
    // MMCR0, PMC1, PMC2, SIA, MMCR1, PMC3, PMC4 — raw scratch
    pmon: [u32; 7],

    ia: u32,
    cia: u32,
    tb_sub: u32,
}

impl Cpu {
    pub fn new() -> Self {
        Cpu {
            gprs: [0; 32],
            fprs: [Fpr::default(); 32],
            cr: 0,
            fpscr: 0,
            msr: 0,
            xer: 0,
            lr: 0,
            ctr: 0,
            dar: 0,
            dec: 0,
            tbr: 0,
            srr0: 0,
            srr1: 0,
            sprg: [0; 4],
            ibat: [[0; 2]; 8],
            dbat: [[0; 2]; 8],
            gqr: [0; 8],
            hid0: 0,
            hid2: 0,
            hid4: 0,
            l2cr: 0,
            pmon: [0; 7],
            ia: RESET_IA,
            cia: RESET_IA,
            tb_sub: 0,
        }
    }

    pub fn reset(&mut self) {
        *self = Cpu::new();
    }

    pub fn set_entry(&mut self, addr: u32) {
        info!("Broadway Entry point {:08X}", addr);
        self.ia = addr;
    }

    /// Runs fetch/decode/execute until the slice budget on the bus drains.
    pub fn run(&mut self, bus: &mut Bus) {
        while bus.cycles_to_run > 0 {
            if bus.take_irq_notice() {
                self.try_external_interrupt(bus);
            }

            let instr = self.fetch(bus);
            self.exec(instr, bus);

            bus.cycles_to_run -= 1;
            self.tick_timebase();
        }
    }

    fn fetch(&mut self, bus: &mut Bus) -> u32 {
        self.cia = self.ia;

        let addr = self.translate(self.ia, true);
        let instr = bus.read32(addr);

        self.ia = self.ia.wrapping_add(4);

        instr
    }

    fn tick_timebase(&mut self) {
        self.tb_sub += 1;
        if self.tb_sub == TBR_PRESCALER {
            self.tb_sub = 0;
            self.tbr = self.tbr.wrapping_add(1);
        }
    }

    // ----------------------------------------------------------- interrupts

    /// Delivery point for the external interrupt: called at the instruction
    /// boundary after a PI assertion, and from MTMSR/RFI.
    fn try_external_interrupt(&mut self, bus: &Bus) {
        if self.msr & MSR_EE != 0 && bus.pi_irq_asserted() {
            info!("Broadway Taking external interrupt (IA: {:08X})", self.ia);
            self.enter_exception(Exception::ExternalInterrupt);
        }
    }

    fn enter_exception(&mut self, exception: Exception) {
        self.srr0 = self.ia;
        self.srr1 = (self.srr1 & !MASK_MSR_SAVE) | (self.msr & MASK_MSR_SAVE);

        self.msr = (self.msr & !MSR_LE) | if self.msr & MSR_ILE != 0 { MSR_LE } else { 0 };
        self.msr &= !MASK_MSR_CLEAR;

        self.ia = exception.vector();
    }

    fn op_rfi(&mut self, bus: &Bus) {
        self.msr = (self.msr & !MASK_MSR_SAVE) | (self.srr1 & MASK_MSR_SAVE);
        self.msr &= !MSR_POW;
        self.ia = self.srr0;

        self.try_external_interrupt(bus);
    }

    fn op_sc(&mut self) {
        debug!("Broadway System call (IA: {:08X})", self.cia);
        self.enter_exception(Exception::SystemCall);
    }

    // ---------------------------------------------------------- translation

    /// Block address translation. Identity when the relevant MSR enable is
    /// off; otherwise a linear BAT search. Protection bits are not enforced.
    fn translate(&self, addr: u32, is_code: bool) -> u32 {
        let enable = if is_code { MSR_IR } else { MSR_DR };
        if self.msr & enable == 0 {
            return addr;
        }

        let bats = if is_code { &self.ibat } else { &self.dbat };
        let count = if self.hid4 & HID4_SBE != 0 { 8 } else { 4 };

        for bat in bats.iter().take(count) {
            let [upper, lower] = *bat;

            // Vs/Vp; an all-zero entry must not match
            if upper & 3 == 0 {
                continue;
            }

            let length = ((upper >> 2) & 0x7FF) << 17;
            let bepi = upper >> 17;

            if addr & !(length | 0x1_FFFF) == bepi << 17 {
                let brpn = lower >> 17;
                return (brpn << 17) | (addr & length) | (addr & 0x1_FFFF);
            }
        }

        error!(
            "Broadway BAT miss ({} address: {:08X}, IA: {:08X})",
            if is_code { "code" } else { "data" },
            addr,
            self.cia
        );
        exit(1);
    }

    // --------------------------------------------------------------- memory

    fn load8(&mut self, bus: &mut Bus, addr: u32) -> u8 {
        let pa = self.translate(addr, false);
        bus.read8(pa)
    }

    fn load16(&mut self, bus: &mut Bus, addr: u32) -> u16 {
        let pa = self.translate(addr, false);
        bus.read16(pa)
    }

    fn load32(&mut self, bus: &mut Bus, addr: u32) -> u32 {
        let pa = self.translate(addr, false);
        bus.read32(pa)
    }

    fn load64(&mut self, bus: &mut Bus, addr: u32) -> u64 {
        let pa = self.translate(addr, false);
        bus.read64(pa)
    }

    fn store8(&mut self, bus: &mut Bus, addr: u32, data: u8) {
        let pa = self.translate(addr, false);
        bus.write8(pa, data);
    }

    fn store16(&mut self, bus: &mut Bus, addr: u32, data: u16) {
        let pa = self.translate(addr, false);
        bus.write16(pa, data);
    }

    fn store32(&mut self, bus: &mut Bus, addr: u32, data: u32) {
        let pa = self.translate(addr, false);
        bus.write32(pa, data);
    }

    fn store64(&mut self, bus: &mut Bus, addr: u32, data: u64) {
        let pa = self.translate(addr, false);
        bus.write64(pa, data);
    }

    // ------------------------------------------------------------ CR / XER

    fn set_cr_field(&mut self, field: u32, value: u32) {
        self.cr = set_bits(self.cr, 4 * field, 4 * field + 3, value);
    }

    fn cr_bit(&self, bit: u32) -> u32 {
        get_bits(self.cr, bit, bit)
    }

    fn set_cr_bit(&mut self, bit: u32, value: u32) {
        self.cr = set_bits(self.cr, bit, bit, value);
    }

    /// CR field from a 32-bit signed result: {LT, GT, EQ, SO}.
    fn set_flags(&mut self, field: u32, value: u32) {
        let signed = value as i32;
        let mut c = if signed < 0 {
            8
        } else if signed > 0 {
            4
        } else {
            2
        };
        if self.xer & XER_SO != 0 {
            c |= 1;
        }
        self.set_cr_field(field, c);
    }

    fn set_carry(&mut self, carry: bool) {
        self.xer = (self.xer & !XER_CA) | if carry { XER_CA } else { 0 };
    }

    fn set_overflow(&mut self, overflow: bool) {
        if overflow {
            self.xer |= XER_OV | XER_SO;
        } else {
            self.xer &= !XER_OV;
        }
    }

    // ------------------------------------------------------------------ SPR

    fn mfspr(&mut self, spr: u32) -> u32 {
        match spr {
            SPR_XER => self.xer,
            SPR_LR => self.lr,
            SPR_CTR => self.ctr,
            SPR_DAR => self.dar,
            SPR_DEC => self.dec,
            SPR_SRR0 => self.srr0,
            SPR_SRR1 => self.srr1,
            SPR_TBL => self.tbr as u32,
            SPR_TBU => (self.tbr >> 32) as u32,
            SPR_SPRG0..=SPR_SPRG3 => self.sprg[(spr - SPR_SPRG0) as usize],
            SPR_IBAT0U..=SPR_IBAT3L => {
                self.ibat[((spr - SPR_IBAT0U) / 2) as usize][(spr & 1) as usize]
            }
            SPR_DBAT0U..=SPR_DBAT3L => {
                self.dbat[((spr - SPR_DBAT0U) / 2) as usize][(spr & 1) as usize]
            }
            SPR_IBAT4U..=SPR_IBAT7L => {
                self.ibat[(4 + (spr - SPR_IBAT4U) / 2) as usize][(spr & 1) as usize]
            }
            SPR_DBAT4U..=SPR_DBAT7L => {
                self.dbat[(4 + (spr - SPR_DBAT4U) / 2) as usize][(spr & 1) as usize]
            }
            SPR_GQR0..=SPR_GQR7 => self.gqr[(spr - SPR_GQR0) as usize],
            SPR_HID2 => self.hid2,
            SPR_MMCR0..=SPR_PMC4 => self.pmon[(spr - SPR_MMCR0) as usize],
            SPR_HID0 => self.hid0,
            SPR_HID4 => self.hid4 | HID4_H4A,
            SPR_L2CR => self.l2cr,
            _ => {
                error!("Broadway Unimplemented SPR read {} (IA: {:08X})", spr, self.cia);
                exit(1);
            }
        }
    }

    fn mtspr(&mut self, spr: u32, data: u32) {
        match spr {
            SPR_XER => self.xer = data,
            SPR_LR => self.lr = data,
            SPR_CTR => self.ctr = data,
            SPR_DAR => self.dar = data,
            SPR_DEC => {
                // guests only ever park the decrementer
                assert!(data == 0);
                self.dec = data;
            }
            SPR_SRR0 => self.srr0 = data,
            SPR_SRR1 => self.srr1 = data,
            SPR_SPRG0..=SPR_SPRG3 => self.sprg[(spr - SPR_SPRG0) as usize] = data,
            SPR_IBAT0U..=SPR_IBAT3L => {
                self.ibat[((spr - SPR_IBAT0U) / 2) as usize][(spr & 1) as usize] = data;
            }
            SPR_DBAT0U..=SPR_DBAT3L => {
                self.dbat[((spr - SPR_DBAT0U) / 2) as usize][(spr & 1) as usize] = data;
            }
            SPR_IBAT4U..=SPR_IBAT7L => {
                self.ibat[(4 + (spr - SPR_IBAT4U) / 2) as usize][(spr & 1) as usize] = data;
            }
            SPR_DBAT4U..=SPR_DBAT7L => {
                self.dbat[(4 + (spr - SPR_DBAT4U) / 2) as usize][(spr & 1) as usize] = data;
            }
            SPR_GQR0..=SPR_GQR7 => self.gqr[(spr - SPR_GQR0) as usize] = data,
            SPR_HID2 => self.hid2 = data,
            SPR_MMCR0..=SPR_PMC4 => self.pmon[(spr - SPR_MMCR0) as usize] = data,
            SPR_HID0 => {
                if data & HID0_ICFI != 0 {
                    debug!("Broadway ICache flash invalidate");
                }
                if data & HID0_DCFI != 0 {
                    debug!("Broadway DCache flash invalidate");
                }
                self.hid0 = data & !(HID0_ICFI | HID0_DCFI);
            }
            SPR_HID4 => self.hid4 = data,
            SPR_L2CR => {
                if data & L2CR_L2I != 0 {
                    debug!("Broadway L2 global invalidate");
                }
                self.l2cr = data & !L2CR_L2IP;
            }
            _ => {
                error!(
                    "Broadway Unimplemented SPR write {} (IA: {:08X}, data: {:08X})",
                    spr, self.cia, data
                );
                exit(1);
            }
        }
    }

    fn mftb(&mut self, spr: u32) -> u32 {
        match spr {
            SPR_TBL => self.tbr as u32,
            SPR_TBU => (self.tbr >> 32) as u32,
            _ => {
                error!("Broadway Unimplemented TBR read {} (IA: {:08X})", spr, self.cia);
                exit(1);
            }
        }
    }

    // ------------------------------------------------------------- dispatch

    fn exec(&mut self, instr: u32, bus: &mut Bus) {
        use Opcode::*;

        let i = Instruction(instr);

        match Opcode::from_instruction(&i) {
            ADD => self.op_add::<false, false>(&i),
            ADDC => self.op_add::<true, false>(&i),
            ADDE => self.op_add::<true, true>(&i),
            ADDZE => self.op_addze(&i),
            ADDI => self.op_addi(&i),
            ADDIC => self.op_addic::<false>(&i),
            ADDIC_RC => self.op_addic::<true>(&i),
            ADDIS => self.op_addis(&i),
            SUBF => self.op_subf::<false, false>(&i),
            SUBFC => self.op_subf::<true, false>(&i),
            SUBFE => self.op_subf::<true, true>(&i),
            SUBFIC => self.op_subfic(&i),
            SUBFZE => self.op_subfze(&i),
            NEG => self.op_neg(&i),
            MULLI => self.op_mulli(&i),
            MULLW => self.op_mullw(&i),
            MULHW => self.op_mulhw::<true>(&i),
            MULHWU => self.op_mulhw::<false>(&i),
            DIVW => self.op_divw(&i),
            DIVWU => self.op_divwu(&i),

            AND => self.op_and::<false>(&i),
            ANDC => self.op_and::<true>(&i),
            ANDI_RC => self.op_andi::<false>(&i),
            ANDIS_RC => self.op_andi::<true>(&i),
            OR => self.op_or::<false>(&i),
            ORC => self.op_or::<true>(&i),
            ORI => self.op_ori::<false>(&i),
            ORIS => self.op_ori::<true>(&i),
            XOR => self.op_xor(&i),
            XORI => self.op_xori::<false>(&i),
            XORIS => self.op_xori::<true>(&i),
            NOR => self.op_nor(&i),
            EXTSB => self.op_exts::<8>(&i),
            EXTSH => self.op_exts::<16>(&i),
            CNTLZW => self.op_cntlzw(&i),

            SLW => self.op_slw(&i),
            SRW => self.op_srw(&i),
            SRAW => self.op_sraw::<false>(&i),
            SRAWI => self.op_sraw::<true>(&i),
            RLWIMI => self.op_rlwimi(&i),
            RLWINM => self.op_rlwinm(&i),

            CMP => self.op_cmp::<true, false>(&i),
            CMPI => self.op_cmp::<true, true>(&i),
            CMPL => self.op_cmp::<false, false>(&i),
            CMPLI => self.op_cmp::<false, true>(&i),

            B => self.op_b(&i),
            BC => self.op_bc(&i),
            BCLR => self.op_bclr(&i),
            BCCTR => self.op_bcctr(&i),

            MCRF => self.op_mcrf(&i),
            CRAND => self.op_cr_logic(&i, |a, b| a & b),
            CROR => self.op_cr_logic(&i, |a, b| a | b),
            CRXOR => self.op_cr_logic(&i, |a, b| a ^ b),
            CREQV => self.op_cr_logic(&i, |a, b| !(a ^ b)),
            CRNOR => self.op_cr_logic(&i, |a, b| !(a | b)),

            SC => self.op_sc(),
            RFI => self.op_rfi(bus),
            ISYNC | SYNC => {}

            LBZ => self.op_load::<8, false, false>(&i, bus),
            LBZU => self.op_load::<8, true, false>(&i, bus),
            LBZX => self.op_load::<8, false, true>(&i, bus),
            LHZ => self.op_load::<16, false, false>(&i, bus),
            LHZX => self.op_load::<16, false, true>(&i, bus),
            LHA => self.op_lha(&i, bus),
            LWZ => self.op_load::<32, false, false>(&i, bus),
            LWZU => self.op_load::<32, true, false>(&i, bus),
            LWZUX => self.op_load::<32, true, true>(&i, bus),
            LWZX => self.op_load::<32, false, true>(&i, bus),
            LMW => self.op_lmw(&i, bus),
            LSWI => self.op_lswi(&i, bus),

            STB => self.op_store::<8, false, false>(&i, bus),
            STBU => self.op_store::<8, true, false>(&i, bus),
            STBX => self.op_store::<8, false, true>(&i, bus),
            STH => self.op_store::<16, false, false>(&i, bus),
            STHX => self.op_store::<16, false, true>(&i, bus),
            STW => self.op_store::<32, false, false>(&i, bus),
            STWU => self.op_store::<32, true, false>(&i, bus),
            STWUX => self.op_store::<32, true, true>(&i, bus),
            STWX => self.op_store::<32, false, true>(&i, bus),
            STMW => self.op_stmw(&i, bus),
            STSWI => self.op_stswi(&i, bus),

            LFS => self.op_lfs(&i, bus),
            LFD => self.op_lfd::<false>(&i, bus),
            LFDX => self.op_lfd::<true>(&i, bus),
            STFS => self.op_stfs(&i, bus),
            STFD => self.op_stfd(&i, bus),
            STFIWX => self.op_stfiwx(&i, bus),
            FADD => self.op_farith(&i, |a, b, _| a + b),
            FSUB => self.op_farith(&i, |a, b, _| a - b),
            FMUL => self.op_farith(&i, |a, _, c| a * c),
            FDIV => self.op_farith(&i, |a, b, _| a / b),
            FMADD => self.op_farith(&i, |a, b, c| a * c + b),
            FMSUB => self.op_farith(&i, |a, b, c| a * c - b),
            FMR => self.op_fmr(&i),
            FNEG => self.op_fneg(&i),
            FCMPU => self.op_fcmpu(&i),
            FCTIWZ => self.op_fctiwz(&i),
            MTFSB1 => self.op_mtfsb1(&i),
            MTFSF => self.op_mtfsf(&i),

            PS_MR => self.op_ps_mr(&i),
            PS_MERGE01 => self.op_ps_merge::<0, 1>(&i),
            PS_MERGE10 => self.op_ps_merge::<1, 0>(&i),
            PSQ_L => self.op_psq_l(&i, bus),
            PSQ_ST => self.op_psq_st(&i, bus),

            MFSPR => {
                let data = self.mfspr(i.spr());
                self.gprs[i.rd()] = data;
            }
            MTSPR => self.mtspr(i.spr(), self.gprs[i.rs()]),
            MFTB => {
                let data = self.mftb(i.spr());
                self.gprs[i.rd()] = data;
            }
            MFCR => self.gprs[i.rd()] = self.cr,
            MTCRF => self.op_mtcrf(&i),
            MFMSR => self.gprs[i.rd()] = self.msr,
            MTMSR => {
                self.msr = self.gprs[i.rs()];
                self.try_external_interrupt(bus);
            }
            MTSR => debug!("Broadway MTSR ignored (IA: {:08X})", self.cia),

            DCBF | DCBI | ICBI => {}
            DCBZ => self.op_dcbz(&i, bus),

            UNKNOWN => {
                error!(
                    "Broadway Unimplemented instruction {:08X} (IA: {:08X}, opcode: {})",
                    instr,
                    self.cia,
                    i.opcd()
                );
                exit(1);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bus() -> Bus {
        let mut b = Bus::new("filesystem");
        b.reset();
        b
    }

    fn step(cpu: &mut Cpu, bus: &mut Bus, instr: u32) {
        cpu.cia = cpu.ia;
        cpu.ia = cpu.ia.wrapping_add(4);
        cpu.exec(instr, bus);
    }

    fn d_form(op: u32, rt: usize, ra: usize, imm: u32) -> u32 {
        op << 26 | (rt as u32) << 21 | (ra as u32) << 16 | (imm & 0xFFFF)
    }

    fn x_form(rt: usize, ra: usize, rb: usize, xo: u32, rc: bool) -> u32 {
        31 << 26 | (rt as u32) << 21 | (ra as u32) << 16 | (rb as u32) << 11 | xo << 1 | rc as u32
    }

    fn b_form(li: i32, aa: bool, lk: bool) -> u32 {
        18 << 26 | (li as u32 & 0x03FF_FFFC) | (aa as u32) << 1 | lk as u32
    }

    fn bc_form(bo: u32, bi: u32, bd: i32, lk: bool) -> u32 {
        16 << 26 | bo << 21 | bi << 16 | (bd as u32 & 0xFFFC) | lk as u32
    }

    fn xl_form(bo: u32, bi: u32, xo: u32, lk: bool) -> u32 {
        19 << 26 | bo << 21 | bi << 16 | xo << 1 | lk as u32
    }

    fn fa_form(frd: usize, fra: usize, frb: usize, frc: usize, fxo: u32) -> u32 {
        63 << 26
            | (frd as u32) << 21
            | (fra as u32) << 16
            | (frb as u32) << 11
            | (frc as u32) << 6
            | fxo << 1
    }

    fn fx_form(frd: usize, fra: usize, frb: usize, xo: u32) -> u32 {
        63 << 26 | (frd as u32) << 21 | (fra as u32) << 16 | (frb as u32) << 11 | xo << 1
    }

    fn ps_form(op: u32, frd: usize, ra: usize, w: bool, i: usize, d: i32) -> u32 {
        op << 26
            | (frd as u32) << 21
            | (ra as u32) << 16
            | (w as u32) << 15
            | (i as u32) << 12
            | (d as u32 & 0xFFF)
    }

    fn mtspr_op(spr: u32, rs: usize) -> u32 {
        x_form(rs, (spr & 31) as usize, (spr >> 5) as usize, 467, false)
    }

    fn mfspr_op(spr: u32, rd: usize) -> u32 {
        x_form(rd, (spr & 31) as usize, (spr >> 5) as usize, 339, false)
    }

    // ----------------------------------------------------------- translation

    #[test]
    fn translation_is_identity_when_disabled() {
        let cpu = Cpu::new();
        assert_eq!(cpu.translate(0x0000_1000, false), 0x0000_1000);
        assert_eq!(cpu.translate(0xDEAD_BEEF, true), 0xDEAD_BEEF);
    }

    #[test]
    fn bat_hit_maps_block() {
        let mut cpu = Cpu::new();
        cpu.msr = MSR_IR;
        // bepi 0x4000, bl 0x1FF (16 MiB), valid; brpn 0
        cpu.ibat[0] = [0x8000_0000 | (0x1FF << 2) | 3, 0];
        assert_eq!(cpu.translate(0x8000_0040, true), 0x0000_0040);
        assert_eq!(cpu.translate(0x80FF_FFFC, true), 0x00FF_FFFC);
    }

    #[test]
    fn bat_translates_offset_within_block() {
        let mut cpu = Cpu::new();
        cpu.msr = MSR_DR;
        // map 0x80000000 -> 0x10000000, 256 KiB (bl = 1)
        cpu.dbat[0] = [0x8000_0000 | (1 << 2) | 3, 0x1000_0000];
        assert_eq!(cpu.translate(0x8002_1234, false), 0x1002_1234);
    }

    #[test]
    fn secondary_bats_searched_with_sbe() {
        let mut cpu = Cpu::new();
        cpu.msr = MSR_DR;
        cpu.hid4 = HID4_SBE;
        cpu.dbat[5] = [0x9000_0000 | 3, 0x0100_0000];
        assert_eq!(cpu.translate(0x9000_0888, false), 0x0100_0888);
    }

    // ------------------------------------------------------------ arithmetic

    #[test]
    fn addc_sets_carry() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0xFFFF_FFFF;
        cpu.gprs[5] = 1;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 10, false)); // addc r3, r4, r5
        assert_eq!(cpu.gprs[3], 0);
        assert_ne!(cpu.xer & XER_CA, 0);

        // adde consumes the carry
        cpu.gprs[6] = 2;
        cpu.gprs[7] = 3;
        step(&mut cpu, &mut b, x_form(8, 6, 7, 138, false)); // adde r8, r6, r7
        assert_eq!(cpu.gprs[8], 6);
    }

    #[test]
    fn subf_family() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 3;
        cpu.gprs[5] = 10;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 40, false)); // subf r3, r4, r5
        assert_eq!(cpu.gprs[3], 7);

        // subfc: no borrow -> CA set
        step(&mut cpu, &mut b, x_form(3, 4, 5, 8, false));
        assert_eq!(cpu.gprs[3], 7);
        assert_ne!(cpu.xer & XER_CA, 0);

        // borrow clears CA
        cpu.gprs[4] = 10;
        cpu.gprs[5] = 3;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 8, false));
        assert_eq!(cpu.gprs[3], 3u32.wrapping_sub(10));
        assert_eq!(cpu.xer & XER_CA, 0);
    }

    #[test]
    fn addi_addis_treat_r0_as_zero() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[0] = 0x5555_5555;
        step(&mut cpu, &mut b, d_form(14, 3, 0, 0x8000)); // addi r3, 0, -0x8000
        assert_eq!(cpu.gprs[3], 0xFFFF_8000);
        step(&mut cpu, &mut b, d_form(15, 3, 0, 0x8000)); // addis r3, 0, 0x8000
        assert_eq!(cpu.gprs[3], 0x8000_0000);
    }

    #[test]
    fn mul_div() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0xFFFF_FFFF; // -1
        cpu.gprs[5] = 0xFFFF_FFFF;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 75, false)); // mulhw
        assert_eq!(cpu.gprs[3], 0); // (-1 * -1) >> 32

        step(&mut cpu, &mut b, x_form(3, 4, 5, 11, false)); // mulhwu
        assert_eq!(cpu.gprs[3], 0xFFFF_FFFE);

        cpu.gprs[4] = 100;
        cpu.gprs[5] = 7;
        step(&mut cpu, &mut b, x_form(3, 5, 4, 491, false)); // divw r3, r5... (rd, ra, rb)
        assert_eq!(cpu.gprs[3], 0); // 7 / 100
        step(&mut cpu, &mut b, x_form(3, 4, 5, 491, false));
        assert_eq!(cpu.gprs[3], 14);

        cpu.gprs[4] = (-100i32) as u32;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 491, false));
        assert_eq!(cpu.gprs[3] as i32, -14);
    }

    #[test]
    fn sign_extension() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0x0000_00FF;
        step(&mut cpu, &mut b, x_form(4, 3, 0, 954, false)); // extsb r3, r4
        assert_eq!(cpu.gprs[3], 0xFFFF_FFFF);

        cpu.gprs[4] = 0x0000_8000;
        step(&mut cpu, &mut b, x_form(4, 3, 0, 922, false)); // extsh r3, r4
        assert_eq!(cpu.gprs[3], 0xFFFF_8000);
    }

    #[test]
    fn cntlzw_counts() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0x0001_0000;
        step(&mut cpu, &mut b, x_form(4, 3, 0, 26, false));
        assert_eq!(cpu.gprs[3], 15);

        cpu.gprs[4] = 0;
        step(&mut cpu, &mut b, x_form(4, 3, 0, 26, false));
        assert_eq!(cpu.gprs[3], 32);
    }

    #[test]
    fn record_forms_set_cr0() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[4] = 0x8000_0000;
        step(&mut cpu, &mut b, x_form(4, 3, 4, 444, true)); // or. r3, r4, r4
        assert_eq!(cpu.cr >> 28, 0b1000); // LT

        cpu.gprs[4] = 0;
        step(&mut cpu, &mut b, x_form(4, 3, 4, 444, true));
        assert_eq!(cpu.cr >> 28, 0b0010); // EQ

        cpu.xer |= XER_SO;
        cpu.gprs[4] = 5;
        step(&mut cpu, &mut b, x_form(4, 3, 4, 444, true));
        assert_eq!(cpu.cr >> 28, 0b0101); // GT | SO
    }

    #[test]
    fn compares() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[4] = (-5i32) as u32;
        cpu.gprs[5] = 3;
        step(&mut cpu, &mut b, x_form(0, 4, 5, 0, false)); // cmp cr0, r4, r5
        assert_eq!(cpu.cr >> 28, 0b1000); // signed: less

        step(&mut cpu, &mut b, x_form(0, 4, 5, 32, false)); // cmpl
        assert_eq!(cpu.cr >> 28, 0b0100); // unsigned: greater

        step(&mut cpu, &mut b, d_form(11, 0, 4, 0xFFFB)); // cmpi cr0, r4, -5
        assert_eq!(cpu.cr >> 28, 0b0010); // equal

        step(&mut cpu, &mut b, d_form(10, 0, 5, 10)); // cmpli cr0, r5, 10
        assert_eq!(cpu.cr >> 28, 0b1000);
    }

    // --------------------------------------------------------- shift/rotate

    #[test]
    fn rotate_mask() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0x8000_0001;
        // rlwinm r3, r4, 1, 0, 31
        step(&mut cpu, &mut b, 21 << 26 | 4 << 21 | 3 << 16 | 1 << 11 | 31 << 1);
        assert_eq!(cpu.gprs[3], 0x0000_0003);
    }

    #[test]
    fn rlwimi_inserts() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0x0000_00AB;
        cpu.gprs[3] = 0xFFFF_FFFF;
        // rlwimi r3, r4, 8, 16, 23 : insert AB into bits 16-23
        step(
            &mut cpu,
            &mut b,
            20 << 26 | 4 << 21 | 3 << 16 | 8 << 11 | 16 << 6 | 23 << 1,
        );
        assert_eq!(cpu.gprs[3], 0xFFFF_ABFF);
    }

    #[test]
    fn shifts() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[4] = 0x8000_0000;
        cpu.gprs[5] = 4;
        step(&mut cpu, &mut b, x_form(4, 3, 5, 536, false)); // srw
        assert_eq!(cpu.gprs[3], 0x0800_0000);

        cpu.gprs[5] = 33;
        step(&mut cpu, &mut b, x_form(4, 3, 5, 536, false));
        assert_eq!(cpu.gprs[3], 0);

        cpu.gprs[4] = 1;
        cpu.gprs[5] = 31;
        step(&mut cpu, &mut b, x_form(4, 3, 5, 24, false)); // slw
        assert_eq!(cpu.gprs[3], 0x8000_0000);

        // srawi: -8 >> 2 = -2, no carry (no 1s shifted out)
        cpu.gprs[4] = (-8i32) as u32;
        step(&mut cpu, &mut b, x_form(4, 3, 2, 824, false));
        assert_eq!(cpu.gprs[3] as i32, -2);
        assert_eq!(cpu.xer & XER_CA, 0);

        // srawi: -1 >> 1 = -1, carry from the shifted-out 1
        cpu.gprs[4] = 0xFFFF_FFFF;
        step(&mut cpu, &mut b, x_form(4, 3, 1, 824, false));
        assert_eq!(cpu.gprs[3], 0xFFFF_FFFF);
        assert_ne!(cpu.xer & XER_CA, 0);
    }

    // --------------------------------------------------------------- branch

    #[test]
    fn branch_and_link() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.ia = 0x0000_1000;
        step(&mut cpu, &mut b, b_form(0x100, false, true)); // bl +0x100
        assert_eq!(cpu.lr, 0x0000_1004);
        assert_eq!(cpu.ia, 0x0000_1100);

        step(&mut cpu, &mut b, b_form(-0x100, false, false)); // b -0x100
        assert_eq!(cpu.ia, 0x0000_1000);

        step(&mut cpu, &mut b, b_form(0x2000, true, false)); // ba 0x2000
        assert_eq!(cpu.ia, 0x0000_2000);
    }

    #[test]
    fn conditional_branch_tests_cr_and_ctr() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        // beq taken: BO=01100, BI=2 (CR0.EQ)
        cpu.ia = 0x1000;
        cpu.set_cr_field(0, 0b0010);
        step(&mut cpu, &mut b, bc_form(0b01100, 2, 0x40, false));
        assert_eq!(cpu.ia, 0x1040);

        // beq not taken
        cpu.set_cr_field(0, 0b0100);
        step(&mut cpu, &mut b, bc_form(0b01100, 2, 0x40, false));
        assert_eq!(cpu.ia, 0x1044);

        // bdnz: BO=10000, decrements CTR, taken while CTR != 0
        cpu.ia = 0x2000;
        cpu.ctr = 2;
        step(&mut cpu, &mut b, bc_form(0b10000, 0, -0x20, false));
        assert_eq!(cpu.ctr, 1);
        assert_eq!(cpu.ia, 0x1FE0);

        step(&mut cpu, &mut b, bc_form(0b10000, 0, -0x20, false));
        assert_eq!(cpu.ctr, 0);
        assert_eq!(cpu.ia, 0x1FE4); // fell through
    }

    #[test]
    fn bclr_and_bcctr() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.ia = 0x1000;
        cpu.lr = 0x0000_4003; // low bits must be dropped
        step(&mut cpu, &mut b, xl_form(0b10100, 0, 16, false)); // blr
        assert_eq!(cpu.ia, 0x0000_4000);

        cpu.ctr = 0x0000_5000;
        step(&mut cpu, &mut b, xl_form(0b10100, 0, 528, true)); // bctrl
        assert_eq!(cpu.ia, 0x0000_5000);
        assert_eq!(cpu.lr, 0x0000_4004);
    }

    #[test]
    fn cr_field_ops() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.set_cr_bit(4, 1);
        cpu.set_cr_bit(5, 0);
        step(&mut cpu, &mut b, xl_form(0, 4, 193, false) | 5 << 11); // crxor 0, 4, 5
        assert_eq!(cpu.cr_bit(0), 1);

        step(&mut cpu, &mut b, xl_form(1, 4, 289, false) | 5 << 11); // creqv 1, 4, 5
        assert_eq!(cpu.cr_bit(1), 0);

        step(&mut cpu, &mut b, xl_form(2, 4, 33, false) | 5 << 11); // crnor 2, 4, 5
        assert_eq!(cpu.cr_bit(2), 0);

        // mcrf cr7, cr0
        cpu.set_cr_field(0, 0b1010);
        step(&mut cpu, &mut b, 19 << 26 | 7 << 23 | 0 << 18);
        assert_eq!(cpu.cr & 0xF, 0b1010);
    }

    // ------------------------------------------------------------ exceptions

    #[test]
    fn system_call_save_sequence() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.msr = MSR_EE | MSR_IR | MSR_DR;
        let old_msr = cpu.msr;
        cpu.ia = 0x0000_1000;

        step(&mut cpu, &mut b, 0x4400_0002); // sc

        assert_eq!(cpu.ia, 0x0000_0C00);
        assert_eq!(cpu.srr0, 0x0000_1004);
        assert_eq!(cpu.srr1 & MASK_MSR_SAVE, old_msr & MASK_MSR_SAVE);
        assert_eq!(cpu.msr & (MSR_IR | MSR_DR | MSR_EE), 0);
    }

    #[test]
    fn rfi_restores_machine_state() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.msr = MSR_EE | MSR_IR | MSR_DR | MSR_FP;
        let old_msr = cpu.msr;
        cpu.ia = 0x0000_1000;
        step(&mut cpu, &mut b, 0x4400_0002); // sc

        step(&mut cpu, &mut b, 0x4C00_0064); // rfi
        assert_eq!(cpu.ia, 0x0000_1004);
        assert_eq!(cpu.msr & MASK_MSR_SAVE, old_msr & MASK_MSR_SAVE);
    }

    #[test]
    fn external_interrupt_via_ipc_completion() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        // nops over the vectors, the boot stub and everything in between
        for addr in (0..0x2_0000u32).step_by(4) {
            b.write32(addr, 0x6000_0000); // ori r0, r0, 0
        }

        // unmask the whole chain, enable the acknowledge interrupt
        b.write32(0x0C00_3004, 1 << 14);
        b.write32(0x0D00_0034, 1 << 30);
        b.write32(0x0D00_0004, 0x30);

        // OPEN "/dev/es"
        b.write32(0x0000_8020, u32::from_be_bytes(*b"/dev"));
        b.write32(0x0000_8024, u32::from_be_bytes(*b"/es\0"));
        b.write32(0x0000_8000, 1);
        for n in 1..8 {
            b.write32(0x0000_8000 + 4 * n, if n == 3 { 0x0000_8020 } else { 0 });
        }
        b.write32(0x0D00_0000, 0x0000_8000); // PPCMSG
        b.write32(0x0D00_0004, 0x31); // execute

        cpu.msr = MSR_EE;

        // slice 1: runs until the acknowledge deadline, then the event fires
        let ev = b.begin_slice().expect("acknowledge event");
        cpu.run(&mut b);
        b.dispatch_event(ev);
        assert!(b.pi_irq_asserted());

        // slice 2: the interrupt is taken at the first instruction boundary
        let ev = b.begin_slice().expect("complete event");
        let ia_before = cpu.ia;
        cpu.run(&mut b);
        b.dispatch_event(ev);

        assert_eq!(cpu.msr & MSR_EE, 0);
        assert_eq!(cpu.srr0, ia_before);
        // the whole slice ran out of the vector region
        assert_eq!(cpu.ia, VECTOR_EXTERNAL + 4 * 4096);
    }

    #[test]
    fn mtmsr_reexamines_pending_interrupt() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        // raise the acknowledge interrupt without running the CPU
        b.write32(0x0C00_3004, 1 << 14);
        b.write32(0x0D00_0034, 1 << 30);
        b.write32(0x0000_8020, u32::from_be_bytes(*b"/dev"));
        b.write32(0x0000_8024, u32::from_be_bytes(*b"/es\0"));
        b.write32(0x0000_8000, 1);
        b.write32(0x0000_800C, 0x0000_8020);
        b.write32(0x0D00_0000, 0x0000_8000);
        b.write32(0x0D00_0004, 0x21); // execute + iy2

        let ev = b.begin_slice().unwrap();
        b.cycles_to_run = 0;
        b.dispatch_event(ev); // acknowledge -> PI line up
        assert!(b.pi_irq_asserted());

        // EE off: nothing happens
        cpu.ia = 0x3000;
        cpu.gprs[3] = 0;
        step(&mut cpu, &mut b, x_form(3, 0, 0, 146, false)); // mtmsr r3 (ee=0)
        assert_eq!(cpu.ia, 0x3004);

        // EE on: vectors immediately
        cpu.gprs[3] = MSR_EE;
        step(&mut cpu, &mut b, x_form(3, 0, 0, 146, false));
        assert_eq!(cpu.ia, VECTOR_EXTERNAL);
        assert_eq!(cpu.srr0, 0x3008);
    }

    // ----------------------------------------------------------- load/store

    #[test]
    fn update_forms_write_back_ea() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        b.write8(0x2010, 0xAB);
        cpu.gprs[4] = 0x2000;
        step(&mut cpu, &mut b, d_form(35, 3, 4, 0x10)); // lbzu r3, 0x10(r4)
        assert_eq!(cpu.gprs[3], 0xAB);
        assert_eq!(cpu.gprs[4], 0x2010);

        b.write32(0x3004, 0xCAFE_BABE);
        cpu.gprs[4] = 0x3000;
        step(&mut cpu, &mut b, d_form(33, 3, 4, 4)); // lwzu
        assert_eq!(cpu.gprs[3], 0xCAFE_BABE);
        assert_eq!(cpu.gprs[4], 0x3004);

        cpu.gprs[4] = 0x3000;
        cpu.gprs[5] = 8;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 55, false)); // lwzux
        assert_eq!(cpu.gprs[4], 0x3008);

        cpu.gprs[3] = 0x55;
        cpu.gprs[4] = 0x4000;
        step(&mut cpu, &mut b, d_form(39, 3, 4, 1)); // stbu
        assert_eq!(cpu.gprs[4], 0x4001);
        assert_eq!(b.read8(0x4001), 0x55);

        cpu.gprs[3] = 0x1234_5678;
        cpu.gprs[4] = 0x4100;
        step(&mut cpu, &mut b, d_form(37, 3, 4, 0xFFFC)); // stwu r3, -4(r4)
        assert_eq!(cpu.gprs[4], 0x40FC);
        assert_eq!(b.read32(0x40FC), 0x1234_5678);

        cpu.gprs[4] = 0x4200;
        cpu.gprs[5] = 0x20;
        step(&mut cpu, &mut b, x_form(3, 4, 5, 183, false)); // stwux
        assert_eq!(cpu.gprs[4], 0x4220);
        assert_eq!(b.read32(0x4220), 0x1234_5678);
    }

    #[test]
    fn loads_and_stores_round_trip() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[3] = 0x8182_8384;
        cpu.gprs[4] = 0x5000;
        step(&mut cpu, &mut b, d_form(36, 3, 4, 0)); // stw
        step(&mut cpu, &mut b, d_form(40, 5, 4, 0)); // lhz
        assert_eq!(cpu.gprs[5], 0x8182);
        step(&mut cpu, &mut b, d_form(42, 5, 4, 0)); // lha
        assert_eq!(cpu.gprs[5], 0xFFFF_8182);
        step(&mut cpu, &mut b, d_form(34, 5, 4, 3)); // lbz
        assert_eq!(cpu.gprs[5], 0x84);

        cpu.gprs[5] = 0xFFFF_9192;
        step(&mut cpu, &mut b, d_form(44, 5, 4, 8)); // sth
        assert_eq!(b.read16(0x5008), 0x9192);
    }

    #[test]
    fn multiple_word_transfers() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[29] = 0x1111_1111;
        cpu.gprs[30] = 0x2222_2222;
        cpu.gprs[31] = 0x3333_3333;
        cpu.gprs[4] = 0x6000;
        step(&mut cpu, &mut b, d_form(47, 29, 4, 0)); // stmw r29, 0(r4)
        assert_eq!(b.read32(0x6000), 0x1111_1111);
        assert_eq!(b.read32(0x6008), 0x3333_3333);

        cpu.gprs[29] = 0;
        cpu.gprs[30] = 0;
        cpu.gprs[31] = 0;
        step(&mut cpu, &mut b, d_form(46, 29, 4, 0)); // lmw
        assert_eq!(cpu.gprs[30], 0x2222_2222);
        assert_eq!(cpu.gprs[31], 0x3333_3333);
    }

    #[test]
    fn string_transfers() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[5] = 0x4142_4344;
        cpu.gprs[6] = 0x4546_4748;
        cpu.gprs[4] = 0x7000;
        step(&mut cpu, &mut b, x_form(5, 4, 8, 725, false)); // stswi r5, r4, 8
        assert_eq!(b.read32(0x7000), 0x4142_4344);
        assert_eq!(b.read32(0x7004), 0x4546_4748);

        step(&mut cpu, &mut b, x_form(7, 4, 6, 597, false)); // lswi r7, r4, 6
        assert_eq!(cpu.gprs[7], 0x4142_4344);
        assert_eq!(cpu.gprs[8], 0x4546_0000); // tail bytes zeroed
    }

    #[test]
    fn dcbz_zeroes_cache_block() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        for n in 0..40 {
            b.write8(0x2000 + n, 0xFF);
        }

        cpu.gprs[4] = 0x0000_2000;
        step(&mut cpu, &mut b, x_form(0, 0, 4, 1014, false)); // dcbz 0, r4
        for n in 0..32 {
            assert_eq!(b.read8(0x2000 + n), 0, "byte {}", n);
        }
        assert_eq!(b.read8(0x2020), 0xFF);
    }

    // ------------------------------------------------------------------ SPRs

    #[test]
    fn spr_round_trips() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.gprs[3] = 0xA5A5_0001;
        step(&mut cpu, &mut b, mtspr_op(SPR_SPRG0, 3));
        step(&mut cpu, &mut b, mfspr_op(SPR_SPRG0, 4));
        assert_eq!(cpu.gprs[4], 0xA5A5_0001);

        step(&mut cpu, &mut b, mtspr_op(SPR_GQR0 + 3, 3));
        step(&mut cpu, &mut b, mfspr_op(SPR_GQR0 + 3, 4));
        assert_eq!(cpu.gprs[4], 0xA5A5_0001);

        cpu.gprs[3] = 0x1234_5678;
        step(&mut cpu, &mut b, mtspr_op(SPR_LR, 3));
        assert_eq!(cpu.lr, 0x1234_5678);
    }

    #[test]
    fn hid4_bit31_reads_as_one() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[3] = 0;
        step(&mut cpu, &mut b, mtspr_op(SPR_HID4, 3));
        step(&mut cpu, &mut b, mfspr_op(SPR_HID4, 4));
        assert_eq!(cpu.gprs[4], 0x8000_0000);
    }

    #[test]
    fn hid0_flash_invalidate_self_clears() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[3] = HID0_ICFI | HID0_DCFI | 0x0000_C000;
        step(&mut cpu, &mut b, mtspr_op(SPR_HID0, 3));
        step(&mut cpu, &mut b, mfspr_op(SPR_HID0, 4));
        assert_eq!(cpu.gprs[4], 0x0000_C000);
    }

    #[test]
    fn l2cr_invalidate_completes_instantly() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.gprs[3] = L2CR_L2I | 0x8000_0000;
        step(&mut cpu, &mut b, mtspr_op(SPR_L2CR, 3));
        step(&mut cpu, &mut b, mfspr_op(SPR_L2CR, 4));
        assert_eq!(cpu.gprs[4] & L2CR_L2IP, 0);
    }

    #[test]
    fn timebase_advances_every_12_instructions() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        for n in 0..24u32 {
            b.write32(0x100 + 4 * n, 0x6000_0000); // ori r0, r0, 0
        }
        cpu.ia = 0x100;
        b.cycles_to_run = 24;
        cpu.run(&mut b);

        assert_eq!(cpu.tbr, 2);
        assert_eq!(cpu.ia, 0x100 + 24 * 4);

        step(&mut cpu, &mut b, x_form(3, 12, 8, 371, false)); // mftb r3
        assert_eq!(cpu.gprs[3], 2);
    }

    #[test]
    fn mtcrf_masks_fields() {
        let mut cpu = Cpu::new();
        let mut b = bus();
        cpu.cr = 0xFFFF_FFFF;
        cpu.gprs[3] = 0x1234_5678;
        // crm = 0x80 | 0x01: fields 0 and 7
        step(&mut cpu, &mut b, 31 << 26 | 3 << 21 | 0x81 << 12 | 144 << 1);
        assert_eq!(cpu.cr, 0x1FFF_FFF8);
    }

    // ----------------------------------------------------------------- float

    #[test]
    fn float_arithmetic_on_ps0() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[1].set_ps0(1.5);
        cpu.fprs[2].set_ps0(2.25);
        step(&mut cpu, &mut b, fa_form(3, 1, 2, 0, 21)); // fadd f3, f1, f2
        assert_eq!(cpu.fprs[3].ps0(), 3.75);

        step(&mut cpu, &mut b, fa_form(3, 1, 2, 0, 20)); // fsub
        assert_eq!(cpu.fprs[3].ps0(), -0.75);

        step(&mut cpu, &mut b, fa_form(3, 1, 0, 2, 25)); // fmul f3, f1, f2 (frc!)
        assert_eq!(cpu.fprs[3].ps0(), 3.375);

        step(&mut cpu, &mut b, fa_form(3, 2, 1, 0, 18)); // fdiv f3, f2, f1
        assert_eq!(cpu.fprs[3].ps0(), 1.5);

        cpu.fprs[4].set_ps0(10.0);
        step(&mut cpu, &mut b, fa_form(3, 1, 4, 2, 29)); // fmadd: f1 * f2 + f4
        assert_eq!(cpu.fprs[3].ps0(), 13.375);

        step(&mut cpu, &mut b, fa_form(3, 1, 4, 2, 28)); // fmsub: f1 * f2 - f4
        assert_eq!(cpu.fprs[3].ps0(), -6.625);
    }

    #[test]
    fn fmr_fneg_preserve_bits() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[2].set_raw0(0x400E_0000_0000_0001);
        step(&mut cpu, &mut b, fx_form(3, 0, 2, 72)); // fmr
        assert_eq!(cpu.fprs[3].raw0(), 0x400E_0000_0000_0001);

        step(&mut cpu, &mut b, fx_form(3, 0, 2, 40)); // fneg
        assert_eq!(cpu.fprs[3].raw0(), 0xC00E_0000_0000_0001);
    }

    #[test]
    fn fcmpu_orders_and_detects_nan() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[1].set_ps0(1.0);
        cpu.fprs[2].set_ps0(2.0);
        step(&mut cpu, &mut b, fx_form(0, 1, 2, 0)); // fcmpu cr0
        assert_eq!(cpu.cr >> 28, 0b1000);

        cpu.fprs[1].set_ps0(f64::NAN);
        step(&mut cpu, &mut b, fx_form(0, 1, 2, 0));
        assert_eq!(cpu.cr >> 28, 0b0001); // unordered
        assert_eq!((cpu.fpscr >> 12) & 0xF, 0b0001);
    }

    #[test]
    fn fctiwz_truncates_toward_zero() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[2].set_ps0(-1.75);
        step(&mut cpu, &mut b, fx_form(3, 0, 2, 15));
        assert_eq!(cpu.fprs[3].raw0() as u32, (-1i32) as u32);

        cpu.fprs[2].set_ps0(2.99);
        step(&mut cpu, &mut b, fx_form(3, 0, 2, 15));
        assert_eq!(cpu.fprs[3].raw0() as u32, 2);
    }

    #[test]
    fn fpscr_writes() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        // mtfsb1 bit 3
        step(&mut cpu, &mut b, fx_form(3, 0, 0, 38));
        assert_eq!(cpu.fpscr, 1 << 28);

        // mtfsf with FM = 0xFF copies the whole low word
        cpu.fprs[2].set_raw0(0x0000_0000_DEAD_BEEF);
        step(&mut cpu, &mut b, 63 << 26 | 0xFF << 17 | 2 << 11 | 711 << 1);
        assert_eq!(cpu.fpscr, 0xDEAD_BEEF);
    }

    #[test]
    fn lfs_widens_and_stfs_narrows() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        b.write32(0x3000, 0x3FC0_0000); // 1.5f
        step(&mut cpu, &mut b, d_form(48, 1, 0, 0x3000)); // lfs f1, 0x3000(0)
        assert_eq!(cpu.fprs[1].ps0(), 1.5);

        // with paired singles enabled the value lands in both lanes
        cpu.hid2 = HID2_PSE;
        step(&mut cpu, &mut b, d_form(48, 2, 0, 0x3000));
        assert_eq!(cpu.fprs[2].ps1(), 1.5);

        cpu.fprs[3].set_ps0(-2.5);
        step(&mut cpu, &mut b, d_form(52, 3, 0, 0x3010)); // stfs
        assert_eq!(b.read32(0x3010), 0xC020_0000);

        cpu.fprs[4].set_raw0(0x1122_3344_5566_7788);
        step(&mut cpu, &mut b, d_form(54, 4, 0, 0x3018)); // stfd
        assert_eq!(b.read64(0x3018), 0x1122_3344_5566_7788);

        step(&mut cpu, &mut b, d_form(50, 5, 0, 0x3018)); // lfd
        assert_eq!(cpu.fprs[5].raw0(), 0x1122_3344_5566_7788);

        cpu.gprs[4] = 0x3018;
        step(&mut cpu, &mut b, x_form(6, 0, 4, 599, false)); // lfdx f6, 0, r4
        assert_eq!(cpu.fprs[6].raw0(), 0x1122_3344_5566_7788);

        cpu.gprs[5] = 0x3020;
        step(&mut cpu, &mut b, x_form(6, 0, 5, 983, false)); // stfiwx
        assert_eq!(b.read32(0x3020), 0x5566_7788);
    }

    // --------------------------------------------------------- paired single

    #[test]
    fn psq_l_loads_both_lanes() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        b.write32(0x3000, 0x3F80_0000); // 1.0f
        b.write32(0x3004, 0x4000_0000); // 2.0f

        cpu.gprs[3] = 0x3000;
        step(&mut cpu, &mut b, ps_form(56, 1, 3, false, 0, 0)); // psq_l f1, 0(r3)
        assert_eq!(cpu.fprs[1].ps0(), 1.0);
        assert_eq!(cpu.fprs[1].ps1(), 2.0);
    }

    #[test]
    fn psq_l_scalar_sets_ps1_to_one() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        b.write32(0x3000, 0x4080_0000); // 4.0f
        cpu.gprs[3] = 0x3000;
        step(&mut cpu, &mut b, ps_form(56, 1, 3, true, 0, 0));
        assert_eq!(cpu.fprs[1].ps0(), 4.0);
        assert_eq!(cpu.fprs[1].ps1(), 1.0);
    }

    #[test]
    fn psq_st_stores_lanes() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[1].set_ps0(1.0);
        cpu.fprs[1].set_ps1(2.0);
        cpu.gprs[3] = 0x4000;
        step(&mut cpu, &mut b, ps_form(60, 1, 3, false, 0, 0)); // psq_st pair
        assert_eq!(b.read32(0x4000), 0x3F80_0000);
        assert_eq!(b.read32(0x4004), 0x4000_0000);

        b.write32(0x4004, 0xFFFF_FFFF);
        step(&mut cpu, &mut b, ps_form(60, 1, 3, true, 0, 0)); // scalar: ps1 untouched
        assert_eq!(b.read32(0x4004), 0xFFFF_FFFF);
    }

    #[test]
    fn ps_merge_and_mr() {
        let mut cpu = Cpu::new();
        let mut b = bus();

        cpu.fprs[1].set_ps0(1.0);
        cpu.fprs[1].set_ps1(2.0);
        cpu.fprs[2].set_ps0(3.0);
        cpu.fprs[2].set_ps1(4.0);

        // ps_merge01 f3, f1, f2 : {f1.ps0, f2.ps1}
        step(&mut cpu, &mut b, 4 << 26 | 3 << 21 | 1 << 16 | 2 << 11 | 560 << 1);
        assert_eq!(cpu.fprs[3].ps0(), 1.0);
        assert_eq!(cpu.fprs[3].ps1(), 4.0);

        // ps_merge10 f3, f1, f2 : {f1.ps1, f2.ps0}
        step(&mut cpu, &mut b, 4 << 26 | 3 << 21 | 1 << 16 | 2 << 11 | 592 << 1);
        assert_eq!(cpu.fprs[3].ps0(), 2.0);
        assert_eq!(cpu.fprs[3].ps1(), 3.0);

        // ps_mr f4, f3
        step(&mut cpu, &mut b, 4 << 26 | 4 << 21 | 3 << 11 | 72 << 1);
        assert_eq!(cpu.fprs[4].ps0(), 2.0);
        assert_eq!(cpu.fprs[4].ps1(), 3.0);
    }
}
