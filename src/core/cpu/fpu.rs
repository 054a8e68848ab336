//! Float, paired-single and quantized load/store implementations.
//!
//! Each FPR is two 64-bit lanes ("PS0"/"PS1"). Double-precision arithmetic
//! works on lane 0; the quantized loads fill both lanes from 32-bit data.

use std::process::exit;

use tracing::error;

use crate::core::cpu::instruction::Instruction;
use crate::core::cpu::{Cpu, HID2_PSE};
use crate::core::memory::bus::Bus;

/// Bit-exact paired-single register: the f64 views alias the raw lanes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fpr {
    ps: [u64; 2],
}

impl Fpr {
    pub fn ps0(&self) -> f64 {
        f64::from_bits(self.ps[0])
    }

    pub fn ps1(&self) -> f64 {
        f64::from_bits(self.ps[1])
    }

    pub fn set_ps0(&mut self, value: f64) {
        self.ps[0] = value.to_bits();
    }

    pub fn set_ps1(&mut self, value: f64) {
        self.ps[1] = value.to_bits();
    }

    pub fn raw0(&self) -> u64 {
        self.ps[0]
    }

    pub fn set_raw0(&mut self, bits: u64) {
        self.ps[0] = bits;
    }
}

// GQR fields (MSB numbering): LD_SCALE 2..7, LD_TYPE 13..15,
// ST_SCALE 18..23, ST_TYPE 29..31. Only the float type (0) is in use.
const GQR_TYPE_FLOAT: u32 = 0;

fn gqr_ld_type(gqr: u32) -> u32 {
    (gqr >> 16) & 7
}

fn gqr_st_type(gqr: u32) -> u32 {
    gqr & 7
}

impl Cpu {
    fn ea_psq(&self, i: &Instruction) -> u32 {
        let base = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        base.wrapping_add(i.ps_d())
    }

    fn ea_fd(&self, i: &Instruction) -> u32 {
        let base = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        base.wrapping_add(i.simm())
    }

    fn ea_fx(&self, i: &Instruction) -> u32 {
        let base = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        base.wrapping_add(self.gprs[i.rb()])
    }

    // ------------------------------------------------------------ load/store

    /// LFS widens the single to a double in PS0, and into PS1 as well when
    /// paired singles are enabled.
    pub(super) fn op_lfs(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_fd(i);
        let value = f32::from_bits(self.load32(bus, ea)) as f64;

        self.fprs[i.rd()].set_ps0(value);
        if self.hid2 & HID2_PSE != 0 {
            self.fprs[i.rd()].set_ps1(value);
        }
    }

    pub(super) fn op_lfd<const INDEXED: bool>(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = if INDEXED { self.ea_fx(i) } else { self.ea_fd(i) };
        let bits = self.load64(bus, ea);
        self.fprs[i.rd()].set_raw0(bits);
    }

    pub(super) fn op_stfs(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_fd(i);
        let bits = (self.fprs[i.rs()].ps0() as f32).to_bits();
        self.store32(bus, ea, bits);
    }

    pub(super) fn op_stfd(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_fd(i);
        let bits = self.fprs[i.rs()].raw0();
        self.store64(bus, ea, bits);
    }

    pub(super) fn op_stfiwx(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_fx(i);
        let bits = self.fprs[i.rs()].raw0() as u32;
        self.store32(bus, ea, bits);
    }

    // ------------------------------------------------------------ arithmetic

    /// A-form arithmetic on the double lane; the closure sees (frA, frB, frC).
    pub(super) fn op_farith(&mut self, i: &Instruction, f: fn(f64, f64, f64) -> f64) {
        // FPSCR side effects of the record form are not modeled
        assert!(!i.rc());

        let a = self.fprs[i.ra()].ps0();
        let b = self.fprs[i.rb()].ps0();
        let c = self.fprs[i.frc()].ps0();

        self.fprs[i.rd()].set_ps0(f(a, b, c));
    }

    pub(super) fn op_fmr(&mut self, i: &Instruction) {
        assert!(!i.rc());
        let bits = self.fprs[i.rb()].raw0();
        self.fprs[i.rd()].set_raw0(bits);
    }

    pub(super) fn op_fneg(&mut self, i: &Instruction) {
        assert!(!i.rc());
        let bits = self.fprs[i.rb()].raw0() ^ (1 << 63);
        self.fprs[i.rd()].set_raw0(bits);
    }

    /// Unordered compare: NaN operands set the FU bit of the target field.
    pub(super) fn op_fcmpu(&mut self, i: &Instruction) {
        let a = self.fprs[i.ra()].ps0();
        let b = self.fprs[i.rb()].ps0();

        let c = if a.is_nan() || b.is_nan() {
            1
        } else if a < b {
            8
        } else if a > b {
            4
        } else {
            2
        };

        self.set_cr_field(i.crfd(), c);
        // mirror into FPSCR.FPCC
        self.fpscr = (self.fpscr & !0x0000_F000) | (c << 12);
    }

    /// Truncate-toward-zero to a 32-bit integer in the low half of the lane.
    pub(super) fn op_fctiwz(&mut self, i: &Instruction) {
        assert!(!i.rc());

        let value = self.fprs[i.rb()].ps0();
        let result = value as i32; // saturating, truncates toward zero

        self.fprs[i.rd()].set_raw0(0xFFF8_0000_0000_0000 | result as u32 as u64);
    }

    pub(super) fn op_mtfsb1(&mut self, i: &Instruction) {
        assert!(!i.rc());
        self.fpscr |= 1 << (31 - i.crbd());
    }

    /// FM selects which FPSCR nibbles take the low word of frB.
    pub(super) fn op_mtfsf(&mut self, i: &Instruction) {
        assert!(!i.rc());

        let bits = self.fprs[i.rb()].raw0() as u32;
        let fm = i.fm();

        for field in 0..8 {
            if fm & (0x80 >> field) != 0 {
                let shift = 28 - 4 * field;
                self.fpscr = (self.fpscr & !(0xF << shift)) | (bits & (0xF << shift));
            }
        }
    }

    // --------------------------------------------------------- paired single

    pub(super) fn op_ps_mr(&mut self, i: &Instruction) {
        assert!(!i.rc());
        self.fprs[i.rd()] = self.fprs[i.rb()];
    }

    /// PS_MERGE01 / PS_MERGE10: lane selection from frA and frB.
    pub(super) fn op_ps_merge<const LANE_A: usize, const LANE_B: usize>(&mut self, i: &Instruction) {
        assert!(!i.rc());

        let a = self.fprs[i.ra()].ps[LANE_A];
        let b = self.fprs[i.rb()].ps[LANE_B];

        self.fprs[i.rd()].ps = [a, b];
    }

    /// Quantized load; only the float type is in use, so dequantization is a
    /// plain single-to-double widen and the scale is ignored.
    pub(super) fn op_psq_l(&mut self, i: &Instruction, bus: &mut Bus) {
        let gqr = self.gqr[i.ps_i()];
        if gqr_ld_type(gqr) != GQR_TYPE_FLOAT {
            error!(
                "Broadway Unimplemented GQR load type {} (IA: {:08X})",
                gqr_ld_type(gqr),
                self.cia
            );
            exit(1);
        }

        let ea = self.ea_psq(i);
        let ps0 = f32::from_bits(self.load32(bus, ea)) as f64;
        let ps1 = if i.ps_w() {
            1.0
        } else {
            f32::from_bits(self.load32(bus, ea.wrapping_add(4))) as f64
        };

        self.fprs[i.rd()].set_ps0(ps0);
        self.fprs[i.rd()].set_ps1(ps1);
    }

    pub(super) fn op_psq_st(&mut self, i: &Instruction, bus: &mut Bus) {
        let gqr = self.gqr[i.ps_i()];
        if gqr_st_type(gqr) != GQR_TYPE_FLOAT {
            error!(
                "Broadway Unimplemented GQR store type {} (IA: {:08X})",
                gqr_st_type(gqr),
                self.cia
            );
            exit(1);
        }

        let ea = self.ea_psq(i);
        let ps0 = (self.fprs[i.rs()].ps0() as f32).to_bits();
        self.store32(bus, ea, ps0);

        if !i.ps_w() {
            let ps1 = (self.fprs[i.rs()].ps1() as f32).to_bits();
            self.store32(bus, ea.wrapping_add(4), ps1);
        }
    }
}
