//! Integer, branch, load/store and cache instruction implementations.

use tracing::warn;

use crate::core::bits::{get_bits, get_mask};
use crate::core::cpu::instruction::Instruction;
use crate::core::cpu::Cpu;
use crate::core::memory::bus::Bus;

impl Cpu {
    // ------------------------------------------------------------ addressing

    /// D-form effective address; RA = 0 reads as literal zero.
    fn ea_d(&self, i: &Instruction) -> u32 {
        let base = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        base.wrapping_add(i.simm())
    }

    /// X-form effective address; RA = 0 reads as literal zero.
    fn ea_x(&self, i: &Instruction) -> u32 {
        let base = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        base.wrapping_add(self.gprs[i.rb()])
    }

    /// Update forms always use RA as the base and write the EA back into it.
    fn ea_update(&self, i: &Instruction, indexed: bool) -> u32 {
        let offset = if indexed { self.gprs[i.rb()] } else { i.simm() };
        self.gprs[i.ra()].wrapping_add(offset)
    }

    // ------------------------------------------------------------ arithmetic

    fn add3(a: u32, b: u32, c: u32) -> (u32, bool) {
        let wide = a as u64 + b as u64 + c as u64;
        (wide as u32, wide > u32::MAX as u64)
    }

    fn signed_overflow(a: u32, b: u32, result: u32) -> bool {
        (!(a ^ b) & (a ^ result)) >> 31 != 0
    }

    pub(super) fn op_addi(&mut self, i: &Instruction) {
        let mut n = i.simm();
        if i.ra() != 0 {
            n = n.wrapping_add(self.gprs[i.ra()]);
        }
        self.gprs[i.rd()] = n;
    }

    pub(super) fn op_addis(&mut self, i: &Instruction) {
        let mut n = i.uimm() << 16;
        if i.ra() != 0 {
            n = n.wrapping_add(self.gprs[i.ra()]);
        }
        self.gprs[i.rd()] = n;
    }

    pub(super) fn op_addic<const RC: bool>(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let (result, carry) = Self::add3(a, i.simm(), 0);
        self.gprs[i.rd()] = result;
        self.set_carry(carry);
        if RC {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_add<const CARRY: bool, const EXTEND: bool>(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let b = self.gprs[i.rb()];
        let c = if EXTEND {
            (self.xer >> 29) & 1 // CA
        } else {
            0
        };
        let (result, carry) = Self::add3(a, b, c);

        self.gprs[i.rd()] = result;

        if CARRY {
            self.set_carry(carry);
        }
        if i.oe() {
            self.set_overflow(Self::signed_overflow(a, b, result));
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_addze(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let ca = (self.xer >> 29) & 1;
        let (result, carry) = Self::add3(a, 0, ca);

        self.gprs[i.rd()] = result;
        self.set_carry(carry);

        if i.oe() {
            self.set_overflow(Self::signed_overflow(a, 0, result));
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    /// SUBF family computes !rA + rB + 1 (or + CA for the extended forms).
    pub(super) fn op_subf<const CARRY: bool, const EXTEND: bool>(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let b = self.gprs[i.rb()];
        let c = if EXTEND { (self.xer >> 29) & 1 } else { 1 };
        let (result, carry) = Self::add3(!a, b, c);

        self.gprs[i.rd()] = result;

        if CARRY {
            self.set_carry(carry);
        }
        if i.oe() {
            self.set_overflow(Self::signed_overflow(!a, b, result));
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_subfic(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let (result, carry) = Self::add3(!a, i.simm(), 1);
        self.gprs[i.rd()] = result;
        self.set_carry(carry);
    }

    pub(super) fn op_subfze(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let ca = (self.xer >> 29) & 1;
        let (result, carry) = Self::add3(!a, 0, ca);

        self.gprs[i.rd()] = result;
        self.set_carry(carry);

        if i.oe() {
            self.set_overflow(Self::signed_overflow(!a, 0, result));
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_neg(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let result = (!a).wrapping_add(1);

        self.gprs[i.rd()] = result;

        if i.oe() {
            self.set_overflow(a == 0x8000_0000);
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_mulli(&mut self, i: &Instruction) {
        self.gprs[i.rd()] = (self.gprs[i.ra()] as i32).wrapping_mul(i.simm() as i32) as u32;
    }

    pub(super) fn op_mullw(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()] as i32 as i64;
        let b = self.gprs[i.rb()] as i32 as i64;
        let wide = a * b;
        let result = wide as u32;

        self.gprs[i.rd()] = result;

        if i.oe() {
            self.set_overflow(wide != result as i32 as i64);
        }
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_mulhw<const SIGNED: bool>(&mut self, i: &Instruction) {
        let result = if SIGNED {
            let wide = self.gprs[i.ra()] as i32 as i64 * self.gprs[i.rb()] as i32 as i64;
            (wide >> 32) as u32
        } else {
            let wide = self.gprs[i.ra()] as u64 * self.gprs[i.rb()] as u64;
            (wide >> 32) as u32
        };

        self.gprs[i.rd()] = result;

        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_divw(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()] as i32;
        let b = self.gprs[i.rb()] as i32;

        let result = if b == 0 || (a == i32::MIN && b == -1) {
            warn!("Broadway Undefined DIVW ({} / {}, IA: {:08X})", a, b, self.cia);
            if i.oe() {
                self.set_overflow(true);
            }
            0
        } else {
            if i.oe() {
                self.set_overflow(false);
            }
            (a / b) as u32
        };

        self.gprs[i.rd()] = result;

        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_divwu(&mut self, i: &Instruction) {
        let a = self.gprs[i.ra()];
        let b = self.gprs[i.rb()];

        let result = if b == 0 {
            warn!("Broadway Undefined DIVWU ({} / 0, IA: {:08X})", a, self.cia);
            if i.oe() {
                self.set_overflow(true);
            }
            0
        } else {
            if i.oe() {
                self.set_overflow(false);
            }
            a / b
        };

        self.gprs[i.rd()] = result;

        if i.rc() {
            self.set_flags(0, result);
        }
    }

    // --------------------------------------------------------------- logical

    fn logic_result(&mut self, i: &Instruction, result: u32) {
        self.gprs[i.ra()] = result;
        if i.rc() {
            self.set_flags(0, result);
        }
    }

    pub(super) fn op_and<const COMPLEMENT: bool>(&mut self, i: &Instruction) {
        let b = if COMPLEMENT { !self.gprs[i.rb()] } else { self.gprs[i.rb()] };
        let result = self.gprs[i.rs()] & b;
        self.logic_result(i, result);
    }

    pub(super) fn op_or<const COMPLEMENT: bool>(&mut self, i: &Instruction) {
        let b = if COMPLEMENT { !self.gprs[i.rb()] } else { self.gprs[i.rb()] };
        let result = self.gprs[i.rs()] | b;
        self.logic_result(i, result);
    }

    pub(super) fn op_xor(&mut self, i: &Instruction) {
        let result = self.gprs[i.rs()] ^ self.gprs[i.rb()];
        self.logic_result(i, result);
    }

    pub(super) fn op_nor(&mut self, i: &Instruction) {
        let result = !(self.gprs[i.rs()] | self.gprs[i.rb()]);
        self.logic_result(i, result);
    }

    pub(super) fn op_andi<const SHIFTED: bool>(&mut self, i: &Instruction) {
        let imm = if SHIFTED { i.uimm() << 16 } else { i.uimm() };
        let result = self.gprs[i.rs()] & imm;
        self.gprs[i.ra()] = result;
        self.set_flags(0, result);
    }

    pub(super) fn op_ori<const SHIFTED: bool>(&mut self, i: &Instruction) {
        let imm = if SHIFTED { i.uimm() << 16 } else { i.uimm() };
        self.gprs[i.ra()] = self.gprs[i.rs()] | imm;
    }

    pub(super) fn op_xori<const SHIFTED: bool>(&mut self, i: &Instruction) {
        let imm = if SHIFTED { i.uimm() << 16 } else { i.uimm() };
        self.gprs[i.ra()] = self.gprs[i.rs()] ^ imm;
    }

    pub(super) fn op_exts<const WIDTH: usize>(&mut self, i: &Instruction) {
        let result = match WIDTH {
            8 => self.gprs[i.rs()] as i8 as i32 as u32,
            _ => self.gprs[i.rs()] as i16 as i32 as u32,
        };
        self.logic_result(i, result);
    }

    pub(super) fn op_cntlzw(&mut self, i: &Instruction) {
        let result = self.gprs[i.rs()].leading_zeros();
        self.logic_result(i, result);
    }

    // -------------------------------------------------------- shift / rotate

    pub(super) fn op_slw(&mut self, i: &Instruction) {
        let n = self.gprs[i.rb()] & 0x3F;
        let result = if n >= 32 { 0 } else { self.gprs[i.rs()] << n };
        self.logic_result(i, result);
    }

    pub(super) fn op_srw(&mut self, i: &Instruction) {
        let n = self.gprs[i.rb()] & 0x3F;
        let result = if n >= 32 { 0 } else { self.gprs[i.rs()] >> n };
        self.logic_result(i, result);
    }

    pub(super) fn op_sraw<const IMMEDIATE: bool>(&mut self, i: &Instruction) {
        let n = if IMMEDIATE { i.sh() } else { self.gprs[i.rb()] & 0x3F };
        let value = self.gprs[i.rs()] as i32;

        let (result, carry) = if n >= 32 {
            // all bits shift out: 32 copies of the sign, CA = sign
            ((value >> 31) as u32, value < 0)
        } else if n == 0 {
            (value as u32, false)
        } else {
            let shifted_out = self.gprs[i.rs()] & ((1 << n) - 1);
            ((value >> n) as u32, value < 0 && shifted_out != 0)
        };

        self.set_carry(carry);
        self.logic_result(i, result);
    }

    pub(super) fn op_rlwinm(&mut self, i: &Instruction) {
        let rotated = self.gprs[i.rs()].rotate_left(i.sh());
        let result = rotated & get_mask(i.mb(), i.me());
        self.logic_result(i, result);
    }

    pub(super) fn op_rlwimi(&mut self, i: &Instruction) {
        let mask = get_mask(i.mb(), i.me());
        let rotated = self.gprs[i.rs()].rotate_left(i.sh());
        let result = (rotated & mask) | (self.gprs[i.ra()] & !mask);
        self.logic_result(i, result);
    }

    // --------------------------------------------------------------- compare

    pub(super) fn op_cmp<const SIGNED: bool, const IMMEDIATE: bool>(&mut self, i: &Instruction) {
        assert!(!i.l());

        let a = self.gprs[i.ra()];
        let b = if IMMEDIATE {
            if SIGNED { i.simm() } else { i.uimm() }
        } else {
            self.gprs[i.rb()]
        };

        let mut c = if SIGNED {
            let (a, b) = (a as i32, b as i32);
            if a < b {
                8
            } else if a > b {
                4
            } else {
                2
            }
        } else if a < b {
            8
        } else if a > b {
            4
        } else {
            2
        };

        if self.xer & (1 << 31) != 0 {
            c |= 1; // SO
        }

        self.set_cr_field(i.crfd(), c);
    }

    // ---------------------------------------------------------------- branch

    pub(super) fn op_b(&mut self, i: &Instruction) {
        let target = if i.aa() { i.li() } else { self.cia.wrapping_add(i.li()) };

        if i.lk() {
            self.lr = self.cia.wrapping_add(4);
        }

        self.ia = target;
    }

    /// BO decode: BO[0] ignores the condition, BO[2] suppresses the CTR
    /// decrement, BO[1]/BO[3] select the polarity of each test.
    fn branch_condition(&mut self, i: &Instruction, allow_ctr: bool) -> bool {
        let bo = i.bo();

        let ctr_ok = if bo & 0x04 != 0 {
            true
        } else {
            assert!(allow_ctr);
            self.ctr = self.ctr.wrapping_sub(1);
            (self.ctr != 0) != (bo & 0x02 != 0)
        };

        let cond_ok = bo & 0x10 != 0 || self.cr_bit(i.bi()) == (bo >> 3) & 1;

        ctr_ok && cond_ok
    }

    pub(super) fn op_bc(&mut self, i: &Instruction) {
        let taken = self.branch_condition(i, true);

        if i.lk() {
            self.lr = self.cia.wrapping_add(4);
        }

        if taken {
            self.ia = if i.aa() { i.bd() } else { self.cia.wrapping_add(i.bd()) };
        }
    }

    pub(super) fn op_bclr(&mut self, i: &Instruction) {
        let taken = self.branch_condition(i, true);
        let target = self.lr & !3;

        if i.lk() {
            self.lr = self.cia.wrapping_add(4);
        }

        if taken {
            self.ia = target;
        }
    }

    pub(super) fn op_bcctr(&mut self, i: &Instruction) {
        // a CTR-decrementing BCCTR is architecturally invalid
        let taken = self.branch_condition(i, false);

        if i.lk() {
            self.lr = self.cia.wrapping_add(4);
        }

        if taken {
            self.ia = self.ctr & !3;
        }
    }

    // --------------------------------------------------------------- CR ops

    pub(super) fn op_mcrf(&mut self, i: &Instruction) {
        let field = get_bits(self.cr, 4 * i.crfs(), 4 * i.crfs() + 3);
        self.set_cr_field(i.crfd(), field);
    }

    pub(super) fn op_cr_logic(&mut self, i: &Instruction, f: fn(u32, u32) -> u32) {
        let a = self.cr_bit(i.crba());
        let b = self.cr_bit(i.crbb());
        self.set_cr_bit(i.crbd(), f(a, b) & 1);
    }

    pub(super) fn op_mtcrf(&mut self, i: &Instruction) {
        let value = self.gprs[i.rs()];
        let crm = i.crm();

        for field in 0..8 {
            if crm & (0x80 >> field) != 0 {
                let shift = 28 - 4 * field;
                self.cr = (self.cr & !(0xF << shift)) | (value & (0xF << shift));
            }
        }
    }

    // ----------------------------------------------------------- load/store

    pub(super) fn op_load<const SIZE: usize, const UPDATE: bool, const INDEXED: bool>(
        &mut self,
        i: &Instruction,
        bus: &mut Bus,
    ) {
        let ea = if UPDATE {
            self.ea_update(i, INDEXED)
        } else if INDEXED {
            self.ea_x(i)
        } else {
            self.ea_d(i)
        };

        let data = match SIZE {
            8 => self.load8(bus, ea) as u32,
            16 => self.load16(bus, ea) as u32,
            _ => self.load32(bus, ea),
        };

        self.gprs[i.rd()] = data;

        if UPDATE {
            self.gprs[i.ra()] = ea;
        }
    }

    pub(super) fn op_lha(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_d(i);
        self.gprs[i.rd()] = self.load16(bus, ea) as i16 as i32 as u32;
    }

    pub(super) fn op_store<const SIZE: usize, const UPDATE: bool, const INDEXED: bool>(
        &mut self,
        i: &Instruction,
        bus: &mut Bus,
    ) {
        let ea = if UPDATE {
            self.ea_update(i, INDEXED)
        } else if INDEXED {
            self.ea_x(i)
        } else {
            self.ea_d(i)
        };

        let data = self.gprs[i.rs()];

        match SIZE {
            8 => self.store8(bus, ea, data as u8),
            16 => self.store16(bus, ea, data as u16),
            _ => self.store32(bus, ea, data),
        }

        if UPDATE {
            self.gprs[i.ra()] = ea;
        }
    }

    pub(super) fn op_lmw(&mut self, i: &Instruction, bus: &mut Bus) {
        let mut ea = self.ea_d(i);
        for r in i.rd()..32 {
            self.gprs[r] = self.load32(bus, ea);
            ea = ea.wrapping_add(4);
        }
    }

    pub(super) fn op_stmw(&mut self, i: &Instruction, bus: &mut Bus) {
        let mut ea = self.ea_d(i);
        for r in i.rs()..32 {
            let data = self.gprs[r];
            self.store32(bus, ea, data);
            ea = ea.wrapping_add(4);
        }
    }

    /// String load: bytes stream MSB-first through a rotating register bank.
    pub(super) fn op_lswi(&mut self, i: &Instruction, bus: &mut Bus) {
        let mut ea = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        let count = if i.nb() == 0 { 32 } else { i.nb() };

        let mut reg = i.rd().wrapping_sub(1) & 31;
        let mut shift = 0i32;

        for _ in 0..count {
            if shift == 0 {
                reg = (reg + 1) & 31;
                self.gprs[reg] = 0;
                shift = 24;
            } else {
                shift -= 8;
            }

            let byte = self.load8(bus, ea);
            self.gprs[reg] |= (byte as u32) << shift;
            ea = ea.wrapping_add(1);
        }
    }

    pub(super) fn op_stswi(&mut self, i: &Instruction, bus: &mut Bus) {
        let mut ea = if i.ra() == 0 { 0 } else { self.gprs[i.ra()] };
        let count = if i.nb() == 0 { 32 } else { i.nb() };

        let mut reg = i.rs().wrapping_sub(1) & 31;
        let mut shift = 0i32;

        for _ in 0..count {
            if shift == 0 {
                reg = (reg + 1) & 31;
                shift = 24;
            } else {
                shift -= 8;
            }

            let byte = (self.gprs[reg] >> shift) as u8;
            self.store8(bus, ea, byte);
            ea = ea.wrapping_add(1);
        }
    }

    // ----------------------------------------------------------------- cache

    /// Zeroes the 32-byte cache block containing the EA.
    pub(super) fn op_dcbz(&mut self, i: &Instruction, bus: &mut Bus) {
        let ea = self.ea_x(i) & !31;
        for n in 0..4 {
            self.store64(bus, ea + 8 * n, 0);
        }
    }
}
