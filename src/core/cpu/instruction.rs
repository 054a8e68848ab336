use crate::core::bits::get_bits;

/// One 32-bit instruction word. Field accessors follow the architecture's
/// big-endian bit numbering (bit 0 = MSB), which is why everything funnels
/// through `get_bits`.
pub struct Instruction(pub u32);

impl Instruction {
    #[inline(always)]
    pub fn opcd(&self) -> u32 {
        get_bits(self.0, 0, 5)
    }
    #[inline(always)]
    pub fn rd(&self) -> usize {
        get_bits(self.0, 6, 10) as usize
    }
    /// Same field as `rd`; stores and logical ops read it as a source.
    #[inline(always)]
    pub fn rs(&self) -> usize {
        get_bits(self.0, 6, 10) as usize
    }
    #[inline(always)]
    pub fn ra(&self) -> usize {
        get_bits(self.0, 11, 15) as usize
    }
    #[inline(always)]
    pub fn rb(&self) -> usize {
        get_bits(self.0, 16, 20) as usize
    }
    #[inline(always)]
    pub fn xo(&self) -> u32 {
        get_bits(self.0, 21, 30)
    }
    #[inline(always)]
    pub fn fxo(&self) -> u32 {
        get_bits(self.0, 26, 30)
    }
    #[inline(always)]
    pub fn rc(&self) -> bool {
        get_bits(self.0, 31, 31) != 0
    }
    #[inline(always)]
    pub fn oe(&self) -> bool {
        get_bits(self.0, 21, 21) != 0
    }
    #[inline(always)]
    pub fn aa(&self) -> bool {
        get_bits(self.0, 30, 30) != 0
    }
    #[inline(always)]
    pub fn lk(&self) -> bool {
        get_bits(self.0, 31, 31) != 0
    }
    #[inline(always)]
    pub fn uimm(&self) -> u32 {
        get_bits(self.0, 16, 31)
    }
    #[inline(always)]
    pub fn simm(&self) -> u32 {
        get_bits(self.0, 16, 31) as u16 as i16 as u32
    }
    #[inline(always)]
    pub fn sh(&self) -> u32 {
        get_bits(self.0, 16, 20)
    }
    #[inline(always)]
    pub fn mb(&self) -> u32 {
        get_bits(self.0, 21, 25)
    }
    #[inline(always)]
    pub fn me(&self) -> u32 {
        get_bits(self.0, 26, 30)
    }
    #[inline(always)]
    pub fn nb(&self) -> u32 {
        get_bits(self.0, 16, 20)
    }
    #[inline(always)]
    pub fn bo(&self) -> u32 {
        get_bits(self.0, 6, 10)
    }
    #[inline(always)]
    pub fn bi(&self) -> u32 {
        get_bits(self.0, 11, 15)
    }
    /// Branch displacement, shifted and sign-extended.
    #[inline(always)]
    pub fn bd(&self) -> u32 {
        (((get_bits(self.0, 16, 29) << 2) as i32) << 16 >> 16) as u32
    }
    /// 24-bit branch displacement, shifted and sign-extended.
    #[inline(always)]
    pub fn li(&self) -> u32 {
        (((get_bits(self.0, 6, 29) << 2) as i32) << 6 >> 6) as u32
    }
    /// SPR number: the two halves of the field are swapped in the encoding.
    #[inline(always)]
    pub fn spr(&self) -> u32 {
        get_bits(self.0, 11, 15) | (get_bits(self.0, 16, 20) << 5)
    }
    #[inline(always)]
    pub fn crfd(&self) -> u32 {
        get_bits(self.0, 6, 8)
    }
    #[inline(always)]
    pub fn crfs(&self) -> u32 {
        get_bits(self.0, 11, 13)
    }
    #[inline(always)]
    pub fn crbd(&self) -> u32 {
        get_bits(self.0, 6, 10)
    }
    #[inline(always)]
    pub fn crba(&self) -> u32 {
        get_bits(self.0, 11, 15)
    }
    #[inline(always)]
    pub fn crbb(&self) -> u32 {
        get_bits(self.0, 16, 20)
    }
    #[inline(always)]
    pub fn l(&self) -> bool {
        get_bits(self.0, 10, 10) != 0
    }
    #[inline(always)]
    pub fn crm(&self) -> u32 {
        get_bits(self.0, 12, 19)
    }
    #[inline(always)]
    pub fn fm(&self) -> u32 {
        get_bits(self.0, 7, 14)
    }
    #[inline(always)]
    pub fn frc(&self) -> usize {
        get_bits(self.0, 21, 25) as usize
    }
    /// Quantized load/store: scalar flag, GQR index, 12-bit displacement.
    #[inline(always)]
    pub fn ps_w(&self) -> bool {
        get_bits(self.0, 16, 16) != 0
    }
    #[inline(always)]
    pub fn ps_i(&self) -> usize {
        get_bits(self.0, 17, 19) as usize
    }
    #[inline(always)]
    pub fn ps_d(&self) -> u32 {
        ((get_bits(self.0, 20, 31) as i32) << 20 >> 20) as u32
    }
}

#[derive(Debug, PartialEq)]
#[allow(non_camel_case_types)]
pub enum Opcode {
    // integer arithmetic
    ADD,
    ADDC,
    ADDE,
    ADDI,
    ADDIC,
    ADDIC_RC,
    ADDIS,
    ADDZE,
    SUBF,
    SUBFC,
    SUBFE,
    SUBFIC,
    SUBFZE,
    NEG,
    MULLI,
    MULLW,
    MULHW,
    MULHWU,
    DIVW,
    DIVWU,
    // logical
    AND,
    ANDC,
    ANDI_RC,
    ANDIS_RC,
    OR,
    ORC,
    ORI,
    ORIS,
    XOR,
    XORI,
    XORIS,
    NOR,
    EXTSB,
    EXTSH,
    CNTLZW,
    // shift/rotate
    SLW,
    SRW,
    SRAW,
    SRAWI,
    RLWIMI,
    RLWINM,
    // compare
    CMP,
    CMPI,
    CMPL,
    CMPLI,
    // branch
    B,
    BC,
    BCLR,
    BCCTR,
    // CR ops
    MCRF,
    CRAND,
    CROR,
    CRXOR,
    CREQV,
    CRNOR,
    // system
    SC,
    RFI,
    ISYNC,
    SYNC,
    // loads
    LBZ,
    LBZU,
    LBZX,
    LHZ,
    LHZX,
    LHA,
    LWZ,
    LWZU,
    LWZUX,
    LWZX,
    LMW,
    LSWI,
    // stores
    STB,
    STBU,
    STBX,
    STH,
    STHX,
    STW,
    STWU,
    STWUX,
    STWX,
    STMW,
    STSWI,
    // float
    LFS,
    LFD,
    LFDX,
    STFS,
    STFD,
    STFIWX,
    FADD,
    FSUB,
    FMUL,
    FDIV,
    FMADD,
    FMSUB,
    FMR,
    FNEG,
    FCMPU,
    FCTIWZ,
    MTFSB1,
    MTFSF,
    // paired single / quantized
    PS_MR,
    PS_MERGE01,
    PS_MERGE10,
    PSQ_L,
    PSQ_ST,
    // register movement
    MFSPR,
    MTSPR,
    MFTB,
    MFCR,
    MTCRF,
    MFMSR,
    MTMSR,
    MTSR,
    // cache
    DCBF,
    DCBI,
    DCBZ,
    ICBI,
    UNKNOWN,
}

impl Opcode {
    pub fn from_instruction(instr: &Instruction) -> Opcode {
        use Opcode::*;

        match instr.opcd() {
            4 => match instr.xo() {
                72 => PS_MR,
                560 => PS_MERGE01,
                592 => PS_MERGE10,
                _ => UNKNOWN,
            },
            7 => MULLI,
            8 => SUBFIC,
            10 => CMPLI,
            11 => CMPI,
            12 => ADDIC,
            13 => ADDIC_RC,
            14 => ADDI,
            15 => ADDIS,
            16 => BC,
            17 => SC,
            18 => B,
            19 => match instr.xo() {
                0 => MCRF,
                16 => BCLR,
                33 => CRNOR,
                50 => RFI,
                150 => ISYNC,
                193 => CRXOR,
                257 => CRAND,
                289 => CREQV,
                449 => CROR,
                528 => BCCTR,
                _ => UNKNOWN,
            },
            20 => RLWIMI,
            21 => RLWINM,
            24 => ORI,
            25 => ORIS,
            26 => XORI,
            27 => XORIS,
            28 => ANDI_RC,
            29 => ANDIS_RC,
            31 => match instr.xo() {
                0 => CMP,
                19 => MFCR,
                23 => LWZX,
                24 => SLW,
                26 => CNTLZW,
                28 => AND,
                32 => CMPL,
                55 => LWZUX,
                60 => ANDC,
                83 => MFMSR,
                86 => DCBF,
                87 => LBZX,
                124 => NOR,
                144 => MTCRF,
                146 => MTMSR,
                151 => STWX,
                183 => STWUX,
                210 => MTSR,
                215 => STBX,
                279 => LHZX,
                316 => XOR,
                339 => MFSPR,
                371 => MFTB,
                407 => STHX,
                412 => ORC,
                444 => OR,
                467 => MTSPR,
                470 => DCBI,
                536 => SRW,
                597 => LSWI,
                598 => SYNC,
                599 => LFDX,
                725 => STSWI,
                792 => SRAW,
                824 => SRAWI,
                922 => EXTSH,
                954 => EXTSB,
                982 => ICBI,
                983 => STFIWX,
                1014 => DCBZ,
                // XO-form arithmetic keeps its meaning with the OE bit set
                xo => match xo & 0x1FF {
                    8 => SUBFC,
                    10 => ADDC,
                    11 => MULHWU,
                    40 => SUBF,
                    75 => MULHW,
                    104 => NEG,
                    136 => SUBFE,
                    138 => ADDE,
                    200 => SUBFZE,
                    202 => ADDZE,
                    235 => MULLW,
                    266 => ADD,
                    459 => DIVWU,
                    491 => DIVW,
                    _ => UNKNOWN,
                },
            },
            32 => LWZ,
            33 => LWZU,
            34 => LBZ,
            35 => LBZU,
            36 => STW,
            37 => STWU,
            38 => STB,
            39 => STBU,
            40 => LHZ,
            42 => LHA,
            44 => STH,
            46 => LMW,
            47 => STMW,
            48 => LFS,
            50 => LFD,
            52 => STFS,
            54 => STFD,
            56 => PSQ_L,
            60 => PSQ_ST,
            63 => match instr.xo() {
                0 => FCMPU,
                15 => FCTIWZ,
                38 => MTFSB1,
                40 => FNEG,
                72 => FMR,
                711 => MTFSF,
                _ => match instr.fxo() {
                    18 => FDIV,
                    20 => FSUB,
                    21 => FADD,
                    25 => FMUL,
                    28 => FMSUB,
                    29 => FMADD,
                    _ => UNKNOWN,
                },
            },
            _ => UNKNOWN,
        }
    }
}
