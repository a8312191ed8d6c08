//! The intermediate binary format and its byte serialization.
//!
//! Instruction format, in emission order:
//! - legacy prefix: 0-1 byte
//! - VEX: 0, 2 or 3 bytes / REX: 0-1 byte (never both)
//! - opcode: 1-3 bytes
//! - ModRM: 0-1 byte (Mod 2-bit | Reg 3-bit | R/M 3-bit)
//! - SIB: 0-1 byte (Scale 2-bit | Index 3-bit | Base 3-bit)
//! - displacement: 0, 1 or 4 bytes, little-endian
//! - immediate: 0, 1, 2, 4 or 8 bytes, little-endian
//!
//! Reference: Intel SDM Volume 2, Chapter 2.1 (instruction format) and
//! Section 2.3.5 (VEX prefix layout).

use crate::form::FormId;

// ModR/M mod field values
pub const MOD_INDIRECT: u8 = 0b00;
pub const MOD_INDIRECT_DISP8: u8 = 0b01;
pub const MOD_INDIRECT_DISP32: u8 = 0b10;
pub const MOD_DIRECT: u8 = 0b11;

/// R/M = 100 escapes to a SIB byte when mod != 11.
pub const RM_SIB_FOLLOWS: u8 = 0b100;
/// R/M = 101 with mod = 00 selects `[rip + disp32]`.
pub const RM_RIP_RELATIVE: u8 = 0b101;

/// SIB index = 100 means no index register.
pub const SIB_INDEX_NONE: u8 = 0b100;
/// SIB base = 101 with mod = 00 means no base, absolute disp32.
pub const SIB_BASE_DISP32: u8 = 0b101;

/// REX prefix fields, `0100WRXB`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RexPrefix {
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
}

impl RexPrefix {
    pub fn byte(self) -> u8 {
        0x40 | (u8::from(self.w) << 3)
            | (u8::from(self.r) << 2)
            | (u8::from(self.x) << 1)
            | u8::from(self.b)
    }
}

/// VEX opcode map (the escape bytes the prefix replaces).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VexMap {
    Map0f,
    Map0f38,
    Map0f3a,
}

impl VexMap {
    fn bits(self) -> u8 {
        match self {
            VexMap::Map0f => 0b01,
            VexMap::Map0f38 => 0b10,
            VexMap::Map0f3a => 0b11,
        }
    }
}

/// VEX prefix fields.
///
/// `r`, `x` and `b` are stored in the wire's inverted polarity (true = not
/// extended) and written as-is; `source` is the already-inverted `vvvv`
/// nibble (`15 - register index`, all-ones when unused).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VexPrefix {
    pub l: bool,
    pub w: bool,
    pub r: bool,
    pub x: bool,
    pub b: bool,
    pub source: u8,
    pub map: VexMap,
    /// Implied legacy prefix: 0 = none, 1 = 66, 2 = F3, 3 = F2.
    pub pp: u8,
}

impl Default for VexPrefix {
    fn default() -> Self {
        VexPrefix {
            l: false,
            // WIG forms serialize W as zero, matching reference assemblers
            w: false,
            r: true,
            x: true,
            b: true,
            source: 0b1111,
            map: VexMap::Map0f,
            pp: 0,
        }
    }
}

impl VexPrefix {
    /// Serializes as the compact 2-byte C5 form when only fields that form
    /// can carry are in play, otherwise as the 3-byte C4 form.
    pub fn bytes(self) -> Vec<u8> {
        if self.map == VexMap::Map0f && self.x && self.b && !self.w {
            let byte1 = (u8::from(self.r) << 7) | (self.source << 3) | (u8::from(self.l) << 2) | self.pp;
            vec![0xC5, byte1]
        } else {
            let byte1 = (u8::from(self.r) << 7)
                | (u8::from(self.x) << 6)
                | (u8::from(self.b) << 5)
                | self.map.bits();
            let byte2 =
                (u8::from(self.w) << 7) | (self.source << 3) | (u8::from(self.l) << 2) | self.pp;
            vec![0xC4, byte1, byte2]
        }
    }
}

/// ModR/M byte fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModRm {
    pub mode: u8,
    pub reg: u8,
    pub rm: u8,
}

impl ModRm {
    pub fn byte(self) -> u8 {
        ((self.mode & 0b11) << 6) | ((self.reg & 0b111) << 3) | (self.rm & 0b111)
    }
}

/// SIB byte fields. Index and base are stored unmasked (the full 4-bit
/// register number); the high bits live in REX.X/REX.B.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sib {
    pub scale: u8,
    pub index: u8,
    pub base: u8,
}

impl Sib {
    pub fn byte(self) -> u8 {
        ((self.scale & 0b11) << 6) | ((self.index & 0b111) << 3) | (self.base & 0b111)
    }
}

/// A fully decided instruction encoding, one step before bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryFormat {
    pub prefix: Option<u8>,
    pub vex: Option<VexPrefix>,
    pub rex: Option<RexPrefix>,
    pub opcode: Vec<u8>,
    pub modrm: Option<ModRm>,
    pub sib: Option<Sib>,
    pub disp: Vec<u8>,
    pub imm: Vec<u8>,
    pub form: FormId,
}

impl BinaryFormat {
    pub(crate) fn new(opcode: Vec<u8>, prefix: Option<u8>, form: FormId) -> Self {
        BinaryFormat {
            prefix,
            vex: None,
            rex: None,
            opcode,
            modrm: None,
            sib: None,
            disp: Vec::new(),
            imm: Vec::new(),
            form,
        }
    }

    pub(crate) fn modrm_mut(&mut self) -> &mut ModRm {
        self.modrm.get_or_insert_with(ModRm::default)
    }

    pub(crate) fn rex_mut(&mut self) -> &mut RexPrefix {
        self.rex.get_or_insert_with(RexPrefix::default)
    }

    pub(crate) fn vex_mut(&mut self) -> &mut VexPrefix {
        self.vex.get_or_insert_with(VexPrefix::default)
    }

    /// Emits the record as the final little-endian byte stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        debug_assert!(
            self.vex.is_none() || self.rex.is_none(),
            "VEX and REX are mutually exclusive"
        );

        let mut out = Vec::with_capacity(15);
        if let Some(prefix) = self.prefix {
            out.push(prefix);
        }
        if let Some(vex) = self.vex {
            out.extend(vex.bytes());
        }
        if let Some(rex) = self.rex {
            out.push(rex.byte());
        }
        out.extend_from_slice(&self.opcode);
        if let Some(modrm) = self.modrm {
            out.push(modrm.byte());
        }
        if let Some(sib) = self.sib {
            out.push(sib.byte());
        }
        out.extend_from_slice(&self.disp);
        out.extend_from_slice(&self.imm);

        debug_assert!(out.len() <= 15, "x86-64 instructions are at most 15 bytes");
        out
    }
}
