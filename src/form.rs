//! Instruction-form descriptors: the static shape of one legal encoding.
//!
//! A form pairs a mnemonic group with a concrete opcode, up to four encoding
//! extensions and up to four operand slots. Each slot declares the low-level
//! operand kind it accepts (`rm64`, `imm32`, ...) and the role the operand
//! plays in the encoded bytes (ModR/M field, opcode register, immediate).

use crate::operand::AsmOperandKind;

/// Low-level operand kinds, as instruction forms declare them.
///
/// The declaration order is load-bearing: when several forms match an
/// instruction, the selector stable-sorts candidates by the first operand's
/// kind and takes the smallest, so `Rm*` (which also covers direct
/// registers) is preferred over the register-only `R*` shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum OperandKind {
    Rel8,
    Rel16,
    Rel32,
    Rm8,
    Rm16,
    Rm32,
    Rm64,
    M,
    M16,
    M32,
    M64,
    Seg64,
    Imm8,
    Imm16,
    Imm32,
    Imm64,
    R8,
    R16,
    R32,
    R64,
    Xmm1S32,
    Xmm1S64,
    Xmm2S32,
    Xmm2S64,
    Xmm1M32,
    Xmm1M64,
    Xmm2M32,
    Xmm2M64,
    Xmm2M128,
    Ymm1,
    Ymm2,
}

// Sizes as they appear in lookup keys.
const BYTE: u8 = 1;
const WORD: u8 = 2;
const DWORD: u8 = 4;
const QWORD: u8 = 8;
const OWORD: u8 = 16;
const YWORD: u8 = 32;

impl OperandKind {
    /// Expands a low-level kind into the set of `(high-level kind, size)`
    /// lookup keys it accepts. The trie builder registers a form under every
    /// key of every slot.
    pub(crate) fn expand(self) -> Vec<(AsmOperandKind, u8)> {
        use AsmOperandKind::*;
        match self {
            OperandKind::Rel8 => vec![(Uint8, BYTE)],
            OperandKind::Rel16 => vec![(Uint16, WORD)],
            OperandKind::Rel32 => vec![(Uint32, DWORD)],
            OperandKind::Rm8 => rm_keys(BYTE),
            OperandKind::Rm16 => rm_keys(WORD),
            OperandKind::Rm32 => rm_keys(DWORD),
            OperandKind::Rm64 => rm_keys(QWORD),
            OperandKind::M => mem_keys(QWORD),
            // word memory only ever appears as a bare indirect access
            OperandKind::M16 => vec![(IndirectReg, WORD)],
            OperandKind::M32 => mem_keys(DWORD),
            OperandKind::M64 => mem_keys(QWORD),
            OperandKind::Seg64 => vec![(SegOffset, QWORD)],
            OperandKind::Imm8 => vec![(Uint8, BYTE)],
            OperandKind::Imm16 => vec![(Uint16, WORD)],
            // generic integer immediates land in the imm32 slot
            OperandKind::Imm32 => vec![(Uint32, DWORD), (Uint, QWORD)],
            OperandKind::Imm64 => vec![(Uint64, QWORD)],
            OperandKind::R8 => vec![(Reg, BYTE)],
            OperandKind::R16 => vec![(Reg, WORD)],
            OperandKind::R32 => vec![(Reg, DWORD)],
            OperandKind::R64 => vec![(Reg, QWORD)],
            OperandKind::Xmm1S32 | OperandKind::Xmm2S32 => vec![(Freg, DWORD)],
            OperandKind::Xmm1S64 | OperandKind::Xmm2S64 => vec![(Freg, QWORD)],
            OperandKind::Xmm1M32 | OperandKind::Xmm2M32 => {
                let mut keys = vec![(Freg, DWORD)];
                keys.extend(mem_keys(DWORD));
                keys
            }
            OperandKind::Xmm1M64 | OperandKind::Xmm2M64 => {
                let mut keys = vec![(Freg, QWORD)];
                keys.extend(mem_keys(QWORD));
                keys
            }
            // 128-bit memory operands are not accepted, only the register half
            OperandKind::Xmm2M128 => vec![(Freg, OWORD)],
            OperandKind::Ymm1 | OperandKind::Ymm2 => vec![(Freg, YWORD)],
        }
    }
}

fn rm_keys(size: u8) -> Vec<(AsmOperandKind, u8)> {
    use AsmOperandKind::*;
    vec![
        (Reg, size),
        (IndirectReg, size),
        (DispReg, size),
        (RipRelative, size),
        (SibReg, size),
    ]
}

fn mem_keys(size: u8) -> Vec<(AsmOperandKind, u8)> {
    use AsmOperandKind::*;
    vec![
        (IndirectReg, size),
        (DispReg, size),
        (RipRelative, size),
        (SibReg, size),
    ]
}

/// How an operand is placed into the encoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandEncoding {
    /// ModR/M `r/m` field (register-direct or any memory mode).
    ModRmRm,
    /// ModR/M `reg` field.
    ModRmReg,
    /// Register number added to the last opcode byte (`B8+rd` style).
    OpcodePlus,
    /// Immediate bytes after displacement.
    Imm,
    /// VEX `vvvv` source register field.
    VexVvvv,
}

/// Encoding extensions a form may carry, at most four.
///
/// `Slash0..Slash7` fix the ModR/M `reg` field to an opcode digit; `SlashR`
/// says ModR/M is present and `reg` comes from an operand. The `Imm*` width
/// hints are not consulted while encoding (the operand's own width decides),
/// but are preserved so the object writer can size relocations from the
/// chosen form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeExt {
    Slash0,
    Slash1,
    Slash2,
    Slash3,
    Slash4,
    Slash5,
    Slash6,
    Slash7,
    SlashR,
    Rex,
    RexW,
    ImmByte,
    ImmWord,
    ImmDword,
    ImmQword,
    Vex128,
    Vex256,
    Vex66,
    VexF2,
    VexF3,
    Vex0f,
    Vex0f38,
    Vex0f3a,
    VexW0,
    VexW1,
    VexWig,
}

/// One operand slot of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormOperand {
    pub kind: OperandKind,
    pub encoding: OperandEncoding,
}

/// One catalog entry: a single legal encoding shape of a mnemonic.
///
/// `group` keys the lookup trie (the backend-facing mnemonic); `name` is the
/// display mnemonic of this particular form (`group: "mov"` holds both
/// `mov` and `movsd` forms).
#[derive(Debug, Clone, PartialEq)]
pub struct InstForm {
    pub group: &'static str,
    pub name: &'static str,
    pub prefix: Option<u8>,
    pub opcode: Vec<u8>,
    pub extensions: Vec<OpcodeExt>,
    pub operands: Vec<FormOperand>,
}

impl InstForm {
    /// Returns true if the form declares the given extension.
    pub fn has_ext(&self, ext: OpcodeExt) -> bool {
        self.extensions.contains(&ext)
    }

    /// Returns true if the form carries a REX or REX.W extension.
    pub fn has_rex_ext(&self) -> bool {
        self.has_ext(OpcodeExt::Rex) || self.has_ext(OpcodeExt::RexW)
    }
}

/// Identity of a chosen form within the catalog, handed back to the object
/// writer so it can recover the form's extension set for relocation sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FormId(pub(crate) u16);

impl FormId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
