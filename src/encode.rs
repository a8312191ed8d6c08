//! The fill phase: materialize a chosen form and its operands into a
//! [`BinaryFormat`], then serialize.
//!
//! Extensions run first and decide which sub-records exist (ModR/M digit,
//! REX, VEX fields); a REX is synthesized afterwards if the operands demand
//! one and the form declared neither REX nor VEX. Operands then run in slot
//! order, each dispatching on its high-level kind and the slot's encoding
//! role.

use log::trace;

use crate::error::EncodeError;
use crate::form::{FormId, InstForm, OpcodeExt, OperandEncoding};
use crate::format::{
    BinaryFormat, Sib, VexMap, MOD_DIRECT, MOD_INDIRECT, MOD_INDIRECT_DISP8, MOD_INDIRECT_DISP32,
    RM_RIP_RELATIVE, RM_SIB_FOLLOWS, SIB_BASE_DISP32, SIB_INDEX_NONE,
};
use crate::operand::{AsmInst, AsmOperand};
use crate::select::OpcodeTable;

/// One encoded instruction: the bytes and the identity of the form that
/// produced them (the object writer derives relocation types from the form).
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedInst {
    pub bytes: Vec<u8>,
    pub form: FormId,
}

/// Encodes a single assembly instruction against the given form table.
pub fn encode(table: &OpcodeTable, inst: &AsmInst) -> Result<EncodedInst, EncodeError> {
    let selection = table.select(inst)?;
    let form = table.form(selection.form);
    let format = fill(form, selection.form, inst, selection.needs_rex)?;
    let bytes = format.to_bytes();
    trace!("{} -> {:02x?}", inst.mnemonic, bytes);
    Ok(EncodedInst {
        bytes,
        form: selection.form,
    })
}

/// Builds the binary-format record for `inst` encoded as `form`.
pub(crate) fn fill(
    form: &InstForm,
    id: FormId,
    inst: &AsmInst,
    needs_rex: bool,
) -> Result<BinaryFormat, EncodeError> {
    let mut format = BinaryFormat::new(form.opcode.clone(), inst.prefix.or(form.prefix), id);

    for &ext in &form.extensions {
        apply_ext(&mut format, ext);
    }

    // Registers like r9 or spl force a REX even on forms that do not declare
    // one; VEX-encoded forms carry the extension bits in the VEX prefix.
    if needs_rex && format.rex.is_none() && format.vex.is_none() {
        format.rex_mut();
    }

    let slash_r = form.has_ext(OpcodeExt::SlashR);
    for (form_op, asm_op) in form.operands.iter().zip(&inst.operands) {
        fill_operand(&mut format, form.name, slash_r, form_op.encoding, asm_op)?;
    }

    debug_validate(&format);
    Ok(format)
}

fn apply_ext(format: &mut BinaryFormat, ext: OpcodeExt) {
    use OpcodeExt::*;
    match ext {
        Slash0 => format.modrm_mut().reg = 0,
        Slash1 => format.modrm_mut().reg = 1,
        Slash2 => format.modrm_mut().reg = 2,
        Slash3 => format.modrm_mut().reg = 3,
        Slash4 => format.modrm_mut().reg = 4,
        Slash5 => format.modrm_mut().reg = 5,
        Slash6 => format.modrm_mut().reg = 6,
        Slash7 => format.modrm_mut().reg = 7,
        SlashR => {
            format.modrm_mut();
        }
        Rex => {
            format.rex_mut();
        }
        RexW => format.rex_mut().w = true,
        Vex128 => {
            format.vex_mut();
        }
        Vex256 => format.vex_mut().l = true,
        Vex66 => format.vex_mut().pp = 1,
        VexF3 => format.vex_mut().pp = 2,
        VexF2 => format.vex_mut().pp = 3,
        Vex0f => format.vex_mut().map = VexMap::Map0f,
        Vex0f38 => format.vex_mut().map = VexMap::Map0f38,
        Vex0f3a => format.vex_mut().map = VexMap::Map0f3a,
        VexW0 | VexWig => format.vex_mut().w = false,
        VexW1 => format.vex_mut().w = true,
        // immediate width hints are relocation metadata, not encoder state
        ImmByte | ImmWord | ImmDword | ImmQword => {}
    }
}

/// Sets the extension bit for a register landing in ModRM.rm / SIB.base.
fn extend_b(format: &mut BinaryFormat, index: u8) {
    if let Some(rex) = format.rex.as_mut() {
        rex.b = index > 7;
    } else if let Some(vex) = format.vex.as_mut() {
        // VEX stores the bit inverted
        vex.b = index <= 7;
    }
}

/// Sets the extension bit for a register landing in ModRM.reg.
fn extend_r(format: &mut BinaryFormat, index: u8) {
    if let Some(rex) = format.rex.as_mut() {
        rex.r = index > 7;
    } else if let Some(vex) = format.vex.as_mut() {
        vex.r = index <= 7;
    }
}

fn fill_operand(
    format: &mut BinaryFormat,
    form_name: &'static str,
    slash_r: bool,
    encoding: OperandEncoding,
    asm_op: &AsmOperand,
) -> Result<(), EncodeError> {
    use OperandEncoding::*;

    match (*asm_op, encoding) {
        (AsmOperand::Reg(r) | AsmOperand::Freg { reg: r, .. }, ModRmRm) => {
            {
                let modrm = format.modrm_mut();
                modrm.mode = MOD_DIRECT;
                modrm.rm = r.index() & 7;
            }
            extend_b(format, r.index());
        }

        (AsmOperand::Reg(r) | AsmOperand::Freg { reg: r, .. }, ModRmReg) => {
            if format.modrm.is_none() {
                format.modrm_mut().mode = MOD_DIRECT;
            }
            // without /r the reg field belongs to the opcode digit (the
            // shift-by-CL forms park CL in this slot without encoding it)
            if slash_r {
                format.modrm_mut().reg = r.index() & 7;
                extend_r(format, r.index());
            }
        }

        (AsmOperand::Reg(r) | AsmOperand::Freg { reg: r, .. }, OpcodePlus) => {
            format.opcode[0] += r.index() & 7;
            if let Some(rex) = format.rex.as_mut() {
                rex.b = r.index() > 7;
            }
        }

        (AsmOperand::Reg(r) | AsmOperand::Freg { reg: r, .. }, VexVvvv) => {
            // vvvv is a one's-complement nibble and fully identifies the
            // register; it does not touch the R bit
            format.vex_mut().source = 15 - r.index();
        }

        (AsmOperand::DispReg { reg, disp, .. }, ModRmRm) => {
            let rm_low = reg.index() & 7;
            if rm_low == RM_SIB_FOLLOWS {
                // rsp/r12 cannot be addressed through the bare rm field
                format.sib = Some(Sib {
                    scale: 0,
                    index: SIB_INDEX_NONE,
                    base: reg.index(),
                });
            }
            {
                let modrm = format.modrm_mut();
                modrm.rm = rm_low;
                modrm.mode = if (-128..=127).contains(&disp) {
                    MOD_INDIRECT_DISP8
                } else {
                    MOD_INDIRECT_DISP32
                };
            }
            format.disp = if (-128..=127).contains(&disp) {
                vec![disp as u8]
            } else {
                disp.to_le_bytes().to_vec()
            };
            extend_b(format, reg.index());
        }

        (AsmOperand::IndirectReg { reg, .. }, ModRmRm) => {
            let rm_low = reg.index() & 7;
            if rm_low == RM_RIP_RELATIVE {
                // [rbp]/[r13] have no mod=00 encoding; use a zero disp8
                let modrm = format.modrm_mut();
                modrm.mode = MOD_INDIRECT_DISP8;
                modrm.rm = rm_low;
                format.disp = vec![0];
            } else if rm_low == RM_SIB_FOLLOWS {
                let modrm = format.modrm_mut();
                modrm.mode = MOD_INDIRECT;
                modrm.rm = RM_SIB_FOLLOWS;
                format.sib = Some(Sib {
                    scale: 0,
                    index: SIB_INDEX_NONE,
                    base: reg.index(),
                });
            } else {
                let modrm = format.modrm_mut();
                modrm.mode = MOD_INDIRECT;
                modrm.rm = rm_low;
            }
            extend_b(format, reg.index());
        }

        (AsmOperand::RipRelative { disp, .. }, ModRmRm) => {
            let modrm = format.modrm_mut();
            modrm.mode = MOD_INDIRECT;
            modrm.rm = RM_RIP_RELATIVE;
            format.disp = disp.to_le_bytes().to_vec();
        }

        (AsmOperand::SegOffset { seg, offset }, ModRmRm) => {
            // segment override plus absolute SIB addressing: base of the
            // effective address is seg.base, not a register
            format.prefix = Some(seg.prefix_byte());
            let modrm = format.modrm_mut();
            modrm.mode = MOD_INDIRECT;
            modrm.rm = RM_SIB_FOLLOWS;
            format.sib = Some(Sib {
                scale: 0,
                index: SIB_INDEX_NONE,
                base: SIB_BASE_DISP32,
            });
            format.disp = offset.to_le_bytes().to_vec();
        }

        (
            AsmOperand::SibReg {
                base,
                index,
                scale,
                disp,
                ..
            },
            ModRmRm,
        ) => {
            debug_assert!(scale <= 3, "scale is the encoded 2-bit field");
            let index_num = match index {
                Some(r) => r.index(),
                None => SIB_INDEX_NONE,
            };
            format.modrm_mut().rm = RM_SIB_FOLLOWS;
            format.sib = Some(Sib {
                scale,
                index: index_num,
                base: base.index(),
            });
            if let Some(rex) = format.rex.as_mut() {
                rex.x = index_num > 7;
                rex.b = base.index() > 7;
            } else if let Some(vex) = format.vex.as_mut() {
                vex.x = index_num <= 7;
                vex.b = base.index() <= 7;
            }

            if disp == 0 {
                format.modrm_mut().mode = MOD_INDIRECT;
                format.disp.clear();
            } else if (-128..=127).contains(&disp) {
                format.modrm_mut().mode = MOD_INDIRECT_DISP8;
                format.disp = vec![disp as u8];
            } else {
                format.modrm_mut().mode = MOD_INDIRECT_DISP32;
                format.disp = disp.to_le_bytes().to_vec();
            }

            // rbp/r13 base has no mod=00 form; a zero displacement must be
            // made explicit as disp8
            if base.index() & 7 == SIB_BASE_DISP32 && disp == 0 {
                format.modrm_mut().mode = MOD_INDIRECT_DISP8;
                format.disp = vec![0];
            }
        }

        (AsmOperand::Uint8(value), Imm) => format.imm = vec![value],
        (AsmOperand::Uint16(value), Imm) => format.imm = value.to_le_bytes().to_vec(),
        (AsmOperand::Uint32(value), Imm) => format.imm = value.to_le_bytes().to_vec(),
        (AsmOperand::Uint64(value), Imm) => format.imm = value.to_le_bytes().to_vec(),
        // generic integers are promoted into the 4-byte immediate slot
        (AsmOperand::Uint(value), Imm) => format.imm = (value as u32).to_le_bytes().to_vec(),
        (AsmOperand::Float32(value), Imm) => format.imm = value.to_le_bytes().to_vec(),
        (AsmOperand::Float64(value), Imm) => format.imm = value.to_le_bytes().to_vec(),

        (op, encoding) => {
            return Err(EncodeError::UnsupportedEncoding {
                form: form_name,
                encoding,
                kind: op.kind(),
            })
        }
    }
    Ok(())
}

/// ModR/M mod and displacement width must agree by the end of fill; a form
/// with `/r` or `/digit` but no RM operand would trip this.
fn debug_validate(format: &BinaryFormat) {
    if let Some(modrm) = format.modrm {
        let disp_len = format.disp.len();
        let consistent = match modrm.mode {
            MOD_DIRECT => disp_len == 0,
            // mod=00 carries no displacement except the RIP-relative and
            // absolute-SIB disp32 shapes
            MOD_INDIRECT => disp_len == 0 || disp_len == 4,
            MOD_INDIRECT_DISP8 => disp_len == 1,
            MOD_INDIRECT_DISP32 => disp_len == 4,
            _ => false,
        };
        debug_assert!(
            consistent,
            "ModR/M mod {:#04b} disagrees with {} displacement byte(s)",
            modrm.mode, disp_len
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormOperand, OperandKind};
    use crate::operand::Segment;
    use crate::register::*;
    use pretty_assertions::assert_eq;

    fn enc(mnemonic: &'static str, operands: Vec<AsmOperand>) -> Vec<u8> {
        let inst = AsmInst::new(mnemonic, operands);
        encode(OpcodeTable::global(), &inst).unwrap().bytes
    }

    fn mem(reg: Register) -> AsmOperand {
        AsmOperand::IndirectReg { reg, size: 8 }
    }

    #[test]
    fn test_mov_register_to_register() {
        // mov rax, rbx
        assert_eq!(enc("mov", vec![AsmOperand::Reg(RAX), AsmOperand::Reg(RBX)]), vec![0x48, 0x89, 0xD8]);
        // both operands extended: mov r9, r10
        assert_eq!(enc("mov", vec![AsmOperand::Reg(R9), AsmOperand::Reg(R10)]), vec![0x4D, 0x89, 0xD1]);
        // 32-bit drops REX, 16-bit adds the operand-size prefix
        assert_eq!(enc("mov", vec![AsmOperand::Reg(EAX), AsmOperand::Reg(EBX)]), vec![0x89, 0xD8]);
        assert_eq!(enc("mov", vec![AsmOperand::Reg(AX), AsmOperand::Reg(CX)]), vec![0x66, 0x89, 0xC8]);
    }

    #[test]
    fn test_mov_immediate_to_register() {
        // mov eax, 0x12345678 (B8+rd id)
        assert_eq!(
            enc("mov", vec![AsmOperand::Reg(EAX), AsmOperand::Uint32(0x12345678)]),
            vec![0xB8, 0x78, 0x56, 0x34, 0x12]
        );
        // mov r10, imm64 sets REX.B on the opcode register
        assert_eq!(
            enc("mov", vec![AsmOperand::Reg(R10), AsmOperand::Uint64(0x1234567890ABCDEF)]),
            vec![0x49, 0xBA, 0xEF, 0xCD, 0xAB, 0x90, 0x78, 0x56, 0x34, 0x12]
        );
    }

    #[test]
    fn test_add_immediate_to_stack_slot() {
        // add qword [rbp - 8], 1 with a generic immediate
        assert_eq!(
            enc(
                "add",
                vec![
                    AsmOperand::DispReg { reg: RBP, disp: -8, size: 8 },
                    AsmOperand::Uint(1),
                ]
            ),
            vec![0x48, 0x81, 0x45, 0xF8, 0x01, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_lea_rip_relative() {
        // lea rdi, [rip + 0x100]
        assert_eq!(
            enc(
                "lea",
                vec![
                    AsmOperand::Reg(RDI),
                    AsmOperand::RipRelative { disp: 0x100, size: 8 },
                ]
            ),
            vec![0x48, 0x8D, 0x3D, 0x00, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_mov_segment_offset() {
        // mov rax, fs:0x28 (stack canary load)
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SegOffset { seg: Segment::Fs, offset: 0x28 },
                ]
            ),
            vec![0x64, 0x48, 0x8B, 0x04, 0x25, 0x28, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RCX),
                    AsmOperand::SegOffset { seg: Segment::Gs, offset: 0x10 },
                ]
            ),
            vec![0x65, 0x48, 0x8B, 0x0C, 0x25, 0x10, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn test_indirect_rbp_and_r13_force_zero_disp8() {
        assert_eq!(enc("mov", vec![AsmOperand::Reg(R8), mem(RBP)]), vec![0x4C, 0x8B, 0x45, 0x00]);
        assert_eq!(enc("mov", vec![AsmOperand::Reg(RAX), mem(R13)]), vec![0x49, 0x8B, 0x45, 0x00]);
    }

    #[test]
    fn test_indirect_rsp_and_r12_take_sib() {
        assert_eq!(enc("mov", vec![AsmOperand::Reg(R8), mem(RSP)]), vec![0x4C, 0x8B, 0x04, 0x24]);
        assert_eq!(enc("mov", vec![AsmOperand::Reg(RAX), mem(R12)]), vec![0x49, 0x8B, 0x04, 0x24]);
    }

    #[test]
    fn test_displacement_width_boundaries() {
        let disp = |d| vec![AsmOperand::Reg(RAX), AsmOperand::DispReg { reg: RBX, disp: d, size: 8 }];
        assert_eq!(enc("mov", disp(127)), vec![0x48, 0x8B, 0x43, 0x7F]);
        assert_eq!(enc("mov", disp(128)), vec![0x48, 0x8B, 0x83, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(enc("mov", disp(-128)), vec![0x48, 0x8B, 0x43, 0x80]);
        assert_eq!(enc("mov", disp(-129)), vec![0x48, 0x8B, 0x83, 0x7F, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn test_eight_bit_register_flavors() {
        // ah filters out the REX twin
        assert_eq!(enc("mov", vec![AsmOperand::Reg(AH), AsmOperand::Reg(CL)]), vec![0x88, 0xCC]);
        // spl shares ah's slot but demands the REX twin
        assert_eq!(enc("mov", vec![AsmOperand::Reg(SPL), AsmOperand::Reg(CL)]), vec![0x40, 0x88, 0xCC]);
        // plain low bytes pick the REX twin by registration order
        assert_eq!(enc("mov", vec![AsmOperand::Reg(AL), AsmOperand::Reg(CL)]), vec![0x40, 0x88, 0xC8]);
        // r8b-r15b synthesize REX through the operand scan
        assert_eq!(enc("mov", vec![AsmOperand::Reg(R9B), AsmOperand::Reg(CL)]), vec![0x41, 0x88, 0xC9]);
    }

    #[test]
    fn test_sib_addressing() {
        // mov rax, [rcx + rsi*4 + 0x10]
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: RCX, index: Some(RSI), scale: 2, disp: 0x10, size: 8 },
                ]
            ),
            vec![0x48, 0x8B, 0x44, 0xB1, 0x10]
        );
        // mov rax, [rcx + rsi + 0x1234] takes a dword displacement
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: RCX, index: Some(RSI), scale: 0, disp: 0x1234, size: 8 },
                ]
            ),
            vec![0x48, 0x8B, 0x84, 0x31, 0x34, 0x12, 0x00, 0x00]
        );
        // extended base and index land in REX.B and REX.X
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: R9, index: Some(R10), scale: 0, disp: 0, size: 8 },
                ]
            ),
            vec![0x4B, 0x8B, 0x04, 0x11]
        );
    }

    #[test]
    fn test_sib_rbp_base_displacement_rules() {
        // zero displacement must become an explicit disp8
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: RBP, index: Some(RSI), scale: 0, disp: 0, size: 8 },
                ]
            ),
            vec![0x48, 0x8B, 0x44, 0x35, 0x00]
        );
        // a real displacement is kept as-is
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: RBP, index: Some(RSI), scale: 2, disp: 0x10, size: 8 },
                ]
            ),
            vec![0x48, 0x8B, 0x44, 0xB5, 0x10]
        );
        // r13 behaves like rbp
        assert_eq!(
            enc(
                "mov",
                vec![
                    AsmOperand::Reg(RAX),
                    AsmOperand::SibReg { base: R13, index: Some(RSI), scale: 0, disp: 0, size: 8 },
                ]
            ),
            vec![0x49, 0x8B, 0x44, 0x35, 0x00]
        );
    }

    #[test]
    fn test_control_flow() {
        assert_eq!(enc("call", vec![AsmOperand::Uint32(0x10)]), vec![0xE8, 0x10, 0x00, 0x00, 0x00]);
        assert_eq!(enc("jmp", vec![AsmOperand::Uint8(0x05)]), vec![0xEB, 0x05]);
        assert_eq!(enc("je", vec![AsmOperand::Uint32(0x80)]), vec![0x0F, 0x84, 0x80, 0x00, 0x00, 0x00]);
        assert_eq!(enc("ret", vec![]), vec![0xC3]);
        assert_eq!(enc("syscall", vec![]), vec![0x0F, 0x05]);
        assert_eq!(enc("movsq", vec![]), vec![0x48, 0xA5]);
        // call through a register uses the /2 digit
        assert_eq!(enc("call", vec![AsmOperand::Reg(RCX)]), vec![0xFF, 0xD1]);
    }

    #[test]
    fn test_push_pop_synthesize_rex_for_extended_registers() {
        assert_eq!(enc("push", vec![AsmOperand::Reg(RCX)]), vec![0xFF, 0xF1]);
        assert_eq!(enc("push", vec![AsmOperand::Reg(R9)]), vec![0x41, 0xFF, 0xF1]);
        assert_eq!(enc("pop", vec![AsmOperand::Reg(RCX)]), vec![0x8F, 0xC1]);
    }

    #[test]
    fn test_shift_by_cl_keeps_opcode_digit() {
        // sar rax, cl: CL occupies the reg slot but /7 owns the field
        assert_eq!(
            enc("sar", vec![AsmOperand::Reg(RAX), AsmOperand::Reg(CL)]),
            vec![0x48, 0xD3, 0xF8]
        );
        assert_eq!(
            enc("shr", vec![AsmOperand::Reg(RCX), AsmOperand::Reg(CL)]),
            vec![0x48, 0xD3, 0xE9]
        );
    }

    #[test]
    fn test_scalar_float_forms() {
        let xmm = |reg, size| AsmOperand::Freg { reg, size };
        // movsd xmm1, xmm2 via the mov group
        assert_eq!(
            enc("mov", vec![xmm(XMM1, 8), xmm(XMM2, 8)]),
            vec![0xF2, 0x0F, 0x10, 0xCA]
        );
        assert_eq!(
            enc("mov", vec![xmm(XMM1, 4), xmm(XMM2, 4)]),
            vec![0xF3, 0x0F, 0x10, 0xCA]
        );
        // store direction: movsd [rax], xmm3
        assert_eq!(
            enc("mov", vec![mem(RAX), xmm(XMM3, 8)]),
            vec![0xF2, 0x0F, 0x11, 0x18]
        );
        // addsd xmm8, xmm1 needs a synthesized REX.R after the prefix
        assert_eq!(
            enc("add", vec![xmm(XMM8, 8), xmm(XMM1, 8)]),
            vec![0xF2, 0x44, 0x0F, 0x58, 0xC1]
        );
        // comisd via the cmp group
        assert_eq!(
            enc("cmp", vec![xmm(XMM0, 8), xmm(XMM1, 8)]),
            vec![0x66, 0x0F, 0x2F, 0xC1]
        );
    }

    #[test]
    fn test_vex_two_byte_encoding() {
        let xmm = |reg| AsmOperand::Freg { reg, size: 8 };
        // vaddsd xmm0, xmm1, xmm2
        assert_eq!(
            enc("vaddsd", vec![xmm(XMM0), xmm(XMM1), xmm(XMM2)]),
            vec![0xC5, 0xF3, 0x58, 0xC2]
        );
        // vmovups ymm0, ymm1
        assert_eq!(
            enc(
                "vmovups",
                vec![
                    AsmOperand::Freg { reg: YMM0, size: 32 },
                    AsmOperand::Freg { reg: YMM1, size: 32 },
                ]
            ),
            vec![0xC5, 0xFC, 0x10, 0xC1]
        );
    }

    #[test]
    fn test_vex_three_byte_encoding() {
        let xmm = |reg| AsmOperand::Freg { reg, size: 8 };
        // an extended rm register clears B and forces the C4 form; no REX is
        // ever emitted alongside it
        assert_eq!(
            enc("vaddsd", vec![xmm(XMM0), xmm(XMM1), xmm(XMM8)]),
            vec![0xC4, 0xC1, 0x73, 0x58, 0xC0]
        );
        assert_eq!(
            enc(
                "vmovups",
                vec![
                    AsmOperand::Freg { reg: YMM8, size: 32 },
                    AsmOperand::Freg { reg: YMM9, size: 32 },
                ]
            ),
            vec![0xC4, 0x41, 0x7C, 0x10, 0xC1]
        );
    }

    #[test]
    fn test_widening_moves() {
        assert_eq!(
            enc("movzx", vec![AsmOperand::Reg(EAX), AsmOperand::Reg(CL)]),
            vec![0x0F, 0xB6, 0xC1]
        );
        assert_eq!(
            enc("movsx", vec![AsmOperand::Reg(RAX), AsmOperand::Reg(ECX)]),
            vec![0x48, 0x63, 0xC1]
        );
    }

    #[test]
    fn test_worst_case_stays_within_length_limit() {
        let bytes = enc(
            "add",
            vec![
                AsmOperand::SibReg { base: R9, index: Some(R10), scale: 3, disp: 0x1234, size: 8 },
                AsmOperand::Uint32(0x12345678),
            ],
        );
        assert_eq!(
            bytes,
            vec![0x4B, 0x81, 0x84, 0xD1, 0x34, 0x12, 0x00, 0x00, 0x78, 0x56, 0x34, 0x12]
        );
        assert!(bytes.len() <= 15);
    }

    #[test]
    fn test_form_id_recovers_the_chosen_form() {
        let table = OpcodeTable::global();
        let inst = AsmInst::new("mov", vec![AsmOperand::Reg(RAX), AsmOperand::Reg(RBX)]);
        let encoded = encode(table, &inst).unwrap();
        let form = table.form(encoded.form);
        assert_eq!(form.name, "mov");
        assert_eq!(form.opcode, [0x89]);
        assert!(form.has_ext(OpcodeExt::RexW));
    }

    #[test]
    fn test_float_immediate_widths() {
        let imm_form = InstForm {
            group: "mov",
            name: "mov",
            prefix: None,
            opcode: vec![0xB8],
            extensions: vec![],
            operands: vec![FormOperand {
                kind: OperandKind::Imm32,
                encoding: OperandEncoding::Imm,
            }],
        };
        let inst = AsmInst::new("mov", vec![AsmOperand::Float32(1.5)]);
        let format = fill(&imm_form, FormId(0), &inst, false).unwrap();
        assert_eq!(format.imm, 1.5f32.to_le_bytes().to_vec());

        let inst = AsmInst::new("mov", vec![AsmOperand::Float64(1.5)]);
        let format = fill(&imm_form, FormId(0), &inst, false).unwrap();
        assert_eq!(format.imm, 1.5f64.to_le_bytes().to_vec());
    }

    #[test]
    fn test_unsupported_role_is_reported() {
        let bad_form = InstForm {
            group: "mov",
            name: "mov",
            prefix: None,
            opcode: vec![0x90],
            extensions: vec![],
            operands: vec![FormOperand {
                kind: OperandKind::Imm32,
                encoding: OperandEncoding::ModRmReg,
            }],
        };
        let inst = AsmInst::new("mov", vec![AsmOperand::Uint32(1)]);
        let result = fill(&bad_form, FormId(0), &inst, false);
        assert!(matches!(
            result,
            Err(EncodeError::UnsupportedEncoding {
                encoding: OperandEncoding::ModRmReg,
                ..
            })
        ));
    }
}
