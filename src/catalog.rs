//! The instruction-form catalog: every encoding shape the backend may ask
//! for, as plain data.
//!
//! Forms are listed in registration order. Order matters for exactly one
//! thing: when two forms of a group share the same first-operand kind (the
//! REX and non-REX 8-bit twins), the selector's stable sort keeps the one
//! registered first, so REX variants come before their plain counterparts.
//!
//! Opcodes and shapes follow the Intel SDM instruction summary tables
//! (https://www.felixcloutier.com/x86/ is the quick reference).

use crate::form::OpcodeExt::{self, *};
use crate::form::OperandEncoding::{self, *};
use crate::form::OperandKind::{self, *};
use crate::form::{FormOperand, InstForm};

fn form(
    group: &'static str,
    name: &'static str,
    prefix: Option<u8>,
    opcode: &[u8],
    extensions: &[OpcodeExt],
    operands: &[(OperandKind, OperandEncoding)],
) -> InstForm {
    InstForm {
        group,
        name,
        prefix,
        opcode: opcode.to_vec(),
        extensions: extensions.to_vec(),
        operands: operands
            .iter()
            .map(|&(kind, encoding)| FormOperand { kind, encoding })
            .collect(),
    }
}

/// The classic ALU family (`add`-shaped): `80/81 /digit` immediate forms,
/// then `base+0..base+3` register forms, REX 8-bit twins first.
fn alu_family(forms: &mut Vec<InstForm>, group: &'static str, digit: OpcodeExt, base: u8) {
    forms.extend([
        form(group, group, None, &[0x80], &[Rex, digit, ImmByte], &[(Rm8, ModRmRm), (Imm8, Imm)]),
        form(group, group, None, &[0x80], &[digit, ImmByte], &[(Rm8, ModRmRm), (Imm8, Imm)]),
        form(group, group, Some(0x66), &[0x81], &[digit, ImmWord], &[(Rm16, ModRmRm), (Imm16, Imm)]),
        form(group, group, None, &[0x81], &[digit, ImmDword], &[(Rm32, ModRmRm), (Imm32, Imm)]),
        form(group, group, None, &[0x81], &[RexW, digit, ImmDword], &[(Rm64, ModRmRm), (Imm32, Imm)]),
        form(group, group, None, &[base], &[Rex, SlashR], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form(group, group, None, &[base], &[SlashR], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form(group, group, Some(0x66), &[base + 1], &[SlashR], &[(Rm16, ModRmRm), (R16, ModRmReg)]),
        form(group, group, None, &[base + 1], &[SlashR], &[(Rm32, ModRmRm), (R32, ModRmReg)]),
        form(group, group, None, &[base + 1], &[RexW, SlashR], &[(Rm64, ModRmRm), (R64, ModRmReg)]),
        form(group, group, None, &[base + 2], &[Rex, SlashR], &[(R8, ModRmReg), (Rm8, ModRmRm)]),
        form(group, group, None, &[base + 2], &[SlashR], &[(R8, ModRmReg), (Rm8, ModRmRm)]),
        form(group, group, Some(0x66), &[base + 3], &[SlashR], &[(R16, ModRmReg), (Rm16, ModRmRm)]),
        form(group, group, None, &[base + 3], &[SlashR], &[(R32, ModRmReg), (Rm32, ModRmRm)]),
        form(group, group, None, &[base + 3], &[RexW, SlashR], &[(R64, ModRmReg), (Rm64, ModRmRm)]),
    ]);
}

/// Single-operand `F6/F7 /digit` family (`mul`, `div`, `neg`, ...).
fn unary_family(
    forms: &mut Vec<InstForm>,
    group: &'static str,
    digit: OpcodeExt,
    with_rex8: bool,
) {
    if with_rex8 {
        forms.push(form(group, group, None, &[0xF6], &[Rex, digit], &[(Rm8, ModRmRm)]));
    }
    forms.extend([
        form(group, group, None, &[0xF6], &[digit], &[(Rm8, ModRmRm)]),
        form(group, group, Some(0x66), &[0xF7], &[digit], &[(Rm16, ModRmRm)]),
        form(group, group, None, &[0xF7], &[digit], &[(Rm32, ModRmRm)]),
        form(group, group, None, &[0xF7], &[RexW, digit], &[(Rm64, ModRmRm)]),
    ]);
}

/// Shift-by-CL family, `D2/D3 /digit`. The CL operand sits in a ModRM.reg
/// slot but the digit owns the field; the fill phase leaves it alone because
/// these forms carry no `/r`.
fn shift_family(forms: &mut Vec<InstForm>, group: &'static str, digit: OpcodeExt) {
    forms.extend([
        form(group, group, None, &[0xD2], &[Rex, digit], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form(group, group, None, &[0xD2], &[digit], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form(group, group, Some(0x66), &[0xD3], &[digit], &[(Rm16, ModRmRm), (R8, ModRmReg)]),
        form(group, group, None, &[0xD3], &[digit], &[(Rm32, ModRmRm), (R8, ModRmReg)]),
        form(group, group, None, &[0xD3], &[RexW, digit], &[(Rm64, ModRmRm), (R8, ModRmReg)]),
    ]);
}

/// Builds the full catalog.
pub(crate) fn catalog() -> Vec<InstForm> {
    let mut forms = vec![
        form("lea", "lea", None, &[0x8D], &[RexW, SlashR], &[(R64, ModRmReg), (M, ModRmRm)]),
        form("syscall", "syscall", None, &[0x0F, 0x05], &[], &[]),
        form("call", "call", None, &[0xFF], &[Slash2], &[(Rm64, ModRmRm)]),
        form("call", "call", None, &[0xE8], &[ImmDword], &[(Rel32, Imm)]),
        form("jmp", "jmp", None, &[0xEB], &[ImmByte], &[(Rel8, Imm)]),
        form("jmp", "jmp", None, &[0xE9], &[ImmDword], &[(Rel32, Imm)]),
        form("je", "je", None, &[0x74], &[ImmByte], &[(Rel8, Imm)]),
        form("je", "je", None, &[0x0F, 0x84], &[ImmDword], &[(Rel32, Imm)]),
        form("ret", "ret", None, &[0xC3], &[], &[]),
        form("push", "push", None, &[0xFF], &[Slash6], &[(Rm64, ModRmRm)]),
        form("push", "push", None, &[0x50], &[], &[(R64, OpcodePlus)]),
        form("pop", "pop", None, &[0x58], &[], &[(R64, OpcodePlus)]),
        form("pop", "pop", None, &[0x8F], &[Slash0], &[(Rm64, ModRmRm)]),
    ];

    alu_family(&mut forms, "add", Slash0, 0x00);
    alu_family(&mut forms, "sub", Slash5, 0x28);

    unary_family(&mut forms, "idiv", Slash7, true);
    unary_family(&mut forms, "div", Slash6, true);
    unary_family(&mut forms, "imul", Slash5, false);
    unary_family(&mut forms, "mul", Slash4, true);

    // mov reg -> rm
    forms.extend([
        form("mov", "mov", None, &[0x88], &[Rex, SlashR], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form("mov", "mov", None, &[0x88], &[SlashR], &[(Rm8, ModRmRm), (R8, ModRmReg)]),
        form("mov", "mov", Some(0x66), &[0x89], &[SlashR], &[(Rm16, ModRmRm), (R16, ModRmReg)]),
        form("mov", "mov", None, &[0x89], &[SlashR], &[(Rm32, ModRmRm), (R32, ModRmReg)]),
        form("mov", "mov", None, &[0x89], &[RexW, SlashR], &[(Rm64, ModRmRm), (R64, ModRmReg)]),
    ]);
    // mov rm -> reg
    forms.extend([
        form("mov", "mov", None, &[0x8A], &[Rex, SlashR], &[(R8, ModRmReg), (Rm8, ModRmRm)]),
        form("mov", "mov", None, &[0x8A], &[SlashR], &[(R8, ModRmReg), (Rm8, ModRmRm)]),
        form("mov", "mov", Some(0x66), &[0x8B], &[SlashR], &[(R16, ModRmReg), (Rm16, ModRmRm)]),
        form("mov", "mov", None, &[0x8B], &[RexW, SlashR], &[(R64, ModRmReg), (Rm64, ModRmRm)]),
        form("mov", "mov", None, &[0x8B], &[SlashR], &[(R32, ModRmReg), (Rm32, ModRmRm)]),
    ]);
    // mov seg -> reg (TLS loads, fs:/gs: absolute)
    forms.push(form("mov", "mov", None, &[0x8B], &[RexW, SlashR], &[
        (R64, ModRmReg),
        (Seg64, ModRmRm),
    ]));
    // mov imm -> reg
    forms.extend([
        form("mov", "mov", None, &[0xB0], &[Rex, ImmByte], &[(R8, OpcodePlus), (Imm8, Imm)]),
        form("mov", "mov", None, &[0xB0], &[ImmByte], &[(R8, OpcodePlus), (Imm8, Imm)]),
        form("mov", "mov", Some(0x66), &[0xB8], &[ImmWord], &[(R16, OpcodePlus), (Imm16, Imm)]),
        form("mov", "mov", None, &[0xB8], &[ImmDword], &[(R32, OpcodePlus), (Imm32, Imm)]),
        form("mov", "mov", None, &[0xB8], &[RexW, ImmQword], &[(R64, OpcodePlus), (Imm64, Imm)]),
    ]);
    // mov imm -> rm
    forms.extend([
        form("mov", "mov", None, &[0xC6], &[Rex, Slash0, ImmByte], &[(Rm8, ModRmRm), (Imm8, Imm)]),
        form("mov", "mov", None, &[0xC6], &[Slash0, ImmByte], &[(Rm8, ModRmRm), (Imm8, Imm)]),
        form("mov", "mov", Some(0x66), &[0xC7], &[Slash0, ImmWord], &[(Rm16, ModRmRm), (Imm16, Imm)]),
        form("mov", "mov", None, &[0xC7], &[Slash0, ImmDword], &[(Rm32, ModRmRm), (Imm32, Imm)]),
        form("mov", "mov", None, &[0xC7], &[RexW, Slash0, ImmDword], &[(Rm64, ModRmRm), (Imm32, Imm)]),
    ]);

    alu_family(&mut forms, "cmp", Slash7, 0x38);

    // setcc rm8, REX variants first
    let setcc: [(&'static str, u8); 10] = [
        ("seta", 0x97),
        ("setae", 0x93),
        ("setb", 0x92),
        ("setbe", 0x96),
        ("setg", 0x9F),
        ("setge", 0x9D),
        ("setl", 0x9C),
        ("setle", 0x9E),
        ("sete", 0x94),
        ("setne", 0x95),
    ];
    for (name, opcode) in setcc {
        forms.push(form(name, name, None, &[0x0F, opcode], &[Rex], &[(Rm8, ModRmRm)]));
    }
    for (name, opcode) in setcc {
        forms.push(form(name, name, None, &[0x0F, opcode], &[], &[(Rm8, ModRmRm)]));
    }

    unary_family(&mut forms, "neg", Slash3, true);
    unary_family(&mut forms, "not", Slash2, true);

    alu_family(&mut forms, "xor", Slash6, 0x30);
    alu_family(&mut forms, "or", Slash1, 0x08);
    alu_family(&mut forms, "and", Slash4, 0x20);

    shift_family(&mut forms, "sal", Slash4);
    shift_family(&mut forms, "sar", Slash7);
    shift_family(&mut forms, "shr", Slash5);

    // scalar float moves; the backend addresses all of these as `mov`
    forms.extend([
        form("mov", "movsd", Some(0xF2), &[0x0F, 0x10], &[SlashR], &[(Xmm1S64, ModRmReg), (M64, ModRmRm)]),
        form("mov", "movsd", Some(0xF2), &[0x0F, 0x10], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2S64, ModRmRm)]),
        form("mov", "movsd", Some(0xF2), &[0x0F, 0x11], &[SlashR], &[(Xmm1M64, ModRmRm), (Xmm2S64, ModRmReg)]),
        form("mov", "movss", Some(0xF3), &[0x0F, 0x10], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2S32, ModRmRm)]),
        form("mov", "movss", Some(0xF3), &[0x0F, 0x10], &[SlashR], &[(Xmm1S32, ModRmReg), (M32, ModRmRm)]),
        form("mov", "movss", Some(0xF3), &[0x0F, 0x11], &[SlashR], &[(Xmm2M32, ModRmRm), (Xmm1S32, ModRmReg)]),
    ]);
    forms.extend([
        form("xor", "xorps", None, &[0x0F, 0x57], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("xor", "xorpd", Some(0x66), &[0x0F, 0x57], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
    ]);
    // scalar float arithmetic
    forms.extend([
        form("add", "addss", Some(0xF3), &[0x0F, 0x58], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("add", "addsd", Some(0xF2), &[0x0F, 0x58], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
        form("sub", "subss", Some(0xF3), &[0x0F, 0x5C], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("sub", "subsd", Some(0xF2), &[0x0F, 0x5C], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
        form("fmul", "mulss", Some(0xF3), &[0x0F, 0x59], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("fmul", "mulsd", Some(0xF2), &[0x0F, 0x59], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
        form("fdiv", "divss", Some(0xF3), &[0x0F, 0x5E], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("fdiv", "divsd", Some(0xF2), &[0x0F, 0x5E], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
        form("cmp", "comiss", None, &[0x0F, 0x2F], &[SlashR], &[(Xmm1S32, ModRmReg), (Xmm2M32, ModRmRm)]),
        form("cmp", "comisd", Some(0x66), &[0x0F, 0x2F], &[SlashR], &[(Xmm1S64, ModRmReg), (Xmm2M64, ModRmRm)]),
    ]);

    // widening moves
    forms.extend([
        form("movsx", "movsx", Some(0x66), &[0x0F, 0xBE], &[SlashR], &[(R16, ModRmReg), (Rm8, ModRmRm)]),
        form("movsx", "movsx", None, &[0x0F, 0xBE], &[SlashR], &[(R32, ModRmReg), (Rm8, ModRmRm)]),
        form("movsx", "movsx", None, &[0x0F, 0xBE], &[RexW, SlashR], &[(R64, ModRmReg), (Rm8, ModRmRm)]),
        form("movsx", "movsx", None, &[0x0F, 0xBF], &[SlashR], &[(R32, ModRmReg), (Rm16, ModRmRm)]),
        form("movsx", "movsx", None, &[0x0F, 0xBF], &[RexW, SlashR], &[(R64, ModRmReg), (Rm16, ModRmRm)]),
        form("movsx", "movsxd", None, &[0x63], &[RexW, SlashR], &[(R64, ModRmReg), (Rm32, ModRmRm)]),
    ]);
    forms.extend([
        form("movzx", "movzx", Some(0x66), &[0x0F, 0xB6], &[SlashR], &[(R16, ModRmReg), (Rm8, ModRmRm)]),
        form("movzx", "movzx", None, &[0x0F, 0xB6], &[SlashR], &[(R32, ModRmReg), (Rm8, ModRmRm)]),
        form("movzx", "movzx", None, &[0x0F, 0xB6], &[RexW, SlashR], &[(R64, ModRmReg), (Rm8, ModRmRm)]),
        form("movzx", "movzx", None, &[0x0F, 0xB7], &[SlashR], &[(R32, ModRmReg), (Rm16, ModRmRm)]),
        form("movzx", "movzx", None, &[0x0F, 0xB7], &[RexW, SlashR], &[(R64, ModRmReg), (Rm16, ModRmRm)]),
        // a 32-bit load zero-extends for free; this aliases onto opcode 63
        form("movzx", "mov", None, &[0x63], &[SlashR], &[(R64, ModRmReg), (Rm32, ModRmRm)]),
    ]);

    forms.push(form("movsq", "movsq", None, &[0xA5], &[RexW], &[]));

    // AVX scalar/packed forms
    forms.extend([
        form("vaddsd", "vaddsd", None, &[0x58], &[Vex128, VexF2, Vex0f, SlashR], &[
            (Xmm1S64, ModRmReg),
            (Xmm2S64, VexVvvv),
            (Xmm2M64, ModRmRm),
        ]),
        form("vaddss", "vaddss", None, &[0x58], &[Vex128, VexF3, Vex0f, SlashR], &[
            (Xmm1S32, ModRmReg),
            (Xmm2S32, VexVvvv),
            (Xmm2M32, ModRmRm),
        ]),
        form("vmovups", "vmovups", None, &[0x10], &[Vex256, Vex0f, SlashR], &[
            (Ymm1, ModRmReg),
            (Ymm2, ModRmRm),
        ]),
        form("vmovups", "vmovups", None, &[0x11], &[Vex256, Vex0f, SlashR], &[
            (Ymm2, ModRmRm),
            (Ymm1, ModRmReg),
        ]),
    ]);

    forms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_shape_limits() {
        let forms = catalog();
        assert!(forms.len() > 150);
        for form in &forms {
            assert!(!form.group.is_empty());
            assert!((1..=3).contains(&form.opcode.len()), "{}", form.name);
            assert!(form.extensions.len() <= 4, "{}", form.name);
            assert!(form.operands.len() <= 4, "{}", form.name);
        }
    }

    #[test]
    fn test_rex_twins_are_registered_first() {
        let forms = catalog();
        let eight_bit_movs: Vec<_> = forms
            .iter()
            .filter(|f| f.group == "mov" && f.opcode == [0x88])
            .collect();
        assert_eq!(eight_bit_movs.len(), 2);
        assert!(eight_bit_movs[0].has_rex_ext());
        assert!(!eight_bit_movs[1].has_rex_ext());
    }

    #[test]
    fn test_cmp_has_both_register_directions() {
        let forms = catalog();
        assert!(forms.iter().any(|f| f.group == "cmp" && f.opcode == [0x39]));
        assert!(forms.iter().any(|f| f.group == "cmp" && f.opcode == [0x3B]));
    }
}
