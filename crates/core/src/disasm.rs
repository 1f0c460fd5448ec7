//! MSP430 instruction disassembler.
//!
//! Converts decoded [`Instruction`] values back to human-readable
//! assembly text. Used by the debugger for breakpoint, step, trace, and
//! register-dump views.

use crate::memory::Memory;
use crate::opcodes::{self, Cond, DoubleOp, Instruction, Operand, SingleOp, REG_PC, REG_SP};

/// Register display names (`r0`–`r3` carry their dedicated roles).
pub fn reg_name(r: u8) -> &'static str {
    const NAMES: [&str; 16] = [
        "pc", "sp", "sr", "cg2", "r4", "r5", "r6", "r7", "r8", "r9", "r10", "r11", "r12", "r13",
        "r14", "r15",
    ];
    NAMES[(r & 0xF) as usize]
}

fn operand(op: Operand) -> String {
    match op {
        Operand::Reg(r) => reg_name(r).into(),
        Operand::Indexed(r, x) => format!("0x{:X}({})", x, reg_name(r)),
        Operand::Absolute(a) => format!("&0x{:04X}", a),
        Operand::Indirect(r) => format!("@{}", reg_name(r)),
        Operand::IndirectInc(r) => format!("@{}+", reg_name(r)),
        Operand::Imm(v) => format!("#0x{:X}", v),
    }
}

/// Format a decoded instruction as an assembly string.
///
/// `pc` is the address the instruction was fetched from, used to resolve
/// jump targets. Emitted mnemonics follow MSP430 conventions with a `.B`
/// suffix for byte operations; `MOV @sp+, pc` is rendered as `RET`.
pub fn disassemble(inst: Instruction, pc: u16) -> String {
    match inst {
        Instruction::Double { op, byte, src, dst } => {
            if op == DoubleOp::Mov
                && src == Operand::IndirectInc(REG_SP)
                && dst == Operand::Reg(REG_PC)
            {
                return "RET".into();
            }
            let name = match op {
                DoubleOp::Mov => "MOV",
                DoubleOp::Add => "ADD",
                DoubleOp::Addc => "ADDC",
                DoubleOp::Subc => "SUBC",
                DoubleOp::Sub => "SUB",
                DoubleOp::Cmp => "CMP",
                DoubleOp::Dadd => "DADD",
                DoubleOp::Bit => "BIT",
                DoubleOp::Bic => "BIC",
                DoubleOp::Bis => "BIS",
                DoubleOp::Xor => "XOR",
                DoubleOp::And => "AND",
            };
            format!(
                "{}{} {}, {}",
                name,
                if byte { ".B" } else { "" },
                operand(src),
                operand(dst)
            )
        }
        Instruction::Single { op, byte, src } => {
            if op == SingleOp::Reti {
                return "RETI".into();
            }
            let name = match op {
                SingleOp::Rrc => "RRC",
                SingleOp::Swpb => "SWPB",
                SingleOp::Rra => "RRA",
                SingleOp::Sxt => "SXT",
                SingleOp::Push => "PUSH",
                SingleOp::Call => "CALL",
                SingleOp::Reti => unreachable!(),
            };
            format!(
                "{}{} {}",
                name,
                if byte { ".B" } else { "" },
                operand(src)
            )
        }
        Instruction::Jump { cond, offset } => {
            let name = match cond {
                Cond::Nz => "JNZ",
                Cond::Z => "JZ",
                Cond::Nc => "JNC",
                Cond::C => "JC",
                Cond::N => "JN",
                Cond::Ge => "JGE",
                Cond::L => "JL",
                Cond::Always => "JMP",
            };
            let target = pc
                .wrapping_add(2)
                .wrapping_add((offset as u16).wrapping_mul(2));
            format!("{} 0x{:04X}", name, target)
        }
        Instruction::Unknown(w) => format!(".word 0x{:04X}", w),
    }
}

/// Format the status register as a flag string like "vnzc"
/// (lowercase = clear, UPPERCASE = set), plus the GIE bit.
pub fn format_sr(sr: u16) -> String {
    let bits = [
        (crate::cpu::SR_V, 'V'),
        (crate::cpu::SR_N, 'N'),
        (crate::cpu::SR_Z, 'Z'),
        (crate::cpu::SR_C, 'C'),
    ];
    let mut s = String::with_capacity(8);
    for (mask, name) in bits {
        if sr & mask != 0 {
            s.push(name);
        } else {
            s.push(name.to_ascii_lowercase());
        }
    }
    if sr & crate::cpu::SR_GIE != 0 {
        s.push_str(" GIE");
    }
    s
}

/// Disassemble `count` instructions starting at `start`.
///
/// Returns lines of `"0xAAAA: WORD [WORD [WORD]]  MNEMONIC"`.
pub fn disassemble_range(mem: &Memory, start: u16, count: u32) -> Vec<String> {
    let mut lines = Vec::with_capacity(count as usize);
    let mut addr = start & !1;
    for _ in 0..count {
        let w0 = mem.read_word(addr);
        let w1 = mem.read_word(addr.wrapping_add(2));
        let w2 = mem.read_word(addr.wrapping_add(4));
        let (inst, size) = opcodes::decode(addr, w0, w1, w2);
        let asm = disassemble(inst, addr);
        let words: Vec<String> = (0..size)
            .map(|i| format!("{:04X}", mem.read_word(addr.wrapping_add(i as u16 * 2))))
            .collect();
        lines.push(format!("0x{:04X}: {:<14} {}", addr, words.join(" "), asm));
        addr = addr.wrapping_add(size as u16 * 2);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::decode;

    #[test]
    fn test_disasm_mov_immediate() {
        let (inst, _) = decode(0xC000, 0x4031, 0x0400, 0);
        assert_eq!(disassemble(inst, 0xC000), "MOV #0x400, sp");
    }

    #[test]
    fn test_disasm_ret_pseudo_op() {
        let (inst, _) = decode(0, 0x4130, 0, 0);
        assert_eq!(disassemble(inst, 0), "RET");
    }

    #[test]
    fn test_disasm_jump_target() {
        // JMP -1 word at 0xC010 loops to itself
        let (inst, _) = decode(0xC010, 0x3FFF, 0, 0);
        assert_eq!(disassemble(inst, 0xC010), "JMP 0xC010");
    }

    #[test]
    fn test_disasm_byte_suffix() {
        // MOV.B #0x12, r5 = 0x4075 0x0012
        let (inst, _) = decode(0, 0x4075, 0x0012, 0);
        assert_eq!(disassemble(inst, 0), "MOV.B #0x12, r5");
    }

    #[test]
    fn test_format_sr() {
        assert_eq!(format_sr(0), "vnzc");
        assert_eq!(format_sr(crate::cpu::SR_Z | crate::cpu::SR_C), "vnZC");
        assert_eq!(format_sr(crate::cpu::SR_GIE), "vnzc GIE");
    }

    #[test]
    fn test_disassemble_range_advances_by_size() {
        let mut mem = Memory::new();
        // MOV #0x0400, SP (2 words) then RET (1 word)
        mem.write_word(0xC000, 0x4031);
        mem.write_word(0xC002, 0x0400);
        mem.write_word(0xC004, 0x4130);
        let lines = disassemble_range(&mem, 0xC000, 2);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0xC000:"));
        assert!(lines[0].ends_with("MOV #0x400, sp"));
        assert!(lines[1].starts_with("0xC004:"));
        assert!(lines[1].ends_with("RET"));
    }
}
