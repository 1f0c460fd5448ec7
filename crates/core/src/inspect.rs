//! Register and memory inspection views.
//!
//! Resolves register-name tokens (`%r4`, `r4`, `pc`, `%sp`, ...) to
//! register indices, renders the register table, and formats the fixed
//! memory dump window: 4 rows of 8 bytes with a selectable cell width.
//!
//! The dump window is always 32 bytes regardless of any requested byte
//! count — the `dump` command accepts a count operand but does not use
//! it (preserved reference behavior, see DESIGN.md).

use crate::cpu::Cpu;
use crate::disasm::{format_sr, reg_name};
use crate::memory::Memory;

/// Dump cell width in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellWidth {
    Byte,
    Word,
    DoubleWord,
}

/// Resolve a register-name token to a register index.
///
/// Accepts an optional leading `%`, the dedicated names `pc`/`sp`/`sr`/
/// `cg2`, and `r0`–`r15`, all case-insensitive. Returns `None` for
/// anything else ("not a register"), which callers use to fall back to
/// the address interpretation.
pub fn reg_name_to_index(token: &str) -> Option<usize> {
    let name = token.strip_prefix('%').unwrap_or(token);
    let lower = name.to_ascii_lowercase();
    match lower.as_str() {
        "pc" => return Some(0),
        "sp" => return Some(1),
        "sr" => return Some(2),
        "cg2" => return Some(3),
        _ => {}
    }
    let num = lower.strip_prefix('r')?;
    match num.parse::<usize>() {
        Ok(i) if i < 16 => Some(i),
        _ => None,
    }
}

/// Format the register table with the status-flag summary.
pub fn render_registers(cpu: &Cpu) -> String {
    let mut s = String::new();
    for row in 0..4 {
        for col in 0..4 {
            let i = row + col * 4;
            s.push_str(&format!("{:<4}0x{:04X}", reg_name(i as u8), cpu.regs[i]));
            if col < 3 {
                s.push_str("   ");
            }
        }
        s.push('\n');
    }
    s.push_str(&format!("flags: {}\n", format_sr(cpu.sr())));
    s
}

/// Format the fixed 32-byte dump window: 4 rows of 8 bytes starting at
/// `start`, grouped into cells of the given width. Cells reproduce the
/// stored byte order.
pub fn dump_window(mem: &Memory, start: u16, width: CellWidth) -> String {
    let mut s = String::from("\n");
    let mut addr = start;
    for _ in 0..4 {
        s.push_str(&format!("0x{:04X}:\t", addr));
        let row: Vec<u8> = (0..8).map(|i| mem.read_byte(addr.wrapping_add(i))).collect();
        match width {
            CellWidth::Byte => {
                for b in &row {
                    s.push_str(&format!("0x{:02X}  ", b));
                }
            }
            CellWidth::Word => {
                for pair in row.chunks(2) {
                    s.push_str(&format!("0x{:02X}{:02X}  ", pair[0], pair[1]));
                }
            }
            CellWidth::DoubleWord => {
                for quad in row.chunks(4) {
                    s.push_str(&format!(
                        "0x{:02X}{:02X}{:02X}{:02X}  ",
                        quad[0], quad[1], quad[2], quad[3]
                    ));
                }
            }
        }
        while s.ends_with(' ') {
            s.pop();
        }
        s.push('\n');
        addr = addr.wrapping_add(8);
    }
    s
}
