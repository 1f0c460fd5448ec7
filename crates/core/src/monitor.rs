//! Debugger command interpreter.
//!
//! Parses one line of text into a command plus operands and dispatches
//! it against the emulator. Command tokens are case-insensitive and
//! resolved through an alias lookup table. Numeric operands follow the
//! reference behavior: counts are decimal, addresses and values are
//! hex, and a malformed number is not rejected — it parses as zero
//! (the default-on-parse-failure policy, see DESIGN.md).

use crate::debugger::BreakKind;
use crate::inspect::{self, CellWidth};
use crate::Emulator;

/// The debugger command vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Reset,
    Step,
    Quit,
    Run,
    Disas,
    Dump,
    Set,
    Break,
    MemoryBreak,
    ListBreaks,
    Regs,
    Trace,
    Stats,
    Help,
}

/// Alias table mapping command names to handlers. Order is cosmetic;
/// lookups match any alias case-insensitively.
const COMMANDS: &[(&[&str], Command)] = &[
    (&["reset", "restart"], Command::Reset),
    (&["step", "s"], Command::Step),
    (&["quit", "q"], Command::Quit),
    (&["run", "r"], Command::Run),
    (&["disas", "disassemble", "dis"], Command::Disas),
    (&["dump"], Command::Dump),
    (&["set"], Command::Set),
    (&["break"], Command::Break),
    (&["memorybreak"], Command::MemoryBreak),
    (&["bps"], Command::ListBreaks),
    (&["regs"], Command::Regs),
    (&["trace"], Command::Trace),
    (&["stats"], Command::Stats),
    (&["help", "h"], Command::Help),
];

fn lookup(token: &str) -> Option<Command> {
    COMMANDS
        .iter()
        .find(|(aliases, _)| aliases.iter().any(|a| a.eq_ignore_ascii_case(token)))
        .map(|&(_, cmd)| cmd)
}

// ─── Operand parsing ────────────────────────────────────────────────────────
//
// Default-on-parse-failure policy: a malformed numeric operand yields
// zero instead of an error. Commands that want a different default for
// a *missing* operand handle that case before calling these.

/// Decimal operand, zero on parse failure.
fn dec_or_zero(token: &str) -> u32 {
    token.parse().unwrap_or(0)
}

/// Hex operand (optional `0x` prefix), zero on parse failure.
fn hex_or_zero(token: &str) -> u16 {
    let t = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    u32::from_str_radix(t, 16).unwrap_or(0) as u16
}

/// Auto-radix operand: `0x` prefix means hex, otherwise decimal.
/// Zero on parse failure.
fn auto_or_zero(token: &str) -> u16 {
    if token.starts_with("0x") || token.starts_with("0X") {
        hex_or_zero(token)
    } else {
        token.parse::<u32>().unwrap_or(0) as u16
    }
}

impl Emulator {
    /// Execute one debugger command line.
    ///
    /// Clears the latched execution fault, then performs exactly one
    /// command action. Unrecognized tokens report an error and change
    /// no state. Always returns control to the caller's loop.
    pub fn exec_command(&mut self, line: &str) {
        self.debugger.fault = None;

        let mut parts = line.split_whitespace();
        let token = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        match lookup(token) {
            Some(Command::Reset) => self.cmd_reset(),
            Some(Command::Step) => self.cmd_step(&args),
            Some(Command::Quit) => self.debugger.quit = true,
            Some(Command::Run) => self.cmd_run(),
            Some(Command::Disas) => self.cmd_disas(&args),
            Some(Command::Dump) => self.cmd_dump(&args),
            Some(Command::Set) => self.cmd_set(&args),
            Some(Command::Break) => self.cmd_break(&args, BreakKind::Execute),
            Some(Command::MemoryBreak) => self.cmd_break(&args, BreakKind::Memory),
            Some(Command::ListBreaks) => self.cmd_bps(),
            Some(Command::Regs) => self.render_state(),
            Some(Command::Trace) => self.cmd_trace(&args),
            Some(Command::Stats) => self.cmd_stats(),
            Some(Command::Help) => self.cmd_help(),
            None => self.print_console("\t[Invalid command, type \"help\".]\n"),
        }
    }

    fn cmd_reset(&mut self) {
        self.reset_to_vector();
        self.render_state();
    }

    fn cmd_step(&mut self, args: &[&str]) {
        let steps = match args.first() {
            Some(t) => dec_or_zero(t),
            None => 1,
        };
        self.step_batch(steps);
        self.render_state();
    }

    fn cmd_run(&mut self) {
        // Discard any stop request that arrived while halted
        self.stop.clear();
        self.cpu.running = true;
        self.debugger.debug_mode = false;
    }

    fn cmd_disas(&mut self, args: &[&str]) {
        let count = match args.first() {
            Some(t) => dec_or_zero(t),
            None => 10,
        };
        let start = match args.get(1) {
            Some(t) => hex_or_zero(t),
            None => self.cpu.pc(),
        };
        self.render_disassembly(start, count);
    }

    fn cmd_dump(&mut self, args: &[&str]) {
        let token = args.first().copied().unwrap_or("");
        let start = match token.chars().next() {
            Some('0'..='9') => hex_or_zero(token),
            Some('%') | Some('r') | Some('R') => match inspect::reg_name_to_index(token) {
                Some(i) => self.cpu.regs[i],
                None => {
                    self.print_console("\t[not a register]\n");
                    return;
                }
            },
            // No recognized form: dump from the current PC
            _ => self.cpu.pc(),
        };
        // A trailing byte count is accepted but the window is fixed
        let text = inspect::dump_window(&self.mem, start, CellWidth::Byte);
        self.print_console(&text);
    }

    fn cmd_set(&mut self, args: &[&str]) {
        let target = args.first().copied().unwrap_or("");
        let value = args.get(1).map(|t| hex_or_zero(t)).unwrap_or(0);

        if let Some(i) = inspect::reg_name_to_index(target) {
            self.cpu.regs[i] = value;
            self.render_state();
        } else {
            let addr = auto_or_zero(target);
            // Debugger writes bypass the access flags so they cannot
            // trip memory-watch breakpoints
            self.mem.write_word(addr, value);
        }
    }

    fn cmd_break(&mut self, args: &[&str], kind: BreakKind) {
        let count = match kind {
            BreakKind::Execute => self.debugger.breakpoints.exec().len(),
            BreakKind::Memory => self.debugger.breakpoints.watch().len(),
        };
        if count >= crate::debugger::MAX_BREAKPOINTS {
            self.print_console("Breakpoints are full.\n");
            return;
        }
        let Some(token) = args.first() else {
            self.print_console("error\n");
            return;
        };
        let addr = hex_or_zero(token);
        let (index, label) = match kind {
            BreakKind::Execute => (self.debugger.breakpoints.add_exec(addr), "PC"),
            BreakKind::Memory => (self.debugger.breakpoints.add_watch(addr), "MEM"),
        };
        if let Some(index) = index {
            self.print_console(&format!("\n\t[Breakpoint {}[{}] Set]\n", label, index));
        }
    }

    fn cmd_bps(&mut self) {
        if self.debugger.breakpoints.is_empty() {
            self.print_console("You have not set any breakpoints!\n");
            return;
        }
        let mut text = String::new();
        for (i, &addr) in self.debugger.breakpoints.exec().iter().enumerate() {
            text.push_str(&format!("\tPC[{}] 0x{:04X}\n", i + 1, addr));
        }
        for (i, &addr) in self.debugger.breakpoints.watch().iter().enumerate() {
            text.push_str(&format!("\tMEM[{}] 0x{:04X}\n", i + 1, addr));
        }
        self.print_console(&text);
    }

    fn cmd_trace(&mut self, args: &[&str]) {
        match args.first() {
            Some(t) if t.eq_ignore_ascii_case("on") => self.debugger.trace = true,
            Some(t) if t.eq_ignore_ascii_case("off") => self.debugger.trace = false,
            // Any other operand just reports the current state
            _ => {}
        }
        let state = if self.debugger.trace { "on" } else { "off" };
        self.print_console(&format!("Tracing is {}\n", state));
    }

    fn cmd_stats(&mut self) {
        let report = self
            .stats
            .report(self.clock.cycles(), self.clock.mclk_hz());
        let trace = self.tracer.report();
        self.print_console(&report);
        if !trace.is_empty() {
            self.print_console(&trace);
        }
    }

    fn cmd_help(&mut self) {
        self.print_console(concat!(
            "\nCommands:\n",
            "---------------------------------------------------------------\n",
            "reset | restart          reload PC from the reset vector,\n",
            "                         clear statistics and call trace\n",
            "step | s [N]             execute up to N instructions (default 1)\n",
            "run | r                  run until a breakpoint or fault\n",
            "quit | q                 exit the emulator\n",
            "disas | dis [N] [ADDR]   disassemble N instructions (default 10,\n",
            "                         hex ADDR defaults to the current PC)\n",
            "dump ADDR | %REG         dump 32 bytes of memory from a hex\n",
            "                         address or a register's value\n",
            "set REG|ADDR VALUE       write a hex value to a register or a\n",
            "                         memory word\n",
            "break ADDR               set an execution breakpoint (hex)\n",
            "memorybreak ADDR         set a memory-watch breakpoint (hex)\n",
            "bps                      list all breakpoints\n",
            "regs                     show registers and the next instruction\n",
            "trace on|off             toggle instruction tracing\n",
            "stats                    show execution statistics\n",
            "help | h                 show this reference\n\n",
        ));
    }
}
