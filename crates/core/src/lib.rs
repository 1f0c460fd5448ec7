//! # msp430-core
//!
//! MSP430 emulation core with an interactive debugger (v0.2.0).
//!
//! Emulates an MSP430G2553-class microcontroller: 64 KB unified address
//! space, sixteen 16-bit registers, the standard three-format
//! instruction set with all addressing modes and constant generators,
//! and simplified peripheral hardware (basic clock module, Timer_A,
//! Port 1, USCI_A0 serial). The debugger drives execution instruction
//! by instruction with exact, reproducible stopping behavior.
//!
//! ## Architecture
//!
//! - [`Emulator`] — Top-level aggregate wiring CPU, memory, and peripherals
//! - [`Cpu`] — Register file (r0=pc, r1=sp, r2=sr, r3=cg2) and running flag
//! - [`Memory`] — 64 KB data space with access flags for memory watchpoints
//! - [`peripherals`] — Clock module, Timer_A, Port 1, serial controller
//! - [`opcodes`] / [`disasm`] — Instruction decoder and disassembler
//! - [`debugger`] — Breakpoint registry, debugger state, console sinks
//! - [`monitor`] — Command interpreter (the `impl Emulator` command block)
//! - [`inspect`] — Register table and memory dump rendering
//! - [`stats`] — Execution statistics and call tracing
//! - [`firmware`] — Raw binary and Intel HEX image loading
//! - [`savestate`] — Compressed machine snapshots
//! - [`upload_server`] — TCP firmware upload + remote console worker
//!
//! ## Scheduling model
//!
//! The main thread owns all emulator state. In debug mode it reads and
//! dispatches command lines; in run mode it calls
//! [`Emulator::process_iteration`] in a loop, which checks breakpoints,
//! executes one instruction, ticks the peripherals in fixed order, and
//! charges the fixed average instruction cost to the emulated clock.
//! The network worker communicates only through the
//! [`upload_server::ServerEvent`] channel and the [`StopToken`].

pub mod cpu;
pub mod debugger;
pub mod disasm;
pub mod firmware;
pub mod inspect;
pub mod memory;
pub mod monitor;
pub mod opcodes;
pub mod peripherals;
pub mod savestate;
pub mod stats;
pub mod upload_server;

pub use cpu::Cpu;
pub use debugger::{Console, Debugger, InterfaceKind};
pub use memory::Memory;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use debugger::{BreakKind, BreakpointHit, ExecFault, StdoutConsole};
use opcodes::Instruction;
use peripherals::{ClockModule, Port1, SerialCtrl, TimerA};
use savestate::SaveState;
use stats::{CallTracer, ExecStats};

/// Fixed average cycle cost charged per instruction in run mode.
pub const CYCLES_PER_INSTRUCTION: u64 = 4;
/// Sleep interval of the scheduler while the processor is halted.
pub const HALTED_POLL: Duration = Duration::from_millis(10);

/// Cancellation token for asynchronous stop requests.
///
/// Replaces the reference implementation's process-wide emulator
/// pointer and signal handler: any agent holding a clone may request a
/// stop, and the scheduler consumes the request at the next iteration
/// boundary. Setting the token performs no I/O and touches no other
/// state, so it is safe to invoke from any context.
#[derive(Clone, Default)]
pub struct StopToken(Arc<AtomicBool>);

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that the running processor halt into debug mode.
    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request, returning whether one was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }

    /// Discard any pending request.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Top-level emulator combining all subsystems.
pub struct Emulator {
    pub cpu: Cpu,
    pub mem: Memory,
    pub clock: ClockModule,
    pub timer: TimerA,
    pub port: Port1,
    pub serial: SerialCtrl,
    pub debugger: Debugger,
    pub stats: ExecStats,
    pub tracer: CallTracer,
    /// Cancellation token consumed by the scheduler
    pub stop: StopToken,
    /// Enable stderr diagnostics
    pub debug: bool,
    console: Box<dyn Console>,
}

impl Emulator {
    /// Create an emulator with all subsystems in power-on state. Output
    /// goes to stdout until [`set_console`](Self::set_console) installs
    /// a different sink.
    pub fn new(interface: InterfaceKind) -> Self {
        Emulator {
            cpu: Cpu::new(),
            mem: Memory::new(),
            clock: ClockModule::new(),
            timer: TimerA::new(),
            port: Port1::new(),
            serial: SerialCtrl::new(),
            debugger: Debugger::new(interface),
            stats: ExecStats::new(),
            tracer: CallTracer::new(),
            stop: StopToken::new(),
            debug: false,
            console: Box::new(StdoutConsole),
        }
    }

    /// Install the console sink all rendered text is written to.
    pub fn set_console(&mut self, console: Box<dyn Console>) {
        self.console = console;
    }

    /// Write text to the active console sink.
    pub fn print_console(&mut self, text: &str) {
        self.console.print(text);
    }

    // ─── Reset and rendering ────────────────────────────────────────────

    /// Reload the program counter from the reset vector and clear the
    /// execution statistics and call trace. Memory, peripherals, and
    /// breakpoints are deliberately untouched — the reset command only
    /// restores the processor's starting point.
    pub fn reset_to_vector(&mut self) {
        let pc = self.mem.reset_vector();
        self.cpu.set_pc(pc);
        self.stats.reset(self.clock.cycles());
        self.tracer.reset();
    }

    /// Render the register table and the next instruction.
    pub fn render_state(&mut self) {
        let regs = inspect::render_registers(&self.cpu);
        self.print_console(&regs);
        self.render_disassembly(self.cpu.pc(), 1);
    }

    /// Render `count` disassembled instructions starting at `start`.
    pub fn render_disassembly(&mut self, start: u16, count: u32) {
        let mut text = String::new();
        for line in disasm::disassemble_range(&self.mem, start, count) {
            text.push_str(&line);
            text.push('\n');
        }
        self.print_console(&text);
    }

    // ─── Data-space access with peripheral hooks ────────────────────────

    /// Read a byte on behalf of executing code.
    pub fn read_data_byte(&mut self, addr: u16) -> u8 {
        let raw = self.mem.load_byte(addr);
        if let Some(v) = self.port.read_hook(addr, &self.mem) {
            return v;
        }
        if let Some(v) = self.serial.read_hook(addr, &mut self.mem) {
            return v;
        }
        raw
    }

    /// Read a word on behalf of executing code.
    pub fn read_data_word(&mut self, addr: u16) -> u16 {
        let a = addr & !1;
        let lo = self.read_data_byte(a) as u16;
        let hi = self.read_data_byte(a.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }

    /// Write a byte on behalf of executing code.
    pub fn write_data_byte(&mut self, addr: u16, v: u8) {
        self.mem.store_byte(addr, v);
        self.timer.write_hook(addr, &mut self.mem);
        self.serial.write_hook(addr, v, &mut self.mem);
    }

    /// Write a word on behalf of executing code.
    pub fn write_data_word(&mut self, addr: u16, v: u16) {
        let a = addr & !1;
        self.write_data_byte(a, v as u8);
        self.write_data_byte(a.wrapping_add(1), (v >> 8) as u8);
    }

    // ─── Execution ──────────────────────────────────────────────────────

    /// Execute a single instruction at the current program counter.
    ///
    /// Latches an [`ExecFault`] instead of executing when the PC is
    /// misaligned or the opcode does not decode; the PC then still
    /// points at the faulting word.
    pub fn step_one(&mut self) {
        let pc = self.cpu.pc();
        if pc & 1 != 0 {
            self.debugger.fault = Some(ExecFault::MisalignedPc { addr: pc });
            return;
        }
        let w0 = self.mem.read_word(pc);
        let w1 = self.mem.read_word(pc.wrapping_add(2));
        let w2 = self.mem.read_word(pc.wrapping_add(4));
        let (inst, size) = opcodes::decode(pc, w0, w1, w2);
        if let Instruction::Unknown(opcode) = inst {
            self.debugger.fault = Some(ExecFault::IllegalInstruction { opcode, addr: pc });
            return;
        }
        if self.debugger.trace {
            let line = format!("\t0x{:04X}: {}\n", pc, disasm::disassemble(inst, pc));
            self.print_console(&line);
        }
        self.cpu.set_pc(pc.wrapping_add(size as u16 * 2));
        self.execute_inst(inst, pc);
        self.stats.instructions += 1;
    }

    /// Advance all peripherals in fixed order: clock, timer, port, serial.
    pub fn tick_peripherals(&mut self) {
        self.clock.tick(&self.mem);
        self.timer.tick(&mut self.mem);
        self.port.tick(&mut self.mem);
        self.serial.tick(&mut self.mem);
    }

    /// Execute up to `n` instructions.
    ///
    /// Breakpoints are checked before each instruction except the first
    /// of the batch, so stepping forward from an address that is itself
    /// a breakpoint makes progress. The batch aborts early on a hit or
    /// on an execution fault.
    pub fn step_batch(&mut self, n: u32) {
        for i in 0..n {
            if i > 0 {
                if let Some(hit) = self.debugger.breakpoints.check(self.cpu.pc(), &mut self.mem)
                {
                    self.on_breakpoint_hit(hit);
                    break;
                }
            }
            self.step_one();
            self.tick_peripherals();
            if let Some(fault) = self.debugger.fault {
                self.print_console(&format!("\n\t[Execution fault: {}]\n", fault));
                break;
            }
        }
    }

    /// One iteration of the outer scheduler.
    ///
    /// Halted: sleep briefly so command input can be serviced. Running:
    /// consume a pending stop request, check breakpoints, execute one
    /// instruction, tick the peripherals, and charge the fixed average
    /// instruction cost to the emulated clock. A breakpoint hit, an
    /// execution fault, or a stop request drops back into debug mode.
    pub fn process_iteration(&mut self) {
        if !self.cpu.running {
            std::thread::sleep(HALTED_POLL);
            return;
        }
        if self.stop.take() {
            self.cpu.running = false;
            self.debugger.debug_mode = true;
            return;
        }
        if let Some(hit) = self.debugger.breakpoints.check(self.cpu.pc(), &mut self.mem) {
            self.on_breakpoint_hit(hit);
            return;
        }
        self.step_one();
        self.tick_peripherals();
        if let Some(fault) = self.debugger.fault {
            self.print_console(&format!("\n\t[Execution fault: {}]\n", fault));
            self.cpu.running = false;
            self.debugger.debug_mode = true;
            return;
        }
        self.clock.advance(CYCLES_PER_INSTRUCTION);
    }

    /// Halt into debug mode after a breakpoint hit, reporting which
    /// breakpoint fired with its 1-based index.
    fn on_breakpoint_hit(&mut self, hit: BreakpointHit) {
        let label = match hit.kind {
            BreakKind::Execute => "PC",
            BreakKind::Memory => "MEM",
        };
        self.print_console(&format!("\n\t[Breakpoint {}[{}] hit]\n\n", label, hit.index));
        if self.debug {
            eprintln!(
                "{} breakpoint {} hit at 0x{:04X} after {} instructions",
                label, hit.index, hit.addr, self.stats.instructions
            );
        }
        self.cpu.running = false;
        self.debugger.debug_mode = true;
        self.render_state();
    }

    // ─── Host-side accessors ────────────────────────────────────────────

    /// Take and clear the bytes the firmware transmitted over serial.
    pub fn take_serial_output(&mut self) -> Vec<u8> {
        self.serial.take_tx()
    }

    /// Capture the machine state for a save state.
    pub fn save_state(&self) -> SaveState {
        SaveState {
            regs: self.cpu.regs,
            running: self.cpu.running,
            data: self.mem.data.clone(),
            cycles: self.clock.cycles(),
            mclk_hz: self.clock.mclk_hz(),
            instructions: self.stats.instructions,
        }
    }

    /// Restore machine state from a save state. Debugger state
    /// (breakpoints, flags) belongs to the session and is untouched;
    /// the statistics epoch restarts at the restored cycle origin.
    pub fn restore_state(&mut self, state: &SaveState) {
        self.cpu.regs = state.regs;
        self.cpu.running = state.running;
        let n = state.data.len().min(self.mem.data.len());
        self.mem.data[..n].copy_from_slice(&state.data[..n]);
        self.clock.restore(state.cycles, state.mclk_hz);
        self.stats = ExecStats::new();
        self.stats.instructions = state.instructions;
        self.tracer.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debugger::BufferConsole;

    /// Emulator with a program of `MOV #1, r4` instructions at 0xC000
    /// and the reset vector pointing there.
    fn test_emu() -> (Emulator, BufferConsole) {
        let console = BufferConsole::new();
        let mut emu = Emulator::new(InterfaceKind::Console);
        emu.set_console(Box::new(console.clone()));
        for i in 0..64u16 {
            emu.mem.write_word(0xC000 + i * 4, 0x4034);
            emu.mem.write_word(0xC002 + i * 4, 0x0001);
        }
        emu.mem.write_word(memory::RESET_VECTOR, 0xC000);
        emu.reset_to_vector();
        (emu, console)
    }

    #[test]
    fn test_run_mode_halts_on_breakpoint_before_executing() {
        let (mut emu, console) = test_emu();
        emu.debugger.breakpoints.add_exec(0xC008);
        emu.exec_command("run");
        while emu.cpu.running {
            emu.process_iteration();
        }
        // Halted with the breakpointed instruction not yet executed
        assert_eq!(emu.cpu.pc(), 0xC008);
        assert_eq!(emu.stats.instructions, 2);
        assert!(emu.debugger.debug_mode);
        assert!(console.take().contains("[Breakpoint PC[1] hit]"));
    }

    #[test]
    fn test_run_mode_charges_average_cycle_cost() {
        let (mut emu, _console) = test_emu();
        emu.debugger.breakpoints.add_exec(0xC00C);
        emu.exec_command("run");
        while emu.cpu.running {
            emu.process_iteration();
        }
        assert_eq!(emu.clock.cycles(), 3 * CYCLES_PER_INSTRUCTION);
        // Step batches do not advance the emulated clock
        emu.exec_command("step");
        assert_eq!(emu.clock.cycles(), 3 * CYCLES_PER_INSTRUCTION);
    }

    #[test]
    fn test_stop_token_halts_run() {
        let (mut emu, _console) = test_emu();
        emu.exec_command("run");
        emu.process_iteration();
        emu.stop.request_stop();
        emu.process_iteration();
        assert!(!emu.cpu.running);
        assert!(emu.debugger.debug_mode);
        assert!(!emu.stop.is_requested());
    }

    #[test]
    fn test_run_clears_stale_stop_request() {
        let (mut emu, _console) = test_emu();
        emu.stop.request_stop();
        emu.exec_command("run");
        assert!(!emu.stop.is_requested());
        emu.process_iteration();
        assert!(emu.cpu.running);
    }

    #[test]
    fn test_illegal_instruction_faults_and_halts_run() {
        let (mut emu, console) = test_emu();
        emu.mem.write_word(0xC004, 0x0000);
        emu.exec_command("run");
        emu.process_iteration();
        assert!(emu.cpu.running);
        emu.process_iteration();
        assert!(!emu.cpu.running);
        assert!(emu.debugger.debug_mode);
        assert_eq!(emu.cpu.pc(), 0xC004);
        assert!(console.take().contains("Execution fault"));
    }

    #[test]
    fn test_memory_watch_halts_run() {
        let (mut emu, console) = test_emu();
        // MOV #0xAA, &0x0200 then the MOV #1, r4 chain
        emu.mem.write_word(0xC000, 0x40B2);
        emu.mem.write_word(0xC002, 0x00AA);
        emu.mem.write_word(0xC004, 0x0200);
        emu.debugger.breakpoints.add_watch(0x0200);
        emu.exec_command("run");
        while emu.cpu.running {
            emu.process_iteration();
        }
        assert_eq!(emu.mem.read_word(0x0200), 0x00AA);
        assert!(console.take().contains("[Breakpoint MEM[1] hit]"));
    }

    #[test]
    fn test_trace_prints_instructions() {
        let (mut emu, console) = test_emu();
        emu.exec_command("trace on");
        console.take();
        emu.exec_command("step");
        let out = console.take();
        assert!(out.contains("0xC000: MOV #0x1, r4"));
    }

    #[test]
    fn test_serial_output_captured() {
        let (mut emu, _console) = test_emu();
        // MOV.B #0x41, &UCA0TXBUF
        emu.mem.write_word(0xC000, 0x40F2);
        emu.mem.write_word(0xC002, 0x0041);
        emu.mem.write_word(0xC004, peripherals::serial::UCA0TXBUF);
        emu.step_batch(1);
        assert_eq!(emu.take_serial_output(), b"A");
    }

    #[test]
    fn test_call_and_ret_are_traced() {
        let (mut emu, _console) = test_emu();
        emu.cpu.set_sp(0x0400);
        // CALL #0xC100; at 0xC100: RET
        emu.mem.write_word(0xC000, 0x12B0);
        emu.mem.write_word(0xC002, 0xC100);
        emu.mem.write_word(0xC100, 0x4130);
        emu.step_batch(1);
        assert_eq!(emu.cpu.pc(), 0xC100);
        assert_eq!(emu.tracer.depth(), 1);
        emu.step_batch(1);
        assert_eq!(emu.cpu.pc(), 0xC004);
        assert_eq!(emu.tracer.depth(), 0);
        assert_eq!(emu.tracer.top_calls(1)[0].0, (0xC000, 0xC100));
    }

    #[test]
    fn test_save_restore_round_trip() {
        let (mut emu, _console) = test_emu();
        emu.exec_command("step 3");
        let state = emu.save_state();
        let pc = emu.cpu.pc();
        emu.exec_command("step 5");
        emu.restore_state(&state);
        assert_eq!(emu.cpu.pc(), pc);
        assert_eq!(emu.stats.instructions, 3);
    }
}
