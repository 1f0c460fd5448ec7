//! Debugger state and breakpoint registry.
//!
//! Two insertion-ordered, fixed-capacity breakpoint lists: execution
//! addresses (halt when the program counter reaches them) and
//! memory-watch addresses (halt when the cell's access flags become
//! nonzero). The lists are append-only by design — the command
//! vocabulary has no removal operation — and capacity-bounded at
//! [`MAX_BREAKPOINTS`] each.

use std::io::Write;
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::memory::Memory;

/// Fixed capacity of each breakpoint list.
pub const MAX_BREAKPOINTS: usize = 32;

/// Which list a breakpoint belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// Execution breakpoint (program-counter match)
    Execute,
    /// Memory-watch breakpoint (access-flag match)
    Memory,
}

/// A breakpoint match returned by [`Breakpoints::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointHit {
    pub kind: BreakKind,
    /// 1-based display index within its list
    pub index: usize,
    pub addr: u16,
}

/// Append-only breakpoint registry.
pub struct Breakpoints {
    exec: Vec<u16>,
    watch: Vec<u16>,
}

impl Breakpoints {
    pub fn new() -> Self {
        Breakpoints {
            exec: Vec::new(),
            watch: Vec::new(),
        }
    }

    /// Append an execution breakpoint. Returns its 1-based index, or
    /// `None` when the list is at capacity.
    pub fn add_exec(&mut self, addr: u16) -> Option<usize> {
        if self.exec.len() >= MAX_BREAKPOINTS {
            return None;
        }
        self.exec.push(addr);
        Some(self.exec.len())
    }

    /// Append a memory-watch breakpoint. Same contract as [`add_exec`](Self::add_exec).
    pub fn add_watch(&mut self, addr: u16) -> Option<usize> {
        if self.watch.len() >= MAX_BREAKPOINTS {
            return None;
        }
        self.watch.push(addr);
        Some(self.watch.len())
    }

    pub fn exec(&self) -> &[u16] {
        &self.exec
    }

    pub fn watch(&self) -> &[u16] {
        &self.watch
    }

    pub fn is_empty(&self) -> bool {
        self.exec.is_empty() && self.watch.is_empty()
    }

    /// Check for a hit: the first execution breakpoint equal to `pc`,
    /// else the first memory-watch address accessed since the last
    /// check (flags are consumed), else `None`.
    pub fn check(&self, pc: u16, mem: &mut Memory) -> Option<BreakpointHit> {
        for (i, &addr) in self.exec.iter().enumerate() {
            if addr == pc {
                return Some(BreakpointHit {
                    kind: BreakKind::Execute,
                    index: i + 1,
                    addr,
                });
            }
        }
        for (i, &addr) in self.watch.iter().enumerate() {
            if mem.take_access_flags(addr) != 0 {
                return Some(BreakpointHit {
                    kind: BreakKind::Memory,
                    index: i + 1,
                    addr,
                });
            }
        }
        None
    }

}

impl Default for Breakpoints {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution fault signaled by the decode/execute path. Latched on the
/// [`Debugger`] and cleared at the start of every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExecFault {
    #[error("illegal instruction 0x{opcode:04X} at 0x{addr:04X}")]
    IllegalInstruction { opcode: u16, addr: u16 },
    #[error("program counter misaligned at 0x{addr:04X}")]
    MisalignedPc { addr: u16 },
}

/// Which front end drives the command loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceKind {
    /// Synchronous line reads from a local terminal
    Console,
    /// Lines arriving from the upload/network worker
    Network,
}

/// Debugger control state.
pub struct Debugger {
    /// Monotonic shutdown flag: once set it is never cleared
    pub quit: bool,
    /// True while the command loop (rather than the scheduler) runs
    pub debug_mode: bool,
    /// Per-instruction trace output enabled
    pub trace: bool,
    pub interface: InterfaceKind,
    /// Fault latched by the current command's execution, if any
    pub fault: Option<ExecFault>,
    pub breakpoints: Breakpoints,
}

impl Debugger {
    pub fn new(interface: InterfaceKind) -> Self {
        Debugger {
            quit: false,
            debug_mode: true,
            trace: false,
            interface,
            fault: None,
            breakpoints: Breakpoints::new(),
        }
    }
}

// ─── Console sink ───────────────────────────────────────────────────────────

/// Output sink for all user-facing debugger text. Console mode writes
/// to stdout; network mode writes to the connected TCP stream.
pub trait Console: Send {
    fn print(&mut self, text: &str);
}

/// Console sink writing to the local terminal.
pub struct StdoutConsole;

impl Console for StdoutConsole {
    fn print(&mut self, text: &str) {
        let mut out = std::io::stdout();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

/// Console sink accumulating output in a shared buffer. Used by tests
/// and by embedders that capture rendered text.
#[derive(Clone, Default)]
pub struct BufferConsole {
    buf: Arc<Mutex<String>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take and clear the accumulated output.
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.buf.lock().unwrap())
    }
}

impl Console for BufferConsole {
    fn print(&mut self, text: &str) {
        self.buf.lock().unwrap().push_str(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Memory;

    #[test]
    fn test_capacity_is_enforced() {
        let mut bps = Breakpoints::new();
        for i in 0..MAX_BREAKPOINTS as u16 {
            assert_eq!(bps.add_exec(0xC000 + i * 2), Some(i as usize + 1));
        }
        assert_eq!(bps.add_exec(0xF000), None);
        assert_eq!(bps.exec().len(), MAX_BREAKPOINTS);
        // The watch list has independent capacity
        assert_eq!(bps.add_watch(0x0200), Some(1));
    }

    #[test]
    fn test_check_prefers_first_exec_match() {
        let mut bps = Breakpoints::new();
        let mut mem = Memory::new();
        bps.add_exec(0xC010);
        bps.add_exec(0xC010);
        let hit = bps.check(0xC010, &mut mem).unwrap();
        assert_eq!(hit.kind, BreakKind::Execute);
        assert_eq!(hit.index, 1);
    }

    #[test]
    fn test_watch_hit_consumes_flags() {
        let mut bps = Breakpoints::new();
        let mut mem = Memory::new();
        bps.add_watch(0x0200);
        assert!(bps.check(0x0000, &mut mem).is_none());
        mem.store_byte(0x0200, 0xAA);
        let hit = bps.check(0x0000, &mut mem).unwrap();
        assert_eq!(hit.kind, BreakKind::Memory);
        assert_eq!(hit.addr, 0x0200);
        // Flags were consumed: no repeat hit without a new access
        assert!(bps.check(0x0000, &mut mem).is_none());
    }

    #[test]
    fn test_buffer_console_accumulates() {
        let console = BufferConsole::new();
        let mut sink = console.clone();
        sink.print("hello ");
        sink.print("world");
        assert_eq!(console.take(), "hello world");
        assert_eq!(console.take(), "");
    }
}
