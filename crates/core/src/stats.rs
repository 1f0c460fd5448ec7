//! Execution statistics and call tracing.
//!
//! Tracks instruction counts and the emulated cycle total, plus a
//! bounded history of CALL/RET pairs with per-edge invocation counts.
//! Both are cleared by the `reset` debugger command; the `stats`
//! command renders the report.

use std::collections::HashMap;

/// Maximum number of call-history entries retained.
const CALL_HISTORY_LIMIT: usize = 64;
/// Call-stack depth tracked for nesting display.
const CALL_STACK_LIMIT: usize = 128;

/// Instruction/cycle counters.
pub struct ExecStats {
    /// Instructions executed since the last reset
    pub instructions: u64,
    /// Cycle counter value at the last reset
    cycle_base: u64,
}

impl ExecStats {
    pub fn new() -> Self {
        ExecStats {
            instructions: 0,
            cycle_base: 0,
        }
    }

    /// Clear the counters, treating `cycles_now` as the new epoch.
    pub fn reset(&mut self, cycles_now: u64) {
        self.instructions = 0;
        self.cycle_base = cycles_now;
    }

    /// Cycles elapsed since the last reset.
    pub fn cycles(&self, cycles_now: u64) -> u64 {
        cycles_now.saturating_sub(self.cycle_base)
    }

    /// Format the statistics report.
    pub fn report(&self, cycles_now: u64, mclk_hz: u32) -> String {
        let cycles = self.cycles(cycles_now);
        let mut s = String::new();
        s.push_str("=== Execution statistics ===\n");
        s.push_str(&format!("Instructions: {}\n", self.instructions));
        s.push_str(&format!("Cycles:       {}\n", cycles));
        if self.instructions > 0 {
            let cpi = cycles as f64 / self.instructions as f64;
            s.push_str(&format!("Cycles/inst:  {:.2}\n", cpi));
        }
        if mclk_hz > 0 {
            let secs = cycles as f64 / mclk_hz as f64;
            s.push_str(&format!("Emulated time: {:.6} s @ {} Hz\n", secs, mclk_hz));
        }
        s
    }
}

impl Default for ExecStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded CALL/RET history with per-edge counts.
pub struct CallTracer {
    /// (caller, callee) → invocation count
    edges: HashMap<(u16, u16), u64>,
    /// Most recent calls as (caller, callee, depth)
    history: Vec<(u16, u16, usize)>,
    depth: usize,
}

impl CallTracer {
    pub fn new() -> Self {
        CallTracer {
            edges: HashMap::new(),
            history: Vec::new(),
            depth: 0,
        }
    }

    pub fn reset(&mut self) {
        self.edges.clear();
        self.history.clear();
        self.depth = 0;
    }

    /// Record a CALL from `caller` to `callee`.
    pub fn record_call(&mut self, caller: u16, callee: u16) {
        *self.edges.entry((caller, callee)).or_insert(0) += 1;
        if self.history.len() == CALL_HISTORY_LIMIT {
            self.history.remove(0);
        }
        self.history.push((caller, callee, self.depth));
        if self.depth < CALL_STACK_LIMIT {
            self.depth += 1;
        }
    }

    /// Record a RET/RETI.
    pub fn record_ret(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Top-N call edges by invocation count.
    pub fn top_calls(&self, n: usize) -> Vec<((u16, u16), u64)> {
        let mut v: Vec<_> = self.edges.iter().map(|(&e, &c)| (e, c)).collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        v.truncate(n);
        v
    }

    /// Format the call-trace report.
    pub fn report(&self) -> String {
        let mut s = String::new();
        let calls = self.top_calls(10);
        if calls.is_empty() {
            return s;
        }
        s.push_str("\n--- Top call edges ---\n");
        for ((from, to), cnt) in calls {
            s.push_str(&format!("0x{:04X} -> 0x{:04X}  {:>6}\n", from, to, cnt));
        }
        s.push_str("\n--- Recent calls ---\n");
        for &(from, to, depth) in self.history.iter().rev().take(10) {
            s.push_str(&format!(
                "{:indent$}0x{:04X} -> 0x{:04X}\n",
                "",
                from,
                to,
                indent = depth.min(16)
            ));
        }
        s
    }
}

impl Default for CallTracer {
    fn default() -> Self {
        Self::new()
    }
}
