//! Timer_A emulation.
//!
//! Supports stop, up, and continuous counting modes with the input
//! divider, TAIFG on wrap, and CCIFG on a CCR0 compare match. Up/down
//! mode is treated as continuous (no PWM consumers in this frontend).
//! The counter advances by the fixed average instruction cost on every
//! tick, matching the scheduler's timing model.

use crate::memory::Memory;
use crate::CYCLES_PER_INSTRUCTION;

pub const TACTL: u16 = 0x0160;
pub const TACCTL0: u16 = 0x0162;
pub const TAR: u16 = 0x0170;
pub const TACCR0: u16 = 0x0172;

/// TACTL bits
const TAIFG: u16 = 0x0001;
const TACLR: u16 = 0x0004;
/// TACCTLx bits
const CCIFG: u16 = 0x0001;

/// Timer_A state. Register values live in data space; this struct only
/// carries the divider remainder between ticks.
pub struct TimerA {
    accum: u32,
}

impl TimerA {
    pub fn new() -> Self {
        TimerA { accum: 0 }
    }

    pub fn reset(&mut self) {
        self.accum = 0;
    }

    /// React to an executed store into a timer register.
    pub fn write_hook(&mut self, addr: u16, mem: &mut Memory) {
        // TACLR resets the counter and the divider, then clears itself
        if addr == TACTL || addr == TACTL + 1 {
            let ctl = mem.read_word(TACTL);
            if ctl & TACLR != 0 {
                mem.write_word(TAR, 0);
                mem.write_word(TACTL, ctl & !TACLR);
                self.accum = 0;
            }
        }
    }

    /// Advance the timer by one instruction's worth of cycles.
    pub fn tick(&mut self, mem: &mut Memory) {
        let ctl = mem.read_word(TACTL);
        let mc = (ctl >> 4) & 3;
        if mc == 0 {
            return;
        }
        let divider = 1u32 << ((ctl >> 6) & 3);
        self.accum += CYCLES_PER_INSTRUCTION as u32;
        let steps = self.accum / divider;
        self.accum %= divider;
        if steps == 0 {
            return;
        }

        let tar = mem.read_word(TAR) as u32;
        let ccr0 = mem.read_word(TACCR0) as u32;
        let mut new_ctl = ctl;
        let mut cctl0 = mem.read_word(TACCTL0);

        let new_tar = if mc == 1 {
            // Up mode: count to CCR0, CCIFG at the top, TAIFG on wrap to 0
            if ccr0 == 0 {
                0
            } else {
                let period = ccr0 + 1;
                let total = tar + steps;
                if total >= ccr0 {
                    cctl0 |= CCIFG;
                }
                if total >= period {
                    new_ctl |= TAIFG;
                }
                total % period
            }
        } else {
            // Continuous (and up/down, simplified): wrap at 0xFFFF
            let total = tar + steps;
            if total > 0xFFFF {
                new_ctl |= TAIFG;
            }
            if tar < ccr0 && total >= ccr0 {
                cctl0 |= CCIFG;
            }
            total & 0xFFFF
        };

        mem.write_word(TAR, new_tar as u16);
        mem.write_word(TACTL, new_ctl);
        mem.write_word(TACCTL0, cctl0);
    }
}

impl Default for TimerA {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stopped_timer_does_not_count() {
        let mut t = TimerA::new();
        let mut mem = Memory::new();
        t.tick(&mut mem);
        assert_eq!(mem.read_word(TAR), 0);
    }

    #[test]
    fn test_continuous_mode_counts_and_wraps() {
        let mut t = TimerA::new();
        let mut mem = Memory::new();
        mem.write_word(TACTL, 2 << 4); // MC = continuous, divider /1
        t.tick(&mut mem);
        assert_eq!(mem.read_word(TAR), CYCLES_PER_INSTRUCTION as u16);

        mem.write_word(TAR, 0xFFFE);
        t.tick(&mut mem);
        assert_ne!(mem.read_word(TACTL) & TAIFG, 0);
    }

    #[test]
    fn test_up_mode_compare_match() {
        let mut t = TimerA::new();
        let mut mem = Memory::new();
        mem.write_word(TACTL, 1 << 4); // MC = up
        mem.write_word(TACCR0, 3);
        t.tick(&mut mem); // counts 4 with period 4: wraps and matches
        assert_ne!(mem.read_word(TACCTL0) & CCIFG, 0);
        assert_ne!(mem.read_word(TACTL) & TAIFG, 0);
        assert_eq!(mem.read_word(TAR), 0);
    }

    #[test]
    fn test_taclr_resets_counter() {
        let mut t = TimerA::new();
        let mut mem = Memory::new();
        mem.write_word(TAR, 0x1234);
        mem.write_word(TACTL, TACLR);
        t.write_hook(TACTL, &mut mem);
        assert_eq!(mem.read_word(TAR), 0);
        assert_eq!(mem.read_word(TACTL) & TACLR, 0);
    }
}
