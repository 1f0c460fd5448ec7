//! USCI_A0 serial controller (UART mode).
//!
//! Transmission completes instantly: a store to UCA0TXBUF appends the
//! byte to the transmit log (drained by the frontend) and re-raises
//! UCA0TXIFG. Received bytes are queued by the host and surface one at
//! a time through UCA0RXBUF with UCA0RXIFG signaling availability.

use std::collections::VecDeque;

use super::{IFG2, UCA0RXIFG, UCA0TXIFG};
use crate::memory::Memory;

pub const UCA0STAT: u16 = 0x0065;
pub const UCA0RXBUF: u16 = 0x0066;
pub const UCA0TXBUF: u16 = 0x0067;

/// USCI_A0 state.
pub struct SerialCtrl {
    tx_log: Vec<u8>,
    rx_queue: VecDeque<u8>,
}

impl SerialCtrl {
    pub fn new() -> Self {
        SerialCtrl {
            tx_log: Vec::new(),
            rx_queue: VecDeque::new(),
        }
    }

    pub fn reset(&mut self) {
        self.tx_log.clear();
        self.rx_queue.clear();
    }

    /// Queue bytes for the firmware to receive.
    pub fn queue_rx(&mut self, bytes: &[u8]) {
        self.rx_queue.extend(bytes);
    }

    /// Take and clear the accumulated transmit log.
    pub fn take_tx(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.tx_log)
    }

    /// React to an executed store into a serial register.
    pub fn write_hook(&mut self, addr: u16, value: u8, mem: &mut Memory) {
        if addr == UCA0TXBUF {
            self.tx_log.push(value);
            // Transmit buffer is immediately ready again
            let ifg = mem.read_byte(IFG2);
            mem.write_byte(IFG2, ifg | UCA0TXIFG);
        }
    }

    /// Serve an executed load of UCA0RXBUF, consuming the queued byte.
    pub fn read_hook(&mut self, addr: u16, mem: &mut Memory) -> Option<u8> {
        if addr != UCA0RXBUF {
            return None;
        }
        let byte = self.rx_queue.pop_front().unwrap_or(0);
        if self.rx_queue.is_empty() {
            let ifg = mem.read_byte(IFG2);
            mem.write_byte(IFG2, ifg & !UCA0RXIFG);
        }
        Some(byte)
    }

    /// Refresh interrupt flags.
    pub fn tick(&mut self, mem: &mut Memory) {
        let mut ifg = mem.read_byte(IFG2) | UCA0TXIFG;
        if !self.rx_queue.is_empty() {
            ifg |= UCA0RXIFG;
        }
        mem.write_byte(IFG2, ifg);
    }
}

impl Default for SerialCtrl {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transmit_logs_byte_and_raises_ifg() {
        let mut ser = SerialCtrl::new();
        let mut mem = Memory::new();
        ser.write_hook(UCA0TXBUF, b'A', &mut mem);
        ser.write_hook(UCA0TXBUF, b'B', &mut mem);
        assert_eq!(ser.take_tx(), b"AB");
        assert_ne!(mem.read_byte(IFG2) & UCA0TXIFG, 0);
        assert!(ser.take_tx().is_empty());
    }

    #[test]
    fn test_receive_queue_drains_through_rxbuf() {
        let mut ser = SerialCtrl::new();
        let mut mem = Memory::new();
        ser.queue_rx(b"hi");
        ser.tick(&mut mem);
        assert_ne!(mem.read_byte(IFG2) & UCA0RXIFG, 0);
        assert_eq!(ser.read_hook(UCA0RXBUF, &mut mem), Some(b'h'));
        assert_eq!(ser.read_hook(UCA0RXBUF, &mut mem), Some(b'i'));
        assert_eq!(mem.read_byte(IFG2) & UCA0RXIFG, 0);
    }
}
