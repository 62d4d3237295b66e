//! Pure-software cable that models a TDI-to-TDO delay line of fixed length,
//! i.e. an ideal shift register soldered straight across the header.  Used by
//! the crate's own tests and handy for bring-up of layers above the cable
//! without hardware attached.

use std::collections::VecDeque;

use crate::cable::Cable;
use crate::error::Result;

pub struct Loopback {
    line: VecDeque<bool>,
    clocks: usize,
    history: Vec<(bool, bool)>,
    trst: bool,
}

impl Loopback {
    /// A delay line of `length` stages, initially all zero.  `length` of 1
    /// echoes TDI back one clock later.
    pub fn new(length: usize) -> Self {
        assert!(length > 0);
        Self {
            line: VecDeque::from(vec![false; length]),
            clocks: 0,
            history: Vec::new(),
            trst: false,
        }
    }

    /// Total TCK cycles driven since construction.
    pub fn clocks(&self) -> usize {
        self.clocks
    }

    /// Every (tms, tdi) pair driven, in order.
    pub fn history(&self) -> &[(bool, bool)] {
        &self.history
    }
}

impl Cable for Loopback {
    fn clock(&mut self, tms: bool, tdi: bool) -> Result<()> {
        self.line.push_front(tdi);
        self.line.pop_back();
        self.clocks += 1;
        self.history.push((tms, tdi));
        Ok(())
    }

    fn tdo(&mut self) -> Result<bool> {
        Ok(self.line.back().copied().unwrap_or(false))
    }

    fn set_trst(&mut self, assert: bool) -> Result<bool> {
        self.trst = assert;
        Ok(assert)
    }

    fn trst(&mut self) -> Option<bool> {
        Some(self.trst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_stage_delays_by_one() {
        let mut cable = Loopback::new(1);
        let pattern = [true, false, true, true, false];
        let mut seen = Vec::new();
        for &bit in &pattern {
            seen.push(cable.tdo().unwrap());
            cable.clock(false, bit).unwrap();
        }
        seen.push(cable.tdo().unwrap());
        // First sample is the initial zero, then the pattern delayed by one.
        assert_eq!(seen, vec![false, true, false, true, true, false]);
        assert_eq!(cable.clocks(), 5);
    }
}
