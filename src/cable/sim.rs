//! A fully software-simulated scan chain behind the `Cable` interface: a
//! vector of emulated 1149.1 devices honoring the TAP state machine clock by
//! clock.  Lets the layers above the cable be exercised without hardware;
//! the crate's own chain and bus tests run on it.
//!
//! `SimCable` is a cheap cloneable handle, so a test can drive a chain
//! through one clone and inspect device internals through another.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::cable::Cable;
use crate::error::Result;
use crate::statemachine::TapState;

/// What a device's latched instruction selects between TDI and TDO.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Selected {
    Bypass,
    IdCode,
    Custom,
}

/// One emulated device.  Registers are deques with the TDO end at the front.
pub struct SimDevice {
    irlen: usize,
    idcode: Option<u32>,
    /// `(opcode bits, register length)` of a single custom instruction.
    custom: Option<(Vec<bool>, usize)>,
    /// Parallel hold latch behind the custom register (Update-DR target).
    pub custom_store: Vec<bool>,
    /// When set, Capture-DR loads this into the custom register instead of
    /// the hold latch, modelling externally driven pins.
    pub capture_override: Option<Vec<bool>>,
    ir_shift: VecDeque<bool>,
    selected: Selected,
    dr_shift: VecDeque<bool>,
}

impl SimDevice {
    /// `custom` is `(opcode string, register length)`; the opcode string is
    /// in register form, bit 0 (first clocked) first, and must be `irlen`
    /// characters.
    pub fn new(irlen: usize, idcode: Option<u32>, custom: Option<(&str, usize)>) -> Self {
        let custom = custom.map(|(op, len)| {
            let bits: Vec<bool> = op.chars().map(|c| c == '1').collect();
            assert_eq!(bits.len(), irlen);
            (bits, len)
        });
        let custom_len = custom.as_ref().map_or(0, |(_, len)| *len);
        let mut dev = Self {
            irlen,
            idcode,
            custom,
            custom_store: vec![false; custom_len],
            capture_override: None,
            ir_shift: VecDeque::from(vec![false; irlen]),
            selected: Selected::Bypass,
            dr_shift: VecDeque::new(),
        };
        dev.test_logic_reset();
        dev
    }

    pub fn selected(&self) -> Selected {
        self.selected
    }

    fn test_logic_reset(&mut self) {
        self.selected = if self.idcode.is_some() {
            Selected::IdCode
        } else {
            Selected::Bypass
        };
    }

    fn capture_ir(&mut self) {
        // Mandatory 0b01 in the two first-out bit positions.
        self.ir_shift = VecDeque::from(vec![false; self.irlen]);
        self.ir_shift[0] = true;
    }

    fn update_ir(&mut self) {
        let latched: Vec<bool> = self.ir_shift.iter().copied().collect();
        self.selected = if latched.iter().all(|&b| b) {
            Selected::Bypass
        } else if self.custom.as_ref().is_some_and(|(op, _)| *op == latched) {
            Selected::Custom
        } else if self.idcode.is_some() {
            Selected::IdCode
        } else {
            Selected::Bypass
        };
    }

    fn capture_dr(&mut self) {
        self.dr_shift = match self.selected {
            Selected::Bypass => VecDeque::from(vec![false]),
            Selected::IdCode => {
                let code = self.idcode.unwrap_or(0);
                (0..32).map(|i| (code >> i) & 1 == 1).collect()
            }
            Selected::Custom => match &self.capture_override {
                Some(bits) => bits.iter().copied().collect(),
                None => self.custom_store.iter().copied().collect(),
            },
        };
    }

    fn update_dr(&mut self) {
        if self.selected == Selected::Custom {
            self.custom_store = self.dr_shift.iter().copied().collect();
        }
    }

    fn shift_ir(&mut self, tdi: bool) -> bool {
        match self.ir_shift.pop_front() {
            Some(out) => {
                self.ir_shift.push_back(tdi);
                out
            }
            None => tdi,
        }
    }

    fn shift_dr(&mut self, tdi: bool) -> bool {
        match self.dr_shift.pop_front() {
            Some(out) => {
                self.dr_shift.push_back(tdi);
                out
            }
            None => tdi,
        }
    }
}

struct SimInner {
    state: TapState,
    devices: Vec<SimDevice>,
    clocks: usize,
}

/// The simulated chain.  Device 0 is nearest TDI.
#[derive(Clone)]
pub struct SimCable {
    inner: Rc<RefCell<SimInner>>,
}

impl SimCable {
    pub fn new(devices: Vec<SimDevice>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SimInner {
                state: TapState::TestLogicReset,
                devices,
                clocks: 0,
            })),
        }
    }

    /// Total TCK cycles driven since construction.
    pub fn clocks(&self) -> usize {
        self.inner.borrow().clocks
    }

    /// Inspect or tweak a device mid-test.
    pub fn with_device<R>(&self, index: usize, f: impl FnOnce(&mut SimDevice) -> R) -> R {
        f(&mut self.inner.borrow_mut().devices[index])
    }
}

impl Cable for SimCable {
    fn clock(&mut self, tms: bool, tdi: bool) -> Result<()> {
        let inner = &mut *self.inner.borrow_mut();
        // Registers shift on edges taken while sitting in a Shift state,
        // including the edge that exits to Exit1.
        match inner.state {
            TapState::ShiftIr => {
                let mut carry = tdi;
                for dev in &mut inner.devices {
                    carry = dev.shift_ir(carry);
                }
            }
            TapState::ShiftDr => {
                let mut carry = tdi;
                for dev in &mut inner.devices {
                    carry = dev.shift_dr(carry);
                }
            }
            _ => {}
        }
        let next = inner.state.step(tms);
        match next {
            TapState::TestLogicReset => inner
                .devices
                .iter_mut()
                .for_each(SimDevice::test_logic_reset),
            TapState::CaptureIr => inner.devices.iter_mut().for_each(SimDevice::capture_ir),
            TapState::UpdateIr => inner.devices.iter_mut().for_each(SimDevice::update_ir),
            TapState::CaptureDr => inner.devices.iter_mut().for_each(SimDevice::capture_dr),
            TapState::UpdateDr => inner.devices.iter_mut().for_each(SimDevice::update_dr),
            _ => {}
        }
        inner.state = next;
        inner.clocks += 1;
        Ok(())
    }

    fn tdo(&mut self) -> Result<bool> {
        let inner = self.inner.borrow();
        let Some(last) = inner.devices.last() else {
            return Ok(false);
        };
        Ok(match inner.state {
            TapState::ShiftIr => last.ir_shift.front().copied().unwrap_or(false),
            TapState::ShiftDr => last.dr_shift.front().copied().unwrap_or(false),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_selects_idcode_or_bypass() {
        let dev = SimDevice::new(4, Some(0x1002_1043), None);
        assert_eq!(dev.selected(), Selected::IdCode);
        let dev = SimDevice::new(4, None, None);
        assert_eq!(dev.selected(), Selected::Bypass);
    }

    #[test]
    fn idcode_shifts_out_lsb_first() {
        let mut cable = SimCable::new(vec![SimDevice::new(4, Some(0x0000_0005), None)]);
        // TLR -> Idle -> SelectDR -> CaptureDR -> ShiftDR
        for (tms, tdi) in [(false, false), (true, false), (false, false), (false, false)] {
            cable.clock(tms, tdi).unwrap();
        }
        let mut bits = Vec::new();
        for _ in 0..4 {
            bits.push(cable.tdo().unwrap());
            cable.clock(false, false).unwrap();
        }
        // 0x5 = 0b0101, LSB first.
        assert_eq!(bits, vec![true, false, true, false]);
    }
}
