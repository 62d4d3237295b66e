//! Chain-wide orchestration: one physical TAP, N daisy-chained parts, one
//! combined serial shift.  The chain owns the cable and the TAP controller,
//! composes per-part instruction and data registers into a single pattern,
//! and redistributes the capture.
//!
//! Bit-order convention, applied identically to IR and DR shifts: part 0 is
//! wired nearest TDI, so the last part's bits are clocked first and the first
//! bits captured from TDO belong to the last part.

use crate::cable::Cable;
use crate::error::Result;
use crate::idcode::IdCode;
use crate::part::{Part, PartDescription};
use crate::register::BitRegister;
use crate::shift::shift_register;
use crate::statemachine::{TapController, TapState};

/// Where a data register shift leaves the TAP.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ExitMode {
    /// Update the register and return to Run-Test/Idle.
    Idle,
    /// Hold in Pause-DR without updating; the next shift resumes through
    /// Exit2-DR without a new capture (SVF-style pause semantics).
    Pause,
}

/// Known part descriptions keyed by IDCODE, consulted during detection.
/// Descriptions come from part files parsed outside this crate.
#[derive(Default)]
pub struct PartCatalog {
    entries: Vec<PartDescription>,
}

impl PartCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, desc: PartDescription) {
        self.entries.push(desc);
    }

    /// Match ignores the 4 version bits so one entry covers all steppings.
    pub fn lookup(&self, idcode: IdCode) -> Option<&PartDescription> {
        self.entries
            .iter()
            .find(|d| {
                d.idcode
                    .is_some_and(|raw| IdCode::new(raw).matches_ignoring_version(idcode))
            })
    }
}

/// Upper bound on devices considered during detection.
const MAX_TAPS: usize = 32;

pub struct Chain {
    cable: Box<dyn Cable>,
    tap: TapController,
    parts: Vec<Part>,
    active_part: usize,
}

impl Chain {
    /// Take ownership of a cable and initialize it.  The TAP state starts
    /// unknown; call `reset` (or any shift, which resets implicitly) before
    /// relying on state-dependent behavior.
    pub fn new(mut cable: Box<dyn Cable>) -> Result<Self> {
        cable.init()?;
        Ok(Self {
            cable,
            tap: TapController::new(),
            parts: Vec::new(),
            active_part: 0,
        })
    }

    pub fn tap_state(&self) -> TapState {
        self.tap.state()
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn part(&self, index: usize) -> &Part {
        &self.parts[index]
    }

    pub fn part_mut(&mut self, index: usize) -> &mut Part {
        &mut self.parts[index]
    }

    pub fn active_part(&self) -> usize {
        self.active_part
    }

    pub fn set_active_part(&mut self, index: usize) {
        assert!(index < self.parts.len());
        self.active_part = index;
    }

    /// Append a part to the chain by hand, for setups where the topology is
    /// known and detection is unnecessary (or the parts are not in any
    /// catalog).  Order must follow the wiring: part 0 nearest TDI.
    pub fn attach_part(&mut self, part: Part) {
        self.parts.push(part);
    }

    /// Drive the TRST line (where the cable has one) and track the resulting
    /// state: assertion invalidates, release guarantees Test-Logic-Reset.
    pub fn set_trst(&mut self, assert: bool) -> Result<TapState> {
        let applied = self.cable.set_trst(assert)?;
        Ok(self.tap.set_trst(applied))
    }

    /// Force the chain into a known state: five TMS-high clocks reach
    /// Test-Logic-Reset from anywhere (including Unknown), one TMS-low clock
    /// settles in Run-Test/Idle.
    pub fn reset(&mut self) -> Result<()> {
        for _ in 0..5 {
            self.cable.clock(true, false)?;
            self.tap.clock(true);
        }
        // The controller counts the five highs and is in TestLogicReset now.
        self.cable.clock(false, false)?;
        self.tap.clock(false);
        Ok(())
    }

    /// Walk the TAP to `state` by the shortest TMS path, resetting first if
    /// the current state cannot be trusted.
    fn drive_to(&mut self, state: TapState) -> Result<()> {
        if self.tap.state() == TapState::Unknown {
            self.reset()?;
        }
        let path = self
            .tap
            .tms_path_to(state)
            .expect("every state is reachable after reset");
        for tms in path {
            self.cable.clock(tms, false)?;
            self.tap.clock(tms);
        }
        Ok(())
    }

    /// Shift every part's active instruction opcode through the instruction
    /// column in one combined operation, capture the outgoing bits into each
    /// part's `ir_capture`, and finish in Run-Test/Idle.
    ///
    /// An empty chain is a successful no-op with zero clocks, so an
    /// undetected chain can still be exercised during bring-up.
    pub fn shift_instructions(&mut self) -> Result<()> {
        if self.parts.is_empty() {
            return Ok(());
        }

        let total: usize = self.parts.iter().map(|p| p.ir_length()).sum();
        let mut input = BitRegister::new(total);
        let mut offset = 0;
        for part in self.parts.iter().rev() {
            let opcode = part.active_instruction().opcode();
            for i in 0..opcode.len() {
                input.set(offset + i, opcode.get(i).unwrap_or(false));
            }
            offset += opcode.len();
        }
        tracing::debug!(total, pattern = %input, "instruction shift");

        self.drive_to(TapState::ShiftIr)?;
        let mut capture = BitRegister::new(total);
        shift_register(&mut *self.cable, &mut self.tap, &input, Some(&mut capture), true)?;

        let mut offset = 0;
        for part in self.parts.iter_mut().rev() {
            let len = part.ir_length();
            let out = part.ir_capture_mut();
            for i in 0..len {
                out.set(i, capture.get(offset + i).unwrap_or(false));
            }
            offset += len;
        }

        self.drive_to(TapState::RunTestIdle)
    }

    /// Shift the data column.  Each part contributes its active
    /// instruction's bound register; a part whose instruction binds none
    /// contributes a single filler bit, the width-1 BYPASS register every
    /// compliant device presents.  Captured bits land in each register's
    /// `value` after the old `value` moves to `previous` for change
    /// detection; filler captures are dropped.
    pub fn shift_data_registers(&mut self, exit: ExitMode) -> Result<()> {
        if self.parts.is_empty() {
            return Ok(());
        }

        let total: usize = self
            .parts
            .iter()
            .map(|p| p.active_data_register().map_or(1, |r| r.len()))
            .sum();
        let mut input = BitRegister::new(total);
        let mut offset = 0;
        for part in self.parts.iter().rev() {
            match part.active_data_register() {
                Some(reg) => {
                    for i in 0..reg.len() {
                        input.set(offset + i, reg.value.get(i).unwrap_or(false));
                    }
                    offset += reg.len();
                }
                None => offset += 1,
            }
        }
        tracing::debug!(total, ?exit, "data register shift");

        self.drive_to(TapState::ShiftDr)?;
        let mut capture = BitRegister::new(total);
        shift_register(&mut *self.cable, &mut self.tap, &input, Some(&mut capture), true)?;

        let mut offset = 0;
        for part in self.parts.iter_mut().rev() {
            match part.active_data_register_mut() {
                Some(reg) => {
                    reg.previous.copy_from(&reg.value);
                    for i in 0..reg.value.len() {
                        reg.value.set(i, capture.get(offset + i).unwrap_or(false));
                    }
                    offset += reg.value.len();
                }
                None => offset += 1,
            }
        }

        match exit {
            ExitMode::Idle => self.drive_to(TapState::RunTestIdle),
            ExitMode::Pause => self.drive_to(TapState::PauseDr),
        }
    }

    /// Probe the chain: reset, walk the post-reset data column for IDCODE
    /// and BYPASS devices, and instantiate catalog matches as parts (part 0
    /// nearest TDI).
    ///
    /// Returns the number of parts attached.  A chain where no device is
    /// recognized yields `Ok(0)` with the parts list empty; that is a valid
    /// terminal outcome, not an error, and callers must check for it.  If
    /// any device is missing from the catalog the whole chain is left
    /// unpopulated, since operating with guessed register lengths would
    /// corrupt every later shift.
    pub fn detect_parts(&mut self, catalog: &PartCatalog) -> Result<usize> {
        self.parts.clear();
        self.active_part = 0;
        self.reset()?;
        self.drive_to(TapState::ShiftDr)?;

        // Flood the column with ones; a captured 1 heads a 32-bit IDCODE, a
        // captured 0 is a device in BYPASS, and 32 ones in a row is our own
        // fill coming back around.
        let probe_len = 33 * MAX_TAPS + 32;
        let mut input = BitRegister::new(probe_len);
        input.fill(true);
        let mut capture = BitRegister::new(probe_len);
        shift_register(&mut *self.cable, &mut self.tap, &input, Some(&mut capture), true)?;
        self.drive_to(TapState::RunTestIdle)?;

        // First bits out of TDO belong to the device furthest from TDI.
        let mut idcodes: Vec<Option<IdCode>> = Vec::new();
        let mut index = 0;
        while index < probe_len && idcodes.len() <= MAX_TAPS {
            if !capture.get(index).unwrap_or(false) {
                idcodes.push(None);
                index += 1;
                continue;
            }
            if index + 32 > probe_len {
                break;
            }
            let mut raw = 0u32;
            for i in 0..32 {
                if capture.get(index + i).unwrap_or(false) {
                    raw |= 1 << i;
                }
            }
            if raw == u32::MAX {
                // End of chain: reading back the ones we shifted in.
                break;
            }
            let idcode = IdCode::new(raw);
            if !idcode.valid() {
                tracing::error!(%idcode, "malformed IDCODE in chain scan");
                return Ok(0);
            }
            tracing::info!(%idcode, "found TAP");
            idcodes.push(Some(idcode));
            index += 32;
        }
        idcodes.reverse();

        let mut parts = Vec::new();
        for (position, entry) in idcodes.iter().enumerate() {
            let Some(code) = entry else {
                tracing::warn!(position, "bypass-only device; chain left empty");
                return Ok(0);
            };
            match catalog.lookup(*code) {
                Some(desc) => {
                    tracing::debug!(%code, part = %desc.part_number, "catalog match");
                    parts.push(Part::from_description(desc)?);
                }
                None => {
                    tracing::warn!(%code, position, "device not in catalog; chain left empty");
                    return Ok(0);
                }
            }
        }

        // The probe left every device's register full of ones; resynchronize.
        self.reset()?;
        self.parts = parts;
        Ok(self.parts.len())
    }
}

impl Drop for Chain {
    fn drop(&mut self) {
        self.cable.done();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cable::loopback::Loopback;
    use crate::cable::sim::{SimCable, SimDevice};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Loopback handle that can be kept outside the chain for inspection.
    struct Shared(Rc<RefCell<Loopback>>);

    impl Cable for Shared {
        fn clock(&mut self, tms: bool, tdi: bool) -> Result<()> {
            self.0.borrow_mut().clock(tms, tdi)
        }
        fn tdo(&mut self) -> Result<bool> {
            self.0.borrow_mut().tdo()
        }
        fn set_trst(&mut self, assert: bool) -> Result<bool> {
            self.0.borrow_mut().set_trst(assert)
        }
    }

    fn catalog_with(descs: Vec<PartDescription>) -> PartCatalog {
        let mut catalog = PartCatalog::new();
        for d in descs {
            catalog.register(d);
        }
        catalog
    }

    fn two_part_descriptions() -> (PartDescription, PartDescription) {
        let a = PartDescription {
            manufacturer: "Acme".into(),
            part_number: "AC4".into(),
            stepping: "A".into(),
            idcode: Some(0x1002_1043),
            ir_length: 4,
            instructions: vec![("PEEK".into(), "0101".into(), Some("DATA".into()))],
            data_registers: vec![("DATA".into(), 32)],
            ..Default::default()
        };
        let b = PartDescription {
            manufacturer: "Acme".into(),
            part_number: "AC8".into(),
            stepping: "A".into(),
            idcode: Some(0x2004_2043),
            ir_length: 8,
            instructions: vec![("POKE".into(), "00010001".into(), Some("CTRL".into()))],
            data_registers: vec![("CTRL".into(), 5)],
            ..Default::default()
        };
        (a, b)
    }

    fn two_part_sim() -> SimCable {
        SimCable::new(vec![
            SimDevice::new(4, Some(0x1002_1043), Some(("0101", 32))),
            SimDevice::new(8, Some(0x2004_2043), None),
        ])
    }

    fn two_part_chain(sim: &SimCable) -> Chain {
        let (a, b) = two_part_descriptions();
        let mut chain = Chain::new(Box::new(sim.clone())).unwrap();
        chain.attach_part(Part::from_description(&a).unwrap());
        chain.attach_part(Part::from_description(&b).unwrap());
        chain
    }

    #[test]
    fn empty_chain_shifts_are_zero_clock_successes() {
        let handle = Rc::new(RefCell::new(Loopback::new(1)));
        let mut chain = Chain::new(Box::new(Shared(handle.clone()))).unwrap();
        chain.reset().unwrap();
        let after_reset = handle.borrow().clocks();
        assert_eq!(after_reset, 6);

        chain.shift_instructions().unwrap();
        chain.shift_data_registers(ExitMode::Idle).unwrap();
        assert_eq!(handle.borrow().clocks(), after_reset);
    }

    #[test]
    fn two_part_instruction_and_data_shift_clock_counts() {
        let sim = two_part_sim();
        let mut chain = two_part_chain(&sim);

        chain.part_mut(0).set_instruction("PEEK").unwrap();
        // Part 1 stays in its reset default.
        assert_eq!(chain.part(1).active_instruction().name(), "BYPASS");

        chain.reset().unwrap();
        let base = sim.clocks();
        chain.shift_instructions().unwrap();
        // Idle->ShiftIR entry (4) + 12 opcode bits + UpdateIR/Idle exit (2).
        assert_eq!(sim.clocks() - base, 18);
        assert_eq!(chain.tap_state(), TapState::RunTestIdle);
        // Active instructions survive the shift.
        assert_eq!(chain.part(0).active_instruction().name(), "PEEK");
        assert_eq!(chain.part(1).active_instruction().name(), "BYPASS");
        // Mandatory 1149.1 capture pattern reads back per part.
        assert_eq!(chain.part(0).ir_capture().to_string(), "1000");
        assert_eq!(chain.part(1).ir_capture().to_string(), "10000000");

        let base = sim.clocks();
        chain.shift_data_registers(ExitMode::Idle).unwrap();
        // Idle->ShiftDR entry (3) + 32 DATA bits + 1 BYPASS bit + exit (2).
        assert_eq!(sim.clocks() - base, 38);
        assert_eq!(chain.tap_state(), TapState::RunTestIdle);
    }

    #[test]
    fn data_round_trips_through_simulated_parts() {
        let sim = two_part_sim();
        let mut chain = two_part_chain(&sim);
        chain.part_mut(0).set_instruction("PEEK").unwrap();
        chain.reset().unwrap();
        chain.shift_instructions().unwrap();

        let pattern = "10110011100011110000111110000001";
        chain
            .part_mut(0)
            .data_register_mut("DATA")
            .unwrap()
            .value
            .set_from_str(pattern)
            .unwrap();
        // First shift loads the device; its capture is the old contents.
        chain.shift_data_registers(ExitMode::Idle).unwrap();
        let stored: String = sim.with_device(0, |dev| {
            dev.custom_store
                .iter()
                .map(|&b| if b { '1' } else { '0' })
                .collect()
        });
        assert_eq!(stored, pattern);

        // Second shift reads it back and flags the change.
        chain.shift_data_registers(ExitMode::Idle).unwrap();
        let reg = chain.part(0).data_register("DATA").unwrap();
        assert_eq!(reg.value.to_string(), pattern);
        assert!(reg.changed());
    }

    #[test]
    fn pause_exit_holds_and_resumes_without_recapture() {
        let sim = two_part_sim();
        let mut chain = two_part_chain(&sim);
        chain.part_mut(0).set_instruction("PEEK").unwrap();
        chain.reset().unwrap();
        chain.shift_instructions().unwrap();

        chain.shift_data_registers(ExitMode::Pause).unwrap();
        assert_eq!(chain.tap_state(), TapState::PauseDr);

        // Resuming needs only Exit2-DR on the way back to Shift-DR.
        let base = sim.clocks();
        chain.shift_data_registers(ExitMode::Idle).unwrap();
        assert_eq!(sim.clocks() - base, 2 + 33 + 2);
        assert_eq!(chain.tap_state(), TapState::RunTestIdle);
    }

    #[test]
    fn detect_builds_parts_from_catalog() {
        let (a, b) = two_part_descriptions();
        let catalog = catalog_with(vec![a, b]);
        let sim = SimCable::new(vec![
            // Stepping differs from the catalog idcode; version is masked.
            SimDevice::new(4, Some(0xF002_1043), Some(("0101", 32))),
            SimDevice::new(8, Some(0x2004_2043), None),
        ]);
        let mut chain = Chain::new(Box::new(sim)).unwrap();

        assert_eq!(chain.detect_parts(&catalog).unwrap(), 2);
        assert_eq!(chain.parts().len(), 2);
        assert_eq!(chain.part(0).part_number(), "AC4");
        assert_eq!(chain.part(0).ir_length(), 4);
        assert_eq!(chain.part(1).part_number(), "AC8");
        assert_eq!(chain.part(1).ir_length(), 8);
        assert_eq!(chain.tap_state(), TapState::RunTestIdle);
    }

    #[test]
    fn detect_with_unknown_device_leaves_chain_empty() {
        let (a, _) = two_part_descriptions();
        let catalog = catalog_with(vec![a]);
        let sim = SimCable::new(vec![
            SimDevice::new(4, Some(0x1002_1043), None),
            // Not registered in the catalog.
            SimDevice::new(8, Some(0x2004_2043), None),
        ]);
        let mut chain = Chain::new(Box::new(sim)).unwrap();

        assert_eq!(chain.detect_parts(&catalog).unwrap(), 0);
        assert!(chain.parts().is_empty());
    }

    #[test]
    fn trst_pulse_resynchronizes_state() {
        let handle = Rc::new(RefCell::new(Loopback::new(1)));
        let mut chain = Chain::new(Box::new(Shared(handle))).unwrap();
        assert_eq!(chain.tap_state(), TapState::Unknown);
        chain.set_trst(true).unwrap();
        assert_eq!(chain.tap_state(), TapState::Unknown);
        chain.set_trst(false).unwrap();
        assert_eq!(chain.tap_state(), TapState::TestLogicReset);
    }
}
