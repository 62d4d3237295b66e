//! The IEEE 1149.1 TAP controller model.  `TapState` is the pure automaton:
//! 16 architectural states plus `Unknown`, advanced one TMS bit at a time.
//! `TapController` wraps it with TRST semantics and a TMS path planner, and is
//! owned by a `Chain` so two chains in one process never share controller
//! state.

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TapState {
    /// State cannot be trusted.  Entered at construction and on TRST
    /// assertion; only a TMS reset sequence (or TRST release) leaves it.
    Unknown,
    TestLogicReset,
    RunTestIdle,
    SelectDrScan,
    CaptureDr,
    ShiftDr,
    Exit1Dr,
    PauseDr,
    Exit2Dr,
    UpdateDr,
    SelectIrScan,
    CaptureIr,
    ShiftIr,
    Exit1Ir,
    PauseIr,
    Exit2Ir,
    UpdateIr,
}

impl TapState {
    /// The canonical 1149.1 transition table.  `Unknown` never guesses: both
    /// TMS values keep it `Unknown`.
    pub fn step(self, tms: bool) -> TapState {
        use TapState::*;
        if tms {
            match self {
                TestLogicReset => TestLogicReset,
                RunTestIdle | UpdateDr | UpdateIr => SelectDrScan,
                SelectDrScan => SelectIrScan,
                CaptureDr | ShiftDr => Exit1Dr,
                Exit1Dr | Exit2Dr => UpdateDr,
                PauseDr => Exit2Dr,
                SelectIrScan => TestLogicReset,
                CaptureIr | ShiftIr => Exit1Ir,
                Exit1Ir | Exit2Ir => UpdateIr,
                PauseIr => Exit2Ir,
                Unknown => Unknown,
            }
        } else {
            match self {
                TestLogicReset | RunTestIdle | UpdateDr | UpdateIr => RunTestIdle,
                SelectDrScan => CaptureDr,
                CaptureDr | ShiftDr | Exit2Dr => ShiftDr,
                Exit1Dr | PauseDr => PauseDr,
                SelectIrScan => CaptureIr,
                CaptureIr | ShiftIr | Exit2Ir => ShiftIr,
                Exit1Ir | PauseIr => PauseIr,
                Unknown => Unknown,
            }
        }
    }

    /// True in the states from which a register shift may begin.
    pub fn can_shift(self) -> bool {
        use TapState::*;
        matches!(self, CaptureDr | ShiftDr | CaptureIr | ShiftIr)
    }
}

/// Tracks the controller state for one physical TAP, including the software
/// view of TRST.  All mutation goes through `clock` and `set_trst`.
pub struct TapController {
    state: TapState,
    trst: bool,
    tms_high_run: usize,
}

impl Default for TapController {
    fn default() -> Self {
        Self::new()
    }
}

impl TapController {
    /// A fresh controller: state unknown, TRST deasserted.
    pub fn new() -> Self {
        Self {
            state: TapState::Unknown,
            trst: false,
            tms_high_run: 0,
        }
    }

    pub fn state(&self) -> TapState {
        self.state
    }

    /// Advance one TCK cycle with the given TMS value.  Five consecutive
    /// TMS-high clocks land every TAP in Test-Logic-Reset, so the controller
    /// counts them and recovers from `Unknown` on the fifth.
    pub fn clock(&mut self, tms: bool) -> TapState {
        self.tms_high_run = if tms { self.tms_high_run + 1 } else { 0 };
        let next = if self.tms_high_run >= 5 {
            TapState::TestLogicReset
        } else {
            self.state.step(tms)
        };
        tracing::trace!(tms, from = ?self.state, to = ?next, "tap clock");
        self.state = next;
        next
    }

    /// Record a TRST line change.  Asserting from deasserted forces
    /// `Unknown`: the chip resets asynchronously and any TMS sequence in
    /// flight is void.  Deasserting from asserted forces `TestLogicReset`,
    /// which the chip guarantees on release.  Idempotent when the value does
    /// not change.
    pub fn set_trst(&mut self, assert: bool) -> TapState {
        if assert != self.trst {
            self.state = if assert {
                TapState::Unknown
            } else {
                TapState::TestLogicReset
            };
            self.trst = assert;
            self.tms_high_run = 0;
        }
        self.state
    }

    pub fn trst(&self) -> bool {
        self.trst
    }

    /// Note that a full TMS reset sequence (5 or more TMS=1 clocks) has been
    /// driven on the wire, which lands any TAP in Test-Logic-Reset.
    pub fn note_reset(&mut self) {
        self.state = TapState::TestLogicReset;
    }

    /// Invalidate the tracked state, e.g. after a transport failure left the
    /// wire in an unobserved condition.
    pub fn invalidate(&mut self) {
        self.state = TapState::Unknown;
        self.tms_high_run = 0;
    }

    /// Shortest TMS sequence from the current state to `target`, found by
    /// breadth-first search over the transition table.  Empty when already
    /// there; `None` when the current state is unknown (drive a reset first)
    /// or the target is `Unknown`.
    pub fn tms_path_to(&self, target: TapState) -> Option<Vec<bool>> {
        if self.state == TapState::Unknown || target == TapState::Unknown {
            return None;
        }
        if self.state == target {
            return Some(Vec::new());
        }

        let mut frontier: Vec<(TapState, Vec<bool>)> = vec![(self.state, Vec::new())];
        // All 16 architectural states are mutually reachable within 8 clocks.
        for _ in 0..8 {
            let mut next_frontier = Vec::new();
            for (state, path) in frontier {
                for tms in [false, true] {
                    let next = state.step(tms);
                    let mut p = path.clone();
                    p.push(tms);
                    if next == target {
                        return Some(p);
                    }
                    next_frontier.push((next, p));
                }
            }
            frontier = next_frontier;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use TapState::*;

    const ALL_STATES: [TapState; 17] = [
        Unknown,
        TestLogicReset,
        RunTestIdle,
        SelectDrScan,
        CaptureDr,
        ShiftDr,
        Exit1Dr,
        PauseDr,
        Exit2Dr,
        UpdateDr,
        SelectIrScan,
        CaptureIr,
        ShiftIr,
        Exit1Ir,
        PauseIr,
        Exit2Ir,
        UpdateIr,
    ];

    #[test]
    fn dr_column_walk() {
        // TLR -0-> Idle -1-> SelectDR -0-> CaptureDR -1-> Exit1DR -1->
        // UpdateDR -1-> SelectDR -1-> SelectIR -0-> CaptureIR
        let mut state = TestLogicReset;
        let steps = [
            (false, RunTestIdle),
            (true, SelectDrScan),
            (false, CaptureDr),
            (true, Exit1Dr),
            (true, UpdateDr),
            (true, SelectDrScan),
            (true, SelectIrScan),
            (false, CaptureIr),
        ];
        for (tms, expect) in steps {
            state = state.step(tms);
            assert_eq!(state, expect);
        }
    }

    #[test]
    fn shift_states_hold_on_tms_low() {
        assert_eq!(ShiftDr.step(false), ShiftDr);
        assert_eq!(ShiftIr.step(false), ShiftIr);
        assert_eq!(CaptureDr.step(false), ShiftDr);
        assert_eq!(CaptureIr.step(false), ShiftIr);
    }

    #[test]
    fn five_tms_highs_reset_from_anywhere() {
        for start in ALL_STATES {
            if start == Unknown {
                continue;
            }
            let mut state = start;
            for _ in 0..5 {
                state = state.step(true);
            }
            assert_eq!(state, TestLogicReset, "from {start:?}");
            assert_eq!(state.step(false), RunTestIdle);
        }
    }

    #[test]
    fn unknown_never_guesses() {
        assert_eq!(Unknown.step(false), Unknown);
        assert_eq!(Unknown.step(true), Unknown);
    }

    #[test]
    fn five_highs_recover_the_controller_from_unknown() {
        let mut tap = TapController::new();
        for _ in 0..4 {
            assert_eq!(tap.clock(true), Unknown);
        }
        assert_eq!(tap.clock(true), TestLogicReset);
        assert_eq!(tap.clock(false), RunTestIdle);

        // A low clock restarts the count.
        let mut tap = TapController::new();
        for _ in 0..3 {
            tap.clock(true);
        }
        tap.clock(false);
        for _ in 0..4 {
            assert_eq!(tap.clock(true), Unknown);
        }
        assert_eq!(tap.clock(true), TestLogicReset);
    }

    #[test]
    fn trst_pulse_forces_reset() {
        for start in ALL_STATES {
            let mut tap = TapController::new();
            tap.state = start;
            assert_eq!(tap.set_trst(true), Unknown);
            // Idempotent while held.
            assert_eq!(tap.set_trst(true), Unknown);
            assert_eq!(tap.set_trst(false), TestLogicReset);
            assert_eq!(tap.set_trst(false), TestLogicReset);
        }
    }

    #[test]
    fn path_planner_is_exact_for_known_routes() {
        let mut tap = TapController::new();
        tap.note_reset();
        // TLR -> ShiftDR is 0,1,0,0.
        let path = tap.tms_path_to(ShiftDr).unwrap();
        assert_eq!(path, vec![false, true, false, false]);
        for tms in path {
            tap.clock(tms);
        }
        assert_eq!(tap.state(), ShiftDr);
        // Already there: empty path.
        assert_eq!(tap.tms_path_to(ShiftDr).unwrap(), Vec::<bool>::new());
    }

    #[test]
    fn path_planner_reaches_every_state() {
        for start in ALL_STATES {
            for target in ALL_STATES {
                if start == Unknown || target == Unknown {
                    continue;
                }
                let mut tap = TapController::new();
                tap.state = start;
                let path = tap.tms_path_to(target).unwrap();
                for tms in path {
                    tap.clock(tms);
                }
                assert_eq!(tap.state(), target, "{start:?} -> {target:?}");
            }
        }
    }

    #[test]
    fn path_planner_refuses_unknown() {
        let tap = TapController::new();
        assert!(tap.tms_path_to(RunTestIdle).is_none());
        let mut tap = TapController::new();
        tap.note_reset();
        assert!(tap.tms_path_to(Unknown).is_none());
    }
}
