//! The shift engine: moves one `BitRegister` through the TAP while capturing
//! what falls out, one TCK at a time.  Entry into Capture/Shift and the exit
//! back to Update or Idle are the caller's job; this module only owns the
//! per-bit protocol.

use crate::cable::Cable;
use crate::error::Result;
use crate::register::BitRegister;
use crate::statemachine::TapController;

/// Shift `input` through the register the TAP currently has selected,
/// capturing TDO into `output` when one is supplied.  Bit 0 of `input` is the
/// first bit clocked; TDO is sampled before each rising edge, so `output[i]`
/// holds the bit that was falling out as `input[i]` went in.
///
/// With `exit` set, TMS is raised on the final bit and the TAP moves to
/// Exit1-DR/IR; otherwise it stays in Shift.  The caller must already have
/// driven the TAP to a Capture or Shift state.
///
/// Transport failures abort mid-shift with the TAP left wherever the last
/// successful clock put it; the caller must treat that as requiring a chain
/// reset.
pub fn shift_register(
    cable: &mut dyn Cable,
    tap: &mut TapController,
    input: &BitRegister,
    mut output: Option<&mut BitRegister>,
    exit: bool,
) -> Result<()> {
    if !tap.state().can_shift() {
        tracing::warn!(state = ?tap.state(), "shift_register outside Capture/Shift");
    }

    let len = input.len();
    for i in 0..len {
        if let Some(out) = output.as_deref_mut() {
            if i < out.len() {
                let bit = cable.tdo()?;
                out.set(i, bit);
            }
        }
        let tms = exit && i == len - 1;
        let tdi = input.get(i).unwrap_or(false);
        cable.clock(tms, tdi)?;
        tap.clock(tms);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cable::loopback::Loopback;
    use crate::statemachine::TapState;

    fn tap_in_shift_dr() -> TapController {
        let mut tap = TapController::new();
        tap.note_reset();
        for tms in [false, true, false, false] {
            tap.clock(tms);
        }
        assert_eq!(tap.state(), TapState::ShiftDr);
        tap
    }

    #[test]
    fn round_trip_through_delay_line() {
        // A loopback of length 4 behaves like one 4-bit register in the
        // chain: shifting 4 bits with exit captures its previous contents
        // (zeros), and a second shift captures the first pattern back.
        let mut cable = Loopback::new(4);
        let mut tap = tap_in_shift_dr();

        let pattern: BitRegister = "1011".parse().unwrap();
        let mut captured = BitRegister::new(4);
        shift_register(&mut cable, &mut tap, &pattern, Some(&mut captured), false).unwrap();
        assert_eq!(captured.to_string(), "0000");

        let zeros = BitRegister::new(4);
        shift_register(&mut cable, &mut tap, &zeros, Some(&mut captured), true).unwrap();
        assert_eq!(captured, pattern);
        assert_eq!(tap.state(), TapState::Exit1Dr);
    }

    #[test]
    fn exit_raises_tms_only_on_final_bit() {
        let mut cable = Loopback::new(1);
        let mut tap = tap_in_shift_dr();
        let pattern: BitRegister = "110".parse().unwrap();
        shift_register(&mut cable, &mut tap, &pattern, None, true).unwrap();
        let tms: Vec<bool> = cable.history().iter().map(|&(tms, _)| tms).collect();
        assert_eq!(tms, vec![false, false, true]);
        let tdi: Vec<bool> = cable.history().iter().map(|&(_, tdi)| tdi).collect();
        assert_eq!(tdi, vec![true, true, false]);
    }

    #[test]
    fn short_output_register_captures_prefix() {
        let mut cable = Loopback::new(1);
        let mut tap = tap_in_shift_dr();
        let pattern: BitRegister = "1111".parse().unwrap();
        let mut out = BitRegister::new(2);
        shift_register(&mut cable, &mut tap, &pattern, Some(&mut out), false).unwrap();
        // Initial zero, then the first input bit.
        assert_eq!(out.to_string(), "01");
    }
}
