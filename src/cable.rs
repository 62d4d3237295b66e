//! Physical link drivers live here.  Hardware adapters implement the `Cable`
//! trait; the core consumes it one TCK cycle at a time and never batches, so
//! TAP state tracking stays exact.
pub mod gpio;
pub mod loopback;
pub mod sim;

use crate::error::Result;

pub trait Cable {
    /// Bring the adapter to a usable state.  Called once by `Chain::new`.
    fn init(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the adapter.  Called on chain teardown.
    fn done(&mut self) {}

    /// Drive one full TCK cycle with the given TMS and TDI values.  TDO must
    /// be sampled with `tdo` before calling this for the cycle whose value is
    /// wanted.
    fn clock(&mut self, tms: bool, tdi: bool) -> Result<()>;

    /// Sample the TDO line as it stands before the next rising edge.
    fn tdo(&mut self) -> Result<bool>;

    /// Drive the optional TRST line.  Returns the value actually applied;
    /// adapters without a TRST wire return the requested value and the
    /// controller tracks it purely in software.
    fn set_trst(&mut self, assert: bool) -> Result<bool> {
        Ok(assert)
    }

    /// Sense the TRST line.  `None` when the adapter cannot read it back.
    fn trst(&mut self) -> Option<bool> {
        None
    }
}
