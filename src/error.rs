//! Crate-wide error type.  Name lookups that callers routinely probe for
//! optional capabilities (`Part::instruction`, `Part::data_register`) return
//! `Option` instead and never produce an error.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A register string did not match the register it was parsed into.
    #[error("invalid register value {value:?} for a register of {len} bits")]
    InvalidFormat { value: String, len: usize },

    /// `set_instruction` was asked for a name the part does not define.
    #[error("part has no instruction {0:?}")]
    UnknownInstruction(String),

    /// An instruction is bound to a data register the part does not define.
    #[error("part has no data register {0:?}")]
    UnknownDataRegister(String),

    /// A boundary cell list is not a dense set of unique positions, or a
    /// control relation points outside it.
    #[error("boundary cell {cell:?} does not fit a {len}-bit boundary register")]
    InvalidBoundary { cell: String, len: usize },

    /// No boundary-scan bit binds the named signal in the required direction.
    #[error("part has no signal {0:?}")]
    UnknownSignal(String),

    /// `set_signal` on a capture-only (input) signal, or `get_signal` on a
    /// drive-only one.
    #[error("signal {0:?} cannot be used in that direction")]
    DirectionMismatch(String),

    /// Cable I/O failed mid-operation.  The TAP is left wherever the last
    /// successful clock put it; the chain must be reset before further use.
    #[error("cable transport failure: {0}")]
    Transport(String),

    /// Bus width probing found no chip responding at the address.
    #[error("no supported bus width at {0:#010x}")]
    UnsupportedWidth(u32),

    /// A bus target held its ready line deasserted for the whole polling
    /// window.  The chain itself is still healthy.
    #[error("bus target at {0:#010x} never reported ready")]
    BusNotReady(u32),

    /// A bus adapter was attached to a chain without a usable part.
    #[error("operation requires a chain with at least one detected part")]
    EmptyChain,
}
