//! Boundary-scan engine for JTAG chains, at a few levels of abstraction.
//! At the bottom is the `Cable` trait: one TCK cycle at a time against a
//! physical adapter (a GPIO bit-bang driver and a software loopback are
//! included; anything exposing clock/TDO/TRST can slot in).
//!
//! Above that, `TapController` models the 16-state IEEE 1149.1 TAP
//! controller plus an explicit `Unknown` state, tracks every clock and TRST
//! change, and plans shortest TMS paths between states.  The shift engine
//! moves `BitRegister` values through the selected register with capture.
//!
//! `Chain` ties it together for scan chains with multiple parts: it owns the
//! cable and the controller, composes every part's instruction or data
//! register into one combined shift (bypassed parts contribute their 1-bit
//! BYPASS register), redistributes the captured bits, and can detect the
//! chain by reading IDCODEs against a part catalog.  `Part` carries the
//! per-chip description: named instructions and data registers, the
//! boundary-scan bit table and signal bindings.
//!
//! On top of a chain, `BoundaryScanBus` turns EXTEST scans of a part's
//! address/data/strobe pins into memory bus read/write semantics for flash
//! and memory tools.
//!
//! # Example
//! ```
//! use jtag_bscan::cable::loopback::Loopback;
//! use jtag_bscan::chain::{Chain, ExitMode, PartCatalog};
//!
//! # fn main() -> jtag_bscan::error::Result<()> {
//! let cable = Loopback::new(1);
//! let mut chain = Chain::new(Box::new(cable))?;
//! chain.reset()?;
//!
//! let catalog = PartCatalog::new();
//! if chain.detect_parts(&catalog)? == 0 {
//!     // Nothing recognized: attach parts by hand or extend the catalog.
//!     // Shifts on an empty chain are still valid no-ops.
//! }
//! chain.shift_instructions()?;
//! chain.shift_data_registers(ExitMode::Idle)?;
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod cable;
pub mod chain;
pub mod error;
pub mod idcode;
pub mod part;
pub mod register;
pub mod shift;
pub mod statemachine;
