//! Memory-bus semantics over boundary-scan shifts.  A `BoundaryScanBus`
//! drives a part's address, data and strobe pins through EXTEST DR scans and
//! turns the captured pins back into words, so flash and memory tools can
//! issue plain read/write calls.
//!
//! Each DR scan captures the pins before the update applies newly staged
//! values, which is what makes pipelined burst reads possible: staging the
//! next address and capturing the previous data share one shift.  It also
//! means the capture replaces everything staged in the BSR, so every cycle
//! restages the complete set of bus lines rather than a delta.

use crate::chain::{Chain, ExitMode};
use crate::error::{Error, Result};
use crate::part::Part;

/// Bus widths a boundary-scan bus can expose.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BusWidth {
    W8,
    W16,
    W32,
}

impl BusWidth {
    pub fn bits(self) -> usize {
        match self {
            BusWidth::W8 => 8,
            BusWidth::W16 => 16,
            BusWidth::W32 => 32,
        }
    }
}

/// Address/data/strobe bus operations exposed to higher layers.
pub trait Bus {
    /// Probe the bus width at `addr`.
    fn width(&mut self, addr: u32) -> Result<BusWidth>;
    /// Single read cycle.
    fn read(&mut self, addr: u32) -> Result<u32>;
    /// Single write cycle.
    fn write(&mut self, addr: u32, value: u32) -> Result<()>;
    /// Begin a burst read at `addr`; the first data word arrives from the
    /// next `read_next` or `read_end`.
    fn read_start(&mut self, addr: u32) -> Result<()>;
    /// Stage the next address and return the word captured for the previous
    /// one (one-cycle latency).
    fn read_next(&mut self, addr: u32) -> Result<u32>;
    /// Finish the burst: deselect the chip and return the final word.
    fn read_end(&mut self) -> Result<u32>;
}

/// Signal names wiring a part's boundary cells to a memory bus.  Address and
/// data line lists are LSB first; strobes are active low.
#[derive(Clone, Debug)]
pub struct BusConfig {
    pub address: Vec<String>,
    pub data: Vec<String>,
    pub ncs: String,
    pub noe: String,
    pub nwe: String,
    /// Ready line for targets that insert wait states; polled after each
    /// read cycle when present.
    pub rdy: Option<String>,
}

/// Cycles to re-sample a configured ready line before giving up.
const MAX_WAIT_POLLS: usize = 64;

pub struct BoundaryScanBus<'a> {
    chain: &'a mut Chain,
    config: BusConfig,
}

impl<'a> BoundaryScanBus<'a> {
    /// Attach to the chain's active part: selects EXTEST there (the other
    /// parts stay bypassed) and loads the instruction column.
    pub fn new(chain: &'a mut Chain, config: BusConfig) -> Result<Self> {
        if chain.parts().is_empty() {
            return Err(Error::EmptyChain);
        }
        let active = chain.active_part();
        chain.part_mut(active).set_instruction("EXTEST")?;
        chain.shift_instructions()?;
        Ok(Self { chain, config })
    }

    fn part(&self) -> &Part {
        self.chain.part(self.chain.active_part())
    }

    /// Stage the full set of bus lines for a read cycle: address applied,
    /// data drivers floated, strobes at the given (active-low) levels.
    fn stage_read_lines(&mut self, addr: u32, ncs: bool, noe: bool) -> Result<()> {
        let index = self.chain.active_part();
        let part = self.chain.part_mut(index);
        for (i, name) in self.config.address.iter().enumerate() {
            part.set_signal(name, (addr >> i) & 1 == 1)?;
        }
        for name in &self.config.data {
            part.release_signal(name)?;
        }
        part.set_signal(&self.config.ncs, ncs)?;
        part.set_signal(&self.config.noe, noe)?;
        part.set_signal(&self.config.nwe, true)?;
        Ok(())
    }

    /// Stage a write cycle: address and data driven, nOE held off, nWE at
    /// the given level.
    fn stage_write_lines(&mut self, addr: u32, value: u32, nwe: bool) -> Result<()> {
        let index = self.chain.active_part();
        let part = self.chain.part_mut(index);
        for (i, name) in self.config.address.iter().enumerate() {
            part.set_signal(name, (addr >> i) & 1 == 1)?;
        }
        for (i, name) in self.config.data.iter().enumerate() {
            part.set_signal(name, (value >> i) & 1 == 1)?;
        }
        part.set_signal(&self.config.ncs, false)?;
        part.set_signal(&self.config.noe, true)?;
        part.set_signal(&self.config.nwe, nwe)?;
        Ok(())
    }

    fn scan(&mut self) -> Result<()> {
        self.chain.shift_data_registers(ExitMode::Idle)
    }

    /// Assemble the captured data pins into a word.
    fn captured_word(&self) -> Result<u32> {
        let part = self.part();
        let mut word = 0u32;
        for (i, name) in self.config.data.iter().enumerate() {
            if part.get_signal(name)? {
                word |= 1 << i;
            }
        }
        Ok(word)
    }

    /// Re-sample until the ready line reports done.  Every DR scan replaces
    /// the staged BSR contents with the capture, so each poll restages the
    /// whole read cycle before scanning again.
    fn wait_ready(&mut self, addr: u32, ncs: bool, noe: bool) -> Result<()> {
        let Some(rdy) = self.config.rdy.clone() else {
            return Ok(());
        };
        for _ in 0..MAX_WAIT_POLLS {
            if self.part().get_signal(&rdy)? {
                return Ok(());
            }
            tracing::trace!("bus not ready, re-sampling");
            self.stage_read_lines(addr, ncs, noe)?;
            self.scan()?;
        }
        Err(Error::BusNotReady(addr))
    }
}

impl Bus for BoundaryScanBus<'_> {
    /// Width is dictated by the configured data lines; anything other than
    /// a byte/halfword/word wiring means no chip answers at this address.
    fn width(&mut self, addr: u32) -> Result<BusWidth> {
        match self.config.data.len() {
            8 => Ok(BusWidth::W8),
            16 => Ok(BusWidth::W16),
            32 => Ok(BusWidth::W32),
            _ => Err(Error::UnsupportedWidth(addr)),
        }
    }

    fn read(&mut self, addr: u32) -> Result<u32> {
        self.read_start(addr)?;
        self.read_end()
    }

    fn write(&mut self, addr: u32, value: u32) -> Result<()> {
        tracing::debug!("bus write {addr:#010x} <- {value:#x}");
        self.stage_write_lines(addr, value, true)?;
        self.scan()?;
        // Strobe nWE low, then release it.
        self.stage_write_lines(addr, value, false)?;
        self.scan()?;
        self.stage_write_lines(addr, value, true)?;
        self.scan()
    }

    fn read_start(&mut self, addr: u32) -> Result<()> {
        tracing::debug!("bus read start at {addr:#010x}");
        self.stage_read_lines(addr, false, false)?;
        self.scan()
    }

    fn read_next(&mut self, addr: u32) -> Result<u32> {
        self.stage_read_lines(addr, false, false)?;
        self.scan()?;
        self.wait_ready(addr, false, false)?;
        self.captured_word()
    }

    fn read_end(&mut self) -> Result<u32> {
        // Capture happens before the deselect applies, so this scan still
        // observes the last selected word.
        self.stage_read_lines(0, true, true)?;
        self.scan()?;
        self.wait_ready(0, true, true)?;
        self.captured_word()
    }
}
