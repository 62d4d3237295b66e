//! Bit-banged cable over four (optionally five) GPIO lines via `embedded-hal`
//! pin traits.  Slow but universal; useful on SBCs with exposed headers.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

use crate::cable::Cable;
use crate::error::{Error, Result};

pub struct Gpio<Clk, Tdi, Tdo, Tms, Trst, Delay>
where
    Clk: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Tms: OutputPin,
    Trst: OutputPin,
    Delay: DelayNs,
{
    half_period: u32,
    delay: Delay,
    clock: Clk,
    tdi: Tdi,
    tdo: Tdo,
    tms: Tms,
    // TRST is active low on the wire.
    trst: Option<Trst>,
    trst_state: bool,
}

fn pin_err<E: core::fmt::Debug>(e: E) -> Error {
    Error::Transport(format!("gpio pin: {e:?}"))
}

impl<Clk, Tdi, Tdo, Tms, Trst, Delay> Gpio<Clk, Tdi, Tdo, Tms, Trst, Delay>
where
    Clk: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Tms: OutputPin,
    Trst: OutputPin,
    Delay: DelayNs,
{
    pub fn new(
        freq_khz: u32,
        clock: Clk,
        tdi: Tdi,
        tdo: Tdo,
        tms: Tms,
        trst: Option<Trst>,
        delay: Delay,
    ) -> Self {
        let period_ns = 1_000_000 / freq_khz;
        let half_period = period_ns / 2;
        Gpio {
            half_period,
            clock,
            tdi,
            tdo,
            tms,
            trst,
            trst_state: false,
            delay,
        }
    }
}

impl<Clk, Tdi, Tdo, Tms, Trst, Delay> Cable for Gpio<Clk, Tdi, Tdo, Tms, Trst, Delay>
where
    Clk: OutputPin,
    Tdi: OutputPin,
    Tdo: InputPin,
    Tms: OutputPin,
    Trst: OutputPin,
    Delay: DelayNs,
{
    fn init(&mut self) -> Result<()> {
        // Clock idles low; release TRST if wired.
        self.clock.set_low().map_err(pin_err)?;
        if let Some(trst) = self.trst.as_mut() {
            trst.set_high().map_err(pin_err)?;
        }
        Ok(())
    }

    fn clock(&mut self, tms: bool, tdi: bool) -> Result<()> {
        self.tms.set_state(PinState::from(tms)).map_err(pin_err)?;
        self.tdi.set_state(PinState::from(tdi)).map_err(pin_err)?;
        self.clock.set_high().map_err(pin_err)?;
        self.delay.delay_ns(self.half_period);
        self.clock.set_low().map_err(pin_err)?;
        self.delay.delay_ns(self.half_period);
        Ok(())
    }

    fn tdo(&mut self) -> Result<bool> {
        self.tdo.is_high().map_err(pin_err)
    }

    fn set_trst(&mut self, assert: bool) -> Result<bool> {
        if let Some(trst) = self.trst.as_mut() {
            trst.set_state(PinState::from(!assert)).map_err(pin_err)?;
        }
        self.trst_state = assert;
        Ok(assert)
    }

    fn trst(&mut self) -> Option<bool> {
        self.trst.as_ref().map(|_| self.trst_state)
    }
}
