//! HD44780 driver module.
//!
//! [HD44780Interface] is everything the driver needs from the hardware: the 4-bit data lines,
//! the RS, RW and E control lines, and a delay. [GpioHD44780Interface] implements it on top of
//! [crate::GpioOutput] pins and a [crate::GpioBus], [SimulatedHD44780] implements it in memory.
//! [QueuedHD44780Driver] is the driver itself.

mod gpio;
mod queued;
mod sim;

use crate::GpioResult;
use log::trace;
use std::fmt::Debug;
use std::time::Duration;

pub use gpio::*;
pub use queued::*;
pub use sim::*;

pub use crate::lcd::hd44780::instr::ShiftDirection;

/// Primitive bus operations of a 4-bit HD44780 interface.
///
/// The required methods map one-to-one onto control line and data line changes. The provided
/// methods combine them into the three transfers the driver uses: a status read, a byte write
/// and a single-nibble write during the power-on sequence.
pub trait HD44780Interface: Debug {
    /// Drives D4-D7 with the low four bits of `nibble`. The data lines must be outputs.
    fn write_nibble(&mut self, nibble: u8) -> GpioResult<()>;

    /// Raises E, samples D4-D7 and lowers E again. The data lines must be inputs.
    fn read_nibble(&mut self) -> GpioResult<u8>;

    fn set_data_lines_output(&mut self) -> GpioResult<()>;

    fn set_data_lines_input(&mut self) -> GpioResult<()>;

    /// Sets RS: high selects the data register, low the instruction register.
    fn set_register_select(&mut self, high: bool) -> GpioResult<()>;

    /// Sets RW: high reads from the controller, low writes to it.
    fn set_read_write(&mut self, read: bool) -> GpioResult<()>;

    /// Pulses E high then low, latching the nibble on the data lines.
    fn pulse_enable(&mut self) -> GpioResult<()>;

    /// Blocks for `duration`.
    fn delay(&mut self, duration: Duration);

    /// Reads the busy flag and address counter as one byte, high nibble first.
    ///
    /// Leaves RW low and the data lines as inputs.
    fn read_status(&mut self) -> GpioResult<u8> {
        self.set_data_lines_input()?;
        self.set_register_select(false)?;
        self.set_read_write(true)?;
        let high = self.read_nibble()?;
        let low = self.read_nibble()?;
        self.set_read_write(false)?;

        let status = (high << 4) | (low & 0x0F);
        trace!("Read status: {:08b}", status);
        Ok(status)
    }

    /// Writes a whole byte as two nibbles, high nibble first.
    fn write_byte(&mut self, byte: u8, rs: bool) -> GpioResult<()> {
        trace!("Sending byte: {:08b}, RS: {}", byte, rs);
        self.set_register_select(rs)?;
        self.set_read_write(false)?;
        self.set_data_lines_output()?;

        self.write_nibble(byte >> 4)?;
        self.pulse_enable()?;
        self.write_nibble(byte & 0x0F)?;
        self.pulse_enable()
    }

    /// Writes a single instruction nibble. Only meaningful while the controller may still be
    /// in 8-bit mode, during power-on.
    fn write_init_nibble(&mut self, nibble: u8) -> GpioResult<()> {
        trace!("Sending init nibble: {:04b}", nibble);
        self.set_register_select(false)?;
        self.set_read_write(false)?;
        self.set_data_lines_output()?;
        self.write_nibble(nibble)?;
        self.pulse_enable()
    }
}

/// Settings for [QueuedHD44780Driver::init].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HD44780Config {
    /// Two-line mode (rows at DDRAM `0x00` and `0x40`).
    pub two_lines: bool,
    /// 5x10 dot font. Only available in one-line mode.
    pub font_5x10: bool,
    /// Show the underline cursor after initialization.
    pub cursor_on: bool,
    /// Blink the cursor cell after initialization.
    pub blink_on: bool,
    /// Time for the supply to settle before the first bus access.
    pub power_on_delay: Duration,
    /// Maximum status reads while waiting for a blocking instruction to finish.
    pub busy_poll_limit: u32,
    /// Pause between two status reads of a blocking wait.
    pub busy_poll_interval: Duration,
}

impl Default for HD44780Config {
    fn default() -> Self {
        HD44780Config {
            two_lines: true,
            font_5x10: false,
            cursor_on: true,
            blink_on: true,
            power_on_delay: Duration::from_millis(50),
            busy_poll_limit: 10_000,
            busy_poll_interval: Duration::from_micros(10),
        }
    }
}

impl HD44780Config {
    pub fn with_two_lines(mut self, two_lines: bool) -> Self {
        self.two_lines = two_lines;
        self
    }

    pub fn with_font_5x10(mut self, font_5x10: bool) -> Self {
        self.font_5x10 = font_5x10;
        self
    }

    pub fn with_cursor(mut self, cursor_on: bool, blink_on: bool) -> Self {
        self.cursor_on = cursor_on;
        self.blink_on = blink_on;
        self
    }

    pub fn with_power_on_delay(mut self, delay: Duration) -> Self {
        self.power_on_delay = delay;
        self
    }

    pub fn with_busy_poll(mut self, limit: u32, interval: Duration) -> Self {
        self.busy_poll_limit = limit;
        self.busy_poll_interval = interval;
        self
    }
}
