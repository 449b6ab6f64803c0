//! GPIO abstraction and a queued HD44780 character LCD driver built on top of it.
//!
//! The [GpioDriver], [GpioPin] and [GpioBus] traits describe the pins the driver needs; the
//! [gpiod] module implements them for the Linux GPIO character device. The LCD itself lives in
//! [lcd::hd44780].
pub mod gpiod;
pub mod lcd;

use bitvec::prelude::*;
use std::fmt::Debug;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum GpioError {
    #[error("pin already in use")]
    AlreadyInUse,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("the feature is not supported on this backend")]
    NotSupported,
    #[error("data lines are not configured for this transfer direction")]
    WrongDirection,
    #[error("IO error: {0}")]
    Io(std::io::ErrorKind),
    #[error("error: {0}")]
    Other(String),
}

impl From<std::io::Error> for GpioError {
    fn from(err: std::io::Error) -> Self {
        GpioError::Io(err.kind())
    }
}

pub type GpioResult<T> = Result<T, GpioError>;

pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO lines available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index.
    fn get_pin(&self, index: usize) -> GpioResult<Box<dyn GpioPin + '_>>;

    /// Claims the GPIO pins at the given indices as a single bus.
    ///
    /// Index `0` of the bus is the least significant bit.
    fn get_pin_bus<const N: usize>(
        &self,
        indices: [usize; N],
    ) -> GpioResult<Box<dyn GpioBus<N> + '_>>;
}

/// Specifies the active level of a GPIO line.
///
/// By default, the active level is high.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioActiveLevel {
    #[default] High,
    Low,
}

impl GpioActiveLevel {
    /// Gets the physical state of the line for the given logical value.
    pub fn get_state(&self, value: bool) -> bool {
        match self {
            GpioActiveLevel::High => value,
            GpioActiveLevel::Low => !value,
        }
    }
}

/// Specifies the bias of a GPIO line.
///
/// The HD44780 data lines are read with pull-ups enabled, so a disconnected display reads as
/// permanently busy instead of permanently ready.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum GpioBias {
    #[default] None,
    PullUp,
    PullDown,
}

pub trait GpioPin: Debug {
    /// Sets the GPIO pin function to input, allowing reading its state.
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioInput + '_>>;
    /// Sets the GPIO pin function to output, allowing writing its state.
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioOutput + '_>>;

    fn active_level(&self) -> GpioActiveLevel {
        GpioActiveLevel::High
    }
    /// Sets the active level of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the backend cannot invert the line.
    fn set_active_level(&mut self, _level: GpioActiveLevel) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }

    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    /// Sets the bias of the GPIO pin.
    ///
    /// # Errors
    /// - `GpioError::NotSupported` if the backend has no configurable bias.
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioInput: Debug {
    /// Reads the state of the GPIO pin.
    fn read(&self) -> GpioResult<bool>;
}

pub trait GpioOutput: Debug {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBus<const N: usize>: Debug {
    fn as_input(&mut self) -> GpioResult<Box<dyn GpioBusInput<N> + '_>>;
    fn as_output(&mut self) -> GpioResult<Box<dyn GpioBusOutput<N> + '_>>;

    fn bias(&self) -> GpioBias {
        GpioBias::None
    }
    fn set_bias(&mut self, _bias: GpioBias) -> GpioResult<()> {
        Err(GpioError::NotSupported)
    }
}

pub trait GpioBusInput<const N: usize>: Debug {
    fn read(&self) -> GpioResult<[bool; N]>;
}

impl dyn GpioBusInput<4> + '_ {
    /// Reads the values of the GPIO pins in the bus.
    /// Returns them as a nibble, LSb first.
    pub fn read_nibble(&self) -> GpioResult<u8> {
        let values = self.read()?;
        let mut bits = bitarr!(u8, Lsb0; 0; 8);
        for (i, value) in values.into_iter().enumerate() {
            bits.set(i, value);
        }
        Ok(bits.load::<u8>())
    }
}

pub trait GpioBusOutput<const N: usize>: Debug {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (slot, bit) in values.iter_mut().zip(value.view_bits::<Lsb0>().iter().by_vals()) {
            *slot = bit;
        }
        self.write(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, Default)]
    struct LatchBus {
        lines: Cell<[bool; 4]>,
    }

    impl GpioBusOutput<4> for LatchBus {
        fn write(&self, values: &[bool; 4]) -> GpioResult<()> {
            self.lines.set(*values);
            Ok(())
        }
    }

    impl GpioBusInput<4> for LatchBus {
        fn read(&self) -> GpioResult<[bool; 4]> {
            Ok(self.lines.get())
        }
    }

    #[test]
    fn nibble_is_written_lsb_first() {
        let bus = LatchBus::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        output.write_nibble(0b0011).unwrap();
        assert_eq!(bus.lines.get(), [true, true, false, false]);
    }

    #[test]
    fn nibble_read_matches_written_lines() {
        let bus = LatchBus::default();
        bus.lines.set([false, true, false, true]);
        let input: &dyn GpioBusInput<4> = &bus;
        assert_eq!(input.read_nibble().unwrap(), 0b1010);
    }

    #[test]
    fn nibble_out_of_range_is_rejected() {
        let bus = LatchBus::default();
        let output: &dyn GpioBusOutput<4> = &bus;
        assert_eq!(output.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert_eq!(bus.lines.get(), [false; 4]);
    }

    #[test]
    fn active_low_inverts_state() {
        assert!(GpioActiveLevel::Low.get_state(false));
        assert!(!GpioActiveLevel::Low.get_state(true));
        assert!(GpioActiveLevel::High.get_state(true));
    }
}
