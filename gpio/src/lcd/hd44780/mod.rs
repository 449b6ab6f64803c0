//! HD44780 LCD module, driven over a 4-bit parallel bus.
//!
//! Display operations are not written to the bus directly. They are encoded into HD44780
//! instructions ([instr]), put on a bounded [queue::CommandQueue] and transmitted one at a time
//! by [driver::QueuedHD44780Driver::update], which only touches the bus once the controller
//! reports it is no longer busy. Call `update` from the main loop as often as possible.
//!
//! # Sources
//!
//! - Hitachi, [“HD44780U (LCD-II) Dot Matrix Liquid Crystal Display Controller/Driver,”](https://www.sparkfun.com/datasheets/LCD/HD44780.pdf)
//!   1998.

pub mod driver;
pub mod instr;
pub mod queue;
mod error;

pub use error::*;
