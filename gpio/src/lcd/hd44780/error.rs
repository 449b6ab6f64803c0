use crate::GpioError;
use thiserror::Error;

/// Errors reported by the HD44780 driver.
///
/// Everything except [LcdError::ProtocolFault] is recoverable: the rejected operation left the
/// queue untouched and can be retried, or the input adjusted.
#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    #[error("row {0} does not exist (expected 0 or 1)")]
    InvalidRow(u8),
    #[error("shift direction {0} is not recognized (expected 0 for left or 1 for right)")]
    InvalidDirection(u8),
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("command queue is full")]
    QueueFull,
    #[error("protocol fault: {0}")]
    ProtocolFault(String),
    #[error("controller still busy after {polls} status reads")]
    HardwareTimeout { polls: u32 },
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
}

impl LcdError {
    /// Whether the error means the driver can no longer be trusted to keep the display in sync.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LcdError::ProtocolFault(_))
    }
}

pub type LcdResult<T> = Result<T, LcdError>;
