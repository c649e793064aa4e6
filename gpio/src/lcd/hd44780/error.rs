use crate::GpioError;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq, Clone)]
pub enum LcdError {
    /// The output lines could not be claimed or configured. The display was never brought up.
    #[error("LCD setup failed: {0}")]
    Setup(#[source] GpioError),
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("unsupported operation: {0:#04x}")]
    UnsupportedOperation(u8),
    /// A line write failed in the middle of a command.
    #[error("GPIO error: {0}")]
    Gpio(#[from] GpioError),
    #[error("the display lock was poisoned")]
    Poisoned,
}

pub type LcdResult<T> = Result<T, LcdError>;
