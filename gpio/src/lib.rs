pub mod delay;
pub mod gpiod;
pub mod lcd;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod soft;
pub mod sysfs;

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

/// A source of output lines, such as a GPIO chip.
///
/// This is the only capability the LCD driver needs from the platform: claim a pin by its number
/// and set its level. Claiming configures the pin as an output driven low. The pin stays claimed
/// until the returned [GpioOutput] is dropped.
pub trait GpioDriver: Debug {
    /// Gets the amount of GPIO pins available.
    fn count(&self) -> GpioResult<usize>;

    /// Claims the GPIO pin at the given index as an output.
    ///
    /// # Errors
    /// - `GpioError::InvalidArgument` if the index is out of range.
    /// - `GpioError::AlreadyInUse` if the pin is already claimed.
    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>>;
}

pub trait GpioOutput: Debug + Send {
    /// Writes the state of the GPIO pin.
    fn write(&self, value: bool) -> GpioResult<()>;
}

pub trait GpioBusOutput<const N: usize>: Debug + Send {
    fn write(&self, values: &[bool; N]) -> GpioResult<()>;
}

impl dyn GpioBusOutput<4> + '_ {
    /// Writes the values to the GPIO pins in the bus.
    /// The values are written as a nibble, LSb first, so bit 3 lands on the last pin of the bus.
    pub fn write_nibble(&self, value: u8) -> GpioResult<()> {
        if value > 0b1111 {
            return Err(GpioError::InvalidArgument);
        }

        let mut values = [false; 4];
        for (i, bit) in values.iter_mut().enumerate() {
            *bit = (value & (1 << i)) != 0;
        }
        self.write(&values)
    }
}
