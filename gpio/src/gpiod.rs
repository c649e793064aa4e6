//! GpiodDriver implementation for driving output lines through the Linux GPIO character device.
use crate::{GpioDriver, GpioError, GpioOutput, GpioResult};
use bitvec::vec::BitVec;
use log::trace;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::AtomicU8;

/// GpiodDriver is a GPIO driver that uses the gpiod library to manage GPIO pins.
pub struct GpiodDriver {
    chip: gpiod::Chip,
    used_pins: BitVec<AtomicU8>,
}

impl GpiodDriver {
    pub fn new(chip: gpiod::Chip) -> Self {
        let n = chip.num_lines() as usize;
        let bits = BitVec::repeat(false, n);
        Self {
            chip,
            used_pins: bits,
        }
    }

    /// Opens the GPIO chip at the given path, e.g. `/dev/gpiochip0`.
    pub fn open(path: &str) -> GpioResult<Self> {
        Ok(Self::new(gpiod::Chip::new(path)?))
    }
}

impl Debug for GpiodDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "GpiodDriver({})", self.chip.name())
    }
}

impl GpioDriver for GpiodDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.chip.num_lines() as usize)
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        if index >= self.count()? {
            return Err(GpioError::InvalidArgument);
        }

        if self.used_pins[index] {
            return Err(GpioError::AlreadyInUse);
        }

        let line = self.chip.request_lines(
            gpiod::Options::output([index as u32]).consumer(env!("CARGO_PKG_NAME")),
        )?;
        line.set_values([false])?;

        self.used_pins.set_aliased(index, true);
        trace!("{:?} claimed pin {}", self, index);

        Ok(Box::new(GpiodOutput {
            driver: self,
            pin_index: index,
            line,
        }))
    }
}

struct GpiodOutput<'a> {
    driver: &'a GpiodDriver,
    pin_index: usize,
    line: gpiod::Lines<gpiod::Output>,
}

impl Debug for GpiodOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for GpiodOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        self.line.set_values([value])?;
        Ok(())
    }
}

impl Drop for GpiodOutput<'_> {
    fn drop(&mut self) {
        self.driver.used_pins.set_aliased(self.pin_index, false);
        trace!("{:?} released pin {}", self.driver, self.pin_index);
    }
}
