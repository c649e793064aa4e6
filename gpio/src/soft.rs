use crate::{GpioBusOutput, GpioOutput, GpioResult};
use std::fmt::Debug;

/// A bus made of individually claimed output pins, written one pin at a time.
///
/// The pins are not updated atomically, so consumers must not rely on the bus lines changing
/// together. The HD44780 latches on the falling edge of E, which makes that fine for the LCD.
pub struct SoftGpioBusOutput<'a, const N: usize> {
    pins: [Box<dyn GpioOutput + 'a>; N],
}

impl<'a, const N: usize> SoftGpioBusOutput<'a, N> {
    pub fn new(pins: [Box<dyn GpioOutput + 'a>; N]) -> Self {
        Self { pins }
    }
}

impl<const N: usize> Debug for SoftGpioBusOutput<'_, N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SoftGpioBusOutput({:?})", self.pins)
    }
}

impl<const N: usize> GpioBusOutput<N> for SoftGpioBusOutput<'_, N> {
    fn write(&self, values: &[bool; N]) -> GpioResult<()> {
        for (pin, &value) in self.pins.iter().zip(values) {
            pin.write(value)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockGpioDriver, Trace, TraceEvent};
    use crate::{GpioDriver, GpioError};

    fn nibble_bus(gpio: &MockGpioDriver) -> SoftGpioBusOutput<'_, 4> {
        SoftGpioBusOutput::new([
            gpio.get_output(4).unwrap(),
            gpio.get_output(5).unwrap(),
            gpio.get_output(6).unwrap(),
            gpio.get_output(7).unwrap(),
        ])
    }

    #[test]
    fn nibble_msb_goes_to_last_pin() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 8);
        let bus = nibble_bus(&gpio);
        let bus: &dyn GpioBusOutput<4> = &bus;

        bus.write_nibble(0b1000).unwrap();

        assert_eq!(
            trace.events(),
            vec![
                TraceEvent::Line { pin: 4, level: false },
                TraceEvent::Line { pin: 5, level: false },
                TraceEvent::Line { pin: 6, level: false },
                TraceEvent::Line { pin: 7, level: true },
            ]
        );
    }

    #[test]
    fn nibble_out_of_range_is_rejected() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 8);
        let bus = nibble_bus(&gpio);
        let bus: &dyn GpioBusOutput<4> = &bus;

        assert_eq!(bus.write_nibble(0x10), Err(GpioError::InvalidArgument));
        assert!(trace.events().is_empty());
    }
}
