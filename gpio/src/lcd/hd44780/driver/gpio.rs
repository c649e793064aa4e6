use crate::delay::{Delay, DelayBounds, SleepDelay};
use crate::lcd::hd44780::driver::{HD44780Driver, RegisterSelect, Timing};
use crate::lcd::hd44780::{LcdError, LcdResult};
use crate::soft::SoftGpioBusOutput;
use crate::{GpioBusOutput, GpioDriver, GpioError, GpioOutput, GpioResult};
use log::{debug, trace};

/// GPIO pin numbers the display is wired to.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PinMap {
    pub rs: usize,
    pub e: usize,
    /// D4, D5, D6, D7, in that order.
    pub data: [usize; 4],
}

impl PinMap {
    /// Checks that no pin is used for two signals.
    pub fn validate(&self) -> GpioResult<()> {
        let pins = self.all();
        for (i, pin) in pins.iter().enumerate() {
            if pins[i + 1..].contains(pin) {
                return Err(GpioError::InvalidArgument);
            }
        }
        Ok(())
    }

    fn all(&self) -> [usize; 6] {
        let [d4, d5, d6, d7] = self.data;
        [self.rs, self.e, d4, d5, d6, d7]
    }
}

impl Default for PinMap {
    /// The wiring on a BeagleBone Black: RS on P8_8, E on P8_10, D4–D7 on P8_18, P8_16, P8_14 and
    /// P8_12.
    fn default() -> Self {
        PinMap {
            rs: 67,
            e: 68,
            data: [65, 46, 26, 44],
        }
    }
}

/// GpioHD44780Driver for an HD44780 on a write-only 4-bit bus.
///
/// The driver owns its output lines for as long as it lives, dropping it releases them.
#[derive(Debug)]
pub struct GpioHD44780Driver<'a, D: Delay = SleepDelay> {
    pin_rs: Box<dyn GpioOutput + 'a>,
    pin_e: Box<dyn GpioOutput + 'a>,
    data_bus: Box<dyn GpioBusOutput<4> + 'a>,
    delay: D,
    timing: Timing,
}

impl<'a, D: Delay> GpioHD44780Driver<'a, D> {
    /// Creates a new GpioHD44780Driver from already configured outputs.
    ///
    /// # Parameters
    ///
    /// - `pin_rs`: Register select output pin.
    /// - `pin_e`: Enable output pin.
    /// - `data_bus`: D4–D7, with bit 0 of a nibble going to D4.
    /// - `delay`: The clock used for every wait.
    pub fn new_4bit(
        pin_rs: Box<dyn GpioOutput + 'a>,
        pin_e: Box<dyn GpioOutput + 'a>,
        data_bus: Box<dyn GpioBusOutput<4> + 'a>,
        delay: D,
    ) -> Self {
        GpioHD44780Driver {
            pin_rs,
            pin_e,
            data_bus,
            delay,
            timing: Timing::default(),
        }
    }

    /// Claims the pins in `pins` from `gpio` and creates a driver on them.
    ///
    /// Nothing is sent to the display yet, call [HD44780Driver::init] for that.
    ///
    /// # Errors
    /// - `LcdError::Setup` if the pin map aliases a pin or any pin cannot be claimed. Pins claimed
    ///   before the failure are released again.
    pub fn open(gpio: &'a dyn GpioDriver, pins: &PinMap, delay: D) -> LcdResult<Self> {
        pins.validate().map_err(LcdError::Setup)?;

        let claim = |pin: usize| gpio.get_output(pin).map_err(LcdError::Setup);
        let pin_rs = claim(pins.rs)?;
        let pin_e = claim(pins.e)?;
        let [d4, d5, d6, d7] = pins.data;
        let data_bus = SoftGpioBusOutput::new([claim(d4)?, claim(d5)?, claim(d6)?, claim(d7)?]);

        debug!("{:?} claimed for the LCD", pins);

        Ok(Self::new_4bit(pin_rs, pin_e, Box::new(data_bus), delay))
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    fn pulse_e(&mut self) -> GpioResult<()> {
        // Set E pin to high
        self.pin_e.write(true)?;
        self.delay.wait(self.timing.enable_pulse);
        // Set E pin to low, the controller latches on this edge
        self.pin_e.write(false)?;
        Ok(())
    }
}

impl<D: Delay> HD44780Driver for GpioHD44780Driver<'_, D> {
    fn timing(&self) -> &Timing {
        &self.timing
    }

    fn wait(&mut self, bounds: DelayBounds) {
        self.delay.wait(bounds);
    }

    fn send_nibble(&mut self, nibble: u8, mode: RegisterSelect) -> GpioResult<()> {
        self.delay.wait(self.timing.nibble_lead);

        trace!("Writing nibble: {:04b}, RS: {:?}", nibble, mode);
        self.data_bus.write_nibble(nibble)?;
        self.pin_rs.write(mode == RegisterSelect::Data)?;
        self.delay.wait(self.timing.settle);

        self.pulse_e()
    }
}
