//! Mock implementations for testing.
//!
//! [MockGpioDriver] and [MockDelay] record every line change and every wait into one shared,
//! ordered [Trace], so a test can check the exact schedule a driver produced. The trace can be
//! decoded into the nibbles the controller would have latched, and replayed into a
//! [SimulatedLcd] to see what the display would show.

use crate::delay::{Delay, DelayBounds};
use crate::lcd::hd44780::driver::{PinMap, RegisterSelect};
use crate::lcd::hd44780::instruction::{CursorDirection, DataLength, Instruction, LineMode};
use crate::lcd::hd44780::{Line, NUM_CHARS_PER_LINE};
use crate::{GpioDriver, GpioError, GpioOutput, GpioResult};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Pin map used throughout the tests. Pins 0 and 3–11 are left unused on purpose.
pub const TEST_PINS: PinMap = PinMap {
    rs: 1,
    e: 2,
    data: [12, 13, 14, 15],
};

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TraceEvent {
    Line { pin: usize, level: bool },
    Wait(DelayBounds),
}

/// Shared, ordered log of line changes and waits.
#[derive(Clone, Debug, Default)]
pub struct Trace {
    events: Arc<Mutex<Vec<TraceEvent>>>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<TraceEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, event: TraceEvent) {
        self.lock().push(event);
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.lock().clone()
    }

    /// Forgets everything recorded so far. Line levels are assumed low afterwards.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Sum of the lower bounds of all recorded waits.
    pub fn min_duration(&self) -> Duration {
        self.lock()
            .iter()
            .filter_map(|event| match event {
                TraceEvent::Wait(bounds) => Some(bounds.min),
                _ => None,
            })
            .sum()
    }

    /// Nibbles latched by the falling edges of E, with the RS level at that moment.
    pub fn nibbles(&self, pins: &PinMap) -> Vec<(RegisterSelect, u8)> {
        let mut levels: HashMap<usize, bool> = HashMap::new();
        let mut nibbles = Vec::new();

        for event in self.lock().iter() {
            let TraceEvent::Line { pin, level } = *event else {
                continue;
            };
            let was_high = levels.insert(pin, level).unwrap_or(false);
            if pin == pins.e && was_high && !level {
                let level = |pin: usize| levels.get(&pin).copied().unwrap_or(false);
                let mode = if level(pins.rs) {
                    RegisterSelect::Data
                } else {
                    RegisterSelect::Command
                };
                let nibble = pins
                    .data
                    .iter()
                    .enumerate()
                    .filter(|(_, pin)| level(**pin))
                    .fold(0u8, |nibble, (bit, _)| nibble | 1 << bit);
                nibbles.push((mode, nibble));
            }
        }

        nibbles
    }

    /// Pairs consecutive nibbles into bytes. Only meaningful once the controller is in 4-bit mode,
    /// i.e. for traces recorded after [crate::lcd::hd44780::driver::HD44780Driver::init].
    pub fn bytes(&self, pins: &PinMap) -> Vec<(RegisterSelect, u8)> {
        self.nibbles(pins)
            .chunks(2)
            .filter(|pair| pair.len() == 2)
            .map(|pair| (pair[0].0, pair[0].1 << 4 | pair[1].1))
            .collect()
    }

    /// Instructions sent, in order.
    pub fn commands(&self, pins: &PinMap) -> Vec<Instruction> {
        self.bytes(pins)
            .into_iter()
            .filter(|(mode, _)| *mode == RegisterSelect::Command)
            .filter_map(|(_, byte)| Instruction::from_byte(byte))
            .collect()
    }

    /// Character codes sent, in order.
    pub fn data(&self, pins: &PinMap) -> Vec<u8> {
        self.bytes(pins)
            .into_iter()
            .filter(|(mode, _)| *mode == RegisterSelect::Data)
            .map(|(_, byte)| byte)
            .collect()
    }
}

/// A GPIO chip whose outputs record their writes into a [Trace].
pub struct MockGpioDriver {
    trace: Trace,
    used_pins: Mutex<Vec<bool>>,
    fail_writes: Mutex<bool>,
}

impl MockGpioDriver {
    pub fn new(trace: &Trace, count: usize) -> Self {
        MockGpioDriver {
            trace: trace.clone(),
            used_pins: Mutex::new(vec![false; count]),
            fail_writes: Mutex::new(false),
        }
    }

    /// Number of pins currently claimed.
    pub fn claimed(&self) -> usize {
        self.used_pins().iter().filter(|used| **used).count()
    }

    /// Makes every following write fail with an IO error, like a disconnected chip.
    pub fn fail_writes(&self, fail: bool) {
        *self.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) = fail;
    }

    fn used_pins(&self) -> MutexGuard<'_, Vec<bool>> {
        self.used_pins.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Debug for MockGpioDriver {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MockGpioDriver")
    }
}

impl GpioDriver for MockGpioDriver {
    fn count(&self) -> GpioResult<usize> {
        Ok(self.used_pins().len())
    }

    fn get_output(&self, index: usize) -> GpioResult<Box<dyn GpioOutput + '_>> {
        let mut used_pins = self.used_pins();
        match used_pins.get_mut(index) {
            None => Err(GpioError::InvalidArgument),
            Some(true) => Err(GpioError::AlreadyInUse),
            Some(used) => {
                *used = true;
                Ok(Box::new(MockOutput {
                    driver: self,
                    pin_index: index,
                }))
            }
        }
    }
}

struct MockOutput<'a> {
    driver: &'a MockGpioDriver,
    pin_index: usize,
}

impl Debug for MockOutput<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}[{}][output]", self.driver, self.pin_index)
    }
}

impl GpioOutput for MockOutput<'_> {
    fn write(&self, value: bool) -> GpioResult<()> {
        if *self.driver.fail_writes.lock().unwrap_or_else(PoisonError::into_inner) {
            return Err(GpioError::Io(std::io::ErrorKind::BrokenPipe));
        }
        self.driver.trace.push(TraceEvent::Line {
            pin: self.pin_index,
            level: value,
        });
        Ok(())
    }
}

impl Drop for MockOutput<'_> {
    fn drop(&mut self) {
        if let Some(used) = self.driver.used_pins().get_mut(self.pin_index) {
            *used = false;
        }
    }
}

/// A clock that records waits instead of sleeping.
#[derive(Debug)]
pub struct MockDelay {
    trace: Trace,
}

impl MockDelay {
    pub fn new(trace: &Trace) -> Self {
        MockDelay {
            trace: trace.clone(),
        }
    }
}

impl Delay for MockDelay {
    fn wait(&mut self, bounds: DelayBounds) {
        self.trace.push(TraceEvent::Wait(bounds));
    }
}

/// Just enough of an HD44780 to check what ends up on the glass.
///
/// Starts in 8-bit mode with a blank DDRAM, as after the internal reset. In 8-bit mode only
/// D7–D4 are wired, so every nibble is a whole transfer with the low bits read as `0`.
#[derive(Debug, Clone)]
pub struct SimulatedLcd {
    ddram: [u8; 128],
    address: u8,
    data_length: DataLength,
    pending: Option<u8>,
    increment: bool,
    pub display_on: bool,
    pub cursor_on: bool,
    pub blink_on: bool,
    pub two_lines: bool,
}

impl Default for SimulatedLcd {
    fn default() -> Self {
        SimulatedLcd {
            ddram: [b' '; 128],
            address: 0,
            data_length: DataLength::EightBit,
            pending: None,
            increment: true,
            display_on: false,
            cursor_on: false,
            blink_on: false,
            two_lines: false,
        }
    }
}

impl SimulatedLcd {
    /// Feeds every nibble latched in `trace` to a fresh controller.
    pub fn replay(trace: &Trace, pins: &PinMap) -> Self {
        let mut lcd = SimulatedLcd::default();
        for (mode, nibble) in trace.nibbles(pins) {
            lcd.latch(mode, nibble);
        }
        lcd
    }

    pub fn latch(&mut self, mode: RegisterSelect, nibble: u8) {
        match self.data_length {
            DataLength::EightBit => self.execute(mode, nibble << 4),
            DataLength::FourBit => match self.pending.take() {
                None => self.pending = Some(nibble),
                Some(high) => self.execute(mode, high << 4 | nibble),
            },
        }
    }

    fn execute(&mut self, mode: RegisterSelect, byte: u8) {
        if mode == RegisterSelect::Data {
            self.ddram[usize::from(self.address)] = byte;
            self.step(self.increment);
            return;
        }

        match Instruction::from_byte(byte) {
            Some(Instruction::ClearDisplay) => {
                self.ddram = [b' '; 128];
                self.address = 0;
                self.increment = true;
            }
            Some(Instruction::ReturnHome) => self.address = 0,
            Some(Instruction::EntryModeSet { direction, .. }) => {
                self.increment = direction == CursorDirection::Right;
            }
            Some(Instruction::DisplayControl {
                display,
                cursor,
                blink,
            }) => {
                self.display_on = display;
                self.cursor_on = cursor;
                self.blink_on = blink;
            }
            Some(Instruction::CursorShift {
                display_shift: false,
                direction,
            }) => self.step(direction == CursorDirection::Right),
            Some(Instruction::FunctionSet {
                data_length, lines, ..
            }) => {
                self.data_length = data_length;
                self.two_lines = lines == LineMode::TwoLines;
            }
            Some(Instruction::SetDdramAddress(address)) => self.address = address,
            _ => {}
        }
    }

    fn step(&mut self, forward: bool) {
        self.address = if forward {
            self.address.wrapping_add(1)
        } else {
            self.address.wrapping_sub(1)
        } & 0x7F;
    }

    /// Current DDRAM address.
    pub fn address(&self) -> u8 {
        self.address
    }

    /// The visible cells of a line.
    pub fn line(&self, line: Line) -> String {
        let start = usize::from(line.base_address());
        let end = start + NUM_CHARS_PER_LINE as usize;
        self.ddram[start..end].iter().map(|&byte| byte as char).collect()
    }

    /// Cells past the visible part of a line, which a correct driver never writes to.
    pub fn hidden(&self, line: Line) -> String {
        let start = usize::from(line.base_address()) + NUM_CHARS_PER_LINE as usize;
        self.ddram[start..start + 24].iter().map(|&byte| byte as char).collect()
    }
}
