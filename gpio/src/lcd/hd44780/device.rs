//! The control surface of the display.
//!
//! [Klcd] owns an initialized driver behind a mutex, so every command runs to completion before
//! the next one touches the lines. Callers only deal with [Request]s and single-character command
//! codes, they don't need to know anything about the protocol.

use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::text::TextExt;
use crate::lcd::hd44780::{LcdError, LcdResult};
use log::{debug, info, warn};
use std::fmt::{Debug, Formatter};
use std::sync::{Mutex, MutexGuard};

/// Capacity of the text buffer in a [Request], including the terminating NUL.
pub const MAX_BUF_LENGTH: usize = 50;

/// One unit of work for [Klcd::ioctl].
///
/// The text is a fixed-size, NUL-terminated buffer. At most `MAX_BUF_LENGTH - 1` bytes of text
/// are ever used. `line` and `offset` are ignored by the commands that don't need them.
#[derive(Clone, Eq, PartialEq)]
pub struct Request {
    text: [u8; MAX_BUF_LENGTH],
    pub line: u32,
    pub offset: u32,
}

impl Request {
    /// Creates a request, truncating `text` to fit the buffer.
    pub fn new(text: impl AsRef<[u8]>, line: u32, offset: u32) -> Self {
        let text = text.as_ref();
        let mut buffer = [0u8; MAX_BUF_LENGTH];
        let length = text.len().min(MAX_BUF_LENGTH - 1);
        buffer[..length].copy_from_slice(&text[..length]);
        Request {
            text: buffer,
            line,
            offset,
        }
    }

    /// Creates a request from a raw buffer. The last byte is overwritten with a NUL.
    pub fn from_raw(mut text: [u8; MAX_BUF_LENGTH], line: u32, offset: u32) -> Self {
        text[MAX_BUF_LENGTH - 1] = 0;
        Request { text, line, offset }
    }

    /// The text up to the first NUL.
    pub fn text(&self) -> &[u8] {
        let end = self
            .text
            .iter()
            .position(|&byte| byte == 0)
            .unwrap_or(MAX_BUF_LENGTH - 1);
        &self.text[..end]
    }
}

impl Debug for Request {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("text", &String::from_utf8_lossy(self.text()))
            .field("line", &self.line)
            .field("offset", &self.offset)
            .finish()
    }
}

/// The commands understood by [Klcd::ioctl].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Command {
    /// `'0'`: clears the display.
    Clear,
    /// `'1'`: prints from the start of line 1, wrapping to line 2.
    PrintLine1,
    /// `'2'`: prints from the start of line 2.
    PrintLine2,
    /// `'3'`: prints from [Request::offset] of [Request::line].
    PrintAt,
    /// `'4'`: shows the blinking cursor.
    CursorOn,
    /// `'5'`: hides the cursor.
    CursorOff,
}

impl Command {
    pub fn code(self) -> u8 {
        match self {
            Command::Clear => b'0',
            Command::PrintLine1 => b'1',
            Command::PrintLine2 => b'2',
            Command::PrintAt => b'3',
            Command::CursorOn => b'4',
            Command::CursorOff => b'5',
        }
    }
}

impl TryFrom<u8> for Command {
    type Error = LcdError;

    fn try_from(code: u8) -> LcdResult<Self> {
        match code {
            b'0' => Ok(Command::Clear),
            b'1' => Ok(Command::PrintLine1),
            b'2' => Ok(Command::PrintLine2),
            b'3' => Ok(Command::PrintAt),
            b'4' => Ok(Command::CursorOn),
            b'5' => Ok(Command::CursorOff),
            _ => Err(LcdError::UnsupportedOperation(code)),
        }
    }
}

/// A brought-up display, ready to take commands.
pub struct Klcd<D: HD44780Driver> {
    driver: Mutex<D>,
}

impl<D: HD44780Driver> Klcd<D> {
    /// Initializes the controller behind `driver` and wraps it.
    ///
    /// The driver is expected to have its lines claimed already. Initialization cannot detect a
    /// missing or unresponsive display, only failing line writes.
    ///
    /// # Errors
    /// - `LcdError::Setup` if a line write fails during bring-up.
    pub fn open(mut driver: D) -> LcdResult<Self> {
        driver.init().map_err(LcdError::Setup)?;
        info!("klcd initialized");
        Ok(Klcd {
            driver: Mutex::new(driver),
        })
    }

    fn lock(&self) -> LcdResult<MutexGuard<'_, D>> {
        self.driver.lock().map_err(|_| LcdError::Poisoned)
    }

    /// Runs one command.
    ///
    /// # Errors
    /// - `LcdError::InvalidArgument` if `request` is absent.
    /// - `LcdError::UnsupportedOperation` for an unknown `code`.
    ///
    /// In both cases nothing is sent to the display.
    pub fn ioctl(&self, code: u8, request: Option<&Request>) -> LcdResult<()> {
        let Some(request) = request else {
            warn!("Invalid argument for klcd ioctl");
            return Err(LcdError::InvalidArgument("missing request"));
        };

        let command = Command::try_from(code).inspect_err(|_| {
            warn!("No such command: {:?}", code as char);
        })?;

        self.dispatch(command, request)
    }

    /// Runs an already decoded command.
    pub fn dispatch(&self, command: Command, request: &Request) -> LcdResult<()> {
        debug!("{:?} ({:?}) with {:?}", command, command.code() as char, request);

        let mut driver = self.lock()?;
        match command {
            Command::Clear => driver.clear_display()?,
            Command::PrintLine1 => driver.print(request.text(), 1)?,
            Command::PrintLine2 => driver.print(request.text(), 2)?,
            Command::PrintAt => driver.print_at(request.text(), request.line, request.offset)?,
            Command::CursorOn => {
                driver.set_display_control(true, true, true)?;
                info!("Cursor on");
            }
            Command::CursorOff => {
                driver.set_display_control(true, false, false)?;
                info!("Cursor off");
            }
        }
        Ok(())
    }

    /// The plain-write path: clears the display and prints `buffer` from the start of line 1.
    ///
    /// The last byte of `buffer` is taken as the writer's terminator (usually the newline `echo`
    /// appends) and is not printed. At most `MAX_BUF_LENGTH - 1` bytes are printed, the text
    /// also stops at the first NUL. Returns the whole length of `buffer`, as it was consumed.
    pub fn write(&self, buffer: &[u8]) -> LcdResult<usize> {
        let length = buffer.len().saturating_sub(1).min(MAX_BUF_LENGTH - 1);
        let request = Request::new(&buffer[..length], 1, 0);

        let mut driver = self.lock()?;
        driver.clear_display()?;
        driver.print(request.text(), 1)?;
        debug!("Wrote {:?}", request);

        Ok(buffer.len())
    }

    /// Turns the display off and hands the driver back, so its lines can be released.
    pub fn shutdown(self) -> LcdResult<D> {
        let mut driver = self.driver.into_inner().map_err(|_| LcdError::Poisoned)?;
        driver.set_display_control(false, false, false)?;
        info!("Display off");
        Ok(driver)
    }
}

impl<D: HD44780Driver> Debug for Klcd<D> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.driver.try_lock() {
            Ok(driver) => write!(f, "Klcd({:?})", *driver),
            Err(_) => write!(f, "Klcd(<busy>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GpioError;
    use crate::lcd::hd44780::Line;
    use crate::lcd::hd44780::driver::GpioHD44780Driver;
    use crate::lcd::hd44780::instruction::Instruction;
    use crate::mock::{MockDelay, MockGpioDriver, SimulatedLcd, Trace, TEST_PINS};
    use std::sync::Arc;
    use std::thread;

    type TestKlcd<'a> = Klcd<GpioHD44780Driver<'a, MockDelay>>;

    fn open<'a>(gpio: &'a MockGpioDriver, trace: &Trace) -> TestKlcd<'a> {
        let driver = GpioHD44780Driver::open(gpio, &TEST_PINS, MockDelay::new(trace)).unwrap();
        Klcd::open(driver).unwrap()
    }

    fn display_control(display: bool, cursor: bool, blink: bool) -> Instruction {
        Instruction::DisplayControl {
            display,
            cursor,
            blink,
        }
    }

    #[test]
    fn request_truncates_and_terminates() {
        let request = Request::new([b'a'; 80], 2, 3);
        assert_eq!(request.text(), &[b'a'; 49][..]);
        assert_eq!(request.line, 2);
        assert_eq!(request.offset, 3);

        let request = Request::from_raw([b'b'; MAX_BUF_LENGTH], 1, 0);
        assert_eq!(request.text().len(), MAX_BUF_LENGTH - 1);

        let request = Request::new("hi\0there", 1, 0);
        assert_eq!(request.text(), b"hi");
    }

    #[test]
    fn command_codes() {
        for command in [
            Command::Clear,
            Command::PrintLine1,
            Command::PrintLine2,
            Command::PrintAt,
            Command::CursorOn,
            Command::CursorOff,
        ] {
            assert_eq!(Command::try_from(command.code()), Ok(command));
        }
        assert_eq!(Command::try_from(b'6'), Err(LcdError::UnsupportedOperation(b'6')));
        assert_eq!(Command::try_from(2u8), Err(LcdError::UnsupportedOperation(2)));
    }

    #[test]
    fn open_brings_the_display_up() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let _klcd = open(&gpio, &trace);

        let display = SimulatedLcd::replay(&trace, &TEST_PINS);
        assert!(display.display_on);
        assert!(display.cursor_on);
        assert!(display.blink_on);
        assert!(display.two_lines);
        assert_eq!(display.address(), 0);
    }

    #[test]
    fn clear_then_print_line_1() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);

        klcd.ioctl(b'2', Some(&Request::new("old", 0, 0))).unwrap();
        klcd.ioctl(b'0', Some(&Request::new("", 0, 0))).unwrap();
        klcd.ioctl(b'1', Some(&Request::new("hi", 0, 0))).unwrap();

        let display = SimulatedLcd::replay(&trace, &TEST_PINS);
        assert_eq!(display.line(Line::First), "hi              ");
        assert_eq!(display.line(Line::Second), " ".repeat(16));
    }

    #[test]
    fn clear_is_a_single_instruction() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        klcd.ioctl(b'0', Some(&Request::new("ignored", 2, 4))).unwrap();

        assert_eq!(trace.commands(&TEST_PINS), vec![Instruction::ClearDisplay]);
        assert!(trace.data(&TEST_PINS).is_empty());
    }

    #[test]
    fn print_commands() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);

        klcd.ioctl(b'1', Some(&Request::new("first", 2, 9))).unwrap();
        klcd.ioctl(b'2', Some(&Request::new("second", 1, 9))).unwrap();
        klcd.ioctl(b'3', Some(&Request::new("@", 1, 15))).unwrap();
        klcd.ioctl(b'3', Some(&Request::new("xy", 2, 14))).unwrap();

        let display = SimulatedLcd::replay(&trace, &TEST_PINS);
        assert_eq!(display.line(Line::First), "first          @");
        assert_eq!(display.line(Line::Second), "second        xy");
    }

    #[test]
    fn cursor_commands_reissue_full_display_control() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        let request = Request::new("", 0, 0);
        klcd.ioctl(b'5', Some(&request)).unwrap();
        klcd.ioctl(b'5', Some(&request)).unwrap();
        klcd.ioctl(b'4', Some(&request)).unwrap();

        assert_eq!(
            trace.commands(&TEST_PINS),
            vec![
                display_control(true, false, false),
                display_control(true, false, false),
                display_control(true, true, true),
            ]
        );
    }

    #[test]
    fn unsupported_command_sends_nothing() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        let result = klcd.ioctl(b'9', Some(&Request::new("hi", 1, 0)));

        assert_eq!(result, Err(LcdError::UnsupportedOperation(b'9')));
        assert!(trace.events().is_empty());
    }

    #[test]
    fn missing_request_sends_nothing() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        let result = klcd.ioctl(b'1', None);

        assert!(matches!(result, Err(LcdError::InvalidArgument(_))));
        assert!(trace.events().is_empty());
    }

    #[test]
    fn write_clears_and_prints_on_line_1() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);

        klcd.ioctl(b'2', Some(&Request::new("leftover", 0, 0))).unwrap();
        let written = klcd.write(b"Hello\n").unwrap();

        assert_eq!(written, 6);
        let display = SimulatedLcd::replay(&trace, &TEST_PINS);
        assert_eq!(display.line(Line::First), "Hello           ");
        assert_eq!(display.line(Line::Second), " ".repeat(16));
    }

    #[test]
    fn write_truncates_to_the_buffer() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        let buffer = [b'z'; 100];
        assert_eq!(klcd.write(&buffer).unwrap(), 100);

        // 49 bytes copied, 32 of them fit on the display
        assert_eq!(trace.data(&TEST_PINS).len(), 32);
        assert_eq!(
            trace.commands(&TEST_PINS),
            vec![
                Instruction::ClearDisplay,
                Instruction::SetDdramAddress(0x00),
                Instruction::SetDdramAddress(0x40),
            ]
        );
    }

    #[test]
    fn empty_write_only_clears() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);
        trace.clear();

        assert_eq!(klcd.write(b"").unwrap(), 0);
        assert_eq!(
            trace.commands(&TEST_PINS),
            vec![Instruction::ClearDisplay, Instruction::SetDdramAddress(0x00)]
        );
    }

    #[test]
    fn shutdown_turns_the_display_off_and_releases_pins() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);

        let driver = klcd.shutdown().unwrap();
        let display = SimulatedLcd::replay(&trace, &TEST_PINS);
        assert!(!display.display_on);
        assert!(!display.cursor_on);

        drop(driver);
        assert_eq!(gpio.claimed(), 0);
    }

    #[test]
    fn line_failure_is_reported() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = open(&gpio, &trace);

        gpio.fail_writes(true);
        let result = klcd.ioctl(b'1', Some(&Request::new("hi", 1, 0)));

        assert_eq!(
            result,
            Err(LcdError::Gpio(GpioError::Io(std::io::ErrorKind::BrokenPipe)))
        );
    }

    #[test]
    fn line_failure_during_bring_up_is_a_setup_error() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let driver = GpioHD44780Driver::open(&gpio, &TEST_PINS, MockDelay::new(&trace)).unwrap();

        gpio.fail_writes(true);
        let result = Klcd::open(driver);

        assert!(matches!(
            result,
            Err(LcdError::Setup(GpioError::Io(std::io::ErrorKind::BrokenPipe)))
        ));
    }

    #[test]
    fn concurrent_commands_do_not_interleave() {
        let trace = Trace::new();
        let gpio = MockGpioDriver::new(&trace, 16);
        let klcd = Arc::new(open(&gpio, &trace));
        trace.clear();

        thread::scope(|scope| {
            for (code, text) in [(b'1', "AAAAAAAA"), (b'2', "BBBBBBBB")] {
                let klcd = Arc::clone(&klcd);
                scope.spawn(move || {
                    for _ in 0..4 {
                        klcd.ioctl(code, Some(&Request::new(text, 0, 0))).unwrap();
                    }
                });
            }
        });

        // Every print is one address instruction followed by eight characters of one kind
        let bytes = trace.bytes(&TEST_PINS);
        assert_eq!(bytes.len(), 8 * 9);
        for print in bytes.chunks(9) {
            let (address, characters) = print.split_first().unwrap();
            let expected = match address.1 {
                0x80 => b'A',
                0xC0 => b'B',
                other => panic!("unexpected instruction {:#04x}", other),
            };
            assert!(characters.iter().all(|&(_, byte)| byte == expected));
        }
    }
}
