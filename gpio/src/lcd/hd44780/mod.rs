//! HD44780 LCD module.
//!
//! Drives a 16x2 character display over six output lines: RS, E and the upper half of the data
//! bus (D4–D7). The R/W line is expected to be tied to ground, so the driver never reads the busy
//! flag back. Fixed delays are used instead, see [driver::Timing].
//!
//! The layers, from the wire up:
//! - [driver::GpioHD44780Driver] sends nibbles and bytes (the transmitter and the codec).
//! - [driver::HD44780Driver] provides the instruction set and the bring-up sequence.
//! - [cursor::CursorExt] turns a `(line, offset)` pair into a DDRAM address.
//! - [text::TextExt] paints text, wrapping from line 1 to line 2 once.
//! - [device::Klcd] is the control surface: the six commands and the plain-write path.

pub mod cursor;
pub mod device;
pub mod driver;
mod error;
pub mod instruction;
pub mod text;

pub use error::*;
use log::warn;

/// Number of characters that fit on one line.
pub const NUM_CHARS_PER_LINE: u32 = 16;

/// A display line.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Line {
    First,
    Second,
}

impl Line {
    /// Maps a 1-based line number to a [Line].
    ///
    /// Anything but `1` or `2` falls back to the first line, with a warning. Callers rely on this,
    /// so it is not treated as an error.
    pub fn from_number(number: u32) -> Line {
        match number {
            1 => Line::First,
            2 => Line::Second,
            _ => {
                warn!("Invalid line number {} readjusted to 1", number);
                Line::First
            }
        }
    }

    /// 1-based line number.
    pub fn number(self) -> u32 {
        match self {
            Line::First => 1,
            Line::Second => 2,
        }
    }

    /// DDRAM address of the first cell of the line.
    pub fn base_address(self) -> u8 {
        match self {
            Line::First => 0x00,
            Line::Second => 0x40,
        }
    }
}
