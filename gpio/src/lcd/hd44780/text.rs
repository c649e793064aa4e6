//! Painting text on the display.
//!
//! Text is a sequence of single-byte character codes from the controller's font table, no
//! translation is done. A print that starts on line 1 and runs past its end continues once at the
//! start of line 2. Line 2 never wraps, whatever doesn't fit is dropped.
//!
//! The address counter is never left to run past the end of a line. Letting it wrap back to `0`
//! would overwrite the start of line 1 and leave following writes out of place.

use crate::GpioResult;
use crate::lcd::hd44780::cursor::CursorExt;
use crate::lcd::hd44780::driver::HD44780Driver;
use crate::lcd::hd44780::{Line, NUM_CHARS_PER_LINE};
use log::trace;

pub trait TextExt {
    /// Prints `text` from the start of `line`.
    fn print(&mut self, text: &[u8], line: u32) -> GpioResult<()>;

    /// Prints `text` from cell `offset` of `line`.
    ///
    /// Lines other than 1 and 2 are treated as 1. An offset at or past the end of line 1 goes
    /// straight to line 2.
    fn print_at(&mut self, text: &[u8], line: u32, offset: u32) -> GpioResult<()>;
}

impl<T: ?Sized + HD44780Driver> TextExt for T {
    fn print(&mut self, text: &[u8], line: u32) -> GpioResult<()> {
        self.print_at(text, line, 0)
    }

    fn print_at(&mut self, text: &[u8], line: u32, offset: u32) -> GpioResult<()> {
        let mut line = Line::from_number(line);
        let mut counter = offset;
        let mut rest = text;

        self.move_to(line, offset)?;

        loop {
            let Some((&character, tail)) = rest.split_first() else {
                break;
            };

            if counter >= NUM_CHARS_PER_LINE {
                if line == Line::Second {
                    trace!(
                        "Dropping {} characters past the end of line {}",
                        rest.len(),
                        line.number()
                    );
                    break;
                }
                line = Line::Second;
                counter = 0;
                self.move_to(line, 0)?;
                continue;
            }

            self.send_data(character)?;
            rest = tail;
            counter += 1;
        }

        Ok(())
    }
}
