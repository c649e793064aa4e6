//! Cursor addressing.
//!
//! The controller keeps its own address counter and the driver never reads it back, so anything
//! that writes text positions the cursor explicitly first.

use crate::GpioResult;
use crate::lcd::hd44780::Line;
use crate::lcd::hd44780::driver::HD44780Driver;

pub trait CursorExt {
    /// Moves the cursor to the first cell of `line` (1 or 2, anything else means 1).
    fn set_line_start(&mut self, line: u32) -> GpioResult<()>;

    /// Moves the cursor to cell `offset` of `line` (1 or 2, anything else means 1).
    ///
    /// `offset` is not checked against the line width. Offsets past the visible part address
    /// hidden DDRAM cells.
    fn set_position(&mut self, line: u32, offset: u32) -> GpioResult<()>;

    /// Same as [CursorExt::set_position], for an already validated line.
    fn move_to(&mut self, line: Line, offset: u32) -> GpioResult<()>;
}

impl<T: ?Sized + HD44780Driver> CursorExt for T {
    fn set_line_start(&mut self, line: u32) -> GpioResult<()> {
        self.move_to(Line::from_number(line), 0)
    }

    fn set_position(&mut self, line: u32, offset: u32) -> GpioResult<()> {
        self.move_to(Line::from_number(line), offset)
    }

    fn move_to(&mut self, line: Line, offset: u32) -> GpioResult<()> {
        // Only the low 7 bits reach the controller, the truncation is intended
        let address = line.base_address().wrapping_add(offset as u8);
        self.set_ddram_address(address)
    }
}
