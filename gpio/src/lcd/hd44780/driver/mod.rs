mod gpio;

use crate::GpioResult;
use crate::delay::DelayBounds;
use crate::lcd::hd44780::instruction::{CursorDirection, DataLength, Font, Instruction, LineMode};
use log::{debug, info};
use std::fmt::Debug;
pub use gpio::*;

/// Value of the RS line during a transfer.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum RegisterSelect {
    /// RS low, the transfer goes to the instruction register.
    Command,
    /// RS high, the transfer goes to the data register (DDRAM at the current address).
    Data,
}

/// Every wait the driver schedules. The defaults are conservative and work without reading the
/// busy flag.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct Timing {
    /// Before every nibble transfer. This doubles as the execution time of the previous
    /// instruction, standing in for busy flag polling.
    pub nibble_lead: DelayBounds,
    /// Between presenting RS and the data lines and raising E.
    pub settle: DelayBounds,
    /// Width of the E pulse.
    pub enable_pulse: DelayBounds,
    /// Before the first wake-up, for Vcc to rise.
    pub power_on: DelayBounds,
    /// After the first wake-up function set.
    pub wake_up_first: DelayBounds,
    /// After the second and third wake-up and after switching to the 4-bit interface.
    pub wake_up: DelayBounds,
    /// After the function set that selects lines and font.
    pub function_set: DelayBounds,
    /// After the remaining bring-up instructions.
    pub instruction: DelayBounds,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            nibble_lead: DelayBounds::micros(2000, 3000),
            settle: DelayBounds::micros(5, 10),
            enable_pulse: DelayBounds::micros(5, 10),
            power_on: DelayBounds::millis(41, 50),
            wake_up_first: DelayBounds::millis(5, 6),
            wake_up: DelayBounds::micros(100, 200),
            function_set: DelayBounds::millis(41, 50),
            instruction: DelayBounds::micros(100, 200),
        }
    }
}

/// Low-level, write-only interface to an HD44780 controller on a 4-bit bus.
///
/// Implementations only provide the nibble transfer and the clock. Everything else, including the
/// bring-up sequence, is built on top of [HD44780Driver::send_nibble].
pub trait HD44780Driver: Debug {
    /// Delays used by this driver.
    fn timing(&self) -> &Timing;

    /// Blocks for the given bounds.
    fn wait(&mut self, bounds: DelayBounds);

    /// Presents a nibble on D7–D4 with RS set according to `mode`, and latches it by pulsing E.
    ///
    /// Waits [Timing::nibble_lead] first, so calls can follow each other back to back.
    fn send_nibble(&mut self, nibble: u8, mode: RegisterSelect) -> GpioResult<()>;

    /// Sends a byte as two nibble transfers, high nibble first.
    fn send(&mut self, byte: u8, mode: RegisterSelect) -> GpioResult<()> {
        self.send_nibble(byte >> 4, mode)?;
        self.send_nibble(byte & 0x0F, mode)
    }

    /// Sends a command to the HD44780 controller.
    /// Sets the RS pin to 0 (command).
    fn send_command(&mut self, command: u8) -> GpioResult<()> {
        self.send(command, RegisterSelect::Command)
    }

    /// Sends data to the HD44780 controller.
    /// Sets the RS pin to 1 (data).
    fn send_data(&mut self, data: u8) -> GpioResult<()> {
        self.send(data, RegisterSelect::Data)
    }

    fn send_instruction(&mut self, instruction: Instruction) -> GpioResult<()> {
        debug!("Sending {:?}", instruction);
        self.send_command(instruction.to_byte())
    }

    /// Sends only the high nibble of an instruction.
    ///
    /// Used during bring-up, while the controller might still listen on an 8-bit bus and only
    /// sees D7–D4.
    fn send_instruction_nibble(&mut self, instruction: Instruction) -> GpioResult<()> {
        debug!("Sending high nibble of {:?}", instruction);
        self.send_nibble(instruction.to_byte() >> 4, RegisterSelect::Command)
    }

    /// Initializes the controller by instruction, as the HD44780 datasheet describes for the 4-bit
    /// interface (figure 24).
    ///
    /// Three 8-bit function sets get the controller into a known state whatever mode it was left
    /// in, then it's switched to 4 bits and configured for two lines with the 5x8 font. The
    /// display is left cleared and on, with a blinking cursor.
    ///
    /// There is no feedback from the controller, so this only fails if a line cannot be written.
    fn init(&mut self) -> GpioResult<()> {
        let timing = *self.timing();
        let wake_up = Instruction::FunctionSet {
            data_length: DataLength::EightBit,
            lines: LineMode::OneLine,
            font: Font::Dots5x8,
        };

        self.wait(timing.power_on);

        self.send_instruction_nibble(wake_up)?;
        self.wait(timing.wake_up_first);
        self.send_instruction_nibble(wake_up)?;
        self.wait(timing.wake_up);
        self.send_instruction_nibble(wake_up)?;
        self.wait(timing.wake_up);

        self.send_instruction_nibble(Instruction::FunctionSet {
            data_length: DataLength::FourBit,
            lines: LineMode::OneLine,
            font: Font::Dots5x8,
        })?;
        self.wait(timing.wake_up);

        self.function_set(DataLength::FourBit, LineMode::TwoLines, Font::Dots5x8)?;
        self.wait(timing.function_set);

        self.set_display_control(false, false, false)?;
        self.wait(timing.instruction);
        self.send_instruction(Instruction::ClearDisplay)?;
        self.wait(timing.instruction);
        self.set_entry_mode(CursorDirection::Right, false)?;
        self.wait(timing.instruction);

        // Not part of the datasheet sequence, this is the default look of the display
        self.set_display_control(true, true, true)?;
        self.wait(timing.instruction);

        info!("HD44780 initialized");
        Ok(())
    }

    /// Clears the display and sets the cursor to the home position.
    fn clear_display(&mut self) -> GpioResult<()> {
        self.send_instruction(Instruction::ClearDisplay)?;
        info!("Display cleared");
        Ok(())
    }

    /// Sets the display to the specified entry mode.
    fn set_entry_mode(&mut self, direction: CursorDirection, shift: bool) -> GpioResult<()> {
        self.send_instruction(Instruction::EntryModeSet { direction, shift })
    }

    /// Sets the display on/off, cursor on/off, and blinking on/off.
    ///
    /// The whole instruction is always sent, the current state is not tracked.
    fn set_display_control(&mut self, display: bool, cursor: bool, blink: bool) -> GpioResult<()> {
        self.send_instruction(Instruction::DisplayControl {
            display,
            cursor,
            blink,
        })
    }

    /// Sets the function set.
    fn function_set(&mut self, data_length: DataLength, lines: LineMode, font: Font) -> GpioResult<()> {
        self.send_instruction(Instruction::FunctionSet {
            data_length,
            lines,
            font,
        })
    }

    /// Sets the DDRAM address.
    fn set_ddram_address(&mut self, address: u8) -> GpioResult<()> {
        self.send_instruction(Instruction::SetDdramAddress(address))
    }
}
