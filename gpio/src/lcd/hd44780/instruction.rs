//! The HD44780 instruction set as a tagged enum.
//!
//! Each variant maps to one byte sent with RS low. Bits not covered by a field are always `0`.

/// Direction the address counter moves after a write, or the direction of a shift.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CursorDirection {
    /// Decrements the address counter.
    Left,
    /// Increments the address counter.
    Right,
}

/// Width of the interface the controller listens on.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DataLength {
    FourBit,
    EightBit,
}

/// Number of display lines the controller drives.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum LineMode {
    OneLine,
    TwoLines,
}

/// Character font. Only the one-line mode supports the taller font.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Font {
    Dots5x8,
    Dots5x10,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Instruction {
    /// Clears DDRAM and sets the address counter to `0`.
    ///
    /// Command: `00000001`.
    ClearDisplay,
    /// Sets the address counter to `0` and undoes any display shift.
    ///
    /// Command: `0000001?`.
    ReturnHome,
    /// Command: `000001IS`.
    /// `I` is `1` when the address increments after a write, `S` shifts the display with it.
    EntryModeSet {
        direction: CursorDirection,
        shift: bool,
    },
    /// Command: `00001DCB`.
    /// `D` turns the display on, `C` shows the underline cursor, `B` blinks the cursor cell.
    DisplayControl {
        display: bool,
        cursor: bool,
        blink: bool,
    },
    /// Moves the cursor or shifts the display by one cell without writing.
    ///
    /// Command: `0001SR??`.
    CursorShift {
        display_shift: bool,
        direction: CursorDirection,
    },
    /// Command: `001DNF??`.
    /// `D` selects the 8-bit interface, `N` two lines, `F` the 5x10 font.
    FunctionSet {
        data_length: DataLength,
        lines: LineMode,
        font: Font,
    },
    /// Sets the DDRAM address. Only the lower 7 bits are used.
    ///
    /// Command: `1AAAAAAA`.
    SetDdramAddress(u8),
}

impl Instruction {
    /// Encodes the instruction into the byte the controller expects.
    pub fn to_byte(self) -> u8 {
        match self {
            Instruction::ClearDisplay => 0b00000001,
            Instruction::ReturnHome => 0b00000010,
            Instruction::EntryModeSet { direction, shift } => {
                let mut command = 0b00000100;
                if direction == CursorDirection::Right {
                    command |= 0b00000010;
                }
                if shift {
                    command |= 0b00000001;
                }
                command
            }
            Instruction::DisplayControl {
                display,
                cursor,
                blink,
            } => {
                let mut command = 0b00001000;
                if display {
                    command |= 0b00000100;
                }
                if cursor {
                    command |= 0b00000010;
                }
                if blink {
                    command |= 0b00000001;
                }
                command
            }
            Instruction::CursorShift {
                display_shift,
                direction,
            } => {
                let mut command = 0b00010000;
                if display_shift {
                    command |= 0b00001000;
                }
                if direction == CursorDirection::Right {
                    command |= 0b00000100;
                }
                command
            }
            Instruction::FunctionSet {
                data_length,
                lines,
                font,
            } => {
                let mut command = 0b00100000;
                if data_length == DataLength::EightBit {
                    command |= 0b00010000;
                }
                if lines == LineMode::TwoLines {
                    command |= 0b00001000;
                }
                if font == Font::Dots5x10 {
                    command |= 0b00000100;
                }
                command
            }
            Instruction::SetDdramAddress(address) => 0b10000000 | (address & 0b01111111),
        }
    }

    /// Decodes a command byte. Don't-care bits are ignored.
    pub fn from_byte(byte: u8) -> Option<Self> {
        let bit = |mask: u8| byte & mask != 0;
        let direction = |mask: u8| {
            if bit(mask) {
                CursorDirection::Right
            } else {
                CursorDirection::Left
            }
        };

        let instruction = match byte.leading_zeros() {
            0 => Instruction::SetDdramAddress(byte & 0b01111111),
            // CGRAM addressing is not modelled
            1 => return None,
            2 => Instruction::FunctionSet {
                data_length: if bit(0b00010000) {
                    DataLength::EightBit
                } else {
                    DataLength::FourBit
                },
                lines: if bit(0b00001000) {
                    LineMode::TwoLines
                } else {
                    LineMode::OneLine
                },
                font: if bit(0b00000100) {
                    Font::Dots5x10
                } else {
                    Font::Dots5x8
                },
            },
            3 => Instruction::CursorShift {
                display_shift: bit(0b00001000),
                direction: direction(0b00000100),
            },
            4 => Instruction::DisplayControl {
                display: bit(0b00000100),
                cursor: bit(0b00000010),
                blink: bit(0b00000001),
            },
            5 => Instruction::EntryModeSet {
                direction: direction(0b00000010),
                shift: bit(0b00000001),
            },
            6 => Instruction::ReturnHome,
            7 => Instruction::ClearDisplay,
            _ => return None,
        };
        Some(instruction)
    }
}

impl From<Instruction> for u8 {
    fn from(instruction: Instruction) -> Self {
        instruction.to_byte()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_the_bring_up_instructions() {
        let function_set = Instruction::FunctionSet {
            data_length: DataLength::FourBit,
            lines: LineMode::TwoLines,
            font: Font::Dots5x8,
        };
        assert_eq!(function_set.to_byte(), 0x28);

        let wake_up = Instruction::FunctionSet {
            data_length: DataLength::EightBit,
            lines: LineMode::OneLine,
            font: Font::Dots5x8,
        };
        assert_eq!(wake_up.to_byte(), 0x30);

        let display_off = Instruction::DisplayControl {
            display: false,
            cursor: false,
            blink: false,
        };
        assert_eq!(display_off.to_byte(), 0x08);

        assert_eq!(Instruction::ClearDisplay.to_byte(), 0x01);

        let entry_mode = Instruction::EntryModeSet {
            direction: CursorDirection::Right,
            shift: false,
        };
        assert_eq!(entry_mode.to_byte(), 0x06);

        let cursor_on = Instruction::DisplayControl {
            display: true,
            cursor: true,
            blink: true,
        };
        assert_eq!(cursor_on.to_byte(), 0x0F);
    }

    #[test]
    fn ddram_address_is_masked_to_seven_bits() {
        assert_eq!(Instruction::SetDdramAddress(0x05).to_byte(), 0x85);
        assert_eq!(Instruction::SetDdramAddress(0x45).to_byte(), 0xC5);
        assert_eq!(Instruction::SetDdramAddress(0x85).to_byte(), 0x85);
    }

    #[test]
    fn cursor_shift_encoding() {
        let shift = Instruction::CursorShift {
            display_shift: true,
            direction: CursorDirection::Right,
        };
        assert_eq!(shift.to_byte(), 0b00011100);
        assert_eq!(u8::from(Instruction::ReturnHome), 0b00000010);
    }

    #[test]
    fn decoding_ignores_dont_care_bits() {
        assert_eq!(Instruction::from_byte(0b00000011), Some(Instruction::ReturnHome));
        assert_eq!(
            Instruction::from_byte(0b00101011),
            Some(Instruction::FunctionSet {
                data_length: DataLength::FourBit,
                lines: LineMode::TwoLines,
                font: Font::Dots5x8,
            })
        );
        assert_eq!(Instruction::from_byte(0b01000000), None);
        assert_eq!(Instruction::from_byte(0), None);
    }
}
