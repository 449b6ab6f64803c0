//! HD44780 instruction encoding.
//!
//! Every function here is pure: it turns a display operation into the [QueueEntry] values that
//! carry it, and never touches the bus. Bit positions follow the HD44780 instruction table.

use crate::lcd::hd44780::queue::QueueEntry;
use crate::lcd::hd44780::{LcdError, LcdResult};
use std::iter::{repeat_n, RepeatN};

/// Clears the display and sets the DDRAM address to 0.
pub const CLEAR_DISPLAY: u8 = 0b0000_0001;
/// Sets the DDRAM address to 0 and cancels any display shift.
pub const RETURN_HOME: u8 = 0b0000_0010;
/// Entry mode set. Bit 1 increments the address after each write, bit 0 shifts the display.
pub const ENTRY_MODE: u8 = 0b0000_0100;
pub const ENTRY_INCREMENT: u8 = 0b0000_0010;
pub const ENTRY_SHIFT: u8 = 0b0000_0001;
/// Display on/off control.
pub const DISPLAY_CONTROL: u8 = 0b0000_1000;
pub const DISPLAY_ON: u8 = 0b0000_0100;
pub const CURSOR_ON: u8 = 0b0000_0010;
pub const BLINK_ON: u8 = 0b0000_0001;
/// Cursor or display shift, without changing DDRAM contents.
pub const CURSOR_SHIFT: u8 = 0b0001_0000;
pub const SHIFT_DISPLAY: u8 = 0b0000_1000;
pub const SHIFT_RIGHT: u8 = 0b0000_0100;
/// Function set. Bit 4 (8-bit interface) is never set by this driver.
pub const FUNCTION_SET: u8 = 0b0010_0000;
pub const FUNCTION_8_BIT: u8 = 0b0001_0000;
pub const FUNCTION_2_LINES: u8 = 0b0000_1000;
pub const FUNCTION_5X10: u8 = 0b0000_0100;
pub const SET_CGRAM_ADDRESS: u8 = 0b0100_0000;
pub const SET_DDRAM_ADDRESS: u8 = 0b1000_0000;

/// Busy flag in the status byte. The remaining seven bits are the address counter.
pub const BUSY_FLAG: u8 = 0b1000_0000;

/// DDRAM address of the first column of each row.
pub const ROW_ADDRESSES: [u8; 2] = [0x00, 0x40];

/// Number of user-definable characters in CGRAM.
pub const CUSTOM_CHARACTERS: u8 = 8;

/// Direction of a display or cursor shift.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ShiftDirection {
    Left,
    Right,
}

impl ShiftDirection {
    fn mask(self) -> u8 {
        match self {
            ShiftDirection::Left => 0,
            ShiftDirection::Right => SHIFT_RIGHT,
        }
    }
}

/// `0` is left, `1` is right.
impl TryFrom<u8> for ShiftDirection {
    type Error = LcdError;

    fn try_from(value: u8) -> LcdResult<Self> {
        match value {
            0 => Ok(ShiftDirection::Left),
            1 => Ok(ShiftDirection::Right),
            _ => Err(LcdError::InvalidDirection(value)),
        }
    }
}

/// Converts a `0`/`1` flag to a boolean.
///
/// # Errors
/// - [LcdError::InvalidParameter] naming `name` for any other value.
pub fn flag_from_u8(value: u8, name: &'static str) -> LcdResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(LcdError::InvalidParameter(name)),
    }
}

fn bit(flag: bool, mask: u8) -> u8 {
    if flag { mask } else { 0 }
}

pub fn clear() -> QueueEntry {
    QueueEntry::Command(CLEAR_DISPLAY)
}

pub fn home() -> QueueEntry {
    QueueEntry::Command(RETURN_HOME)
}

/// Gets the DDRAM address of `column` in `row`, wrapped to 7 bits.
pub fn ddram_address(column: u8, row: u8) -> LcdResult<u8> {
    let base = *ROW_ADDRESSES
        .get(row as usize)
        .ok_or(LcdError::InvalidRow(row))?;
    Ok(base.wrapping_add(column) & 0x7F)
}

/// Moves the cursor to `column` of `row` (0 or 1).
pub fn set_position(column: u8, row: u8) -> LcdResult<QueueEntry> {
    Ok(QueueEntry::Command(SET_DDRAM_ADDRESS | ddram_address(column, row)?))
}

pub fn put_char(c: u8) -> QueueEntry {
    QueueEntry::Data(c)
}

/// Encodes every byte of `s` up to, and not including, the first NUL.
pub fn put_string(s: &[u8]) -> impl ExactSizeIterator<Item = QueueEntry> + '_ {
    let end = s.iter().position(|&b| b == 0).unwrap_or(s.len());
    s[..end].iter().copied().map(put_char)
}

/// Shifts the whole display by `count` characters; DDRAM contents stay put.
pub fn shift_display(count: u8, direction: ShiftDirection) -> RepeatN<QueueEntry> {
    let command = CURSOR_SHIFT | SHIFT_DISPLAY | direction.mask();
    repeat_n(QueueEntry::Command(command), count as usize)
}

/// Moves the cursor by `count` characters without shifting the display.
pub fn move_cursor(count: u8, direction: ShiftDirection) -> RepeatN<QueueEntry> {
    let command = CURSOR_SHIFT | direction.mask();
    repeat_n(QueueEntry::Command(command), count as usize)
}

/// Display control with the display kept on.
pub fn cursor_style(cursor_on: bool, blink_on: bool) -> QueueEntry {
    display_control(true, cursor_on, blink_on)
}

pub fn display_control(display_on: bool, cursor_on: bool, blink_on: bool) -> QueueEntry {
    QueueEntry::Command(
        DISPLAY_CONTROL
            | bit(display_on, DISPLAY_ON)
            | bit(cursor_on, CURSOR_ON)
            | bit(blink_on, BLINK_ON),
    )
}

pub fn entry_mode(increment: bool, shift: bool) -> QueueEntry {
    QueueEntry::Command(ENTRY_MODE | bit(increment, ENTRY_INCREMENT) | bit(shift, ENTRY_SHIFT))
}

/// Function set for the 4-bit interface.
pub fn function_set(two_lines: bool, font_5x10: bool) -> QueueEntry {
    QueueEntry::Command(
        FUNCTION_SET | bit(two_lines, FUNCTION_2_LINES) | bit(font_5x10, FUNCTION_5X10),
    )
}

/// Writes a 5x8 glyph into CGRAM `slot` (0-7).
///
/// Only the low five bits of each row are used. The address counter is left in CGRAM, so a
/// position must be set before printing again.
pub fn define_character(slot: u8, rows: [u8; 8]) -> LcdResult<Vec<QueueEntry>> {
    if slot >= CUSTOM_CHARACTERS {
        return Err(LcdError::InvalidParameter("character slot"));
    }
    let mut entries = Vec::with_capacity(rows.len() + 1);
    entries.push(QueueEntry::Command(SET_CGRAM_ADDRESS | (slot << 3)));
    entries.extend(rows.iter().map(|row| QueueEntry::Data(row & 0x1F)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use QueueEntry::*;

    #[test]
    fn zero_argument_commands() {
        assert_eq!(clear(), Command(0x01));
        assert_eq!(home(), Command(0x02));
    }

    #[test]
    fn position_uses_row_base() {
        assert_eq!(set_position(0, 0), Ok(Command(0x80)));
        assert_eq!(set_position(3, 1), Ok(Command(0xC3)));
        assert_eq!(set_position(0x3F, 1), Ok(Command(0xFF)));
    }

    #[test]
    fn position_wraps_to_seven_bits() {
        assert_eq!(set_position(0x40, 1), Ok(Command(0x80)));
        assert_eq!(set_position(0xFF, 0), Ok(Command(0xFF)));
    }

    #[test]
    fn position_rejects_third_row() {
        assert_eq!(set_position(0, 2), Err(LcdError::InvalidRow(2)));
    }

    #[test]
    fn string_stops_at_nul() {
        let entries: Vec<_> = put_string(b"AB\0CD").collect();
        assert_eq!(entries, vec![Data(b'A'), Data(b'B')]);
        assert_eq!(put_string(b"").len(), 0);
    }

    #[test]
    fn display_shift_repeats() {
        let right: Vec<_> = shift_display(3, ShiftDirection::Right).collect();
        assert_eq!(right, vec![Command(0x1C); 3]);
        let left: Vec<_> = shift_display(2, ShiftDirection::Left).collect();
        assert_eq!(left, vec![Command(0x18); 2]);
        assert_eq!(shift_display(0, ShiftDirection::Left).len(), 0);
    }

    #[test]
    fn cursor_moves_without_display_bit() {
        let entries: Vec<_> = move_cursor(1, ShiftDirection::Right).collect();
        assert_eq!(entries, vec![Command(0x14)]);
        assert_eq!(move_cursor(1, ShiftDirection::Left).next(), Some(Command(0x10)));
    }

    #[test]
    fn raw_direction_is_validated() {
        assert_eq!(ShiftDirection::try_from(0), Ok(ShiftDirection::Left));
        assert_eq!(ShiftDirection::try_from(1), Ok(ShiftDirection::Right));
        assert_eq!(ShiftDirection::try_from(2), Err(LcdError::InvalidDirection(2)));
    }

    #[test]
    fn cursor_style_keeps_display_on() {
        assert_eq!(cursor_style(false, false), Command(0x0C));
        assert_eq!(cursor_style(true, false), Command(0x0E));
        assert_eq!(cursor_style(false, true), Command(0x0D));
        assert_eq!(cursor_style(true, true), Command(0x0F));
        assert_eq!(display_control(false, false, false), Command(0x08));
    }

    #[test]
    fn raw_flags_are_validated() {
        assert_eq!(flag_from_u8(1, "cursor"), Ok(true));
        assert_eq!(flag_from_u8(0, "cursor"), Ok(false));
        assert_eq!(flag_from_u8(7, "blink"), Err(LcdError::InvalidParameter("blink")));
    }

    #[test]
    fn setup_commands() {
        assert_eq!(function_set(true, false), Command(0x28));
        assert_eq!(function_set(false, false), Command(0x20));
        assert_eq!(function_set(true, true), Command(0x2C));
        assert_eq!(entry_mode(true, false), Command(0x06));
    }

    #[test]
    fn custom_character_goes_to_cgram() {
        let entries = define_character(2, [0xFF, 0, 0, 0, 0, 0, 0, 0x11]).unwrap();
        assert_eq!(entries.len(), 9);
        assert_eq!(entries[0], Command(0x50));
        assert_eq!(entries[1], Data(0x1F));
        assert_eq!(entries[8], Data(0x11));
        assert_eq!(
            define_character(8, [0; 8]),
            Err(LcdError::InvalidParameter("character slot"))
        );
    }

    proptest! {
        #[test]
        fn any_valid_position_is_one_ddram_command(column in 0u8..=0x3F, row in 0u8..=1) {
            let base = if row == 0 { 0x00 } else { 0x40 };
            prop_assert_eq!(
                set_position(column, row),
                Ok(Command(0x80 | ((base + column) & 0x7F)))
            );
        }

        #[test]
        fn any_row_above_one_is_rejected(column: u8, row in 2u8..) {
            prop_assert_eq!(set_position(column, row), Err(LcdError::InvalidRow(row)));
        }

        #[test]
        fn strings_map_byte_for_byte(s in proptest::collection::vec(1u8.., 0..64)) {
            let entries: Vec<_> = put_string(&s).collect();
            prop_assert_eq!(entries.len(), s.len());
            for (entry, byte) in entries.iter().zip(&s) {
                prop_assert_eq!(*entry, Data(*byte));
            }
        }
    }
}
