//! Text commands read from the console, one per line.

use std::str::FromStr;
use log::info;
use thiserror::Error;
use lcdfifo_gpio::lcd::hd44780::driver::{HD44780Interface, QueuedHD44780Driver, ShiftDirection};
use lcdfifo_gpio::lcd::hd44780::instr::flag_from_u8;
use lcdfifo_gpio::lcd::hd44780::queue::QueueEntry;
use lcdfifo_gpio::lcd::hd44780::{LcdError, LcdResult};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command {0:?}")]
    Unknown(String),
    #[error("missing argument: {0}")]
    Missing(&'static str),
    #[error("{0:?} is not a number")]
    Number(String),
    #[error(transparent)]
    Lcd(#[from] LcdError),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Command {
    Clear,
    Home,
    Position { column: u8, row: u8 },
    Char(u8),
    Print(String),
    Shift { count: u8, direction: ShiftDirection },
    Cursor { on: bool, blink: bool },
    Raw(QueueEntry),
    Flush,
    Status,
    Quit,
}

fn number<'a>(
    args: &mut impl Iterator<Item = &'a str>,
    name: &'static str,
    radix: u32,
) -> Result<u8, ParseError> {
    let arg = args.next().ok_or(ParseError::Missing(name))?;
    let digits = if radix == 16 {
        arg.trim_start_matches("0x")
    } else {
        arg
    };
    u8::from_str_radix(digits, radix).map_err(|_| ParseError::Number(arg.to_string()))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, rest) = line.split_once(' ').unwrap_or((line, ""));
        let mut args = rest.split_whitespace();

        let command = match name {
            "" => return Err(ParseError::Empty),
            "clear" => Command::Clear,
            "home" => Command::Home,
            "pos" => {
                let column = number(&mut args, "column", 10)?;
                let row = number(&mut args, "row", 10)?;
                Command::Position { column, row }
            }
            "char" => {
                let c = rest.trim_start().bytes().next().ok_or(ParseError::Missing("character"))?;
                Command::Char(c)
            }
            "print" => Command::Print(rest.to_string()),
            "shift" => {
                let count = number(&mut args, "count", 10)?;
                let direction = ShiftDirection::try_from(number(&mut args, "direction", 10)?)?;
                Command::Shift { count, direction }
            }
            "cursor" => {
                let on = flag_from_u8(number(&mut args, "cursor", 10)?, "cursor on/off")?;
                let blink = flag_from_u8(number(&mut args, "blink", 10)?, "cursor blink")?;
                Command::Cursor { on, blink }
            }
            "raw" => {
                let tag = number(&mut args, "tag", 16)?;
                let payload = number(&mut args, "payload", 16)?;
                Command::Raw(QueueEntry::from_tagged(tag, payload)?)
            }
            "flush" => Command::Flush,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            other => return Err(ParseError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

impl Command {
    /// Queues the command on `lcd`. [Command::Quit] does nothing here.
    pub fn apply<I: HD44780Interface, const N: usize>(
        &self,
        lcd: &mut QueuedHD44780Driver<I, N>,
    ) -> LcdResult<()> {
        match self {
            Command::Clear => lcd.clear(),
            Command::Home => lcd.home(),
            Command::Position { column, row } => lcd.set_position(*column, *row),
            Command::Char(c) => lcd.put_char(*c),
            Command::Print(text) => lcd.put_string(text),
            Command::Shift { count, direction } => lcd.shift_display(*count, *direction),
            Command::Cursor { on, blink } => lcd.set_cursor_style(*on, *blink),
            Command::Raw(entry) => lcd.enqueue(*entry),
            Command::Flush => {
                let sent = lcd.flush()?;
                info!("Flushed {} entries", sent);
                Ok(())
            }
            Command::Status => {
                let (busy, address) = lcd.read_status()?;
                info!(
                    "Busy: {}, address: {:#04x}, pending: {}/{}",
                    busy,
                    address,
                    lcd.pending(),
                    lcd.queue().capacity()
                );
                Ok(())
            }
            Command::Quit => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcdfifo_gpio::lcd::hd44780::driver::{HD44780Config, SimulatedHD44780};

    fn parse(line: &str) -> Result<Command, ParseError> {
        line.parse()
    }

    #[test]
    fn parses_every_command() {
        assert_eq!(parse("clear").unwrap(), Command::Clear);
        assert_eq!(parse("  home ").unwrap(), Command::Home);
        assert_eq!(parse("pos 3 1").unwrap(), Command::Position { column: 3, row: 1 });
        assert_eq!(parse("char 1").unwrap(), Command::Char(b'1'));
        assert_eq!(parse("char   x").unwrap(), Command::Char(b'x'));
        assert_eq!(parse("print Hello world").unwrap(), Command::Print("Hello world".into()));
        assert_eq!(
            parse("shift 4 0").unwrap(),
            Command::Shift { count: 4, direction: ShiftDirection::Left }
        );
        assert_eq!(parse("cursor 1 0").unwrap(), Command::Cursor { on: true, blink: false });
        assert_eq!(parse("raw 80 41").unwrap(), Command::Raw(QueueEntry::Data(0x41)));
        assert_eq!(parse("raw 0x40 0x01").unwrap(), Command::Raw(QueueEntry::Command(0x01)));
        assert_eq!(parse("quit").unwrap(), Command::Quit);
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(matches!(parse(""), Err(ParseError::Empty)));
        assert!(matches!(parse("dance"), Err(ParseError::Unknown(_))));
        assert!(matches!(parse("pos 3"), Err(ParseError::Missing("row"))));
        assert!(matches!(parse("pos x 1"), Err(ParseError::Number(_))));
        assert!(matches!(
            parse("shift 1 2"),
            Err(ParseError::Lcd(LcdError::InvalidDirection(2)))
        ));
        assert!(matches!(
            parse("cursor 2 0"),
            Err(ParseError::Lcd(LcdError::InvalidParameter(_)))
        ));
    }

    #[test]
    fn unknown_raw_tag_is_fatal() {
        match parse("raw 11 00") {
            Err(ParseError::Lcd(err)) => assert!(err.is_fatal()),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn row_is_checked_when_applied() {
        let mut lcd =
            QueuedHD44780Driver::init(SimulatedHD44780::new(), HD44780Config::default()).unwrap();
        let command = parse("pos 0 2").unwrap();
        assert_eq!(command.apply(&mut lcd), Err(LcdError::InvalidRow(2)));
        assert!(lcd.is_idle());

        parse("print hi").unwrap().apply(&mut lcd).unwrap();
        parse("flush").unwrap().apply(&mut lcd).unwrap();
        assert_eq!(lcd.interface().row_text(0, 2), "hi");
    }
}
