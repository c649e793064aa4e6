//! Turning command lines and session input into calls on [Klcd].
use klcd_gpio::lcd::hd44780::LcdResult;
use klcd_gpio::lcd::hd44780::device::{Klcd, Request};
use klcd_gpio::lcd::hd44780::driver::HD44780Driver;
use log::{error, info};
use std::io::BufRead;
use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("command must be a single character, got {0:?}")]
    InvalidCommand(String),
    #[error("invalid number {0:?}")]
    InvalidNumber(String),
    #[error("missing {0}")]
    Missing(&'static str),
    #[error(
        "usage: klcd <command> <text> <line> <offset>, or klcd w <text>, or no arguments to read commands from stdin"
    )]
    Usage,
}

/// One thing to do with the display.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Action {
    /// A command code with its request, forwarded as is. Unknown codes are left for [Klcd] to
    /// reject.
    Ioctl(u8, Request),
    /// Raw bytes for the plain-write path, terminator included.
    Write(Vec<u8>),
}

fn parse_code(token: &str) -> Result<u8, ParseError> {
    match token.as_bytes() {
        [code] => Ok(*code),
        [] => Err(ParseError::Empty),
        _ => Err(ParseError::InvalidCommand(token.to_string())),
    }
}

fn parse_number(token: &str) -> Result<u32, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::InvalidNumber(token.to_string()))
}

fn write_buffer(text: &str) -> Vec<u8> {
    let mut buffer = text.as_bytes().to_vec();
    buffer.push(b'\n');
    buffer
}

impl Action {
    /// Parses program arguments, without the program name.
    ///
    /// Either `<command> <text> <line> <offset>` or `w <text>`.
    pub fn from_args(args: &[String]) -> Result<Self, ParseError> {
        match args {
            [w, text] if w == "w" => Ok(Action::Write(write_buffer(text))),
            [command, text, line, offset] => Ok(Action::Ioctl(
                parse_code(command)?,
                Request::new(text, parse_number(line)?, parse_number(offset)?),
            )),
            _ => Err(ParseError::Usage),
        }
    }

    /// Parses one line of session input.
    ///
    /// - `0`, `4`, `5`: clear, cursor on, cursor off.
    /// - `1 <text>`, `2 <text>`: print on line 1 or 2.
    /// - `3 <line> <offset> <text>`: print at a position.
    /// - `w <text>`: clear and print.
    ///
    /// The text is the rest of the line, spaces included.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        if command == "w" {
            return Ok(Action::Write(write_buffer(rest)));
        }

        let code = parse_code(command)?;
        if code != b'3' {
            return Ok(Action::Ioctl(code, Request::new(rest, 0, 0)));
        }

        let mut parts = rest.splitn(3, ' ');
        let line = parts.next().filter(|s| !s.is_empty()).ok_or(ParseError::Missing("line"))?;
        let offset = parts.next().ok_or(ParseError::Missing("offset"))?;
        let text = parts.next().unwrap_or("");
        Ok(Action::Ioctl(
            code,
            Request::new(text, parse_number(line)?, parse_number(offset)?),
        ))
    }

    pub fn run<D: HD44780Driver>(&self, klcd: &Klcd<D>) -> LcdResult<()> {
        match self {
            Action::Ioctl(code, request) => klcd.ioctl(*code, Some(request)),
            Action::Write(buffer) => klcd.write(buffer).map(|_| ()),
        }
    }
}

/// Runs every line of `input` against `klcd`, until the end of input.
///
/// Blank lines are skipped. Bad lines and failed commands are logged and counted, the session
/// goes on. Returns the number of failures.
pub fn run_session<D: HD44780Driver>(klcd: &Klcd<D>, input: impl BufRead) -> std::io::Result<usize> {
    let mut failures = 0;

    for (number, line) in input.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let result = Action::from_line(&line)
            .map_err(eyre::Report::from)
            .and_then(|action| action.run(klcd).map_err(eyre::Report::from));
        if let Err(err) = result {
            error!("Line {}: {}", number + 1, err);
            failures += 1;
        }
    }

    info!("Session ended with {} failures", failures);
    Ok(failures)
}
