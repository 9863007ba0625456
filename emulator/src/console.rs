//! Line grammar for the emulator console.
//!
//! A line is a keyword followed by keyword-specific arguments. The keyword is
//! matched case-insensitively; argument parsers are `winnow` combinators over
//! the remainder of the line.

use core::fmt;
use core::time::Duration;

use winnow::ascii::{Caseless, dec_uint, float, space1};
use winnow::combinator::{alt, opt};
use winnow::error::ContextError;
use winnow::prelude::*;
use winnow::token::take_while;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Keyword {
    Pressure,
    Current,
    Supply,
    Safety,
    Pwm,
    Step,
    Status,
    Report,
    Events,
    Help,
}

impl Keyword {
    pub const ALL: [Self; 10] = [
        Self::Pressure,
        Self::Current,
        Self::Supply,
        Self::Safety,
        Self::Pwm,
        Self::Step,
        Self::Status,
        Self::Report,
        Self::Events,
        Self::Help,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Pressure => "pressure",
            Self::Current => "current",
            Self::Supply => "supply",
            Self::Safety => "safety",
            Self::Pwm => "pwm",
            Self::Step => "step",
            Self::Status => "status",
            Self::Report => "report",
            Self::Events => "events",
            Self::Help => "help",
        }
    }

    pub const fn usage(self) -> &'static str {
        match self {
            Self::Pressure => "pressure <bar>                 - set manifold gauge pressure",
            Self::Current => "current [a|b] <amps>           - set pump current on one or both sensors",
            Self::Supply => "supply <volts>                 - set supply voltage",
            Self::Safety => "safety <on|off>                - assert or release the external safety input",
            Self::Pwm => "pwm <hz> <duty%> | pwm off     - drive or silence the command signal",
            Self::Step => "step [<cycles>|<n>ms|<n>s]     - run control cycles (default 1)",
            Self::Status => "status                         - print the last summary line",
            Self::Report => "report                         - print the verbose status report",
            Self::Events => "events                         - list retained telemetry events",
            Self::Help => "help [topic]                   - show help for a command",
        }
    }

    pub fn lookup(word: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|keyword| keyword.name().eq_ignore_ascii_case(word))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CurrentChannel {
    A,
    B,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PwmSetting {
    pub frequency_hz: f32,
    pub duty_percent: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StepAmount {
    Cycles(u32),
    Time(Duration),
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Command<'a> {
    Pressure(f32),
    Current {
        channel: Option<CurrentChannel>,
        amps: f32,
    },
    Supply(f32),
    Safety(bool),
    Pwm(Option<PwmSetting>),
    Step(StepAmount),
    Status,
    Report,
    Events,
    Help(Option<&'a str>),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ConsoleError<'a> {
    UnknownCommand(&'a str),
    /// Arguments did not match the keyword's grammar; `offset` is the byte
    /// position within the argument text.
    Arguments { keyword: Keyword, offset: usize },
}

impl fmt::Display for ConsoleError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsoleError::UnknownCommand(word) => {
                write!(f, "unknown command `{word}` (try `help`)")
            }
            ConsoleError::Arguments { keyword, offset } => {
                let usage = keyword.usage();
                let syntax = usage.split(" - ").next().unwrap_or(usage).trim_end();
                write!(f, "usage: {syntax} (at argument offset {offset})")
            }
        }
    }
}

/// Parses one trimmed, non-empty console line.
pub fn parse(line: &str) -> Result<Command<'_>, ConsoleError<'_>> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(word, rest)| (word, rest.trim()));
    let keyword = Keyword::lookup(word).ok_or(ConsoleError::UnknownCommand(word))?;

    let parsed = match keyword {
        Keyword::Pressure => finite.map(Command::Pressure).parse(rest),
        Keyword::Current => current.parse(rest),
        Keyword::Supply => finite.map(Command::Supply).parse(rest),
        Keyword::Safety => safety.parse(rest),
        Keyword::Pwm => pwm.parse(rest),
        Keyword::Step => step.parse(rest),
        Keyword::Status => Parser::<&str, &str, ContextError>::value("", Command::Status).parse(rest),
        Keyword::Report => Parser::<&str, &str, ContextError>::value("", Command::Report).parse(rest),
        Keyword::Events => Parser::<&str, &str, ContextError>::value("", Command::Events).parse(rest),
        Keyword::Help => opt(topic).map(Command::Help).parse(rest),
    };

    parsed.map_err(|err| ConsoleError::Arguments {
        keyword,
        offset: err.offset(),
    })
}

fn finite(input: &mut &str) -> Result<f32, ContextError> {
    float::<_, f32, _>
        .verify(|value: &f32| value.is_finite())
        .parse_next(input)
}

fn current<'a>(input: &mut &'a str) -> Result<Command<'a>, ContextError> {
    let channel = alt((
        Caseless("a").value(CurrentChannel::A),
        Caseless("b").value(CurrentChannel::B),
    ));
    alt((
        (channel, space1, finite).map(|(channel, _, amps)| Command::Current {
            channel: Some(channel),
            amps,
        }),
        finite.map(|amps| Command::Current {
            channel: None,
            amps,
        }),
    ))
    .parse_next(input)
}

fn safety<'a>(input: &mut &'a str) -> Result<Command<'a>, ContextError> {
    alt((
        Caseless("on").value(Command::Safety(true)),
        Caseless("off").value(Command::Safety(false)),
    ))
    .parse_next(input)
}

fn pwm<'a>(input: &mut &'a str) -> Result<Command<'a>, ContextError> {
    alt((
        Caseless("off").value(Command::Pwm(None)),
        (finite, space1, finite).map(|(frequency_hz, _, duty_percent)| {
            Command::Pwm(Some(PwmSetting {
                frequency_hz,
                duty_percent,
            }))
        }),
    ))
    .parse_next(input)
}

fn step<'a>(input: &mut &'a str) -> Result<Command<'a>, ContextError> {
    let amount = alt((
        (dec_uint::<_, u64, _>, Caseless("ms"))
            .map(|(millis, _)| StepAmount::Time(Duration::from_millis(millis))),
        (dec_uint::<_, u64, _>, Caseless("s"))
            .map(|(secs, _)| StepAmount::Time(Duration::from_secs(secs))),
        dec_uint::<_, u32, _>.map(StepAmount::Cycles),
    ));
    opt(amount)
        .map(|amount| Command::Step(amount.unwrap_or(StepAmount::Cycles(1))))
        .parse_next(input)
}

fn topic<'a>(input: &mut &'a str) -> Result<&'a str, ContextError> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric()).parse_next(input)
}
