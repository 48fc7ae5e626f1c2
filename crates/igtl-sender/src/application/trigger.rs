//! Named entry points into a [`NetworkSender`].
//!
//! A [`Trigger`] is a typed request a host can hold, log, or parse from
//! text, and later [`dispatch`](Trigger::dispatch) against any sender without
//! knowing how the sender is built.
//!
//! # Text form
//!
//! | Line                               | Trigger                       |
//! |------------------------------------|-------------------------------|
//! | `start`                            | `StartSending`                |
//! | `stop`                             | `StopSending`                 |
//! | `port 18944`                       | `UpdateConfiguration`         |
//! | `send text hello world`            | `SendObject(Text)`            |
//! | `send status 1 tracking ok`        | `SendObject(Status)`          |
//! | `send transform 1 2 3`             | `SendObject(Transform)` (xyz) |
//! | `send transform m0 m1 ... m15`     | `SendObject(Transform)`       |
//!
//! The long names (`start_sending`, `update_configuration`, ...) are accepted
//! as aliases.

use std::str::FromStr;

use igtl_core::{DataObject, Transform};
use thiserror::Error;

use super::network_sender::{Completion, NetworkSender};
use super::sender_service::SenderError;

/// Reasons a line cannot be parsed into a [`Trigger`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TriggerParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    UnknownCommand(String),

    #[error("missing {0}")]
    MissingArgument(&'static str),

    #[error("'{0}' is not a valid number")]
    InvalidNumber(String),

    #[error("unknown object type '{0}' (expected text, status or transform)")]
    UnknownObjectType(String),

    #[error("a transform takes 3 or 16 values, got {0}")]
    TransformArity(usize),
}

/// One request against a [`NetworkSender`].
#[derive(Debug, Clone, PartialEq)]
pub enum Trigger {
    UpdateConfiguration { port: u16 },
    StartSending,
    StopSending,
    SendObject(DataObject),
}

impl Trigger {
    /// Stable name of the entry point, used in logs and console replies.
    pub fn key(&self) -> &'static str {
        match self {
            Trigger::UpdateConfiguration { .. } => "update_configuration",
            Trigger::StartSending => "start_sending",
            Trigger::StopSending => "stop_sending",
            Trigger::SendObject(_) => "send_object",
        }
    }

    /// Invokes the matching entry point on `sender`.
    ///
    /// Lifecycle triggers return their [`Completion`]; sends are
    /// fire-and-forget and return `None`.
    ///
    /// # Errors
    ///
    /// Propagates [`SenderError::WorkerUnavailable`] from a torn-down sender.
    pub fn dispatch<S>(self, sender: &S) -> Result<Option<Completion<()>>, SenderError>
    where
        S: NetworkSender + ?Sized,
    {
        match self {
            Trigger::UpdateConfiguration { port } => sender.update_configuration(port).map(Some),
            Trigger::StartSending => sender.start_sending().map(Some),
            Trigger::StopSending => sender.stop_sending().map(Some),
            Trigger::SendObject(object) => sender.send_object(object).map(|()| None),
        }
    }
}

impl FromStr for Trigger {
    type Err = TriggerParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (command, rest) = split_word(line);
        match command {
            "" => Err(TriggerParseError::Empty),
            "start" | "start_sending" => Ok(Trigger::StartSending),
            "stop" | "stop_sending" => Ok(Trigger::StopSending),
            "port" | "update_configuration" => {
                let (value, _) = split_word(rest);
                if value.is_empty() {
                    return Err(TriggerParseError::MissingArgument("port number"));
                }
                Ok(Trigger::UpdateConfiguration {
                    port: parse_number(value)?,
                })
            }
            "send" | "send_object" => parse_object(rest).map(Trigger::SendObject),
            other => Err(TriggerParseError::UnknownCommand(other.to_string())),
        }
    }
}

fn parse_object(args: &str) -> Result<DataObject, TriggerParseError> {
    let (kind, rest) = split_word(args);
    match kind {
        "" => Err(TriggerParseError::MissingArgument("object type")),
        "text" => Ok(DataObject::Text(rest.to_string())),
        "status" => {
            let (code, message) = split_word(rest);
            if code.is_empty() {
                return Err(TriggerParseError::MissingArgument("status code"));
            }
            Ok(DataObject::Status {
                code: parse_number(code)?,
                message: message.to_string(),
            })
        }
        "transform" => {
            let values = rest
                .split_whitespace()
                .map(parse_number::<f32>)
                .collect::<Result<Vec<_>, _>>()?;
            match values.as_slice() {
                [x, y, z] => Ok(Transform::from_translation(*x, *y, *z).into()),
                m if m.len() == 16 => {
                    let mut matrix = [0f32; 16];
                    matrix.copy_from_slice(m);
                    Ok(Transform { matrix }.into())
                }
                other => Err(TriggerParseError::TransformArity(other.len())),
            }
        }
        other => Err(TriggerParseError::UnknownObjectType(other.to_string())),
    }
}

/// Splits off the first whitespace-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

fn parse_number<T: FromStr>(s: &str) -> Result<T, TriggerParseError> {
    s.parse()
        .map_err(|_| TriggerParseError::InvalidNumber(s.to_string()))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
