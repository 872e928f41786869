//! Command protocol.
//!
//! A message carrying a `command` key controls the session:
//! `{"command": "start", "id": 7}` or `{"command": "stop"}`. Any other
//! message is a data record for the group named by its topic.

use serde_json::Value;

use crate::error::{RecorderError, RecorderResult};

pub const COMMAND_KEY: &str = "command";
pub const ID_KEY: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Start { id: i64 },
    Stop,
}

/// One inbound message, classified.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    Command(Command),
    Record { group: String, record: Value },
}

impl Command {
    /// Parse the command carried by `message`, if any.
    pub fn from_json(message: &Value) -> RecorderResult<Option<Self>> {
        let Some(action) = message.get(COMMAND_KEY) else {
            return Ok(None);
        };
        match action.as_str() {
            Some("start") => {
                let id = message.get(ID_KEY).ok_or(RecorderError::MissingId)?;
                let id = id
                    .as_i64()
                    .ok_or_else(|| RecorderError::InvalidCommand(format!("start id must be an integer, got {id}")))?;
                Ok(Some(Self::Start { id }))
            }
            Some("stop") => Ok(Some(Self::Stop)),
            _ => Err(RecorderError::InvalidCommand(action.to_string())),
        }
    }
}

impl Event {
    pub fn parse(topic: &str, message: &Value) -> RecorderResult<Self> {
        Ok(match Command::from_json(message)? {
            Some(command) => Self::Command(command),
            None => Self::Record {
                group: topic.to_string(),
                record: message.clone(),
            },
        })
    }
}
