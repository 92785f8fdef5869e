// Command domain model - Inbound client requests and their results
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
    #[error("expected a JSON object")]
    NotAnObject,
    #[error("missing 'command' field")]
    MissingCommand,
}

/// One parsed client message: the command name plus every other field
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub name: String,
    pub params: Map<String, Value>,
}

impl Command {
    /// Parse one raw text frame of the form `{"command": "<name>", ...}`
    pub fn parse(raw: &str) -> Result<Self, CommandParseError> {
        let mut envelope = match serde_json::from_str::<Value>(raw)? {
            Value::Object(map) => map,
            _ => return Err(CommandParseError::NotAnObject),
        };

        let name = match envelope.remove("command") {
            Some(Value::String(name)) => name,
            _ => return Err(CommandParseError::MissingCommand),
        };

        Ok(Self {
            name,
            params: envelope,
        })
    }

    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn int_param(&self, key: &str) -> Option<i64> {
        self.params.get(key).and_then(Value::as_i64)
    }
}

/// Result of one command, broadcast verbatim to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CommandResult {
    Payload(Map<String, Value>),
    Failure { error: String },
}

impl CommandResult {
    pub fn payload(value: Value) -> Self {
        match value {
            Value::Object(map) => CommandResult::Payload(map),
            other => {
                let mut map = Map::new();
                map.insert("result".to_string(), other);
                CommandResult::Payload(map)
            }
        }
    }

    pub fn missing_param(param: &str) -> Self {
        CommandResult::Failure {
            error: format!("Missing '{}' parameter", param),
        }
    }

    pub fn unknown_command(name: &str) -> Self {
        CommandResult::Failure {
            error: format!("Unknown command: {}", name),
        }
    }
}
