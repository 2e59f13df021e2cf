//! Normalization of storage driver errors into `{name, error, path}` items.
//!
//! The driver reports most server-side failures with a numeric code, which is
//! what [`StorageErrorInfo::from_driver_error`] reads first. The textual
//! pattern `"<Kind>Error: <code> <message>"` is kept for errors that only
//! exist as strings (older drivers, errors rethrown by other layers).

use mongodb::error::{ErrorKind, WriteFailure};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static STORAGE_ERROR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?P<name>\w*Error): (?P<code>\w+) (?P<message>[^\r\n]+)")
        .expect("storage error pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageErrorInfo {
    pub name: String,
    pub error: String,
    pub path: String,
}

/// Best-effort decode of an error string. Returns `None` when the string does
/// not follow the `"<Kind>Error: <code> <message>"` shape.
pub fn parse_storage_error(raw: &str) -> Option<StorageErrorInfo> {
    let captures = STORAGE_ERROR_PATTERN.captures(raw)?;
    Some(StorageErrorInfo {
        name: captures["name"].to_string(),
        error: captures["message"].trim_end().to_string(),
        path: captures["code"].to_string(),
    })
}

impl StorageErrorInfo {
    /// Prefer the driver's structured error code and fall back to the textual pattern.
    pub fn from_driver_error(err: &mongodb::error::Error) -> Option<Self> {
        let coded = match err.kind.as_ref() {
            ErrorKind::Command(command) => Some((command.code, command.message.clone())),
            ErrorKind::Write(failure) => match failure {
                WriteFailure::WriteError(write) => Some((write.code, write.message.clone())),
                WriteFailure::WriteConcernError(concern) => {
                    Some((concern.code, concern.message.clone()))
                }
                _ => None,
            },
            _ => None,
        };

        match coded {
            Some((code, message)) => Some(StorageErrorInfo {
                name: "MongoError".to_string(),
                error: message,
                path: format!("E{}", code),
            }),
            None => parse_storage_error(&err.to_string()),
        }
    }
}
