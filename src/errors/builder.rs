use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use super::StorageErrorInfo;

/// One accumulated error, shaped `{name, error, path}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorItem {
    pub name: String,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<StorageErrorInfo> for ErrorItem {
    fn from(info: StorageErrorInfo) -> Self {
        ErrorItem {
            name: info.name,
            error: info.error,
            path: Some(info.path),
        }
    }
}

/// Request-scoped error accumulator.
///
/// Builders and delegates push validation or storage errors here instead of
/// returning early; whoever sends the response checks [`ErrorBuilder::has_error`]
/// and either renders the items or the result.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBuilder {
    items: Vec<ErrorItem>,
    #[serde(skip)]
    status: StatusCode,
}

impl Default for ErrorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorBuilder {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            status: StatusCode::BAD_REQUEST,
        }
    }

    pub fn push(&mut self, name: impl Into<String>, error: impl Into<String>) -> &mut Self {
        self.items.push(ErrorItem {
            name: name.into(),
            error: error.into(),
            path: None,
        });
        self
    }

    pub fn push_item(&mut self, item: impl Into<ErrorItem>) -> &mut Self {
        self.items.push(item.into());
        self
    }

    /// `None` or an empty scope matches any item; otherwise only items with that name.
    pub fn has_error(&self, scope: Option<&str>) -> bool {
        match scope {
            None | Some("") => !self.items.is_empty(),
            Some(name) => self.items.iter().any(|item| item.name == name),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[ErrorItem] {
        &self.items
    }

    pub fn output(&self) -> Vec<ErrorItem> {
        self.items.clone()
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self
    }
}

impl IntoResponse for ErrorBuilder {
    fn into_response(self) -> Response {
        (self.status, Json(self.items)).into_response()
    }
}
