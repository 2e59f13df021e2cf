//! CRUD delegates.
//!
//! Each delegate is built once from a collection, a set of builder closures and
//! a [`Responder`]. Running it takes the request's error accumulator, the
//! model (or decoded query string) and a request helper, issues exactly one
//! storage operation, and hands either the result or the accumulated errors to
//! the responder.

use axum::response::{IntoResponse, Json, Response};
use mongodb::bson::Document;
use serde::Serialize;
use tracing::warn;

use crate::errors::{ErrorBuilder, StorageErrorInfo};

pub mod crud;

pub use crud::{
    create, delete_one, get_one, query_by_aggregate, query_by_find, save, CreateDelegate,
    DeleteOneDelegate, GetOneDelegate, QueryByAggregateDelegate, QueryByFindDelegate, SaveDelegate,
};

/// A builder closure: reads the input and the request helper, may push
/// validation errors, and returns the piece of the storage call it is for.
pub type Builder<I, H, T> = Box<dyn Fn(&mut ErrorBuilder, &I, &H) -> T + Send + Sync>;

/// Something that can be flattened into a plain field map before it is handed
/// to the builders.
pub trait Model {
    fn clean(&self) -> Result<Document, String>;
}

impl<T: Serialize + ?Sized> Model for T {
    fn clean(&self) -> Result<Document, String> {
        mongodb::bson::to_document(self).map_err(|err| err.to_string())
    }
}

/// Sends either the result or the accumulated errors back to the caller.
pub trait Responder<T>: Send + Sync {
    type Output;

    fn respond(&self, errors: ErrorBuilder, result: Option<T>) -> Self::Output;
}

/// Renders errors with the accumulator's status, results as `200` JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonResponder;

impl<T: Serialize> Responder<T> for JsonResponder {
    type Output = Response;

    fn respond(&self, errors: ErrorBuilder, result: Option<T>) -> Response {
        if errors.has_error(None) {
            errors.into_response()
        } else {
            Json(result).into_response()
        }
    }
}

/// Hands the outcome to a closure: `Err` with the accumulator when it holds
/// errors, `Ok` with the result otherwise.
pub struct CallbackResponder<F>(pub F);

impl<T, O, F> Responder<T> for CallbackResponder<F>
where
    F: Fn(Result<Option<T>, ErrorBuilder>) -> O + Send + Sync,
{
    type Output = O;

    fn respond(&self, errors: ErrorBuilder, result: Option<T>) -> O {
        if errors.has_error(None) {
            (self.0)(Err(errors))
        } else {
            (self.0)(Ok(result))
        }
    }
}

pub(crate) fn record_storage_error(
    errors: &mut ErrorBuilder,
    operation: &'static str,
    err: &mongodb::error::Error,
) {
    warn!(operation, "storage operation failed: {}", err);
    match StorageErrorInfo::from_driver_error(err) {
        Some(info) => errors.push_item(info),
        None => errors.push("mongodb error", err.to_string()),
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use mongodb::bson::doc;

    #[derive(Serialize)]
    struct Person {
        name: String,
        age: i32,
    }

    #[test]
    fn test_model_clean() {
        let person = Person { name: "john".to_string(), age: 30 };
        assert_eq!(person.clean().unwrap(), doc! { "name": "john", "age": 30 });
    }

    #[test]
    fn test_model_clean_rejects_non_documents() {
        assert!(42_i32.clean().is_err());
    }

    #[test]
    fn test_json_responder_uses_error_status() {
        let mut errors = ErrorBuilder::new();
        errors.push("name", "is required");
        let response = Responder::<Document>::respond(&JsonResponder, errors, None);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = JsonResponder.respond(ErrorBuilder::new(), Some(doc! { "name": "john" }));
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_callback_responder() {
        let responder = CallbackResponder(|outcome: Result<Option<i32>, ErrorBuilder>| match outcome {
            Ok(value) => value.unwrap_or_default(),
            Err(errors) => -(errors.items().len() as i32),
        });

        assert_eq!(responder.respond(ErrorBuilder::new(), Some(7)), 7);

        let mut errors = ErrorBuilder::new();
        errors.push("a", "x").push("b", "y");
        assert_eq!(responder.respond(errors, Some(7)), -2);
    }
}
