use std::collections::BTreeMap;

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::rejection::JsonRejection;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

/// Field name to the list of messages it failed with, in field order.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Success<V> {
    success: bool,
    #[serde(flatten)]
    value: V,
}

impl<V: Serialize> Success<V> {
    pub fn of(value: V) -> Self {
        Self {
            success: true,
            value,
        }
    }
}

/// A successful response: the status code and the `{success: true, ..}` body.
#[derive(Debug, Clone)]
pub struct Reply<V> {
    status: StatusCode,
    body: Success<V>,
}

impl<V: Serialize> Reply<V> {
    pub fn new(status: StatusCode, value: V) -> Self {
        Self {
            status,
            body: Success::of(value),
        }
    }
}

impl<V> IntoResponse for Reply<V>
where
    V: Serialize,
{
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "error")]
pub enum Error {
    InvalidPayload {
        message: String,
        errors: FieldErrors,
    },
    ValidationFailed {
        message: String,
        errors: FieldErrors,
    },
    AuthenticationFailure {
        message: String,
    },
    NotFound {
        message: String,
    },
    InternalError {
        kind: &'static str,
        message: String,
    },
}

impl Error {
    /// Field errors reported with `400 Bad Request`.
    pub fn invalid(errors: FieldErrors) -> Error {
        Error::InvalidPayload {
            message: "Erreur de validation".to_string(),
            errors,
        }
    }

    /// Field errors reported with `422 Unprocessable Entity`; the message is
    /// the first field error.
    pub fn unprocessable(errors: FieldErrors) -> Error {
        let message = errors
            .values()
            .flatten()
            .next()
            .cloned()
            .unwrap_or_else(|| "The given data was invalid.".to_string());
        Error::ValidationFailed { message, errors }
    }

    pub fn unauthenticated() -> Error {
        Error::AuthenticationFailure {
            message: "Unauthenticated.".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Error::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            Error::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Error::AuthenticationFailure { .. } => StatusCode::UNAUTHORIZED,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::InternalError { kind, message } = &self {
            log::error!("{}: {}", kind, message);
        }
        (self.status(), Json(self)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::InternalError {
            kind: "DatabaseError",
            message: err.to_string(),
        }
    }
}

impl From<pbkdf2::password_hash::Error> for Error {
    fn from(err: pbkdf2::password_hash::Error) -> Self {
        Self::InternalError {
            kind: "HashError",
            message: err.to_string(),
        }
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::InternalError {
            kind: "DecodeError",
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for Error {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
            errors: FieldErrors::new(),
        }
    }
}

impl From<MultipartRejection> for Error {
    fn from(rejection: MultipartRejection) -> Self {
        Self::InvalidPayload {
            message: rejection.to_string(),
            errors: FieldErrors::new(),
        }
    }
}

impl From<MultipartError> for Error {
    fn from(err: MultipartError) -> Self {
        Self::InvalidPayload {
            message: err.to_string(),
            errors: FieldErrors::new(),
        }
    }
}
