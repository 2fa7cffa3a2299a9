use std::collections::HashMap;

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::Value;

use crate::{
    identity::AuthenticationError,
    poetry::error::{PoetryError, StorageError},
};

/// Errors caused by the request rather than by the server.
pub trait ApiRequestError: std::error::Error {
    fn status_code(&self) -> StatusCode;

    fn code(&self) -> &'static str {
        "ERR"
    }
}

#[derive(Debug)]
pub enum ServerError {
    Storage(StorageError),
}

impl Serialize for ServerError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::ser::Serializer,
    {
        use serde::ser::SerializeMap;
        match self {
            ServerError::Storage(e) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("message", &e.to_string())?;
                map.end()
            }
        }
    }
}

#[derive(Debug)]
pub enum AppError {
    ServerError {
        error: ServerError,

        #[cfg(debug_assertions)]
        backtrace: Option<backtrace::Backtrace>,
    },
    RequestError {
        status: StatusCode,
        code: &'static str,
        msg: String,
    },
}

#[derive(Serialize)]
struct ErrorResponse {
    code: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    msg: Option<String>,

    #[cfg(debug_assertions)]
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_info: Option<HashMap<&'static str, Value>>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status_code, error_response) = match self {
            AppError::ServerError {
                error,
                #[cfg(debug_assertions)]
                backtrace,
            } => {
                tracing::error!(?error, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    #[cfg(debug_assertions)]
                    {
                        let frames_info = backtrace
                            .as_ref()
                            .map(filter_backtrace)
                            .unwrap_or_default();
                        ErrorResponse {
                            code: "DATABASE_ERR".into(),
                            msg: Some("Database error".into()),
                            debug_info: Some(HashMap::from([
                                (
                                    "backtrace",
                                    serde_json::to_value(&frames_info).unwrap_or_default(),
                                ),
                                (
                                    "error",
                                    serde_json::to_value(&error).unwrap_or_default(),
                                ),
                            ])),
                        }
                    },
                    #[cfg(not(debug_assertions))]
                    ErrorResponse {
                        code: "SERVER_ERR".into(),
                        msg: Some("Internal server error".into()),
                    },
                )
            }
            AppError::RequestError { status, code, msg } => {
                tracing::info!(%status, code, "Returning error to client: {msg}");
                (
                    status,
                    ErrorResponse {
                        code: code.into(),
                        msg: Some(msg),
                        #[cfg(debug_assertions)]
                        debug_info: None,
                    },
                )
            }
        };

        (status_code, Json(error_response)).into_response()
    }
}

impl AppError {
    fn from_request_error<E: ApiRequestError>(e: E) -> Self {
        AppError::RequestError {
            status: e.status_code(),
            code: e.code(),
            msg: e.to_string(),
        }
    }
}

impl ApiRequestError for PoetryError {
    fn status_code(&self) -> StatusCode {
        match self {
            PoetryError::Validation(_) => StatusCode::BAD_REQUEST,
            PoetryError::NotFound { .. } => StatusCode::NOT_FOUND,
            PoetryError::Conflict { .. } | PoetryError::ConstraintViolation(_) => {
                StatusCode::CONFLICT
            }
            PoetryError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            PoetryError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            PoetryError::Validation(_) => "VALIDATION_ERR",
            PoetryError::NotFound { .. } => "NOT_FOUND",
            PoetryError::Conflict { .. } => "CONFLICT",
            PoetryError::ConstraintViolation(_) => "CONSTRAINT_VIOLATION",
            PoetryError::DeadlineExceeded => "DEADLINE_EXCEEDED",
            PoetryError::Storage(_) => "SERVER_ERR",
        }
    }
}

impl From<PoetryError> for AppError {
    fn from(e: PoetryError) -> Self {
        match e {
            PoetryError::Storage(error) => AppError::ServerError {
                error: ServerError::Storage(error),

                #[cfg(debug_assertions)]
                backtrace: Some(backtrace::Backtrace::new()),
            },
            e => AppError::from_request_error(e),
        }
    }
}

impl From<AuthenticationError> for AppError {
    fn from(e: AuthenticationError) -> Self {
        AppError::from_request_error(e)
    }
}

impl From<(&'static str, StatusCode)> for AppError {
    fn from((msg, status): (&'static str, StatusCode)) -> Self {
        AppError::RequestError {
            status,
            code: "ERR",
            msg: msg.into(),
        }
    }
}

impl From<(String, StatusCode)> for AppError {
    fn from((msg, status): (String, StatusCode)) -> Self {
        AppError::RequestError {
            status,
            code: "ERR",
            msg,
        }
    }
}

#[derive(Serialize, Debug)]
struct FrameInfo {
    name: String,
    loc: String,
}

fn filter_backtrace(backtrace: &backtrace::Backtrace) -> Vec<FrameInfo> {
    const MODULE_PREFIX: &str = concat!(env!("CARGO_CRATE_NAME"), "::");
    let mut frames_info: Vec<FrameInfo> = Vec::new();

    for frame in backtrace.frames() {
        for symbol in frame.symbols() {
            if let (Some(name), Some(filename), Some(lineno)) = (
                symbol.name().map(|n| n.to_string()),
                symbol.filename().map(|f| f.to_owned()),
                symbol.lineno(),
            ) {
                if name.contains(MODULE_PREFIX) {
                    frames_info.push(FrameInfo {
                        name,
                        loc: format!("{}:{}", filename.display(), lineno),
                    });
                }
            }
        }
    }

    frames_info
}
