use reqwest::StatusCode;
use shared::error::ApiError;
use thiserror::Error;

/// Failure of a single backend call.
///
/// `Display` yields the message the dashboard shows to the operator: the
/// backend's own error text when it sent one.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("network error calling {path}: {source}")]
    Network {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{message}")]
    NotFound { path: String, message: String },
    #[error("{message}")]
    Validation {
        status: u16,
        path: String,
        message: String,
    },
    #[error("{message}")]
    Server {
        status: u16,
        path: String,
        message: String,
    },
    #[error("unexpected response from {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ClientError {
    pub(crate) fn from_status(status: StatusCode, path: &str, body: &[u8]) -> Self {
        let message = error_message(status, path, body);
        let path = path.to_string();
        match status {
            StatusCode::NOT_FOUND => ClientError::NotFound { path, message },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
                status: status.as_u16(),
                path,
                message,
            },
            _ => ClientError::Server {
                status: status.as_u16(),
                path,
                message,
            },
        }
    }

    /// HTTP status of the response, if the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            ClientError::Validation { status, .. } | ClientError::Server { status, .. } => {
                Some(*status)
            }
            ClientError::Network { .. } | ClientError::Decode { .. } => None,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            ClientError::Network { path, .. }
            | ClientError::NotFound { path, .. }
            | ClientError::Validation { path, .. }
            | ClientError::Server { path, .. }
            | ClientError::Decode { path, .. } => path,
        }
    }
}

fn error_message(status: StatusCode, path: &str, body: &[u8]) -> String {
    if let Ok(api_error) = serde_json::from_slice::<ApiError>(body) {
        if !api_error.message.trim().is_empty() {
            return api_error.message;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {} calling {path}", status.as_u16())
    } else {
        text.to_string()
    }
}
