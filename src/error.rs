use thiserror::Error;

/// Failure outcomes of controller requests and client-side checks
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{action} failed: {message}")]
    Transport { action: String, message: String },

    #[error("{action} failed: HTTP {status}")]
    Status { action: String, status: u16 },

    #[error("{action}: JSON parse error: {source}")]
    Parse {
        action: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("password and confirmation do not match")]
    PasswordMismatch,

    #[error("no document loaded for resource \"{0}\"")]
    NotLoaded(String),

    #[error("request for \"{0}\" is already in progress")]
    Busy(String),

    #[error("{action} is not available while account is {state}")]
    InvalidState { action: &'static str, state: String },
}

impl ClientError {
    pub fn transport(action: impl Into<String>, error: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            action: action.into(),
            message: error.to_string(),
        }
    }

    pub fn parse(action: impl Into<String>, source: serde_json::Error) -> Self {
        ClientError::Parse {
            action: action.into(),
            source,
        }
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;
