use thiserror::Error;

use crate::wizard::StepError;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("store error during {op} (status {status:?}): {message}")]
    Store {
        op: &'static str,
        status: Option<u16>,
        message: String,
    },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error(transparent)]
    Step(#[from] StepError),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Render(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("another request is still in progress")]
    Busy,
}

impl AppError {
    pub fn store(op: &'static str, status: Option<u16>, message: impl Into<String>) -> Self {
        AppError::Store {
            op,
            status,
            message: message.into(),
        }
    }

    /// Message shown across the IPC boundary. Input problems keep their own
    /// wording; transport and store details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Store { .. } | AppError::Http(_) => {
                "The server could not complete the request.".to_string()
            }
            AppError::Auth(_) => "Invalid email or password.".to_string(),
            AppError::NotSignedIn => "Please sign in first.".to_string(),
            AppError::Io(e) => format!("File error: {e}"),
            other => other.to_string(),
        }
    }
}
