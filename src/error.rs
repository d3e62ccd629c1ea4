// Error types for task synchronization

use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, TaskError>;

/// Errors raised by the store, gateway, and supporting modules
#[derive(Debug, Error)]
pub enum TaskError {
    /// Draft rejected before reaching the gateway
    #[error("Invalid task: {0}")]
    Validation(ValidationErrors),

    /// Gateway answered with a non-2xx status
    #[error("{message}")]
    Gateway { status: u16, message: String },

    /// Gateway unreachable or response unreadable
    #[error("{0}")]
    Transport(String),

    #[error("Task not found: {0}")]
    NotFound(String),

    #[error("Invalid import file: {0}")]
    MalformedImport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Preferences error: {0}")]
    Prefs(#[from] rusqlite::Error),
}

impl TaskError {
    /// Message suitable for showing to a user
    pub fn user_message(&self) -> String {
        match self {
            TaskError::Gateway { message, .. } => message.clone(),
            TaskError::Transport(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<reqwest::Error> for TaskError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TaskError::Transport("Request timed out".to_string())
        } else if err.is_decode() {
            TaskError::Transport(format!("Unreadable response from task API: {}", err))
        } else {
            TaskError::Transport(format!("Task API unreachable: {}", err))
        }
    }
}

impl From<ValidationErrors> for TaskError {
    fn from(errors: ValidationErrors) -> Self {
        TaskError::Validation(errors)
    }
}

/// Form field a validation message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Description,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Title => write!(f, "title"),
            Field::Description => write!(f, "description"),
        }
    }
}

/// Per-field validation messages
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    errors: Vec<(Field, String)>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: Field, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// First message recorded for a field
    pub fn get(&self, field: Field) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, message)| message.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.errors.iter().map(|(field, msg)| format!("{}: {}", field, msg)).collect();
        write!(f, "{}", parts.join("; "))
    }
}
