use std::fmt;

/// Failure from the storage collaborator.
#[derive(Debug)]
pub enum StoreError {
    /// The record does not exist.
    NotFound,
    /// The requester is not a participant of the record.
    Forbidden,
    /// The backend itself failed.
    Unavailable(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::Forbidden => write!(f, "forbidden"),
            Self::Unavailable(detail) => write!(f, "storage unavailable: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Client-facing operation failure, serialized as `{ "error": message }`.
///
/// Backend detail is logged server-side and never forwarded to the client.
#[derive(Debug)]
pub struct EventError {
    pub message: String,
}

impl EventError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Map a storage failure onto a client message for the given action.
    ///
    /// `NotFound` and `Forbidden` collapse into one identical message so a
    /// response does not reveal whether the conversation exists.
    pub fn from_store(err: StoreError, action: &str) -> Self {
        match err {
            StoreError::NotFound | StoreError::Forbidden => Self::new("Conversation not found"),
            StoreError::Unavailable(detail) => {
                tracing::error!(%detail, %action, "storage error");
                Self::new(format!("Failed to {action}"))
            }
        }
    }
}
