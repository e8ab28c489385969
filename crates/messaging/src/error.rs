//! Messaging error types.

use saga::SagaError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    #[error("No handler for topic '{0}'")]
    UnknownTopic(String),

    /// The decoded message reached the saga and the step failed.
    #[error("Saga error: {0}")]
    Saga(#[from] SagaError),
}

pub type Result<T> = std::result::Result<T, MessagingError>;
