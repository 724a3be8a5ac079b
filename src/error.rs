//! Error taxonomy for scene generation.

use thiserror::Error;

/// Errors raised while generating, spawning or running a scene.
#[derive(Debug, Error)]
pub enum SceneError {
    /// A material or mesh reference is unknown to the asset catalog.
    #[error("Cannot resolve asset '{reference}': {reason}")]
    AssetResolution { reference: String, reason: String },

    /// The simulation host refused to instantiate an actor.
    #[error("Host refused to spawn {actor} ({class}): {reason}")]
    Spawn { actor: String, class: String, reason: String },

    /// An operation was attempted on a torn-down or not-yet-spawned proxy or scenario.
    #[error("Lifecycle violation on {subject}: {detail}")]
    Lifecycle { subject: String, detail: String },

    /// Missing or invalid configuration values.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SceneError {
    pub fn asset(reference: impl Into<String>, reason: impl Into<String>) -> Self {
        SceneError::AssetResolution { reference: reference.into(), reason: reason.into() }
    }

    pub fn lifecycle(subject: impl Into<String>, detail: impl Into<String>) -> Self {
        SceneError::Lifecycle { subject: subject.into(), detail: detail.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        SceneError::Configuration(message.into())
    }

    /// Configuration errors stop the whole process; everything else only aborts the
    /// enclosing scene.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SceneError::Configuration(_))
    }
}

/// Result type for scene operations
pub type Result<T> = std::result::Result<T, SceneError>;
