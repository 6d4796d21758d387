/// Convenience result type used across Marionette.
pub type MarionetteResult<T> = Result<T, MarionetteError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum MarionetteError {
    /// Invalid caller-provided or catalog data.
    #[error("validation error: {0}")]
    Validation(String),

    /// No candidate clip exists for a requested id, name, or category.
    #[error("missing clip: {0}")]
    MissingClip(String),

    /// A clip resource failed to resolve or decode.
    #[error("load error: {0}")]
    Load(String),

    /// Errors while building or registering timeline spans.
    #[error("scheduling error: {0}")]
    Scheduling(String),

    /// Errors while dispatching a queued playback request.
    #[error("queue error: {0}")]
    Queue(String),

    /// Wrapped lower-level error from dependencies or collaborators.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MarionetteError {
    /// Build a [`MarionetteError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`MarionetteError::MissingClip`] value.
    pub fn missing_clip(msg: impl Into<String>) -> Self {
        Self::MissingClip(msg.into())
    }

    /// Build a [`MarionetteError::Load`] value.
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Build a [`MarionetteError::Scheduling`] value.
    pub fn scheduling(msg: impl Into<String>) -> Self {
        Self::Scheduling(msg.into())
    }

    /// Build a [`MarionetteError::Queue`] value.
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
