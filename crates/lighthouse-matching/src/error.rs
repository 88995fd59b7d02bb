use lighthouse_types::FrameError;
use thiserror::Error;

pub type MatchingResult<T> = Result<T, MatchingError>;

#[derive(Debug, Error)]
pub enum MatchingError {
    #[error("found {found} keypoints, at least {required} are required")]
    InsufficientFeatures { found: usize, required: usize },

    #[error("no image description with id {id}")]
    NotFound { id: String },

    #[error("invalid matching settings: {message}")]
    InvalidSettings { message: String },

    #[error("failed to encode image description: {message}")]
    Encode { message: String },

    #[error("failed to decode image description: {message}")]
    Decode { message: String },

    #[error("matrix layout mismatch: {message}")]
    MatrixLayout { message: String },

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl MatchingError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid_settings(message: impl Into<String>) -> Self {
        Self::InvalidSettings {
            message: message.into(),
        }
    }

    pub fn matrix_layout(message: impl Into<String>) -> Self {
        Self::MatrixLayout {
            message: message.into(),
        }
    }
}
