use thiserror::Error;

/// Error taxonomy for the opportunity lifecycle engine.
///
/// Platform adapters are expected to pre-classify their failures into the
/// platform variants (Authentication, RateLimit, PostNotFound,
/// ContentViolation, PlatformPosting) so callers can decide about retries
/// without string-matching.
#[derive(Error, Debug)]
pub enum PerchError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid status: expected {expected}, found {actual}")]
    InvalidStatus {
        expected: &'static str,
        actual: String,
    },

    #[error("platform authentication failed: {0}")]
    Authentication(String),

    #[error("platform rate limit: {message}")]
    RateLimit {
        message: String,
        retry_after_secs: Option<u64>,
    },

    #[error("parent post not found on platform: {0}")]
    PostNotFound(String),

    #[error("platform rejected content: {0}")]
    ContentViolation(String),

    #[error("platform posting failed: {message}")]
    PlatformPosting { message: String, retryable: bool },

    #[error("generated response is {length} chars, over the platform limit of {max_length}")]
    ConstraintViolation { length: usize, max_length: usize },

    #[error("response generation failed: {0}")]
    Generation(String),

    #[error("scheduler error: {0}")]
    Scheduler(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl PerchError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        PerchError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether a caller may reasonably retry the failed operation as-is.
    pub fn is_retryable(&self) -> bool {
        match self {
            PerchError::RateLimit { .. } => true,
            PerchError::PlatformPosting { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
