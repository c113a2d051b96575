use thiserror::Error;

/// Errors a caller of the orchestrator can observe.
#[derive(Debug, Error)]
pub enum StudioError {
    #[error("API key not found: environment variable {env} is not set")]
    MissingCredential { env: String },

    #[error("variation count must be at least 1 (got {0})")]
    InvalidCount(usize),

    #[error("invalid source image: {0}")]
    InvalidImage(String),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Failed to generate any images. Please try again.")]
    AllAttemptsFailed { attempts: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Transport-level failure of a single remote call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by provider")]
    RateLimited,
    #[error("http error: {0}")]
    Http(String),
    #[error("provider rejected request: {0}")]
    Fatal(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Malformed(e.to_string())
        } else {
            ProviderError::Http(e.to_string())
        }
    }
}

/// Why one attempt in a batch produced no image. Never surfaced to callers.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("model returned text instead of image")]
    NoImage { text: Option<String> },
    #[error("image payload is not valid base64: {0}")]
    BadPayload(String),
    #[error("attempt task aborted: {0}")]
    Aborted(String),
}

pub type Result<T> = std::result::Result<T, StudioError>;
