pub type GazemapResult<T> = Result<T, GazemapError>;

#[derive(thiserror::Error, Debug)]
pub enum GazemapError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("render error: {0}")]
    Render(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GazemapError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn already_exists(msg: impl Into<String>) -> Self {
        Self::AlreadyExists(msg.into())
    }

    /// `true` for the expected concurrent-duplicate outcome, which callers
    /// treat as success.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

impl From<sqlx::Error> for GazemapError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
