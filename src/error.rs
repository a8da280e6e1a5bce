use serde::Serialize;

/// All errors that can occur while talking to the script directory.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error("Sign in required: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error ({code}): {message}")]
    Backend { code: String, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Custom(String),
}

impl AppError {
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Backend {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Short machine-readable tag for the activity log.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::NotFound(_) => "not_found",
            AppError::Backend { .. } => "backend",
            AppError::Network(_) => "network",
            AppError::Io(_) => "io",
            AppError::Json(_) => "json",
            AppError::Custom(_) => "custom",
        }
    }
}

// Front ends render errors as plain strings.
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
