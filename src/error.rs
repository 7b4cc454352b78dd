use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuiltError>;

#[derive(Debug, Error)]
pub enum QuiltError {
    #[error("invalid argument: {message}")]
    InvalidArgument { message: String },

    #[error("invalid quilt data: {message}")]
    Shape { message: String },

    #[error("store error: {message}")]
    Store { message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("no data found at '{path}'")]
    NotFound { path: String },

    #[error(
        "data verification failed: expected {expected}, found {actual}. \
         Restore the previous state from a snapshot (pixel-quilt snapshot restore)"
    )]
    Integrity { expected: String, actual: String },

    #[error("cache error: {0}")]
    Cache(String),
}

impl QuiltError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound { path: path.into() }
    }
}

impl From<Box<bincode::ErrorKind>> for QuiltError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        QuiltError::Cache(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::QuiltError;

    #[test]
    fn integrity_message_points_at_snapshot_restore() {
        let err = QuiltError::Integrity {
            expected: "aaaa".into(),
            actual: "bbbb".into(),
        };
        let text = err.to_string();
        assert!(text.contains("aaaa"));
        assert!(text.contains("bbbb"));
        assert!(text.contains("snapshot restore"));
    }

    #[test]
    fn invalid_constructor_formats_message() {
        let err = QuiltError::invalid("row 16 out of range");
        assert_eq!(err.to_string(), "invalid argument: row 16 out of range");
    }
}
