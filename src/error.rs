use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error while {context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("JSON error while {context}: {source}")]
    Json {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("Parquet error while {context}: {source}")]
    Parquet {
        context: &'static str,
        #[source]
        source: parquet::errors::ParquetError,
    },
    #[error("Arrow error while {context}: {source}")]
    Arrow {
        context: &'static str,
        #[source]
        source: arrow_schema::ArrowError,
    },
    #[error("audio decode failed ({context}): {message}")]
    Audio {
        context: &'static str,
        message: String,
    },
    #[error("{context}: {message}")]
    Collaborator {
        context: &'static str,
        message: String,
    },
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
}

/// Row-level failure classes. Each maps to one log severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    Value,
    Io,
    Other,
}

impl DatasetError {
    pub(crate) fn io(context: &'static str, source: std::io::Error) -> Self {
        Self::Io { context, source }
    }

    pub(crate) fn json(context: &'static str, source: serde_json::Error) -> Self {
        Self::Json { context, source }
    }

    pub(crate) fn parquet(context: &'static str, source: parquet::errors::ParquetError) -> Self {
        Self::Parquet { context, source }
    }

    pub(crate) fn arrow(context: &'static str, source: arrow_schema::ArrowError) -> Self {
        Self::Arrow { context, source }
    }

    pub(crate) fn audio(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Audio {
            context,
            message: err.to_string(),
        }
    }

    /// Wraps a failure reported by an external collaborator (aligner, codec,
    /// formatter or model).
    pub fn collaborator(context: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            context,
            message: err.to_string(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::InvalidInput { .. } => FailureKind::Value,
            Self::Io { .. } => FailureKind::Io,
            Self::Json { .. }
            | Self::Parquet { .. }
            | Self::Arrow { .. }
            | Self::Audio { .. }
            | Self::Collaborator { .. } => FailureKind::Other,
        }
    }
}
