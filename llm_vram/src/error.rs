// top-level error for the public API

use crate::file_encoding_type::{GgmlFileType, GgmlFileTypeError};

#[derive(serde::Serialize, Debug, thiserror::Error)]
pub enum VramError {
    #[error("invalid architecture for model '{model}': `{field}` {reason}")]
    InvalidArchitecture {
        model: String,
        field: &'static str,
        reason: String,
    },

    #[error("format {format} is not supported for estimation (model '{model}')")]
    UnsupportedFormat { model: String, format: GgmlFileType },

    #[error("memory estimate overflow for model '{model}': {what}")]
    EstimateOverflow { model: String, what: &'static str },

    #[error("no estimates could be generated for model '{model}': {reason}")]
    TableGenerationFailed { model: String, reason: String },

    #[error("no estimates available for model '{model}' at format {format}")]
    FormatNotAvailable { model: String, format: GgmlFileType },

    #[error("no estimates available for model '{model}'")]
    NoEstimatesForModel { model: String },

    #[error("invalid constraint {field}: {reason}")]
    InvalidConstraints { field: &'static str, reason: String },

    #[error("invalid config {field}: {reason}")]
    InvalidConfig { field: &'static str, reason: String },

    #[error(transparent)]
    FileType(#[from] GgmlFileTypeError),

    #[error("{operation} failed for '{path}'")]
    FileSystem {
        operation: &'static str,
        path: std::path::PathBuf,
        #[source]
        #[serde(serialize_with = "error_to_string")]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(
        #[from]
        #[serde(serialize_with = "error_to_string")]
        serde_json::Error,
    ),
}

pub type VramResult<T> = std::result::Result<T, VramError>;

impl VramError {
    pub fn file_system(
        operation: &'static str,
        path: impl Into<std::path::PathBuf>,
        err: impl Into<std::io::Error>,
    ) -> Self {
        Self::FileSystem {
            operation,
            path: path.into(),
            source: err.into(),
        }
    }

    pub(crate) fn invalid_architecture(
        model: &str,
        field: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidArchitecture {
            model: model.to_owned(),
            field,
            reason: reason.into(),
        }
    }

    pub(crate) fn overflow(model: &str, what: &'static str) -> Self {
        Self::EstimateOverflow {
            model: model.to_owned(),
            what,
        }
    }
}

pub(crate) fn error_to_string<S>(e: &impl std::fmt::Display, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_str(&e.to_string())
}
