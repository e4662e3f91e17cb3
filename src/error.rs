use std::path::Path;

use thiserror::Error;

use crate::services::validate::FormatIssue;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("line {line}: {message}")]
    Format { line: usize, message: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot represent catalog text as {charset}: {detail}")]
    Encoding { charset: String, detail: String },

    #[error("unknown charset: {0}")]
    UnknownCharset(String),

    #[error("catalog failed format validation ({} issue(s))", .0.len())]
    Invalid(Vec<FormatIssue>),

    #[error("invalid search query: {0}")]
    Query(#[from] regex::Error),

    #[error("invalid MO data: {0}")]
    Mo(String),

    #[error("invalid settings in {path}: {source}")]
    Settings {
        path: String,
        source: serde_json::Error,
    },
}

impl CatalogError {
    pub fn format(line: usize, message: impl Into<String>) -> Self {
        CatalogError::Format {
            line,
            message: message.into(),
        }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        CatalogError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CatalogError>;
