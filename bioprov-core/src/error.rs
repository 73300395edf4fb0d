//! Error types for the BioProv core library

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building, binding, running or persisting provenance objects
#[derive(Debug, Error)]
pub enum BioprovError {
    #[error("Cannot find program '{program}'. Make sure it is on your $PATH.")]
    ProgramNotFound { program: String },

    #[error("Key '{tag}' not found in files of sample '{sample}'. Available keys: [{}]", .available.join(", "))]
    TagNotFound {
        tag: String,
        sample: String,
        available: Vec<String>,
    },

    #[error("File '{}' does not exist", .path.display())]
    FileNotFound { path: PathBuf },

    #[error("Invalid parameter kind '{kind}': must be one of 'input', 'output', 'misc' or none")]
    InvalidKind { kind: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Sample '{name}' not in project '{project}'")]
    SampleNotFound { name: String, project: String },

    #[error("Document store error: {message}")]
    Store { message: String },

    #[error("FASTA parsing error in {}: {message}", .path.display())]
    Fasta { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Table error: {0}")]
    Csv(#[from] csv::Error),
}

impl BioprovError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    pub fn file_not_found<P: Into<PathBuf>>(path: P) -> Self {
        Self::FileNotFound { path: path.into() }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, BioprovError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_not_found_lists_registry() {
        let err = BioprovError::TagNotFound {
            tag: "query".to_string(),
            sample: "s1".to_string(),
            available: vec!["assembly".to_string(), "reads".to_string()],
        };
        let msg = err.to_string();
        assert!(msg.contains("'query'"));
        assert!(msg.contains("'s1'"));
        assert!(msg.contains("assembly, reads"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: BioprovError = io_err.into();
        assert!(matches!(err, BioprovError::Io(_)));
    }
}
