use std::fmt::Display;

use thiserror::Error;

use crate::record::RecordId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("backend error: {0}")]
    Backend(String),
}

impl ServiceError {
    pub fn not_found(id: &RecordId) -> Self { Self::NotFound(format!("record {id} not found")) }

    pub fn backend(context: impl Display, err: impl Display) -> Self {
        Self::Backend(format!("{context}: {err}"))
    }

    /// Stable label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Backend(_) => "backend",
        }
    }
}
