use crate::convert::ConvertError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum RmTreeError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Malformed record {name}: {reason}")]
    Malformed { name: String, reason: String },

    #[error("Unsupported content format version: {0}")]
    UnsupportedSchema(i64),

    #[error("Unsupported page version {version} for page {page}")]
    UnsupportedPageVersion { page: Uuid, version: String },

    #[error("Assertion failed for {uuid}: {reason}")]
    Assertion { uuid: Uuid, reason: String },

    #[error("{uuid} references a parent that is not in the store: {parent}")]
    DanglingParent { uuid: Uuid, parent: Uuid },

    #[error("Parent cycle detected while resolving the path of {0}")]
    ParentCycle(Uuid),

    #[error("Conversion error: {0}")]
    Convert(#[from] ConvertError),

    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),
}

impl RmTreeError {
    pub fn malformed(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn assertion(uuid: Uuid, reason: impl Into<String>) -> Self {
        Self::Assertion {
            uuid,
            reason: reason.into(),
        }
    }

    /// True for well-formed input this tool does not support (as opposed to
    /// inconsistent input).
    pub fn is_compatibility(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedSchema(_) | Self::UnsupportedPageVersion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, RmTreeError>;
