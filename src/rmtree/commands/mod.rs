use crate::compose::DocumentOutcome;
use crate::model::{Entity, EntityKind};
use std::collections::BTreeMap;
use std::path::PathBuf;

pub mod check;
pub mod export;
pub mod stats;
pub mod tree;

pub use check::{CheckReport, Finding, FindingKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdMessage {
    pub level: MessageLevel,
    pub content: String,
}

impl CmdMessage {
    pub fn info(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Info,
            content: content.into(),
        }
    }

    pub fn success(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Success,
            content: content.into(),
        }
    }

    pub fn warning(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Warning,
            content: content.into(),
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            level: MessageLevel::Error,
            content: content.into(),
        }
    }
}

/// An entity with the path it exports to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedEntity {
    pub entity: Entity,
    /// Relative output path, `None` when the parent chain is broken.
    pub path: Option<PathBuf>,
}

impl ListedEntity {
    pub fn kind(&self) -> EntityKind {
        self.entity.kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedDocument {
    pub entity: Entity,
    pub outcome: DocumentOutcome,
}

#[derive(Debug, Default)]
pub struct CmdResult {
    pub report: Option<CheckReport>,
    pub exported: Vec<ExportedDocument>,
    pub listed: Vec<ListedEntity>,
    pub extension_counts: BTreeMap<String, usize>,
    /// Set when the pre-flight check withheld the export.
    pub blocked: bool,
    pub messages: Vec<CmdMessage>,
}

impl CmdResult {
    pub fn add_message(&mut self, message: CmdMessage) {
        self.messages.push(message);
    }

    pub fn with_report(mut self, report: CheckReport) -> Self {
        self.report = Some(report);
        self
    }

    pub fn with_listed(mut self, listed: Vec<ListedEntity>) -> Self {
        self.listed = listed;
        self
    }

    pub fn with_extension_counts(mut self, counts: BTreeMap<String, usize>) -> Self {
        self.extension_counts = counts;
        self
    }
}
