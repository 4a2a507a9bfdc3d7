//! # API Facade
//!
//! A thin facade over the command layer, and the single entry point for every
//! rmtree operation whatever the UI.
//!
//! The API dispatches to `commands/*.rs` and returns `Result<CmdResult>`. It
//! holds no business logic and never prints.
//!
//! `RmTreeApi<S: DataStore>` is generic over the store:
//! - Production: `RmTreeApi<FileStore>`
//! - Testing: `RmTreeApi<InMemoryStore>`
//!
//! The converters and the PDF backend are injected too, so that the whole
//! export path can run in tests without external tools.

use crate::compose::ExportOptions;
use crate::convert::Toolchain;
use crate::error::Result;
use crate::model::Entity;
use crate::pdf::{LopdfBackend, PdfBackend};
use crate::store::DataStore;

pub use crate::commands::{
    CheckReport, CmdMessage, CmdResult, ExportedDocument, Finding, FindingKind, ListedEntity,
    MessageLevel,
};
use crate::commands;

pub struct RmTreeApi<S: DataStore> {
    store: S,
    toolchain: Toolchain,
    backend: Box<dyn PdfBackend>,
}

impl<S: DataStore> RmTreeApi<S> {
    pub fn new(store: S, toolchain: Toolchain) -> Self {
        Self::with_backend(store, toolchain, Box::new(LopdfBackend))
    }

    pub fn with_backend(store: S, toolchain: Toolchain, backend: Box<dyn PdfBackend>) -> Self {
        Self {
            store,
            toolchain,
            backend,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn check(&self) -> Result<CmdResult> {
        commands::check::run(&self.store)
    }

    pub fn export<F>(
        &self,
        options: &ExportOptions,
        ignore_assertions: bool,
        progress: F,
    ) -> Result<CmdResult>
    where
        F: FnMut(usize, usize, &Entity),
    {
        commands::export::run(
            &self.store,
            &self.toolchain,
            self.backend.as_ref(),
            options,
            ignore_assertions,
            progress,
        )
    }

    pub fn tree(&self) -> Result<CmdResult> {
        commands::tree::run(&self.store)
    }

    pub fn stats(&self) -> Result<CmdResult> {
        commands::stats::run(&self.store)
    }
}
