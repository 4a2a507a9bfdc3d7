//! # rmtree Architecture
//!
//! rmtree rebuilds the folder tree of a reMarkable tablet from its flat,
//! UUID-keyed storage directory and exports every document as a PDF, with the
//! handwritten ink composited over the original background PDF when there is
//! one.
//!
//! ## Layers
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  CLI Layer (main.rs, args.rs)                               │
//! │  - Parses arguments, prints results, progress, exit codes   │
//! │  - Installs the tracing subscriber                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  API Layer (api.rs)                                         │
//! │  - Thin facade over commands                                │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Command Layer (commands/*.rs)                              │
//! │  - check, export, tree, stats                               │
//! │  - Returns CmdResult, never prints                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Model (record, content, page, tree, compose, pdf, convert) │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Storage Layer (store/)                                     │
//! │  - Read-only DataStore trait                                │
//! │  - FileStore (production), InMemoryStore (testing)          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Export Pipeline
//!
//! 1. [`tree::scan`] groups the store entries by UUID and builds the entity map.
//! 2. [`commands::check`] validates the store; export only starts when it
//!    finds no compatibility error (and no assertion error unless overridden).
//! 3. For each document, [`content::parse`] yields its pages,
//!    [`page::Page::resolve`] tells empty pages from inked ones, and
//!    [`compose::Compositor`] renders and merges them with the background.
//! 4. The result lands at `{dst}/{ancestor names}/{name}.pdf`.
//!
//! The ink converters are external programs behind the traits of [`convert`];
//! PDF work goes through [`pdf::PdfBackend`].
//!
//! ## Module Overview
//!
//! - [`api`]: The API facade
//! - [`commands`]: Business logic for each command
//! - [`store`]: Storage abstraction and implementations
//! - [`model`]: Entities, kinds, parent references, name sanitization
//! - [`record`]: `.metadata` and `.content` loading
//! - [`content`]: Content schemas and page lists
//! - [`page`]: Page resolution and version detection
//! - [`tree`]: Store scan and output paths
//! - [`compose`]: Page layout and per-document export
//! - [`convert`]: Converter seams and their external implementations
//! - [`pdf`]: PDF measuring and assembly
//! - [`config`]: Configuration management
//! - [`error`]: Error types

pub mod api;
pub mod commands;
pub mod compose;
pub mod config;
pub mod content;
pub mod convert;
pub mod error;
pub mod model;
pub mod page;
pub mod pdf;
pub mod record;
pub mod store;
pub mod tree;
