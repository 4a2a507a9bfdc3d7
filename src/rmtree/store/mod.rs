//! # Storage Layer
//!
//! Read-only access to the tablet's flat object store. Every entry of the store
//! is keyed by a UUID:
//!
//! ```text
//! xochitl/
//! ├── {uuid}.metadata      # name, parent, type
//! ├── {uuid}.content       # format version, page list
//! ├── {uuid}.pdf           # optional background document
//! ├── {uuid}.tombstone     # deleted entity marker
//! ├── {uuid}.dirty         # entity being synced
//! └── {uuid}/              # per-page ink blobs
//!     ├── {page}.rm
//!     └── {page}-metadata.json
//! ```
//!
//! Storage is abstracted behind [`DataStore`] so that the model and command
//! layers can be tested against [`memory::InMemoryStore`] without touching the
//! filesystem. [`fs::FileStore`] is the production implementation.
//!
//! Entries are addressed by store-relative names using `/` as separator
//! (`"{uuid}.content"`, `"{uuid}/{page}.rm"`). Nothing in this layer writes.

use crate::error::{RmTreeError, Result};

pub mod fs;
pub mod memory;

/// Abstract read-only interface to a tablet store.
pub trait DataStore {
    /// Names of the entries at the top level of the store, sorted.
    fn list_entries(&self) -> Result<Vec<String>>;

    /// Names of the entries inside a top-level directory, sorted.
    fn list_dir(&self, name: &str) -> Result<Vec<String>>;

    /// Whether an entry exists and is a regular file.
    fn is_file(&self, name: &str) -> bool;

    /// Whether an entry exists and is a directory.
    fn is_dir(&self, name: &str) -> bool;

    /// Read a whole file.
    fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Read at most `len` bytes from the start of a file.
    fn read_prefix(&self, name: &str, len: usize) -> Result<Vec<u8>>;

    fn read_to_string(&self, name: &str) -> Result<String> {
        let bytes = self.read(name)?;
        String::from_utf8(bytes).map_err(|e| RmTreeError::malformed(name, e.to_string()))
    }
}
