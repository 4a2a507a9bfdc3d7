use super::DataStore;
use crate::error::{RmTreeError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// In-memory store for testing.
/// Directories are implied by the names of the files they contain, or can be
/// added empty with [`InMemoryStore::add_dir`].
#[derive(Default)]
pub struct InMemoryStore {
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        let name = name.into();
        if let Some((dir, _)) = name.split_once('/') {
            self.dirs.insert(dir.to_string());
        }
        self.files.insert(name, bytes.into());
    }

    pub fn add_dir(&mut self, name: impl Into<String>) {
        self.dirs.insert(name.into());
    }

    pub fn remove(&mut self, name: &str) {
        self.files.remove(name);
    }
}

impl DataStore for InMemoryStore {
    fn list_entries(&self) -> Result<Vec<String>> {
        let mut names: BTreeSet<String> = self.dirs.iter().cloned().collect();
        for name in self.files.keys() {
            let top = name.split('/').next().unwrap_or(name);
            names.insert(top.to_string());
        }
        Ok(names.into_iter().collect())
    }

    fn list_dir(&self, name: &str) -> Result<Vec<String>> {
        if !self.is_dir(name) {
            return Err(RmTreeError::NotFound(name.to_string()));
        }
        let prefix = format!("{}/", name);
        Ok(self
            .files
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .map(str::to_string)
            .collect())
    }

    fn is_file(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    fn is_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.files
            .get(name)
            .cloned()
            .ok_or_else(|| RmTreeError::NotFound(name.to_string()))
    }

    fn read_prefix(&self, name: &str, len: usize) -> Result<Vec<u8>> {
        let bytes = self
            .files
            .get(name)
            .ok_or_else(|| RmTreeError::NotFound(name.to_string()))?;
        Ok(bytes[..len.min(bytes.len())].to_vec())
    }
}

// --- Test Fixtures ---

#[cfg(any(test, feature = "test_utils"))]
pub mod fixtures {
    use super::*;
    use crate::model::{DOCUMENT_TAG, FOLDER_TAG};
    use crate::page::PageVersion;
    use serde_json::{json, Value};
    use uuid::Uuid;

    pub fn metadata(name: &str, parent: &str, kind: &str) -> Value {
        json!({
            "visibleName": name,
            "parent": parent,
            "type": kind,
            "lastModified": "1700000000000",
        })
    }

    pub fn content_v1(pages: &[Uuid]) -> Value {
        json!({
            "formatVersion": 1,
            "pageCount": pages.len(),
            "pages": pages.iter().map(Uuid::to_string).collect::<Vec<_>>(),
        })
    }

    pub fn content_v2(pages: &[Uuid]) -> Value {
        let descriptors: Vec<Value> = pages
            .iter()
            .map(|p| json!({ "id": p.to_string(), "idx": { "timestamp": "1:1", "value": "ba" } }))
            .collect();
        content_v2_with(descriptors, pages.len())
    }

    pub fn content_v2_with(descriptors: Vec<Value>, page_count: usize) -> Value {
        json!({
            "formatVersion": 2,
            "pageCount": page_count,
            "cPages": { "pages": descriptors },
        })
    }

    /// A blob starting with the header of `version`, followed by filler.
    pub fn page_blob(version: PageVersion) -> Vec<u8> {
        let mut blob = match version.header() {
            Some(header) => header.into_bytes(),
            None => b"not an ink file at all, really".to_vec(),
        };
        blob.extend_from_slice(b"          \x00\x01\x02");
        blob
    }

    pub struct StoreFixture {
        pub store: InMemoryStore,
    }

    impl Default for StoreFixture {
        fn default() -> Self {
            Self::new()
        }
    }

    impl StoreFixture {
        pub fn new() -> Self {
            Self {
                store: InMemoryStore::new(),
            }
        }

        pub fn with_json(mut self, name: String, value: &Value) -> Self {
            self.store.insert(name, value.to_string());
            self
        }

        pub fn with_file(mut self, name: &str, bytes: &[u8]) -> Self {
            self.store.insert(name, bytes.to_vec());
            self
        }

        pub fn with_folder(self, id: Uuid, name: &str, parent: &str) -> Self {
            self.with_json(format!("{}.metadata", id), &metadata(name, parent, FOLDER_TAG))
                .with_json(format!("{}.content", id), &json!({}))
        }

        pub fn with_document(self, id: Uuid, name: &str, parent: &str, content: Value) -> Self {
            self.with_json(format!("{}.metadata", id), &metadata(name, parent, DOCUMENT_TAG))
                .with_json(format!("{}.content", id), &content)
        }

        pub fn with_page(mut self, doc: Uuid, page: Uuid, version: PageVersion) -> Self {
            self.store
                .insert(format!("{}/{}.rm", doc, page), page_blob(version));
            self
        }

        pub fn with_background(mut self, doc: Uuid, pdf: &[u8]) -> Self {
            self.store.insert(format!("{}.pdf", doc), pdf.to_vec());
            self
        }

        pub fn with_marker(mut self, id: Uuid, extension: &str) -> Self {
            self.store.insert(format!("{}.{}", id, extension), Vec::<u8>::new());
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_are_implied_by_files() {
        let mut store = InMemoryStore::new();
        store.insert("doc/page.rm", b"abc".to_vec());
        store.insert("doc.metadata", b"{}".to_vec());

        assert_eq!(store.list_entries().unwrap(), vec!["doc", "doc.metadata"]);
        assert!(store.is_dir("doc"));
        assert_eq!(store.list_dir("doc").unwrap(), vec!["page.rm"]);
        assert_eq!(store.read_prefix("doc/page.rm", 2).unwrap(), b"ab");
    }

    #[test]
    fn empty_directories_are_listed() {
        let mut store = InMemoryStore::new();
        store.add_dir("empty");
        assert!(store.is_dir("empty"));
        assert!(!store.is_file("empty"));
        assert!(store.list_dir("empty").unwrap().is_empty());
    }
}
