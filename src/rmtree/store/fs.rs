use super::DataStore;
use crate::error::{RmTreeError, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn read_names(dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(RmTreeError::Io)? {
            let entry = entry.map_err(RmTreeError::Io)?;
            // Non UTF-8 names can't be UUID keyed, skip them
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

impl DataStore for FileStore {
    fn list_entries(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(RmTreeError::NotFound(self.root.display().to_string()));
        }
        Self::read_names(&self.root)
    }

    fn list_dir(&self, name: &str) -> Result<Vec<String>> {
        let path = self.entry_path(name);
        if !path.is_dir() {
            return Err(RmTreeError::NotFound(name.to_string()));
        }
        Self::read_names(&path)
    }

    fn is_file(&self, name: &str) -> bool {
        self.entry_path(name).is_file()
    }

    fn is_dir(&self, name: &str) -> bool {
        self.entry_path(name).is_dir()
    }

    fn read(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.entry_path(name);
        if !path.is_file() {
            return Err(RmTreeError::NotFound(name.to_string()));
        }
        fs::read(path).map_err(RmTreeError::Io)
    }

    fn read_prefix(&self, name: &str, len: usize) -> Result<Vec<u8>> {
        let path = self.entry_path(name);
        if !path.is_file() {
            return Err(RmTreeError::NotFound(name.to_string()));
        }
        let file = fs::File::open(path).map_err(RmTreeError::Io)?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64)
            .read_to_end(&mut buf)
            .map_err(RmTreeError::Io)?;
        Ok(buf)
    }
}
