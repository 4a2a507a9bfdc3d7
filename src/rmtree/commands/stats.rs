use crate::commands::{CmdMessage, CmdResult};
use crate::error::Result;
use crate::store::DataStore;
use std::collections::BTreeMap;

/// Label for extension-less directories.
pub const FOLDER_LABEL: &str = "folder";
/// Label for extension-less files.
pub const NO_EXTENSION_LABEL: &str = "(none)";

/// Counts the top-level entries of the store per extension (`.metadata`,
/// `.content`, ...).
pub fn count_extensions<S: DataStore>(store: &S) -> Result<BTreeMap<String, usize>> {
    let mut counts = BTreeMap::new();
    for entry in store.list_entries()? {
        let label = match entry.rfind('.') {
            Some(dot) if dot > 0 => entry[dot..].to_string(),
            _ if store.is_dir(&entry) => FOLDER_LABEL.to_string(),
            _ => NO_EXTENSION_LABEL.to_string(),
        };
        *counts.entry(label).or_insert(0) += 1;
    }
    Ok(counts)
}

pub fn run<S: DataStore>(store: &S) -> Result<CmdResult> {
    let counts = count_extensions(store)?;
    let mut result = CmdResult::default();
    let total: usize = counts.values().sum();
    result.add_message(CmdMessage::info(format!(
        "{} entries, {} kind(s).",
        total,
        counts.len()
    )));
    Ok(result.with_extension_counts(counts))
}
