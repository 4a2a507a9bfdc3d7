//! Reconstruction of the folder tree from the flat store.
//!
//! Every top-level entry whose name starts with a UUID is an artifact of that
//! entity. Artifacts are grouped per UUID and classified:
//!
//! - a `.tombstone` or `.dirty` marker excludes the entity, and nothing else may
//!   exist for it,
//! - otherwise `.metadata` and `.content` are required and the metadata `type`
//!   decides between folder and document,
//! - folders carry nothing beyond their two records.
//!
//! Violations are collected as assertion errors rather than aborting the scan,
//! so that a single broken entity does not hide the rest of the store.

use crate::error::{RmTreeError, Result};
use crate::model::{Entity, EntityKind, ParentRef, TRASH_DIR};
use crate::record::{self, MetadataRecord};
use crate::store::DataStore;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;
use uuid::Uuid;

static UUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12})(?:\.(.*))?$")
        .expect("valid uuid regex")
});

/// The per-UUID artifacts the classification looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Artifact {
    PageFolder,
    Metadata,
    Content,
    Local,
    PageData,
    Pdf,
    Tombstone,
    Dirty,
}

impl Artifact {
    fn from_entry(extension: Option<&str>, is_dir: bool) -> Option<Self> {
        match extension {
            None if is_dir => Some(Artifact::PageFolder),
            Some("metadata") => Some(Artifact::Metadata),
            Some("content") => Some(Artifact::Content),
            Some("local") => Some(Artifact::Local),
            Some("pagedata") => Some(Artifact::PageData),
            Some("pdf") => Some(Artifact::Pdf),
            Some("tombstone") => Some(Artifact::Tombstone),
            Some("dirty") => Some(Artifact::Dirty),
            _ => None,
        }
    }

    fn is_marker(&self) -> bool {
        matches!(self, Artifact::Tombstone | Artifact::Dirty)
    }

    fn is_record(&self) -> bool {
        matches!(self, Artifact::Metadata | Artifact::Content)
    }
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Artifact::PageFolder => "page folder",
            Artifact::Metadata => ".metadata",
            Artifact::Content => ".content",
            Artifact::Local => ".local",
            Artifact::PageData => ".pagedata",
            Artifact::Pdf => ".pdf",
            Artifact::Tombstone => ".tombstone",
            Artifact::Dirty => ".dirty",
        };
        write!(f, "{}", s)
    }
}

/// Result of a store scan.
#[derive(Debug, Default)]
pub struct Scan {
    /// The authoritative UUID to entity table.
    pub entities: BTreeMap<Uuid, Entity>,
    /// UUIDs excluded by a tombstone or dirty marker.
    pub excluded: BTreeSet<Uuid>,
    /// Structural violations found while classifying, per UUID.
    pub issues: Vec<(Uuid, RmTreeError)>,
}

impl Scan {
    pub fn documents(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(|e| e.is_document())
    }

    pub fn get(&self, id: &Uuid) -> Option<&Entity> {
        self.entities.get(id)
    }
}

/// Groups the top-level entries of the store by UUID.
pub fn artifacts<S: DataStore>(store: &S) -> Result<BTreeMap<Uuid, BTreeSet<Artifact>>> {
    let mut grouped: BTreeMap<Uuid, BTreeSet<Artifact>> = BTreeMap::new();
    for entry in store.list_entries()? {
        let Some(caps) = UUID_RE.captures(&entry) else {
            debug!("skipping {}", entry);
            continue;
        };
        let Ok(id) = Uuid::try_parse(&caps[1]) else {
            continue;
        };

        let extension = caps.get(2).map(|m| m.as_str());
        match Artifact::from_entry(extension, store.is_dir(&entry)) {
            Some(artifact) => {
                grouped.entry(id).or_default().insert(artifact);
            }
            None => debug!("ignoring {}", entry),
        }
    }
    Ok(grouped)
}

pub fn scan<S: DataStore>(store: &S) -> Result<Scan> {
    let mut scan = Scan::default();

    for (id, found) in artifacts(store)? {
        match classify(store, id, &found) {
            Ok(Some(entity)) => {
                scan.entities.insert(id, entity);
            }
            Ok(None) => {
                scan.excluded.insert(id);
            }
            Err(e) => scan.issues.push((id, e)),
        }
    }

    debug!(
        "scanned {} entities ({} excluded, {} issues)",
        scan.entities.len(),
        scan.excluded.len(),
        scan.issues.len()
    );
    Ok(scan)
}

fn classify<S: DataStore>(
    store: &S,
    id: Uuid,
    found: &BTreeSet<Artifact>,
) -> Result<Option<Entity>> {
    if found.iter().any(Artifact::is_marker) {
        let extras: Vec<String> = found
            .iter()
            .filter(|a| !a.is_marker())
            .map(Artifact::to_string)
            .collect();
        if !extras.is_empty() {
            return Err(RmTreeError::assertion(
                id,
                format!("deleted entity still has {}", extras.join(", ")),
            ));
        }
        return Ok(None);
    }

    for required in [Artifact::Metadata, Artifact::Content] {
        if !found.contains(&required) {
            return Err(RmTreeError::assertion(id, format!("{} is missing", required)));
        }
    }

    let metadata = record::load_metadata(store, &id)?;
    let entity = entity_from(id, &metadata)?;

    if entity.kind == EntityKind::Folder {
        let extras: Vec<String> = found
            .iter()
            .filter(|a| !a.is_record())
            .map(Artifact::to_string)
            .collect();
        if !extras.is_empty() {
            return Err(RmTreeError::assertion(
                id,
                format!("folder has unexpected {}", extras.join(", ")),
            ));
        }
    }

    Ok(Some(entity))
}

fn entity_from(id: Uuid, metadata: &MetadataRecord) -> Result<Entity> {
    let kind = EntityKind::from_tag(&metadata.kind)
        .ok_or_else(|| RmTreeError::assertion(id, format!("unknown type {:?}", metadata.kind)))?;
    let parent = ParentRef::parse(&metadata.parent).ok_or_else(|| {
        RmTreeError::assertion(id, format!("invalid parent {:?}", metadata.parent))
    })?;
    Ok(Entity::new(id, &metadata.visible_name, parent, kind))
}

/// Directory of `entity` relative to the output root: ancestor names
/// root-first, under `_trash` when the chain ends in the trash.
pub fn output_dir(entity: &Entity, entities: &BTreeMap<Uuid, Entity>) -> Result<PathBuf> {
    let mut names = Vec::new();
    let mut visited = HashSet::from([entity.id]);
    let mut current = entity;

    let in_trash = loop {
        match current.parent {
            ParentRef::Root => break false,
            ParentRef::Trash => break true,
            ParentRef::Entity(parent) => {
                if !visited.insert(parent) {
                    return Err(RmTreeError::ParentCycle(entity.id));
                }
                current = entities
                    .get(&parent)
                    .ok_or(RmTreeError::DanglingParent {
                        uuid: current.id,
                        parent,
                    })?;
                names.push(current.name.as_str());
            }
        }
    };

    let mut path = PathBuf::new();
    if in_trash {
        path.push(TRASH_DIR);
    }
    path.extend(names.iter().rev());
    Ok(path)
}

/// Full relative path of `entity`, its own name included.
pub fn output_path(entity: &Entity, entities: &BTreeMap<Uuid, Entity>) -> Result<PathBuf> {
    Ok(output_dir(entity, entities)?.join(&entity.name))
}
