use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// `type` tag of a notebook, PDF or EPUB.
pub const DOCUMENT_TAG: &str = "DocumentType";
/// `type` tag of a folder.
pub const FOLDER_TAG: &str = "CollectionType";
/// Parent value of an entity sitting in the trash.
pub const TRASH_PARENT: &str = "trash";
/// Output segment for trashed entities.
pub const TRASH_DIR: &str = "_trash";

const UNSAFE_CHARS: [char; 8] = ['/', ':', '*', '?', '"', '<', '>', '|'];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Folder,
    Document,
}

impl EntityKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            DOCUMENT_TAG => Some(EntityKind::Document),
            FOLDER_TAG => Some(EntityKind::Folder),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Folder => write!(f, "folder"),
            EntityKind::Document => write!(f, "document"),
        }
    }
}

/// Where an entity hangs in the tree.
///
/// `Entity` is a weak reference: it must be looked up in the entity map, and
/// may fail to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParentRef {
    Root,
    Trash,
    Entity(Uuid),
}

impl ParentRef {
    /// Parses the raw `parent` field. `None` if it is neither empty, `"trash"`
    /// nor a UUID.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "" => Some(ParentRef::Root),
            TRASH_PARENT => Some(ParentRef::Trash),
            other => Uuid::try_parse(other).ok().map(ParentRef::Entity),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub id: Uuid,
    /// Sanitized display name, safe as a path segment.
    pub name: String,
    pub parent: ParentRef,
    pub kind: EntityKind,
}

impl Entity {
    pub fn new(id: Uuid, visible_name: &str, parent: ParentRef, kind: EntityKind) -> Self {
        let mut name = sanitize_name(visible_name);
        if name.is_empty() || name == "." || name == ".." {
            name = id.to_string();
        }
        Self {
            id,
            name,
            parent,
            kind,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.kind, EntityKind::Document)
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Strips the characters that are not allowed in a file name on common
/// filesystems. Everything else, whitespace included, is kept as is.
pub fn sanitize_name(name: &str) -> String {
    name.chars().filter(|c| !UNSAFE_CHARS.contains(c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize_name("Hello World"), "Hello World");
        assert_eq!(sanitize_name("a/b:c*d?e\"f<g>h|i"), "abcdefghi");
        assert_eq!(sanitize_name(" Meeting [2024] + notes "), " Meeting [2024] + notes ");
        assert_eq!(sanitize_name("tabs\tstay"), "tabs\tstay");
        assert_eq!(sanitize_name("Café"), "Café");
    }

    #[test]
    fn unusable_names_fall_back_to_id() {
        let id = Uuid::new_v4();
        let entity = Entity::new(id, "//", ParentRef::Root, EntityKind::Document);
        assert_eq!(entity.name, id.to_string());

        let entity = Entity::new(id, "..", ParentRef::Root, EntityKind::Folder);
        assert_eq!(entity.name, id.to_string());
    }

    #[test]
    fn test_parent_parse() {
        let id = Uuid::new_v4();
        assert_eq!(ParentRef::parse(""), Some(ParentRef::Root));
        assert_eq!(ParentRef::parse("trash"), Some(ParentRef::Trash));
        assert_eq!(
            ParentRef::parse(&id.to_string()),
            Some(ParentRef::Entity(id))
        );
        assert_eq!(ParentRef::parse("somewhere"), None);
    }

    #[test]
    fn test_kind_from_tag() {
        assert_eq!(
            EntityKind::from_tag("DocumentType"),
            Some(EntityKind::Document)
        );
        assert_eq!(
            EntityKind::from_tag("CollectionType"),
            Some(EntityKind::Folder)
        );
        assert_eq!(EntityKind::from_tag("TemplateType"), None);
    }
}
