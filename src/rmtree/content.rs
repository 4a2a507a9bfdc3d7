//! Interpretation of `.content` records.
//!
//! Two schemas exist in the wild:
//!
//! - **v1**: `pages` is a list of page UUID strings, page *i* pairs with page
//!   *i* of the background PDF.
//! - **v2**: `cPages.pages` is a list of page objects, each with an `id`, an
//!   optional `template.value`, an optional `redir.value` (index of the
//!   background PDF page it sits on) and an optional `deleted` marker.

use crate::error::{RmTreeError, Result};
use crate::record::ContentRecord;
use serde_json::Value;
use uuid::Uuid;

/// Template name meaning "no template".
const BLANK_TEMPLATE: &str = "Blank";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentSchema {
    V1,
    V2,
}

impl ContentSchema {
    pub fn detect(record: &ContentRecord) -> Result<Self> {
        match record.format_version() {
            Some(1) => Ok(ContentSchema::V1),
            Some(2) => Ok(ContentSchema::V2),
            Some(other) => Err(RmTreeError::UnsupportedSchema(other)),
            None => Err(RmTreeError::malformed(
                format!("{}.content", record.id),
                "missing formatVersion",
            )),
        }
    }

    fn required_fields(&self) -> &'static [&'static [&'static str]] {
        match self {
            ContentSchema::V1 => &[&["formatVersion"], &["pageCount"], &["pages"]],
            ContentSchema::V2 => &[&["formatVersion"], &["pageCount"], &["cPages", "pages"]],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDescriptor {
    pub id: Uuid,
    /// Template to draw under the ink, `None` for blank pages.
    pub template: Option<String>,
    /// Index into the background PDF.
    pub redirect: Option<usize>,
}

impl PageDescriptor {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            template: None,
            redirect: None,
        }
    }
}

/// The parsed page list of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageList {
    pub schema: ContentSchema,
    pub declared_count: Option<i64>,
    /// Live pages, in document order.
    pub pages: Vec<PageDescriptor>,
    /// Pages marked as deleted.
    pub deleted: Vec<Uuid>,
}

impl PageList {
    /// The declared page count must match the number of live pages.
    pub fn check_page_count(&self, document: Uuid) -> Result<()> {
        match self.declared_count {
            Some(declared) if declared == self.pages.len() as i64 => Ok(()),
            Some(declared) => Err(RmTreeError::assertion(
                document,
                format!(
                    "pageCount is {} but {} page(s) are listed",
                    declared,
                    self.pages.len()
                ),
            )),
            None => Err(RmTreeError::assertion(document, "pageCount is missing")),
        }
    }
}

/// True iff every field the detected schema requires is present.
pub fn validate_structure(record: &ContentRecord) -> bool {
    match ContentSchema::detect(record) {
        Ok(schema) => schema
            .required_fields()
            .iter()
            .all(|path| record.has_field(path)),
        Err(_) => false,
    }
}

/// Parses the ordered page list. Deleted pages are excluded from
/// [`PageList::pages`].
pub fn parse(record: &ContentRecord) -> Result<PageList> {
    let schema = ContentSchema::detect(record)?;
    let name = format!("{}.content", record.id);
    let declared_count = record.raw.get("pageCount").and_then(Value::as_i64);

    let entries = match schema {
        ContentSchema::V1 => record.field(&["pages"]),
        ContentSchema::V2 => record.field(&["cPages", "pages"]),
    }
    .and_then(Value::as_array)
    .ok_or_else(|| RmTreeError::malformed(&name, "page list is missing"))?;

    let mut pages = Vec::with_capacity(entries.len());
    let mut deleted = Vec::new();
    for (ordinal, entry) in entries.iter().enumerate() {
        match schema {
            ContentSchema::V1 => pages.push(PageDescriptor::new(page_id(entry, &name, ordinal)?)),
            ContentSchema::V2 => {
                let id = page_id(entry, &name, ordinal)?;
                if entry.get("deleted").is_some() {
                    deleted.push(id);
                } else {
                    pages.push(descriptor_v2(id, entry));
                }
            }
        }
    }

    Ok(PageList {
        schema,
        declared_count,
        pages,
        deleted,
    })
}

fn page_id(entry: &Value, name: &str, ordinal: usize) -> Result<Uuid> {
    let raw = match entry {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => entry.get("id").and_then(Value::as_str),
        _ => None,
    }
    .ok_or_else(|| RmTreeError::malformed(name, format!("page {} has no id", ordinal + 1)))?;

    Uuid::try_parse(raw).map_err(|_| {
        RmTreeError::malformed(name, format!("page {} has an invalid id: {}", ordinal + 1, raw))
    })
}

fn descriptor_v2(id: Uuid, entry: &Value) -> PageDescriptor {
    let template = entry
        .pointer("/template/value")
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty() && *t != BLANK_TEMPLATE)
        .map(str::to_string);
    let redirect = entry
        .pointer("/redir/value")
        .and_then(Value::as_u64)
        .map(|v| v as usize);

    PageDescriptor {
        id,
        template,
        redirect,
    }
}
