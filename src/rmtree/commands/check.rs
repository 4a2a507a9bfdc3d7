//! The pre-flight validator.
//!
//! Walks the whole store without exporting anything and sorts every problem
//! into one of two kinds:
//!
//! - **assertion**: the store is inconsistent (missing records, stray files,
//!   page count mismatch, broken parent chain). Export can be forced past these.
//! - **compatibility**: the store is fine but uses a content schema or a page
//!   format this tool cannot read. Export never proceeds past these.

use crate::commands::{CmdMessage, CmdResult};
use crate::content::{self, ContentSchema, PageList};
use crate::error::{RmTreeError, Result};
use crate::model::Entity;
use crate::page::{self, Page, PageVersion};
use crate::record;
use crate::store::DataStore;
use crate::tree::{self, Scan};
use std::fmt;
use uuid::Uuid;

const PAGE_SIDECAR_SUFFIX: &str = "-metadata.json";
const PAGE_BLOB_SUFFIX: &str = ".rm";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FindingKind {
    Compatibility,
    Assertion,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FindingKind::Compatibility => write!(f, "compatibility"),
            FindingKind::Assertion => write!(f, "assertion"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub uuid: Uuid,
    /// Display name, or the UUID when the entity could not be loaded.
    pub name: String,
    pub kind: FindingKind,
    pub message: String,
    /// Offending pages as (1-based ordinal, page UUID).
    pub pages: Vec<(usize, Uuid)>,
}

impl Finding {
    fn from_error(uuid: Uuid, name: String, error: &RmTreeError) -> Self {
        let kind = if error.is_compatibility() {
            FindingKind::Compatibility
        } else {
            FindingKind::Assertion
        };
        Self {
            uuid,
            name,
            kind,
            message: error.to_string(),
            pages: Vec::new(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name, self.uuid, self.message)?;
        if !self.pages.is_empty() {
            let pages: Vec<String> = self
                .pages
                .iter()
                .map(|(ordinal, id)| format!("#{} {}", ordinal, id))
                .collect();
            write!(f, " [{}]", pages.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
    pub documents: usize,
    pub folders: usize,
}

impl CheckReport {
    pub fn compatibility_count(&self) -> usize {
        self.count(FindingKind::Compatibility)
    }

    pub fn assertion_count(&self) -> usize {
        self.count(FindingKind::Assertion)
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    /// Compatibility findings always block, assertion findings only unless
    /// overridden.
    pub fn allows_export(&self, ignore_assertions: bool) -> bool {
        self.compatibility_count() == 0 && (ignore_assertions || self.assertion_count() == 0)
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    fn count(&self, kind: FindingKind) -> usize {
        self.of_kind(kind).count()
    }
}

/// Scans and checks the store, returning the scan for reuse.
pub fn inspect<S: DataStore>(store: &S) -> Result<(Scan, CheckReport)> {
    let scan = tree::scan(store)?;
    let mut report = CheckReport::default();

    for (uuid, error) in &scan.issues {
        report
            .findings
            .push(Finding::from_error(*uuid, uuid.to_string(), error));
    }

    for entity in scan.entities.values() {
        if let Err(e) = tree::output_path(entity, &scan.entities) {
            report
                .findings
                .push(Finding::from_error(entity.id, entity.name.clone(), &e));
        }

        if entity.is_document() {
            report.documents += 1;
            check_document(store, entity, &mut report.findings);
        } else {
            report.folders += 1;
        }
    }

    report.findings.sort_by(|a, b| (a.kind, a.uuid).cmp(&(b.kind, b.uuid)));
    Ok((scan, report))
}

pub fn check_store<S: DataStore>(store: &S) -> Result<CheckReport> {
    Ok(inspect(store)?.1)
}

fn check_document<S: DataStore>(store: &S, entity: &Entity, findings: &mut Vec<Finding>) {
    let finding = |kind: FindingKind, message: String| Finding {
        uuid: entity.id,
        name: entity.name.clone(),
        kind,
        message,
        pages: Vec::new(),
    };
    let from_error = |e: &RmTreeError| Finding::from_error(entity.id, entity.name.clone(), e);

    let record = match record::load_content(store, &entity.id) {
        Ok(record) => record,
        Err(e) => return findings.push(from_error(&e)),
    };
    if let Err(e) = ContentSchema::detect(&record) {
        return findings.push(from_error(&e));
    }
    if !content::validate_structure(&record) {
        return findings.push(finding(
            FindingKind::Assertion,
            "content record is missing required fields".to_string(),
        ));
    }
    let list = match content::parse(&record) {
        Ok(list) => list,
        Err(e) => return findings.push(from_error(&e)),
    };

    if let Err(e) = list.check_page_count(entity.id) {
        findings.push(from_error(&e));
    }

    for deleted in &list.deleted {
        if store.is_file(&page::blob_name(&entity.id, deleted)) {
            findings.push(finding(
                FindingKind::Assertion,
                format!("deleted page {} still has an ink file", deleted),
            ));
        }
    }

    if let Some(message) = stray_page_files(store, &entity.id) {
        findings.push(finding(FindingKind::Assertion, message));
    }

    match unsupported_pages(store, entity.id, &list) {
        Ok(pages) if pages.is_empty() => {}
        Ok(pages) => {
            let mut versions: Vec<String> = pages.iter().map(|(_, _, v)| v.to_string()).collect();
            versions.sort();
            versions.dedup();
            findings.push(Finding {
                pages: pages.iter().map(|(ordinal, id, _)| (*ordinal, *id)).collect(),
                ..finding(
                    FindingKind::Compatibility,
                    format!(
                        "{} page(s) use an unsupported format ({}), only {} is supported",
                        pages.len(),
                        versions.join(", "),
                        PageVersion::SUPPORTED
                    ),
                )
            });
        }
        Err(e) => findings.push(from_error(&e)),
    }
}

/// Present pages whose format is not supported, with their 1-based ordinal.
fn unsupported_pages<S: DataStore>(
    store: &S,
    document: Uuid,
    list: &PageList,
) -> Result<Vec<(usize, Uuid, PageVersion)>> {
    let mut offending = Vec::new();
    for (i, descriptor) in list.pages.iter().enumerate() {
        let page = Page::resolve(store, document, descriptor.clone())?;
        if let Page::Present(present) = &page {
            if !page.test_assertion() {
                offending.push((i + 1, present.descriptor.id, present.version));
            }
        }
    }
    Ok(offending)
}

/// Files in the page folder other than `{page}.rm` and `{page}-metadata.json`.
fn stray_page_files<S: DataStore>(store: &S, document: &Uuid) -> Option<String> {
    let folder = document.to_string();
    if !store.is_dir(&folder) {
        return None;
    }
    let names = match store.list_dir(&folder) {
        Ok(names) => names,
        Err(e) => return Some(e.to_string()),
    };

    let stray: Vec<String> = names
        .into_iter()
        .filter(|name| !is_page_file(name))
        .collect();
    if stray.is_empty() {
        None
    } else {
        Some(format!("unexpected file(s) in the page folder: {}", stray.join(", ")))
    }
}

fn is_page_file(name: &str) -> bool {
    let stem = name
        .strip_suffix(PAGE_BLOB_SUFFIX)
        .or_else(|| name.strip_suffix(PAGE_SIDECAR_SUFFIX));
    stem.is_some_and(|stem| Uuid::try_parse(stem).is_ok())
}

pub fn run<S: DataStore>(store: &S) -> Result<CmdResult> {
    let report = check_store(store)?;
    let mut result = CmdResult::default();
    summarize(&report, &mut result);
    Ok(result.with_report(report))
}

/// Adds the one-line summary of `report` to `result`. The findings themselves
/// travel in [`CmdResult::report`].
pub fn summarize(report: &CheckReport, result: &mut CmdResult) {
    if report.is_clean() {
        result.add_message(CmdMessage::success(format!(
            "No problems found in {} document(s) and {} folder(s).",
            report.documents, report.folders
        )));
    } else {
        result.add_message(CmdMessage::info(format!(
            "{} compatibility error(s), {} assertion error(s).",
            report.compatibility_count(),
            report.assertion_count()
        )));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::MessageLevel;
    use crate::store::memory::fixtures::{content_v1, content_v2, content_v2_with, StoreFixture};
    use serde_json::json;

    #[test]
    fn clean_store_has_no_findings() {
        let (folder, doc, page) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let fixture = StoreFixture::new()
            .with_folder(folder, "A", "")
            .with_document(doc, "B", &folder.to_string(), content_v2(&[page]))
            .with_page(doc, page, PageVersion::V6)
            .with_file(&format!("{}/{}-metadata.json", doc, page), b"{}");

        let report = check_store(&fixture.store).unwrap();
        assert!(report.is_clean(), "{:?}", report.findings);
        assert_eq!((report.documents, report.folders), (1, 1));
        assert!(report.allows_export(false));
    }

    #[test]
    fn old_pages_are_aggregated_per_document() {
        let doc = Uuid::new_v4();
        let pages = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let fixture = StoreFixture::new()
            .with_document(doc, "Legacy", "", content_v1(&pages))
            .with_page(doc, pages[0], PageVersion::V5)
            .with_page(doc, pages[1], PageVersion::V6)
            .with_page(doc, pages[2], PageVersion::Unknown);

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.compatibility_count(), 1);
        assert_eq!(report.assertion_count(), 0);

        let finding = &report.findings[0];
        assert_eq!(finding.pages, vec![(1, pages[0]), (3, pages[2])]);
        assert!(finding.message.contains("v5"));
        assert!(finding.message.contains("unknown"));
        assert!(!report.allows_export(true));
    }

    #[test]
    fn unknown_schema_is_compatibility() {
        let doc = Uuid::new_v4();
        let fixture = StoreFixture::new().with_document(
            doc,
            "Future",
            "",
            json!({ "formatVersion": 3, "pageCount": 0 }),
        );

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.compatibility_count(), 1);
        assert_eq!(report.assertion_count(), 0);
    }

    #[test]
    fn structural_problems_are_assertions() {
        let doc = Uuid::new_v4();
        let fixture = StoreFixture::new().with_document(
            doc,
            "Broken",
            "",
            json!({ "formatVersion": 2, "pageCount": 0, "pages": [] }),
        );

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert!(!report.allows_export(false));
        assert!(report.allows_export(true));
    }

    #[test]
    fn page_count_mismatch_is_an_assertion() {
        let doc = Uuid::new_v4();
        let mut content = content_v1(&[Uuid::new_v4()]);
        content["pageCount"] = json!(4);
        let fixture = StoreFixture::new().with_document(doc, "Count", "", content);

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert!(report.findings[0].message.contains("pageCount"));
    }

    #[test]
    fn deleted_pages_must_not_have_ink() {
        let (doc, live, gone) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let content = content_v2_with(
            vec![
                json!({ "id": live.to_string() }),
                json!({ "id": gone.to_string(), "deleted": { "value": 1 } }),
            ],
            1,
        );
        let fixture = StoreFixture::new()
            .with_document(doc, "Trimmed", "", content)
            .with_page(doc, gone, PageVersion::V6);

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert!(report.findings[0].message.contains(&gone.to_string()));
    }

    #[test]
    fn stray_files_in_page_folder() {
        let (doc, page) = (Uuid::new_v4(), Uuid::new_v4());
        let fixture = StoreFixture::new()
            .with_document(doc, "Messy", "", content_v2(&[page]))
            .with_page(doc, page, PageVersion::V6)
            .with_file(&format!("{}/notes.txt", doc), b"hi");

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert!(report.findings[0].message.contains("notes.txt"));
    }

    #[test]
    fn dirty_marker_with_metadata_is_flagged() {
        let id = Uuid::new_v4();
        let fixture = StoreFixture::new()
            .with_marker(id, "dirty")
            .with_json(
                format!("{}.metadata", id),
                &crate::store::memory::fixtures::metadata("x", "", "DocumentType"),
            );

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert_eq!(report.findings[0].uuid, id);
    }

    #[test]
    fn dangling_parent_is_an_assertion() {
        let doc = Uuid::new_v4();
        let fixture = StoreFixture::new().with_document(
            doc,
            "Lost",
            &Uuid::new_v4().to_string(),
            content_v1(&[]),
        );

        let report = check_store(&fixture.store).unwrap();
        assert_eq!(report.assertion_count(), 1);
        assert_eq!(report.findings[0].name, "Lost");
    }

    #[test]
    fn compatibility_findings_come_first() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let fixture = StoreFixture::new()
            .with_document(a, "Count", "", json!({ "formatVersion": 1, "pageCount": 2, "pages": [] }))
            .with_document(b, "Future", "", json!({ "formatVersion": 9 }));

        let report = check_store(&fixture.store).unwrap();
        let kinds: Vec<FindingKind> = report.findings.iter().map(|f| f.kind).collect();
        assert_eq!(kinds, vec![FindingKind::Compatibility, FindingKind::Assertion]);
    }

    #[test]
    fn run_reports_counts() {
        let doc = Uuid::new_v4();
        let fixture = StoreFixture::new().with_document(doc, "Future", "", json!({ "formatVersion": 9 }));

        let result = run(&fixture.store).unwrap();
        assert!(result
            .messages
            .iter()
            .any(|m| m.content.contains("1 compatibility error(s), 0 assertion error(s)")));
    }

    #[test]
    fn run_keeps_findings_out_of_messages() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let fixture = StoreFixture::new()
            .with_document(a, "Count", "", json!({ "formatVersion": 1, "pageCount": 2, "pages": [] }))
            .with_document(b, "Future", "", json!({ "formatVersion": 9 }));

        let result = run(&fixture.store).unwrap();
        assert_eq!(result.report.as_ref().unwrap().findings.len(), 2);
        assert_eq!(result.messages.len(), 1);
        assert_eq!(result.messages[0].level, MessageLevel::Info);
    }

    #[test]
    fn test_is_page_file() {
        let page = Uuid::new_v4();
        assert!(is_page_file(&format!("{}.rm", page)));
        assert!(is_page_file(&format!("{}-metadata.json", page)));
        assert!(!is_page_file("thumbnail.png"));
        assert!(!is_page_file(&format!("{}.svg", page)));
    }
}
