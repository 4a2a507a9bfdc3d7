use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

const V6_HEADER: &[u8] = b"reMarkable .lines file, version=6          ";
const V5_HEADER: &[u8] = b"reMarkable .lines file, version=5          ";

/// Minimal single-page PDF, enough to be copied through untouched.
const TINY_PDF: &[u8] = b"%PDF-1.4\n1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 100 100] >> endobj\n\
trailer << /Root 1 0 R >>\n%%EOF\n";

struct Backup {
    dir: tempfile::TempDir,
}

impl Backup {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn src(&self) -> PathBuf {
        self.dir.path().join("xochitl")
    }

    fn write(&self, name: &str, bytes: &[u8]) {
        let path = self.src().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn entity(&self, id: Uuid, name: &str, parent: &str, kind: &str, content: serde_json::Value) {
        let metadata = json!({ "visibleName": name, "parent": parent, "type": kind });
        self.write(&format!("{}.metadata", id), metadata.to_string().as_bytes());
        self.write(&format!("{}.content", id), content.to_string().as_bytes());
    }

    fn folder(&self, id: Uuid, name: &str, parent: &str) -> &Self {
        self.entity(id, name, parent, "CollectionType", json!({}));
        self
    }

    fn notebook(&self, id: Uuid, name: &str, parent: &str, pages: &[(Uuid, &[u8])]) -> &Self {
        let descriptors: Vec<_> = pages
            .iter()
            .map(|(page, _)| json!({ "id": page.to_string() }))
            .collect();
        self.entity(
            id,
            name,
            parent,
            "DocumentType",
            json!({ "formatVersion": 2, "pageCount": pages.len(), "cPages": { "pages": descriptors } }),
        );
        for (page, header) in pages {
            self.write(&format!("{}/{}.rm", id, page), header);
        }
        self
    }

    fn command(&self, subcommand: &str, extra: &[&str]) -> Command {
        let config = self.dir.path().join("config.json");
        if !config.exists() {
            fs::write(&config, "{}").unwrap();
        }
        let mut cmd = Command::cargo_bin("rmtree").unwrap();
        cmd.env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(&config)
            .arg(subcommand)
            .arg(self.src())
            .args(extra);
        cmd
    }

    fn out(&self) -> PathBuf {
        self.dir.path().join("out")
    }
}

fn path_of(parts: &[&str]) -> String {
    parts.iter().collect::<PathBuf>().display().to_string()
}

#[test]
fn check_reports_a_clean_store() {
    let backup = Backup::new();
    let folder = Uuid::new_v4();
    backup
        .folder(folder, "Work", "")
        .notebook(Uuid::new_v4(), "Plan", &folder.to_string(), &[(Uuid::new_v4(), V6_HEADER)]);

    backup
        .command("check", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "No problems found in 1 document(s) and 1 folder(s).",
        ));
}

#[test]
fn check_flags_a_marker_next_to_records() {
    let backup = Backup::new();
    let doc = Uuid::new_v4();
    backup.notebook(doc, "Half synced", "", &[]);
    backup.write(&format!("{}.dirty", doc), b"");

    backup
        .command("check", &[])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Assertion errors (1)"))
        .stdout(predicate::str::contains(doc.to_string()));
}

#[test]
fn check_flags_old_page_formats() {
    let backup = Backup::new();
    let page = Uuid::new_v4();
    backup.notebook(Uuid::new_v4(), "Ancient", "", &[(page, V5_HEADER)]);

    backup
        .command("check", &[])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Compatibility errors (1)"))
        .stdout(predicate::str::contains(page.to_string()));
}

#[test]
fn export_refuses_old_page_formats() {
    let backup = Backup::new();
    backup.notebook(Uuid::new_v4(), "Ancient", "", &[(Uuid::new_v4(), V5_HEADER)]);
    let out = backup.out();

    backup
        .command("export", &[out.to_str().unwrap(), "--ignore-assertions"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Export aborted"));
    assert!(!out.join("Ancient.pdf").exists());
}

#[test]
fn export_copies_untouched_pdfs() {
    let backup = Backup::new();
    let (folder, doc) = (Uuid::new_v4(), Uuid::new_v4());
    backup.folder(folder, "Books", "");
    backup.entity(
        doc,
        "Manual",
        &folder.to_string(),
        "DocumentType",
        json!({ "formatVersion": 1, "pageCount": 1, "pages": [Uuid::new_v4().to_string()] }),
    );
    backup.write(&format!("{}.pdf", doc), TINY_PDF);
    let out = backup.out();

    backup
        .command("export", &[out.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 1 of 1 document(s)"));
    assert_eq!(
        fs::read(out.join("Books").join("Manual.pdf")).unwrap(),
        TINY_PDF
    );
}

#[test]
fn tree_lists_output_paths() {
    let backup = Backup::new();
    let folder = Uuid::new_v4();
    backup
        .folder(folder, "Work", "")
        .notebook(Uuid::new_v4(), "Plan", &folder.to_string(), &[])
        .notebook(Uuid::new_v4(), "Old", "trash", &[]);

    backup
        .command("tree", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains(path_of(&["Work", "Plan.pdf"])))
        .stdout(predicate::str::contains(path_of(&["_trash", "Old.pdf"])))
        .stdout(predicate::str::contains("Work/"));
}

#[test]
fn stats_counts_entries_by_extension() {
    let backup = Backup::new();
    backup.notebook(Uuid::new_v4(), "A", "", &[(Uuid::new_v4(), V6_HEADER)]);
    backup.notebook(Uuid::new_v4(), "B", "", &[]);

    backup
        .command("stats", &[])
        .assert()
        .success()
        .stdout(predicate::str::contains(".metadata"))
        .stdout(predicate::str::contains("folder"));
}

#[test]
fn missing_source_is_an_error() {
    let backup = Backup::new();

    backup
        .command("tree", &[])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

#[test]
fn unreadable_config_is_an_error() {
    let backup = Backup::new();
    backup.notebook(Uuid::new_v4(), "A", "", &[]);
    let missing: &Path = &backup.dir.path().join("nope.json");

    Command::cargo_bin("rmtree")
        .unwrap()
        .arg("--config")
        .arg(missing)
        .arg("tree")
        .arg(backup.src())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config error"));
}
