use lopdf::{dictionary, Document, Object, Stream};
use rmtree::api::RmTreeApi;
use rmtree::compose::{DocumentOutcome, ExportOptions};
use rmtree::convert::{
    ConvertError, DrawingTree, Frame, InkDecoder, InkRenderer, Rasterizer, RenderedPage, Toolchain,
};
use rmtree::page::PageVersion;
use rmtree::pdf::{LopdfBackend, PageBox, PdfBackend};
use rmtree::store::fs::FileStore;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use uuid::Uuid;

/// Renders every page to a 200x300 frame shifted by (10, 5).
struct FixedInk;

impl InkDecoder for FixedInk {
    fn decode(&self, blob: &[u8]) -> Result<DrawingTree, ConvertError> {
        Ok(DrawingTree::new(blob.to_vec()))
    }
}

impl InkRenderer for FixedInk {
    fn render(&self, _tree: &DrawingTree, _template: Option<&Path>) -> Result<String, ConvertError> {
        Ok(r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="10 5 200 300"></svg>"#.to_string())
    }
}

struct BlankRasterizer;

impl Rasterizer for BlankRasterizer {
    fn rasterize(&self, svg: &str) -> Result<RenderedPage, ConvertError> {
        let frame = Frame::from_svg(svg).ok_or_else(|| ConvertError::InvalidOutput(svg.into()))?;
        Ok(RenderedPage::new(blank_pdf(&[(frame.width, frame.height)])))
    }
}

fn toolchain() -> Toolchain {
    Toolchain::new(
        Box::new(FixedInk),
        Box::new(FixedInk),
        Box::new(BlankRasterizer),
    )
}

fn blank_pdf(sizes: &[(f64, f64)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids = Vec::new();
    for (width, height) in sizes {
        let content = doc.add_object(Stream::new(lopdf::Dictionary::new(), b"0 0 m 1 1 l S".to_vec()));
        let media_box: Vec<Object> = vec![0.into(), 0.into(), (*width as i64).into(), (*height as i64).into()];
        let page = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => media_box,
            "Contents" => content,
        });
        kids.push(Object::Reference(page));
    }
    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog);
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

struct DiskStore {
    dir: tempfile::TempDir,
}

impl DiskStore {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    fn write(&self, name: &str, bytes: &[u8]) {
        let path = self.dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn document(&self, id: Uuid, name: &str, parent: &str, content: Value) {
        let metadata = json!({ "visibleName": name, "parent": parent, "type": "DocumentType" });
        self.write(&format!("{}.metadata", id), metadata.to_string().as_bytes());
        self.write(&format!("{}.content", id), content.to_string().as_bytes());
    }

    fn folder(&self, id: Uuid, name: &str, parent: &str) {
        let metadata = json!({ "visibleName": name, "parent": parent, "type": "CollectionType" });
        self.write(&format!("{}.metadata", id), metadata.to_string().as_bytes());
        self.write(&format!("{}.content", id), b"{}");
    }

    fn ink(&self, doc: Uuid, page: Uuid) {
        let mut blob = PageVersion::V6.header().unwrap().into_bytes();
        blob.extend_from_slice(b"          ink");
        self.write(&format!("{}/{}.rm", doc, page), &blob);
    }

    fn api(&self) -> RmTreeApi<FileStore> {
        RmTreeApi::new(FileStore::new(self.dir.path()), toolchain())
    }
}

fn v2_page(id: Uuid, redirect: Option<usize>) -> Value {
    match redirect {
        Some(index) => json!({ "id": id.to_string(), "redir": { "value": index } }),
        None => json!({ "id": id.to_string() }),
    }
}

fn v2_content(pages: Vec<Value>) -> Value {
    json!({ "formatVersion": 2, "pageCount": pages.len(), "cPages": { "pages": pages } })
}

#[test]
fn annotated_pdf_keeps_every_background_page() {
    let store = DiskStore::new();
    let (folder, doc, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    store.folder(folder, "Papers", "");
    store.document(
        doc,
        "Article",
        &folder.to_string(),
        v2_content(vec![v2_page(a, Some(0)), v2_page(b, Some(1))]),
    );
    store.write(&format!("{}.pdf", doc), &blank_pdf(&[(612.0, 792.0), (612.0, 792.0)]));
    store.ink(doc, a);

    let dst = tempfile::tempdir().unwrap();
    let result = store
        .api()
        .export(&ExportOptions::new(dst.path()), false, |_, _, _| {})
        .unwrap();

    assert!(!result.blocked);
    let path = dst.path().join("Papers").join("Article.pdf");
    let out = fs::read(&path).unwrap();
    let boxes = LopdfBackend.page_boxes(&out).unwrap();
    assert_eq!(boxes, vec![PageBox::sized(612.0, 792.0); 2]);
    assert!(matches!(
        &result.exported[0].outcome,
        DocumentOutcome::Written { pages: 2, failed: 0, .. }
    ));
}

#[test]
fn untouched_pdf_is_copied_byte_for_byte() {
    let store = DiskStore::new();
    let doc = Uuid::new_v4();
    let background = blank_pdf(&[(300.0, 400.0), (300.0, 400.0), (300.0, 400.0)]);
    store.document(
        doc,
        "Manual",
        "",
        json!({ "formatVersion": 1, "pageCount": 3, "pages": [
            Uuid::new_v4().to_string(), Uuid::new_v4().to_string(), Uuid::new_v4().to_string()
        ] }),
    );
    store.write(&format!("{}.pdf", doc), &background);

    let dst = tempfile::tempdir().unwrap();
    let result = store
        .api()
        .export(&ExportOptions::new(dst.path()), false, |_, _, _| {})
        .unwrap();

    assert!(matches!(result.exported[0].outcome, DocumentOutcome::Copied(_)));
    assert_eq!(fs::read(dst.path().join("Manual.pdf")).unwrap(), background);
}

#[test]
fn notebook_pages_take_the_ink_frame_size() {
    let store = DiskStore::new();
    let (doc, page) = (Uuid::new_v4(), Uuid::new_v4());
    store.document(doc, "Sketch", "trash", v2_content(vec![v2_page(page, None)]));
    store.ink(doc, page);

    let dst = tempfile::tempdir().unwrap();
    store
        .api()
        .export(&ExportOptions::new(dst.path()), false, |_, _, _| {})
        .unwrap();

    let out = fs::read(dst.path().join("_trash").join("Sketch.pdf")).unwrap();
    assert_eq!(
        LopdfBackend.page_boxes(&out).unwrap(),
        vec![PageBox::sized(200.0, 300.0)]
    );
}

#[test]
fn exporting_twice_gives_identical_files() {
    let store = DiskStore::new();
    let (doc, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
    store.document(
        doc,
        "Twice",
        "",
        v2_content(vec![v2_page(a, Some(0)), v2_page(b, None)]),
    );
    store.write(&format!("{}.pdf", doc), &blank_pdf(&[(100.0, 100.0)]));
    store.ink(doc, a);
    store.ink(doc, b);

    let dst = tempfile::tempdir().unwrap();
    let api = store.api();
    let options = ExportOptions::new(dst.path());
    api.export(&options, false, |_, _, _| {}).unwrap();
    let first = fs::read(dst.path().join("Twice.pdf")).unwrap();
    api.export(&options, false, |_, _, _| {}).unwrap();
    let second = fs::read(dst.path().join("Twice.pdf")).unwrap();

    assert_eq!(first, second);
}

#[test]
fn progress_sees_every_document() {
    let store = DiskStore::new();
    let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
    store.document(a, "One", "", v2_content(vec![]));
    store.document(b, "Two", "", v2_content(vec![]));

    let dst = tempfile::tempdir().unwrap();
    let mut seen = Vec::new();
    store
        .api()
        .export(&ExportOptions::new(dst.path()), false, |index, total, entity| {
            seen.push((index, total, entity.name.clone()))
        })
        .unwrap();

    seen.sort();
    assert_eq!(seen.len(), 2);
    assert!(seen.iter().all(|(_, total, _)| *total == 2));
}
