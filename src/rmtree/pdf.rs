//! PDF assembly.
//!
//! The compositor decides *what* goes on each output page; [`PdfBackend`] does
//! the PDF work: measuring the pages of a background document and building the
//! output document from a list of [`PlannedPage`]s.
//!
//! [`LopdfBackend`] wraps every source page (background or ink) as a Form
//! XObject and draws it on the output page with a translation, background layer
//! first so the ink stays on top.

use crate::convert::RenderedPage;
use crate::error::{RmTreeError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashMap;
use tracing::debug;

/// Page tree depth beyond which inherited attributes are not looked up.
const MAX_INHERIT_DEPTH: usize = 64;

/// The media box of a page, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PageBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn sized(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

/// Where a layer lands on the output page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub x: f64,
    pub y: f64,
}

impl Placement {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompositePage {
    pub width: f64,
    pub height: f64,
    /// Background page index and its placement.
    pub background: Option<(usize, Placement)>,
    pub ink: RenderedPage,
    pub ink_at: Placement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlannedPage {
    /// A background page, unchanged.
    Background(usize),
    /// Rendered ink over an optional background page.
    Composite(CompositePage),
}

pub trait PdfBackend {
    /// Media boxes of every page, in page order.
    fn page_boxes(&self, pdf: &[u8]) -> Result<Vec<PageBox>>;

    /// Fails unless `pdf` is a rendered page [`PdfBackend::assemble`] can use.
    fn check_page(&self, pdf: &[u8]) -> Result<()>;

    /// Builds a document from `pages`. Background indices refer to the pages of
    /// `background`.
    fn assemble(&self, background: Option<&[u8]>, pages: &[PlannedPage]) -> Result<Vec<u8>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfBackend;

impl PdfBackend for LopdfBackend {
    fn page_boxes(&self, pdf: &[u8]) -> Result<Vec<PageBox>> {
        let doc = Document::load_mem(pdf)?;
        page_ids(&doc)
            .into_iter()
            .map(|id| media_box(&doc, id))
            .collect()
    }

    fn check_page(&self, pdf: &[u8]) -> Result<()> {
        let doc = Document::load_mem(pdf)?;
        if doc.get_pages().is_empty() {
            return Err(RmTreeError::malformed("rendered page", "PDF has no page"));
        }
        Ok(())
    }

    fn assemble(&self, background: Option<&[u8]>, pages: &[PlannedPage]) -> Result<Vec<u8>> {
        let background = background.map(Document::load_mem).transpose()?;
        let mut output = OutputDocument::new();

        let mut backgrounds = background.as_ref().map(|doc| BackgroundPages {
            ids: page_ids(doc),
            importer: Importer::new(doc),
            forms: HashMap::new(),
        });

        for (ordinal, planned) in pages.iter().enumerate() {
            match planned {
                PlannedPage::Background(index) => {
                    let source = require_background(&mut backgrounds, *index)?;
                    let (form, page_box) = source.form(&mut output.doc, *index)?;
                    output.add_page(
                        page_box.width,
                        page_box.height,
                        &[("Bg", form, page_box, Placement::new(0.0, 0.0))],
                    );
                }
                PlannedPage::Composite(page) => {
                    let mut layers = Vec::with_capacity(2);
                    if let Some((index, at)) = page.background {
                        let source = require_background(&mut backgrounds, index)?;
                        let (form, page_box) = source.form(&mut output.doc, index)?;
                        layers.push(("Bg", form, page_box, at));
                    }

                    let ink = Document::load_mem(&page.ink.pdf)?;
                    let ink_page = page_ids(&ink).into_iter().next().ok_or_else(|| {
                        RmTreeError::malformed(
                            format!("rendered page {}", ordinal + 1),
                            "PDF has no page",
                        )
                    })?;
                    let (form, page_box) =
                        Importer::new(&ink).form(&mut output.doc, ink_page)?;
                    layers.push(("Ink", form, page_box, page.ink_at));

                    output.add_page(page.width, page.height, &layers);
                }
            }
        }

        debug!("assembled {} page(s)", pages.len());
        output.finish()
    }
}

struct BackgroundPages<'a> {
    ids: Vec<ObjectId>,
    importer: Importer<'a>,
    forms: HashMap<usize, (ObjectId, PageBox)>,
}

impl BackgroundPages<'_> {
    fn form(&mut self, target: &mut Document, index: usize) -> Result<(ObjectId, PageBox)> {
        if let Some(form) = self.forms.get(&index) {
            return Ok(*form);
        }
        let id = *self.ids.get(index).ok_or_else(|| {
            RmTreeError::malformed(
                "background PDF",
                format!("no page {} ({} pages)", index + 1, self.ids.len()),
            )
        })?;
        let form = self.importer.form(target, id)?;
        self.forms.insert(index, form);
        Ok(form)
    }
}

fn require_background<'a, 'b>(
    backgrounds: &'b mut Option<BackgroundPages<'a>>,
    index: usize,
) -> Result<&'b mut BackgroundPages<'a>> {
    backgrounds.as_mut().ok_or_else(|| {
        RmTreeError::malformed(
            "background PDF",
            format!("page {} requested without a background", index + 1),
        )
    })
}

struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl OutputDocument {
    fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    fn add_page(&mut self, width: f64, height: f64, layers: &[(&str, ObjectId, PageBox, Placement)]) {
        let mut xobjects = Dictionary::new();
        let mut content = String::new();
        for (name, form, page_box, at) in layers {
            xobjects.set(*name, *form);
            content.push_str(&format!(
                "q 1 0 0 1 {:.4} {:.4} cm /{} Do Q\n",
                at.x - page_box.x,
                at.y - page_box.y,
                name
            ));
        }

        let content_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => rect(&PageBox::sized(width, height)),
            "Resources" => dictionary! { "XObject" => xobjects },
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());
    }

    fn finish(mut self) -> Result<Vec<u8>> {
        let count = self.kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => self.kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

/// Deep-copies objects from a source document, each at most once.
struct Importer<'a> {
    source: &'a Document,
    imported: HashMap<ObjectId, ObjectId>,
}

impl<'a> Importer<'a> {
    fn new(source: &'a Document) -> Self {
        Self {
            source,
            imported: HashMap::new(),
        }
    }

    /// Turns a source page into a Form XObject of the target document.
    fn form(&mut self, target: &mut Document, page_id: ObjectId) -> Result<(ObjectId, PageBox)> {
        let source = self.source;
        let page_box = media_box(source, page_id)?;
        let content = source.get_page_content(page_id)?;
        let resources = match inherited(source, page_id, b"Resources")? {
            Some(resources) => self.object(target, resources)?,
            None => Object::Dictionary(Dictionary::new()),
        };

        let form = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => rect(&page_box),
                "Resources" => resources,
            },
            content,
        );
        Ok((target.add_object(form), page_box))
    }

    fn reference(&mut self, target: &mut Document, id: ObjectId) -> Result<ObjectId> {
        if let Some(new_id) = self.imported.get(&id) {
            return Ok(*new_id);
        }
        let new_id = target.new_object_id();
        self.imported.insert(id, new_id);

        let source = self.source;
        let object = match source.get_object(id) {
            Ok(object) => self.object(target, object)?,
            Err(_) => Object::Null,
        };
        target.objects.insert(new_id, object);
        Ok(new_id)
    }

    fn object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        Ok(match object {
            Object::Reference(id) => Object::Reference(self.reference(target, *id)?),
            Object::Array(items) => Object::Array(
                items
                    .iter()
                    .map(|item| self.object(target, item))
                    .collect::<Result<Vec<_>>>()?,
            ),
            Object::Dictionary(dict) => Object::Dictionary(self.dictionary(target, dict)?),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.dictionary(target, &stream.dict)?;
                Object::Stream(copy)
            }
            other => other.clone(),
        })
    }

    fn dictionary(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            // Back links into the source page tree.
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.object(target, value)?);
        }
        Ok(copy)
    }
}

fn page_ids(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().into_values().collect()
}

fn resolve<'d>(doc: &'d Document, object: &'d Object) -> Result<&'d Object> {
    match object {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

/// Looks a page attribute up, walking the page tree for inherited ones.
fn inherited<'d>(doc: &'d Document, page_id: ObjectId, key: &[u8]) -> Result<Option<&'d Object>> {
    let mut node = doc.get_dictionary(page_id)?;
    for _ in 0..MAX_INHERIT_DEPTH {
        if let Ok(value) = node.get(key) {
            return Ok(Some(resolve(doc, value)?));
        }
        match node.get(b"Parent").and_then(Object::as_reference) {
            Ok(parent) => node = doc.get_dictionary(parent)?,
            Err(_) => return Ok(None),
        }
    }
    Ok(None)
}

fn media_box(doc: &Document, page_id: ObjectId) -> Result<PageBox> {
    let invalid = || RmTreeError::malformed("PDF page", format!("invalid MediaBox on {:?}", page_id));

    let values = inherited(doc, page_id, b"MediaBox")?
        .and_then(|object| object.as_array().ok())
        .ok_or_else(invalid)?
        .iter()
        .map(|v| resolve(doc, v).ok().and_then(number))
        .collect::<Option<Vec<f64>>>()
        .filter(|v| v.len() == 4)
        .ok_or_else(invalid)?;

    let (x0, y0, x1, y1) = (values[0], values[1], values[2], values[3]);
    Ok(PageBox::new(
        x0.min(x1),
        y0.min(y1),
        (x1 - x0).abs(),
        (y1 - y0).abs(),
    ))
}

fn number(object: &Object) -> Option<f64> {
    match object {
        Object::Integer(v) => Some(*v as f64),
        Object::Real(v) => Some(*v as f64),
        _ => None,
    }
}

fn rect(page_box: &PageBox) -> Object {
    Object::Array(vec![
        Object::Real(page_box.x as _),
        Object::Real(page_box.y as _),
        Object::Real((page_box.x + page_box.width) as _),
        Object::Real((page_box.y + page_box.height) as _),
    ])
}

/// Builds a PDF with one blank page per size, each carrying a marker in its
/// content stream.
#[cfg(any(test, feature = "test_utils"))]
pub fn sample_pdf(sizes: &[(f64, f64)]) -> Vec<u8> {
    let mut output = OutputDocument::new();
    for (i, (width, height)) in sizes.iter().enumerate() {
        let content = output.doc.add_object(Stream::new(
            Dictionary::new(),
            format!("% page {}\n0 0 m {} {} l S\n", i + 1, width, height).into_bytes(),
        ));
        let page_id = output.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => output.pages_id,
            "MediaBox" => rect(&PageBox::sized(*width, *height)),
            "Contents" => content,
        });
        output.kids.push(page_id.into());
    }
    output.finish().unwrap_or_default()
}
