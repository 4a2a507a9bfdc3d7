//! # Compositor
//!
//! Produces one PDF per document from its pages and its optional background
//! (`{uuid}.pdf`):
//!
//! | background | pages              | result                                        |
//! |------------|--------------------|-----------------------------------------------|
//! | yes        | all empty          | background copied byte for byte               |
//! | yes        | some present       | ink composited over the matching background   |
//! | no         | any                | rendered pages only, empty ones dropped       |
//!
//! Pairing of pages with background pages depends on the content schema: v1
//! pairs page *i* with background page *i* and appends the background pages
//! left over; v2 follows each page's redirect index.
//!
//! A page that fails to render is skipped with a warning. A document that ends
//! up without any page is not written.

use crate::content::{self, ContentSchema};
use crate::convert::{Frame, Toolchain};
use crate::error::Result;
use crate::model::Entity;
use crate::page::Page;
use crate::pdf::{CompositePage, PageBox, PdfBackend, Placement, PlannedPage};
use crate::record;
use crate::store::DataStore;
use crate::tree;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Where and how documents are exported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Root of the exported tree.
    pub dst: PathBuf,
    /// Directory of `{template}.svg` files.
    pub templates_dir: Option<PathBuf>,
    /// Keep the intermediate SVG of every page next to the output PDF.
    pub keep_svg: bool,
}

impl ExportOptions {
    pub fn new(dst: impl Into<PathBuf>) -> Self {
        Self {
            dst: dst.into(),
            templates_dir: None,
            keep_svg: false,
        }
    }
}

/// Size of an output page and where its two layers go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Layout {
    pub width: f64,
    pub height: f64,
    pub background: Placement,
    pub ink: Placement,
}

/// Aligns rendered ink against a background page.
///
/// The output page is as large as the larger of the two along each axis. The
/// smaller box is moved so that both coordinate systems line up, using the
/// frame's shift to account for where the ink origin sits in its view box.
pub fn layout(frame: &Frame, background: Option<&PageBox>) -> Layout {
    let (w_svg, h_svg) = (frame.width, frame.height);
    let (w_bg, h_bg) = background.map_or((0.0, 0.0), |b| (b.width, b.height));
    let width = w_svg.max(w_bg);
    let height = h_svg.max(h_bg);

    let (mut x_svg, mut y_svg) = (0.0, 0.0);
    let (mut x_bg, mut y_bg) = (0.0, 0.0);

    if w_svg > w_bg {
        x_bg = width / 2.0 - w_bg / 2.0 - (w_svg / 2.0 + frame.x_shift);
    } else if w_svg < w_bg {
        x_svg = width / 2.0 - w_svg / 2.0 + (w_svg / 2.0 + frame.x_shift);
    }

    if h_svg > h_bg {
        y_bg = height - h_bg + frame.y_shift;
    } else if h_svg < h_bg {
        y_svg = height - h_svg - frame.y_shift;
    }

    Layout {
        width,
        height,
        background: Placement::new(x_bg, y_bg),
        ink: Placement::new(x_svg, y_svg),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentOutcome {
    /// The background was copied unchanged.
    Copied(PathBuf),
    /// A composited document was written.
    Written {
        path: PathBuf,
        pages: usize,
        failed: usize,
    },
    /// Nothing to write.
    Empty(PathBuf),
}

impl DocumentOutcome {
    pub fn path(&self) -> &Path {
        match self {
            DocumentOutcome::Copied(path)
            | DocumentOutcome::Written { path, .. }
            | DocumentOutcome::Empty(path) => path,
        }
    }
}

/// A slot of the output: a page, a background page, or both.
struct Slot<'p> {
    page: Option<&'p Page>,
    background: Option<usize>,
}

pub struct Compositor<'a, S: DataStore> {
    store: &'a S,
    toolchain: &'a Toolchain,
    backend: &'a dyn PdfBackend,
    options: &'a ExportOptions,
}

impl<'a, S: DataStore> Compositor<'a, S> {
    pub fn new(
        store: &'a S,
        toolchain: &'a Toolchain,
        backend: &'a dyn PdfBackend,
        options: &'a ExportOptions,
    ) -> Self {
        Self {
            store,
            toolchain,
            backend,
            options,
        }
    }

    /// The file a document is exported to.
    pub fn target(&self, entity: &Entity, entities: &BTreeMap<Uuid, Entity>) -> Result<PathBuf> {
        let dir = self.options.dst.join(tree::output_dir(entity, entities)?);
        Ok(dir.join(format!("{}.pdf", entity.name)))
    }

    pub fn export(
        &self,
        entity: &Entity,
        entities: &BTreeMap<Uuid, Entity>,
    ) -> Result<DocumentOutcome> {
        let target = self.target(entity, entities)?;
        let record = record::load_content(self.store, &entity.id)?;
        let list = content::parse(&record)?;
        let pages = list
            .pages
            .into_iter()
            .map(|descriptor| Page::resolve(self.store, entity.id, descriptor))
            .collect::<Result<Vec<_>>>()?;

        let background_name = format!("{}.pdf", entity.id);
        let background = if self.store.is_file(&background_name) {
            Some(self.store.read(&background_name)?)
        } else {
            None
        };

        if let Some(bytes) = &background {
            if pages.iter().all(Page::is_empty) {
                debug!("[pdf] {} -> {}", entity, target.display());
                write_file(&target, bytes)?;
                return Ok(DocumentOutcome::Copied(target));
            }
        }

        let boxes = match &background {
            Some(bytes) => self.backend.page_boxes(bytes)?,
            None => Vec::new(),
        };
        let slots = pair(entity, list.schema, &pages, boxes.len());

        let svg_dir = match (self.options.keep_svg, target.parent()) {
            (true, Some(dir)) => {
                fs::create_dir_all(dir)?;
                Some(dir)
            }
            _ => None,
        };

        let mut planned = Vec::with_capacity(slots.len());
        let mut failed = 0;
        for slot in slots {
            match slot.page {
                Some(Page::Present(page)) => {
                    let rendered = page
                        .export(
                            self.store,
                            self.toolchain,
                            self.options.templates_dir.as_deref(),
                            svg_dir,
                        )
                        .and_then(|(ink, frame)| {
                            self.backend.check_page(&ink.pdf)?;
                            Ok((ink, frame))
                        });
                    match rendered {
                        Ok((ink, frame)) => {
                            let page_box = slot.background.map(|i| &boxes[i]);
                            let layout = layout(&frame, page_box);
                            planned.push(PlannedPage::Composite(CompositePage {
                                width: layout.width,
                                height: layout.height,
                                background: slot.background.map(|i| (i, layout.background)),
                                ink,
                                ink_at: layout.ink,
                            }));
                        }
                        Err(e) => {
                            warn!(
                                "Failed to export page {} of {}: {}",
                                page.descriptor.id, entity, e
                            );
                            failed += 1;
                        }
                    }
                }
                page => match slot.background {
                    Some(index) => planned.push(PlannedPage::Background(index)),
                    None => {
                        if let Some(page) = page {
                            info!("dropping empty page {} of {}", page.id(), entity);
                        }
                    }
                },
            }
        }

        if planned.is_empty() {
            error!(
                "{} is empty, it will not be written to disk",
                target.display()
            );
            return Ok(DocumentOutcome::Empty(target));
        }

        let bytes = self.backend.assemble(background.as_deref(), &planned)?;
        write_file(&target, &bytes)?;
        debug!("[ink] {} -> {}", entity, target.display());
        Ok(DocumentOutcome::Written {
            path: target,
            pages: planned.len(),
            failed,
        })
    }
}

fn pair<'p>(
    entity: &Entity,
    schema: ContentSchema,
    pages: &'p [Page],
    background_pages: usize,
) -> Vec<Slot<'p>> {
    match schema {
        ContentSchema::V1 => (0..pages.len().max(background_pages))
            .map(|i| Slot {
                page: pages.get(i),
                background: (i < background_pages).then_some(i),
            })
            .collect(),
        ContentSchema::V2 => pages
            .iter()
            .map(|page| {
                let background = page.descriptor().redirect.filter(|index| {
                    let in_range = *index < background_pages;
                    if !in_range && background_pages > 0 {
                        warn!(
                            "page {} of {} redirects to background page {} but there are only {}",
                            page.id(),
                            entity,
                            index + 1,
                            background_pages
                        );
                    }
                    in_range
                });
                Slot {
                    page: Some(page),
                    background,
                }
            })
            .collect(),
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}
