//! Pages of a document, resolved against the store.
//!
//! A page is [`Page::Present`] when its ink blob `{document}/{page}.rm` is a file,
//! [`Page::Empty`] otherwise (typically an untouched page of an imported PDF).
//! The version of a present blob is read from its ASCII header.

use crate::content::PageDescriptor;
use crate::convert::{Frame, RenderedPage, Toolchain};
use crate::error::{RmTreeError, Result};
use crate::store::DataStore;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

pub const HEADER_PREFIX: &str = "reMarkable .lines file, version=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageVersion {
    V6,
    V5,
    V3,
    Unknown,
}

impl PageVersion {
    /// Known versions, in matching priority order.
    pub const KNOWN: [PageVersion; 3] = [PageVersion::V6, PageVersion::V5, PageVersion::V3];
    /// The only version the export pipeline handles.
    pub const SUPPORTED: PageVersion = PageVersion::V6;

    pub fn number(&self) -> Option<u8> {
        match self {
            PageVersion::V6 => Some(6),
            PageVersion::V5 => Some(5),
            PageVersion::V3 => Some(3),
            PageVersion::Unknown => None,
        }
    }

    pub fn header(&self) -> Option<String> {
        self.number().map(|n| format!("{}{}", HEADER_PREFIX, n))
    }

    /// Number of bytes needed to tell the known versions apart.
    pub fn header_len() -> usize {
        Self::KNOWN
            .iter()
            .filter_map(|v| v.header())
            .map(|h| h.len())
            .max()
            .unwrap_or(0)
    }

    /// Matches the start of a blob against the known headers, first match wins.
    pub fn detect(prefix: &[u8]) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|v| {
                v.header()
                    .is_some_and(|h| prefix.starts_with(h.as_bytes()))
            })
            .unwrap_or(PageVersion::Unknown)
    }
}

impl fmt::Display for PageVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.number() {
            Some(n) => write!(f, "v{}", n),
            None => write!(f, "unknown"),
        }
    }
}

pub fn blob_name(document: &Uuid, page: &Uuid) -> String {
    format!("{}/{}.rm", document, page)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyPage {
    pub document: Uuid,
    pub descriptor: PageDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentPage {
    pub document: Uuid,
    pub descriptor: PageDescriptor,
    pub version: PageVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Empty(EmptyPage),
    Present(PresentPage),
}

impl Page {
    pub fn resolve<S: DataStore>(
        store: &S,
        document: Uuid,
        descriptor: PageDescriptor,
    ) -> Result<Self> {
        let name = blob_name(&document, &descriptor.id);
        if !store.is_file(&name) {
            return Ok(Page::Empty(EmptyPage {
                document,
                descriptor,
            }));
        }

        let prefix = store.read_prefix(&name, PageVersion::header_len())?;
        let version = PageVersion::detect(&prefix);
        Ok(Page::Present(PresentPage {
            document,
            descriptor,
            version,
        }))
    }

    pub fn descriptor(&self) -> &PageDescriptor {
        match self {
            Page::Empty(page) => &page.descriptor,
            Page::Present(page) => &page.descriptor,
        }
    }

    pub fn id(&self) -> Uuid {
        self.descriptor().id
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Page::Empty(_))
    }

    /// True iff the page can go through the export pipeline.
    pub fn test_assertion(&self) -> bool {
        match self {
            Page::Empty(_) => true,
            Page::Present(page) => page.version == PageVersion::SUPPORTED,
        }
    }
}

impl PresentPage {
    pub fn blob_name(&self) -> String {
        blob_name(&self.document, &self.descriptor.id)
    }

    /// Renders the ink of the page to a one-page PDF, and returns it with the
    /// coordinate window it covers. The intermediate SVG is written to
    /// `svg_dir` when given.
    pub fn export<S: DataStore>(
        &self,
        store: &S,
        toolchain: &Toolchain,
        templates_dir: Option<&Path>,
        svg_dir: Option<&Path>,
    ) -> Result<(RenderedPage, Frame)> {
        if self.version != PageVersion::SUPPORTED {
            return Err(RmTreeError::UnsupportedPageVersion {
                page: self.descriptor.id,
                version: self.version.to_string(),
            });
        }

        let blob = store.read(&self.blob_name())?;
        let template = self.template_path(templates_dir);

        let tree = toolchain.decoder.decode(&blob)?;
        let svg = toolchain.renderer.render(&tree, template.as_deref())?;

        if let Some(dir) = svg_dir {
            let path = dir.join(format!("{}.svg", self.descriptor.id));
            fs::write(&path, &svg)?;
            debug!("kept {}", path.display());
        }

        let frame = Frame::from_svg(&svg).unwrap_or_else(|| {
            warn!(
                "Can't find the view box of page {} of {}, assuming a full screen page",
                self.descriptor.id, self.document
            );
            Frame::standard()
        });

        let rendered = toolchain.rasterizer.rasterize(&svg)?;
        Ok((rendered, frame))
    }

    fn template_path(&self, templates_dir: Option<&Path>) -> Option<PathBuf> {
        let name = self.descriptor.template.as_deref()?;
        let Some(dir) = templates_dir else {
            debug!("no templates directory, page {} renders without {}", self.descriptor.id, name);
            return None;
        };

        let path = dir.join(format!("{}.svg", name));
        if path.is_file() {
            Some(path)
        } else {
            warn!("Can't find the template file {}", path.display());
            None
        }
    }
}
