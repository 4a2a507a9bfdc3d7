//! # Converter Seams
//!
//! Turning an ink blob into a PDF page takes three external steps, each behind
//! its own trait so the pipeline can be driven by fakes in tests:
//!
//! ```text
//! {page}.rm ──InkDecoder──▶ DrawingTree ──InkRenderer──▶ SVG ──Rasterizer──▶ one-page PDF
//! ```
//!
//! The SVG carries a `viewBox` that tells where the ink sits in the page
//! coordinate system; [`Frame::from_svg`] extracts it so the compositor can
//! align the rendered page against its background.
//!
//! [`external`] provides the production implementations, which shell out to
//! `rmc` and `rsvg-convert`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use thiserror::Error;

pub mod external;
#[cfg(any(test, feature = "test_utils"))]
pub mod testing;

/// Width of the tablet screen in points (1404 px at 226 dpi).
pub const PAGE_WIDTH_PT: f64 = 1404.0 * 72.0 / 226.0;
/// Height of the tablet screen in points (1872 px at 226 dpi).
pub const PAGE_HEIGHT_PT: f64 = 1872.0 * 72.0 / 226.0;

static VIEW_BOX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"<svg\b[^>]*?\bviewBox\s*=\s*["']\s*([-+\d.eE]+)[\s,]+([-+\d.eE]+)[\s,]+([-+\d.eE]+)[\s,]+([-+\d.eE]+)\s*["']"#,
    )
    .expect("valid viewBox regex")
});

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Converter command not found: {0}")]
    CommandNotFound(String),

    #[error("{command} failed with exit code {code}: {stderr}")]
    ProcessFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Not a supported ink file (header {0:?})")]
    InvalidHeader(String),

    #[error("Converter produced invalid output: {0}")]
    InvalidOutput(String),

    #[error("IO error during conversion: {0}")]
    Io(#[from] std::io::Error),
}

/// A decoded page, opaque to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawingTree {
    blob: Vec<u8>,
}

impl DrawingTree {
    pub fn new(blob: Vec<u8>) -> Self {
        Self { blob }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

/// A single-page PDF holding the rendered ink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPage {
    pub pdf: Vec<u8>,
}

impl RenderedPage {
    pub fn new(pdf: Vec<u8>) -> Self {
        Self { pdf }
    }
}

/// The coordinate window of a rendered page: where its origin sits in the
/// tablet coordinate system and how large it is, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x_shift: f64,
    pub y_shift: f64,
    pub width: f64,
    pub height: f64,
}

impl Frame {
    pub fn new(x_shift: f64, y_shift: f64, width: f64, height: f64) -> Self {
        Self {
            x_shift,
            y_shift,
            width,
            height,
        }
    }

    /// The full tablet screen.
    pub fn standard() -> Self {
        Self::new(0.0, 0.0, PAGE_WIDTH_PT, PAGE_HEIGHT_PT)
    }

    /// Reads the `viewBox` of the root `<svg>` element.
    pub fn from_svg(svg: &str) -> Option<Self> {
        let caps = VIEW_BOX_RE.captures(svg)?;
        let value = |i: usize| caps.get(i).and_then(|m| m.as_str().parse::<f64>().ok());
        let frame = Self::new(value(1)?, value(2)?, value(3)?, value(4)?);
        if frame.width > 0.0 && frame.height > 0.0 {
            Some(frame)
        } else {
            None
        }
    }
}

pub trait InkDecoder {
    fn decode(&self, blob: &[u8]) -> Result<DrawingTree, ConvertError>;
}

pub trait InkRenderer {
    /// Renders to SVG, drawing `template` (an SVG file) under the ink if given.
    fn render(&self, tree: &DrawingTree, template: Option<&Path>) -> Result<String, ConvertError>;
}

pub trait Rasterizer {
    fn rasterize(&self, svg: &str) -> Result<RenderedPage, ConvertError>;
}

/// The three converters a page export goes through.
pub struct Toolchain {
    pub decoder: Box<dyn InkDecoder>,
    pub renderer: Box<dyn InkRenderer>,
    pub rasterizer: Box<dyn Rasterizer>,
}

impl Toolchain {
    pub fn new(
        decoder: Box<dyn InkDecoder>,
        renderer: Box<dyn InkRenderer>,
        rasterizer: Box<dyn Rasterizer>,
    ) -> Self {
        Self {
            decoder,
            renderer,
            rasterizer,
        }
    }
}
