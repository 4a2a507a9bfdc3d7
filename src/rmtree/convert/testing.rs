//! In-process converters for tests.

use super::{ConvertError, DrawingTree, Frame, InkDecoder, InkRenderer, Rasterizer, RenderedPage, Toolchain};
use crate::pdf::sample_pdf;
use std::path::Path;

/// Blobs containing this marker fail to decode.
pub const CORRUPT_MARKER: &[u8] = b"corrupt";

/// Decodes any blob without the corruption marker and renders it to a fixed SVG.
pub struct StaticInk {
    svg: String,
}

impl StaticInk {
    pub fn new(svg: impl Into<String>) -> Self {
        Self { svg: svg.into() }
    }
}

impl InkDecoder for StaticInk {
    fn decode(&self, blob: &[u8]) -> Result<DrawingTree, ConvertError> {
        if blob
            .windows(CORRUPT_MARKER.len())
            .any(|window| window == CORRUPT_MARKER)
        {
            return Err(ConvertError::InvalidOutput("corrupt blob".into()));
        }
        Ok(DrawingTree::new(blob.to_vec()))
    }
}

impl InkRenderer for StaticInk {
    fn render(&self, _tree: &DrawingTree, _template: Option<&Path>) -> Result<String, ConvertError> {
        Ok(self.svg.clone())
    }
}

/// Produces a one-page PDF the size of the SVG view box.
pub struct SampleRasterizer;

impl Rasterizer for SampleRasterizer {
    fn rasterize(&self, svg: &str) -> Result<RenderedPage, ConvertError> {
        let frame = Frame::from_svg(svg).unwrap_or_else(Frame::standard);
        Ok(RenderedPage::new(sample_pdf(&[(frame.width, frame.height)])))
    }
}

/// An svg document with the given view box.
pub fn svg_with_view_box(frame: Frame) -> String {
    format!(
        "<?xml version=\"1.0\"?>\n<svg xmlns=\"http://www.w3.org/2000/svg\" viewBox=\"{} {} {} {}\">\n</svg>\n",
        frame.x_shift, frame.y_shift, frame.width, frame.height
    )
}

pub fn toolchain(frame: Frame) -> Toolchain {
    let svg = svg_with_view_box(frame);
    Toolchain::new(
        Box::new(StaticInk::new(svg.clone())),
        Box::new(StaticInk::new(svg)),
        Box::new(SampleRasterizer),
    )
}
