//! Converters backed by external command line tools.
//!
//! - `rmc` decodes v6 ink files and renders them to SVG.
//! - `rsvg-convert` turns the SVG into a one-page PDF. It runs at 72 dpi so one
//!   SVG user unit maps to one PDF point.

use super::{ConvertError, DrawingTree, InkDecoder, InkRenderer, RenderedPage, Rasterizer};
use crate::page::PageVersion;
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use tracing::debug;

pub const DEFAULT_RMC: &str = "rmc";
pub const DEFAULT_RSVG: &str = "rsvg-convert";

/// `rmc` as decoder and renderer.
#[derive(Debug, Clone)]
pub struct RmcTool {
    command: String,
}

impl RmcTool {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for RmcTool {
    fn default() -> Self {
        Self::new(DEFAULT_RMC)
    }
}

impl InkDecoder for RmcTool {
    fn decode(&self, blob: &[u8]) -> Result<DrawingTree, ConvertError> {
        let version = PageVersion::detect(blob);
        if version != PageVersion::SUPPORTED {
            let shown = blob.len().min(PageVersion::header_len());
            return Err(ConvertError::InvalidHeader(
                String::from_utf8_lossy(&blob[..shown]).into_owned(),
            ));
        }
        Ok(DrawingTree::new(blob.to_vec()))
    }
}

impl InkRenderer for RmcTool {
    fn render(&self, tree: &DrawingTree, template: Option<&Path>) -> Result<String, ConvertError> {
        if let Some(template) = template {
            debug!(
                "{} does not draw templates, ignoring {}",
                self.command,
                template.display()
            );
        }

        let mut input = tempfile::Builder::new().suffix(".rm").tempfile()?;
        input.write_all(tree.as_bytes())?;
        input.flush()?;
        let output = tempfile::Builder::new().suffix(".svg").tempfile()?;

        let input_path = input.path().to_string_lossy().into_owned();
        let output_path = output.path().to_string_lossy().into_owned();
        run_tool(
            &self.command,
            &["-t", "svg", "-o", &output_path, &input_path],
            None,
        )?;

        let svg = std::fs::read_to_string(output.path())?;
        if svg.trim().is_empty() {
            return Err(ConvertError::InvalidOutput(format!(
                "{} wrote an empty SVG",
                self.command
            )));
        }
        Ok(svg)
    }
}

/// `rsvg-convert` as rasterizer.
#[derive(Debug, Clone)]
pub struct RsvgRasterizer {
    command: String,
}

impl RsvgRasterizer {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Default for RsvgRasterizer {
    fn default() -> Self {
        Self::new(DEFAULT_RSVG)
    }
}

impl Rasterizer for RsvgRasterizer {
    fn rasterize(&self, svg: &str) -> Result<RenderedPage, ConvertError> {
        let pdf = run_tool(
            &self.command,
            &["--format=pdf", "--dpi-x=72", "--dpi-y=72"],
            Some(svg.as_bytes().to_vec()),
        )?;
        if !pdf.starts_with(b"%PDF") {
            return Err(ConvertError::InvalidOutput(format!(
                "{} did not produce a PDF",
                self.command
            )));
        }
        Ok(RenderedPage::new(pdf))
    }
}

/// Runs `command`, feeding `stdin` if given, and returns its stdout.
fn run_tool(command: &str, args: &[&str], stdin: Option<Vec<u8>>) -> Result<Vec<u8>, ConvertError> {
    debug!("running {} {}", command, args.join(" "));

    let mut child = Command::new(command)
        .args(args)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConvertError::CommandNotFound(command.to_string()),
            _ => ConvertError::Io(e),
        })?;

    // stdin is fed from its own thread while stdout drains.
    let writer = match (stdin, child.stdin.take()) {
        (Some(bytes), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&bytes))),
        _ => None,
    };

    let output = child.wait_with_output()?;
    let fed = match writer {
        Some(writer) => writer
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("stdin writer panicked"))),
        None => Ok(()),
    };

    // Exit status takes precedence over a broken stdin pipe.
    if !output.status.success() {
        return Err(ConvertError::ProcessFailed {
            command: command.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    fed?;
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::fixtures::page_blob;

    #[test]
    fn decoder_accepts_v6_blobs() {
        let blob = page_blob(PageVersion::V6);
        let tree = RmcTool::default().decode(&blob).unwrap();
        assert_eq!(tree.as_bytes(), blob.as_slice());
    }

    #[test]
    fn decoder_rejects_older_blobs() {
        let blob = page_blob(PageVersion::V5);
        assert!(matches!(
            RmcTool::default().decode(&blob),
            Err(ConvertError::InvalidHeader(_))
        ));
        assert!(RmcTool::default().decode(b"").is_err());
    }

    #[test]
    fn missing_command_is_reported() {
        let rasterizer = RsvgRasterizer::new("rmtree-no-such-rasterizer");
        assert!(matches!(
            rasterizer.rasterize("<svg/>"),
            Err(ConvertError::CommandNotFound(_))
        ));
    }
}
