use crate::convert::external::{RmcTool, RsvgRasterizer, DEFAULT_RMC, DEFAULT_RSVG};
use crate::convert::Toolchain;
use crate::error::{RmTreeError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILENAME: &str = "config.json";

/// Configuration for rmtree, stored in `config.json` in the platform config
/// directory unless given explicitly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RmTreeConfig {
    /// Command turning `.rm` files into SVG
    #[serde(default = "default_rmc")]
    pub rmc_command: String,

    /// Command turning SVG into PDF
    #[serde(default = "default_rsvg")]
    pub rsvg_command: String,

    /// Directory holding `<template name>.svg` files
    #[serde(default)]
    pub templates_dir: Option<PathBuf>,

    /// Write the intermediate SVG of every page next to the exported PDF
    #[serde(default)]
    pub keep_svg: bool,

    /// Export even when the store has structural problems
    #[serde(default)]
    pub ignore_assertions: bool,
}

fn default_rmc() -> String {
    DEFAULT_RMC.to_string()
}

fn default_rsvg() -> String {
    DEFAULT_RSVG.to_string()
}

impl Default for RmTreeConfig {
    fn default() -> Self {
        Self {
            rmc_command: default_rmc(),
            rsvg_command: default_rsvg(),
            templates_dir: None,
            keep_svg: false,
            ignore_assertions: false,
        }
    }
}

impl RmTreeConfig {
    /// Load config from the given directory, or return defaults if not found
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join(CONFIG_FILENAME);
        if !config_path.exists() {
            return Ok(Self::default());
        }
        Self::load_file(config_path)
    }

    /// Load config from an explicit file, which must exist
    pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| RmTreeError::Config(format!("{}: {}", path.display(), e)))?;
        let config: RmTreeConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// `--config` if given, else the platform config directory, else defaults
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_file(path),
            None => match default_config_dir() {
                Some(dir) => Self::load(dir),
                None => Ok(Self::default()),
            },
        }
    }

    /// Save config to the given directory
    pub fn save<P: AsRef<Path>>(&self, config_dir: P) -> Result<()> {
        let config_dir = config_dir.as_ref();
        fs::create_dir_all(config_dir)?;

        let content = serde_json::to_string_pretty(self)?;
        fs::write(config_dir.join(CONFIG_FILENAME), content)?;
        Ok(())
    }

    /// The external converters this config points at.
    pub fn toolchain(&self) -> Toolchain {
        Toolchain::new(
            Box::new(RmcTool::new(&self.rmc_command)),
            Box::new(RmcTool::new(&self.rmc_command)),
            Box::new(RsvgRasterizer::new(&self.rsvg_command)),
        )
    }
}

pub fn default_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("com", "rmtree", "rmtree").map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RmTreeConfig::default();
        assert_eq!(config.rmc_command, "rmc");
        assert_eq!(config.rsvg_command, "rsvg-convert");
        assert!(!config.keep_svg);
        assert!(!config.ignore_assertions);
    }

    #[test]
    fn test_load_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = RmTreeConfig::load(dir.path()).unwrap();
        assert_eq!(config, RmTreeConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            r#"{ "rmc_command": "/opt/rmc/bin/rmc", "keep_svg": true }"#,
        )
        .unwrap();

        let config = RmTreeConfig::load(dir.path()).unwrap();
        assert_eq!(config.rmc_command, "/opt/rmc/bin/rmc");
        assert_eq!(config.rsvg_command, "rsvg-convert");
        assert!(config.keep_svg);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let config = RmTreeConfig {
            templates_dir: Some(PathBuf::from("/usr/share/remarkable/templates")),
            ..RmTreeConfig::default()
        };
        config.save(dir.path()).unwrap();

        assert_eq!(RmTreeConfig::load(dir.path()).unwrap(), config);
    }

    #[test]
    fn test_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            RmTreeConfig::resolve(Some(&missing)),
            Err(RmTreeError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            RmTreeConfig::load_file(&path),
            Err(RmTreeError::Serialization(_))
        ));
    }
}
