//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod process;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use recibo_core::models::ReciboConfig;
use recibo_core::Pipeline;

/// `config.json` under the user's configuration directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("recibo")
        .join("config.json")
}

/// Explicit config file, else the default one when present, else defaults.
/// Environment variables are applied on top.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<ReciboConfig> {
    let config = match config_path {
        Some(path) => ReciboConfig::from_file(Path::new(path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                debug!("Loading config from {}", path.display());
                ReciboConfig::from_file(&path)?
            } else {
                ReciboConfig::default()
            }
        }
    };
    Ok(config.with_env())
}

pub fn build_pipeline(config: &ReciboConfig, offline: bool) -> anyhow::Result<Pipeline> {
    if offline {
        return Ok(Pipeline::new(config));
    }
    Ok(Pipeline::from_config(config)?)
}

/// Supported inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    /// Already extracted text, interpreted as is.
    Text,
}

impl InputKind {
    pub fn of(path: &Path) -> Option<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "pdf" => Some(InputKind::Pdf),
            "txt" => Some(InputKind::Text),
            _ => None,
        }
    }
}

/// Read a document, failing on unsupported extensions.
pub fn read_input(path: &Path) -> anyhow::Result<(InputKind, Vec<u8>)> {
    let Some(kind) = InputKind::of(path) else {
        anyhow::bail!("Unsupported file format: {}", path.display());
    };
    Ok((kind, fs::read(path)?))
}
