//! Shared utilities for OCR engines.
//!
//! Provides common functionality for:
//! - Checking for CLI tool availability
//! - Downloading and locating OCR models (optional backends)

use std::process::Command;

#[cfg(feature = "ocr-paddle")]
use std::path::{Path, PathBuf};

#[cfg(feature = "ocr-paddle")]
use super::engine::EngineError;

/// Check if a binary is available in PATH.
pub fn check_binary(name: &str) -> bool {
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Model file specification for downloading.
#[cfg(feature = "ocr-paddle")]
pub struct ModelSpec {
    /// URL to download from.
    pub url: &'static str,
    /// Filename to save as.
    pub filename: &'static str,
    /// Human-readable size for progress messages.
    pub size_hint: &'static str,
}

/// Configuration for model directory management.
#[cfg(feature = "ocr-paddle")]
pub struct ModelDirConfig {
    /// Subdirectory name under the data dir (e.g. "paddle-ocr").
    pub subdir: &'static str,
    /// Required model files to check for presence.
    pub required_files: &'static [&'static str],
}

#[cfg(feature = "ocr-paddle")]
impl ModelDirConfig {
    /// Get the default model directory for this engine.
    pub fn default_dir(&self) -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
            .join(self.subdir)
            .join("models")
    }

    /// Check if a directory contains all required model files.
    pub fn has_required_files(&self, dir: &Path) -> bool {
        self.required_files
            .iter()
            .all(|file| dir.join(file).exists())
    }
}

/// Download a file from a URL to a local path using curl or wget.
#[cfg(feature = "ocr-paddle")]
pub fn download_file(url: &str, dest: &Path) -> Result<(), EngineError> {
    let output = Command::new("curl")
        .args(["-fSL", "--progress-bar", "-o"])
        .arg(dest)
        .arg(url)
        .status();

    match output {
        Ok(status) if status.success() => Ok(()),
        Ok(_) => {
            let _ = std::fs::remove_file(dest);
            Err(EngineError::Failed(format!("Failed to download {}", url)))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            // Try wget as fallback
            let output = Command::new("wget")
                .args(["-q", "--show-progress", "-O"])
                .arg(dest)
                .arg(url)
                .status();

            match output {
                Ok(status) if status.success() => Ok(()),
                Ok(_) => {
                    let _ = std::fs::remove_file(dest);
                    Err(EngineError::Failed(format!("Failed to download {}", url)))
                }
                Err(_) => Err(EngineError::NotAvailable(
                    "Neither curl nor wget found. Install one to download models.".to_string(),
                )),
            }
        }
        Err(e) => Err(EngineError::Io(e)),
    }
}

/// Download a model file if it doesn't exist, with progress message.
#[cfg(feature = "ocr-paddle")]
pub fn ensure_model_file(spec: &ModelSpec, model_dir: &Path) -> Result<(), EngineError> {
    let dest = model_dir.join(spec.filename);
    if !dest.exists() {
        eprintln!("Downloading {} (~{})...", spec.filename, spec.size_hint);
        download_file(spec.url, &dest)?;
        eprintln!("  done: {}", spec.filename);
    }
    Ok(())
}
