//! PDF rasterization shared by both engines.
//!
//! Neither engine consumes PDFs directly; pages are converted to PNG
//! images with pdftoppm (poppler-utils) first.

use std::path::{Path, PathBuf};
use std::process::Command;

use super::engine::EngineError;

/// Check if a file looks like a PDF by extension.
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Convert every page of a PDF to PNG images in `output_dir`, returning
/// the image paths in page order.
pub fn pdf_to_images(pdf_path: &Path, output_dir: &Path) -> Result<Vec<PathBuf>, EngineError> {
    let status = Command::new("pdftoppm")
        .args(["-png", "-r", "300"])
        .arg(pdf_path)
        .arg(output_dir.join("page"))
        .status();

    match status {
        Ok(s) if s.success() => {}
        Ok(_) => {
            return Err(EngineError::Failed(
                "pdftoppm failed to convert PDF".to_string(),
            ))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EngineError::NotAvailable(
                "pdftoppm not found (install poppler-utils)".to_string(),
            ))
        }
        Err(e) => return Err(EngineError::Io(e)),
    }

    let mut images: Vec<PathBuf> = std::fs::read_dir(output_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext == "png")
                .unwrap_or(false)
        })
        .collect();

    // pdftoppm zero-pads page numbers, so lexical order is page order
    images.sort();

    if images.is_empty() {
        return Err(EngineError::Failed(
            "No images generated from PDF".to_string(),
        ));
    }

    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_pdf() {
        assert!(is_pdf(Path::new("scan.pdf")));
        assert!(is_pdf(Path::new("SCAN.PDF")));
        assert!(!is_pdf(Path::new("scan.png")));
        assert!(!is_pdf(Path::new("scan")));
    }
}
