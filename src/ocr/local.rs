//! Tesseract-backed local OCR engine - the fallback stage.
//!
//! Uses Tesseract via command-line in TSV mode, which reports per-word
//! confidence and bounding boxes. Words are regrouped into lines, each
//! line carrying its mean confidence and a four-point bounding polygon.
//! This is the traditional, widely-available OCR option and the default
//! local engine.

use std::path::{Path, PathBuf};
use std::process::Command;

use async_trait::async_trait;
use serde_json::json;
use tempfile::TempDir;
use tracing::debug;

use super::engine::{Detection, EngineError, LocalEngine, OcrFlags};
use super::model_utils::check_binary;
use super::pdf;

/// Tesseract OCR engine.
pub struct TesseractEngine {
    /// Tesseract language setting (e.g. "eng", "fra", "chi_sim").
    lang: String,
}

impl TesseractEngine {
    pub fn new(lang: impl Into<String>) -> Self {
        Self { lang: lang.into() }
    }

    /// Run Tesseract in TSV mode on a single image.
    fn run_tesseract_tsv(&self, image_path: &Path, flags: OcrFlags) -> Result<String, EngineError> {
        let mut cmd = Command::new("tesseract");
        cmd.arg(image_path)
            .arg("stdout")
            .args(["-l", &self.lang]);

        // Orientation handling maps to automatic page segmentation with
        // orientation and script detection. Unwarping has no Tesseract
        // equivalent and is accepted but inert.
        if flags.use_doc_orientation_classify || flags.use_textline_orientation {
            cmd.args(["--psm", "1"]);
        }
        cmd.arg("tsv");

        let output = cmd.output();
        match output {
            Ok(output) => {
                if output.status.success() {
                    Ok(String::from_utf8_lossy(&output.stdout).to_string())
                } else {
                    let stderr = String::from_utf8_lossy(&output.stderr);
                    Err(EngineError::Failed(format!("tesseract failed: {}", stderr)))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EngineError::NotAvailable(
                "tesseract not found (install tesseract-ocr)".to_string(),
            )),
            Err(e) => Err(EngineError::Io(e)),
        }
    }

    /// OCR a single image into line detections.
    fn detect_image(&self, image_path: &Path, flags: OcrFlags) -> Result<Vec<Detection>, EngineError> {
        let tsv = self.run_tesseract_tsv(image_path, flags)?;
        Ok(parse_tsv(&tsv))
    }

    /// OCR every page of a PDF in order.
    fn detect_pdf(&self, pdf_path: &Path, flags: OcrFlags) -> Result<Vec<Detection>, EngineError> {
        let temp_dir = TempDir::new()?;
        let images = pdf::pdf_to_images(pdf_path, temp_dir.path())?;

        let mut detections = Vec::new();
        for (page, image) in images.iter().enumerate() {
            debug!(page = page + 1, "running tesseract on PDF page");
            detections.extend(self.detect_image(image, flags)?);
        }
        Ok(detections)
    }
}

#[async_trait]
impl LocalEngine for TesseractEngine {
    fn is_available(&self) -> bool {
        check_binary("tesseract")
    }

    fn availability_hint(&self) -> String {
        if !check_binary("tesseract") {
            "tesseract not found (install tesseract-ocr)".to_string()
        } else if !check_binary("pdftoppm") {
            "pdftoppm not found (install poppler-utils for PDF support)".to_string()
        } else {
            format!("Tesseract OCR is available (language: {})", self.lang)
        }
    }

    async fn detect(
        &self,
        path: &Path,
        flags: OcrFlags,
    ) -> Result<Vec<Detection>, EngineError> {
        let engine = Self::new(self.lang.clone());
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || {
            if pdf::is_pdf(&path) {
                engine.detect_pdf(&path, flags)
            } else {
                engine.detect_image(&path, flags)
            }
        })
        .await
        .map_err(|e| EngineError::Failed(format!("OCR task failed: {}", e)))?
    }
}

/// One word row from Tesseract's TSV output.
struct TsvWord {
    block: u32,
    par: u32,
    line: u32,
    left: f64,
    top: f64,
    width: f64,
    height: f64,
    conf: f64,
    text: String,
}

/// Parse Tesseract TSV output into per-line detections.
///
/// TSV columns: level, page_num, block_num, par_num, line_num, word_num,
/// left, top, width, height, conf, text. Word rows have level 5; rows
/// with conf -1 are structural and carry no recognized text.
fn parse_tsv(tsv: &str) -> Vec<Detection> {
    let mut words: Vec<TsvWord> = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 {
            continue;
        }
        let level: u32 = match cols[0].parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        if level != 5 {
            continue;
        }
        let text = cols[11].trim();
        if text.is_empty() {
            continue;
        }
        let parse = |s: &str| s.parse::<f64>().unwrap_or(-1.0);
        words.push(TsvWord {
            block: cols[2].parse().unwrap_or(0),
            par: cols[3].parse().unwrap_or(0),
            line: cols[4].parse().unwrap_or(0),
            left: parse(cols[6]),
            top: parse(cols[7]),
            width: parse(cols[8]),
            height: parse(cols[9]),
            conf: parse(cols[10]),
            text: text.to_string(),
        });
    }

    let mut detections: Vec<Detection> = Vec::new();
    let mut current: Vec<TsvWord> = Vec::new();
    let mut current_key: Option<(u32, u32, u32)> = None;

    for word in words {
        let key = (word.block, word.par, word.line);
        if current_key != Some(key) {
            if let Some(detection) = line_detection(&current) {
                detections.push(detection);
            }
            current.clear();
            current_key = Some(key);
        }
        current.push(word);
    }
    if let Some(detection) = line_detection(&current) {
        detections.push(detection);
    }

    detections
}

/// Collapse one line's words into a single detection.
fn line_detection(words: &[TsvWord]) -> Option<Detection> {
    if words.is_empty() {
        return None;
    }

    let text = words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    // Tesseract reports confidence as 0-100, -1 when unknown
    let confidences: Vec<f64> = words.iter().filter(|w| w.conf >= 0.0).map(|w| w.conf).collect();
    let confidence = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64 / 100.0)
    };

    let left = words.iter().map(|w| w.left).fold(f64::INFINITY, f64::min);
    let top = words.iter().map(|w| w.top).fold(f64::INFINITY, f64::min);
    let right = words
        .iter()
        .map(|w| w.left + w.width)
        .fold(f64::NEG_INFINITY, f64::max);
    let bottom = words
        .iter()
        .map(|w| w.top + w.height)
        .fold(f64::NEG_INFINITY, f64::max);

    let polygon = json!([[left, top], [right, top], [right, bottom], [left, bottom]]);

    Some(Detection {
        text,
        confidence,
        polygon: Some(polygon),
    })
}
