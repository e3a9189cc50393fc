//! PaddleOCR local engine (feature: ocr-paddle).
//!
//! Uses paddle-ocr-rs for OCR via ONNX Runtime. Models are automatically
//! downloaded on first use from the RapidOCR releases. The engine instance
//! is initialized once per process and reused across requests.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use tempfile::TempDir;

use paddle_ocr_rs::ocr_lite::OcrLite;

use super::engine::{Detection, EngineError, LocalEngine, OcrFlags};
use super::model_utils::{ensure_model_file, ModelDirConfig, ModelSpec};
use super::pdf;

/// Global cached OcrLite instance (initialized once, reused for all OCR
/// calls). OcrLite is Send+Sync, wrapped in Mutex since detection needs
/// &mut self. The OnceLock guards against duplicate concurrent
/// initialization under racing first requests.
static OCR_ENGINE: OnceLock<Mutex<OcrLite>> = OnceLock::new();

const DET_MODEL_NAME: &str = "ch_PP-OCRv4_det_infer.onnx";
const REC_MODEL_NAME: &str = "ch_PP-OCRv4_rec_infer.onnx";
const CLS_MODEL_NAME: &str = "ch_ppocr_mobile_v2.0_cls_infer.onnx";

/// Model directory configuration for PaddleOCR.
const MODEL_CONFIG: ModelDirConfig = ModelDirConfig {
    subdir: "ocrelay-paddle",
    required_files: &[DET_MODEL_NAME, REC_MODEL_NAME],
};

const DET_MODEL: ModelSpec = ModelSpec {
    url: "https://huggingface.co/SWHL/RapidOCR/resolve/main/PP-OCRv4/ch_PP-OCRv4_det_infer.onnx",
    filename: DET_MODEL_NAME,
    size_hint: "4 MB",
};

const REC_MODEL: ModelSpec = ModelSpec {
    url: "https://huggingface.co/SWHL/RapidOCR/resolve/main/PP-OCRv4/ch_PP-OCRv4_rec_infer.onnx",
    filename: REC_MODEL_NAME,
    size_hint: "10 MB",
};

const CLS_MODEL: ModelSpec = ModelSpec {
    url: "https://www.modelscope.cn/models/RapidAI/RapidOCR/resolve/v3.4.0/onnx/PP-OCRv4/cls/ch_ppocr_mobile_v2.0_cls_infer.onnx",
    filename: CLS_MODEL_NAME,
    size_hint: "1 MB",
};

/// PaddleOCR engine via ONNX Runtime.
pub struct PaddleEngine;

impl PaddleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Ensure models are present, downloading them if necessary.
    fn ensure_models(&self) -> Result<PathBuf, EngineError> {
        let model_dir = MODEL_CONFIG.default_dir();
        if MODEL_CONFIG.has_required_files(&model_dir) {
            return Ok(model_dir);
        }

        std::fs::create_dir_all(&model_dir).map_err(EngineError::Io)?;
        ensure_model_file(&DET_MODEL, &model_dir)?;
        ensure_model_file(&REC_MODEL, &model_dir)?;
        ensure_model_file(&CLS_MODEL, &model_dir)?;
        Ok(model_dir)
    }

    /// Get or initialize the cached OCR engine.
    fn get_or_init_engine(&self) -> Result<&'static Mutex<OcrLite>, EngineError> {
        if let Some(engine) = OCR_ENGINE.get() {
            return Ok(engine);
        }

        let model_dir = self.ensure_models()?;
        let det_model = model_dir.join(DET_MODEL_NAME);
        let cls_model = model_dir.join(CLS_MODEL_NAME);
        let rec_model = model_dir.join(REC_MODEL_NAME);

        let mut ocr = OcrLite::new();
        let num_threads = 4;
        ocr.init_models(
            &det_model.to_string_lossy(),
            &cls_model.to_string_lossy(),
            &rec_model.to_string_lossy(),
            num_threads,
        )
        .map_err(|e| EngineError::Failed(format!("Failed to init PaddleOCR: {}", e)))?;

        // Store in global cache - if another thread beat us, that's fine
        let _ = OCR_ENGINE.set(Mutex::new(ocr));

        OCR_ENGINE
            .get()
            .ok_or_else(|| EngineError::Failed("Failed to cache OCR engine".to_string()))
    }

    /// Run detection on a single image.
    fn run_paddle(&self, image_path: &Path, flags: OcrFlags) -> Result<Vec<Detection>, EngineError> {
        let engine_mutex = self.get_or_init_engine()?;
        let mut ocr = engine_mutex
            .lock()
            .map_err(|e| EngineError::Failed(format!("Failed to lock OCR engine: {}", e)))?;

        let result = ocr
            .detect_from_path(
                image_path.to_str().unwrap_or(""),
                50,    // padding
                1024,  // max side length
                0.5,   // box score threshold
                0.3,   // unclip ratio
                1.6,   // box threshold
                flags.use_textline_orientation, // do angle
                flags.use_doc_orientation_classify, // most angle
            )
            .map_err(|e| EngineError::Failed(format!("PaddleOCR detection failed: {}", e)))?;

        // The crate surfaces recognized text per block; scores and box
        // geometry stay internal to it.
        Ok(result
            .text_blocks
            .iter()
            .map(|block| Detection {
                text: block.text.clone(),
                confidence: None,
                polygon: None,
            })
            .collect())
    }

    fn detect_blocking(&self, path: &Path, flags: OcrFlags) -> Result<Vec<Detection>, EngineError> {
        if !pdf::is_pdf(path) {
            return self.run_paddle(path, flags);
        }

        let temp_dir = TempDir::new()?;
        let images = pdf::pdf_to_images(path, temp_dir.path())?;
        let mut detections = Vec::new();
        for image in &images {
            detections.extend(self.run_paddle(image, flags)?);
        }
        Ok(detections)
    }
}

impl Default for PaddleEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalEngine for PaddleEngine {
    fn is_available(&self) -> bool {
        // Models are auto-downloaded on first use
        true
    }

    fn availability_hint(&self) -> String {
        let model_dir = MODEL_CONFIG.default_dir();
        if MODEL_CONFIG.has_required_files(&model_dir) {
            format!("PaddleOCR models found at {:?}", model_dir)
        } else {
            format!(
                "PaddleOCR models will be auto-downloaded on first use (~15 MB total) to {:?}",
                model_dir
            )
        }
    }

    async fn detect(
        &self,
        path: &Path,
        flags: OcrFlags,
    ) -> Result<Vec<Detection>, EngineError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || PaddleEngine.detect_blocking(&path, flags))
            .await
            .map_err(|e| EngineError::Failed(format!("OCR task failed: {}", e)))?
    }
}
