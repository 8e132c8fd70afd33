use thiserror::Error;

use crate::types::RecognitionConfig;

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Image decode error: {0}")]
    ImageDecode(String),
    #[error("OCR engine error: {0}")]
    Engine(String),
    #[error("Tesseract not available: build with the `tesseract` feature")]
    NotAvailable,
}

/// Abstraction over an OCR engine.
///
/// Implementations accept encoded image bytes plus the page-segmentation /
/// whitelist / engine settings for one pass and return the recognized text.
/// Calls are blocking; the dispatcher runs them on tokio's blocking pool.
pub trait OcrBackend: Send + Sync {
    fn recognize(&self, image_bytes: &[u8], config: &RecognitionConfig) -> Result<String, OcrError>;
}

// ── Mock backend (always available, used for tests) ───────────────────────────

/// Returns a pre-set string regardless of image or configuration. Lets the
/// pipeline run without Tesseract installed.
pub struct MockRecognizer {
    pub text: String,
}

impl MockRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl OcrBackend for MockRecognizer {
    fn recognize(&self, _image_bytes: &[u8], _config: &RecognitionConfig) -> Result<String, OcrError> {
        Ok(self.text.clone())
    }
}

// ── Tesseract backend (optional, gated behind `tesseract` feature) ─────────────

#[cfg(feature = "tesseract")]
pub mod tesseract_backend {
    use super::{OcrBackend, OcrError};
    use crate::types::RecognitionConfig;
    use leptess::{LepTess, Variable};

    pub struct TesseractRecognizer {
        data_path: Option<String>,
        lang: String,
    }

    impl TesseractRecognizer {
        pub fn new(data_path: Option<String>) -> Self {
            Self { data_path, lang: "eng".to_string() }
        }
    }

    fn set_var(lt: &mut LepTess, var: Variable, value: &str) -> Result<(), OcrError> {
        lt.set_variable(var, value)
            .map_err(|e| OcrError::Engine(e.to_string()))
    }

    impl OcrBackend for TesseractRecognizer {
        fn recognize(&self, image_bytes: &[u8], config: &RecognitionConfig) -> Result<String, OcrError> {
            // A fresh handle per call: passes run on separate threads.
            let mut lt = LepTess::new(self.data_path.as_deref(), &self.lang)
                .map_err(|e| OcrError::Engine(e.to_string()))?;
            set_var(&mut lt, Variable::TesseditPagesegMode, &config.psm.as_u8().to_string())?;
            set_var(&mut lt, Variable::TesseditOcrEngineMode, &config.engine.as_u8().to_string())?;
            if !config.whitelist.is_empty() {
                set_var(&mut lt, Variable::TesseditCharWhitelist, &config.whitelist)?;
            }
            lt.set_image_from_mem(image_bytes)
                .map_err(|e| OcrError::ImageDecode(e.to_string()))?;
            lt.get_utf8_text().map_err(|e| OcrError::Engine(e.to_string()))
        }
    }
}
