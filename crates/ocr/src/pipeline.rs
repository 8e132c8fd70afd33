use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use voterform_core::{DraftRecord, FieldName, ValidatedRecord};

use crate::combine::combine_reports;
use crate::config::PipelineConfig;
use crate::dispatch::{DispatchEvent, Dispatcher, RecognitionPass};
use crate::extract::{Extractor, FieldHit};
use crate::preprocess::{self, PreprocessError};
use crate::recognizer::OcrBackend;
use crate::types::{OutcomeKind, PassReport};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image preprocessing failed: {0}")]
    Preprocess(#[from] PreprocessError),
    #[error("Preprocessing task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Per-pass summary for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct PassSummary {
    pub index: usize,
    pub variant: &'static str,
    pub recognition: &'static str,
    pub outcome: OutcomeKind,
    pub elapsed_ms: u128,
    pub chars: usize,
}

impl From<&PassReport> for PassSummary {
    fn from(r: &PassReport) -> Self {
        Self {
            index: r.index,
            variant: r.variant,
            recognition: r.preset.name(),
            outcome: r.outcome.kind(),
            elapsed_ms: r.elapsed.as_millis(),
            chars: r.outcome.text().map_or(0, str::len),
        }
    }
}

/// Everything one extraction request produced.
#[derive(Debug, Clone)]
pub struct FormExtraction {
    /// The record to hand to review.
    pub record: ValidatedRecord,
    /// What the extractor found before validation.
    pub draft: DraftRecord,
    pub corpus: String,
    pub passes: Vec<PassReport>,
    pub hits: Vec<FieldHit>,
    /// Fields that were extracted but failed their format rule.
    pub rejected: Vec<FieldName>,
}

impl FormExtraction {
    /// No pass produced any text.
    pub fn is_empty_corpus(&self) -> bool {
        self.corpus.trim().is_empty()
    }

    pub fn summaries(&self) -> Vec<PassSummary> {
        self.passes.iter().map(PassSummary::from).collect()
    }
}

/// Preprocess -> recognize (all passes) -> combine -> extract -> validate.
///
/// Stateless between requests; one pipeline may serve concurrent calls.
pub struct FormPipeline<R: OcrBackend + 'static> {
    dispatcher: Dispatcher<R>,
    extractor: Extractor,
    config: PipelineConfig,
}

impl<R: OcrBackend + 'static> FormPipeline<R> {
    pub fn new(recognizer: R, config: PipelineConfig) -> Self {
        let dispatcher = Dispatcher::new(recognizer, config.pass_timeout());
        let extractor = Extractor::new().context_window(config.context_window);
        Self { dispatcher, extractor, config }
    }

    pub fn with_recognizer(recognizer: Arc<R>, config: PipelineConfig) -> Self {
        let dispatcher = Dispatcher::from_arc(recognizer, config.pass_timeout());
        let extractor = Extractor::new().context_window(config.context_window);
        Self { dispatcher, extractor, config }
    }

    pub fn with_progress(mut self, tx: mpsc::UnboundedSender<DispatchEvent>) -> Self {
        self.dispatcher = self.dispatcher.with_progress(tx);
        self
    }

    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process an image file on disk.
    pub async fn process_file(&self, path: &Path) -> Result<FormExtraction, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        self.process_bytes(bytes).await
    }

    /// Process raw image bytes (camera capture or upload).
    pub async fn process_bytes(&self, data: Vec<u8>) -> Result<FormExtraction, PipelineError> {
        self.process_bytes_with_cancel(data, &CancellationToken::new()).await
    }

    /// As [`process_bytes`](Self::process_bytes); cancelling `cancel` abandons
    /// outstanding passes and reconciles whatever already settled.
    pub async fn process_bytes_with_cancel(
        &self,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> Result<FormExtraction, PipelineError> {
        let started = Instant::now();
        let techniques = self.config.techniques();
        let settings = self.config.preprocess.clone();

        // Pixel work is CPU-bound; keep it off the async workers.
        let variants = tokio::task::spawn_blocking(move || {
            preprocess::preprocess_all(&data, &techniques, &settings)
        })
        .await??;
        let variants: Vec<_> = variants.into_iter().map(Arc::new).collect();

        let passes = self
            .config
            .passes
            .iter()
            .enumerate()
            .filter_map(|(index, pass)| {
                let variant = variants.iter().find(|v| v.technique == pass.technique)?;
                Some(RecognitionPass {
                    index,
                    variant: Arc::clone(variant),
                    config: pass.recognition.config(),
                })
            })
            .collect();

        let reports = self.dispatcher.recognize_all(passes, cancel).await;
        let extraction = self.reconcile_reports(reports);
        info!(
            elapsed_ms = started.elapsed().as_millis(),
            filled = FieldName::ALL.len() - extraction.record.missing().len(),
            rejected = extraction.rejected.len(),
            "form extraction finished"
        );
        Ok(extraction)
    }

    /// Run combine -> extract -> validate over already-settled passes.
    pub fn reconcile_reports(&self, passes: Vec<PassReport>) -> FormExtraction {
        let corpus = combine_reports(&passes);
        let recognized = passes
            .iter()
            .filter(|p| p.outcome.kind() == OutcomeKind::Recognized)
            .count();
        if corpus.trim().is_empty() {
            warn!(passes = passes.len(), recognized, "no text recognized in any pass");
        }
        let mut extraction = self.reconcile(&corpus);
        extraction.passes = passes;
        extraction
    }

    /// Extract and validate a corpus that was recognized elsewhere.
    pub fn reconcile(&self, corpus: &str) -> FormExtraction {
        let (draft, hits) = self.extractor.extract_with_trace(corpus);
        let (record, rejected) = ValidatedRecord::validate_with_rejections(&draft);
        FormExtraction {
            record,
            draft,
            corpus: corpus.to_string(),
            passes: Vec::new(),
            hits,
            rejected,
        }
    }
}
