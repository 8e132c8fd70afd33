pub mod combine;
pub mod config;
pub mod dispatch;
pub mod extract;
pub mod pipeline;
pub mod preprocess;
pub mod recognizer;
pub mod rules;
pub mod types;

pub use combine::{combine, combine_reports};
pub use config::{ConfigError, PassSpec, PipelineConfig};
pub use dispatch::{recognize, DispatchEvent, Dispatcher, RecognitionPass};
pub use extract::{Extractor, FieldHit};
pub use pipeline::{FormExtraction, FormPipeline, PassSummary, PipelineError};
pub use preprocess::{preprocess, preprocess_all, PreprocessError, PreprocessSettings};
pub use recognizer::{MockRecognizer, OcrBackend, OcrError};
pub use rules::{form_rules, Cleanup, FieldRule, PatternRule, Scope, Tier};
pub use types::{
    ImageVariant, OutcomeKind, PassOutcome, PassReport, RecognitionConfig, RecognitionPreset, Technique,
};
