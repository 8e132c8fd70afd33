use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::preprocess::PreprocessSettings;
use crate::types::{RecognitionPreset, Technique};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid pipeline config: {0}")]
    Invalid(String),
}

/// One (preprocessing technique, recognizer preset) pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSpec {
    pub technique: Technique,
    pub recognition: RecognitionPreset,
}

impl PassSpec {
    pub const fn new(technique: Technique, recognition: RecognitionPreset) -> Self {
        Self { technique, recognition }
    }
}

/// Drives a [`FormPipeline`](crate::pipeline::FormPipeline). Adding a pass is a
/// config change.
///
/// ```toml
/// pass_timeout_ms = 15000
/// context_window = true
///
/// [[passes]]
/// technique = "contrast-threshold"
/// recognition = "single-block"
///
/// [preprocess]
/// max_width = 1500
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub passes: Vec<PassSpec>,
    pub pass_timeout_ms: u64,
    /// Let extraction rules look at neighbouring lines.
    pub context_window: bool,
    pub preprocess: PreprocessSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            passes: vec![
                PassSpec::new(Technique::ContrastThreshold, RecognitionPreset::SingleBlock),
                PassSpec::new(Technique::GammaThreshold, RecognitionPreset::Auto),
                PassSpec::new(Technique::Denoise, RecognitionPreset::AutoOsd),
                PassSpec::new(Technique::Passthrough, RecognitionPreset::SingleColumn),
            ],
            pass_timeout_ms: 15_000,
            context_window: true,
            preprocess: PreprocessSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// One thresholded pass with a longer budget.
    pub fn single_pass() -> Self {
        Self {
            passes: vec![PassSpec::new(Technique::ContrastThreshold, RecognitionPreset::Auto)],
            pass_timeout_ms: 30_000,
            ..Self::default()
        }
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.passes.is_empty() {
            return Err(ConfigError::Invalid("at least one pass is required".into()));
        }
        if self.pass_timeout_ms == 0 {
            return Err(ConfigError::Invalid("pass_timeout_ms must be positive".into()));
        }
        if !(self.preprocess.gamma > 0.0 && self.preprocess.gamma.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "gamma must be a positive number, got {}",
                self.preprocess.gamma
            )));
        }
        Ok(())
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_millis(self.pass_timeout_ms)
    }

    /// Distinct techniques in first-use order.
    pub fn techniques(&self) -> Vec<Technique> {
        let mut out = Vec::new();
        for pass in &self.passes {
            if !out.contains(&pass.technique) {
                out.push(pass.technique);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_four_paired_passes() {
        let c = PipelineConfig::default();
        assert_eq!(c.passes.len(), 4);
        assert_eq!(c.pass_timeout(), Duration::from_secs(15));
        assert_eq!(c.passes[3], PassSpec::new(Technique::Passthrough, RecognitionPreset::SingleColumn));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn single_pass_variant() {
        let c = PipelineConfig::single_pass();
        assert_eq!(c.passes.len(), 1);
        assert_eq!(c.pass_timeout_ms, 30_000);
    }

    #[test]
    fn parses_toml_with_defaults_for_missing_keys() {
        let c = PipelineConfig::from_toml(
            r#"
pass_timeout_ms = 5000

[[passes]]
technique = "gamma-threshold"
recognition = "auto-osd"

[[passes]]
technique = "gamma-threshold"
recognition = "single-block"

[preprocess]
threshold = 100
"#,
        )
        .unwrap();
        assert_eq!(c.pass_timeout_ms, 5000);
        assert_eq!(c.passes.len(), 2);
        assert_eq!(c.passes[0].recognition, RecognitionPreset::AutoOsd);
        assert_eq!(c.preprocess.threshold, 100);
        assert_eq!(c.preprocess.max_width, 1500);
        assert!(c.context_window);
        assert_eq!(c.techniques(), vec![Technique::GammaThreshold]);
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(PipelineConfig::from_toml("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn rejects_unknown_technique() {
        let err = PipelineConfig::from_toml("[[passes]]\ntechnique = \"sharpen\"\nrecognition = \"auto\"\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_empty_pass_list_and_zero_timeout() {
        assert!(matches!(PipelineConfig::from_toml("passes = []"), Err(ConfigError::Invalid(_))));
        assert!(matches!(PipelineConfig::from_toml("pass_timeout_ms = 0"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.toml");
        std::fs::write(&path, "context_window = false\n").unwrap();
        let c = PipelineConfig::from_file(&path).unwrap();
        assert!(!c.context_window);
        assert_eq!(c.passes.len(), 4);
    }
}
