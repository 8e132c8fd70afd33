use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A named pixel-level enhancement applied before recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Technique {
    /// Luminance then a fixed binarization cutoff.
    ContrastThreshold,
    /// Luminance, gamma lift, then a higher cutoff; keeps faint strokes.
    GammaThreshold,
    /// 3x3 median filter per channel.
    Denoise,
    /// The decoded image, untouched.
    Passthrough,
}

impl Technique {
    /// Name carried by the resulting image variant, for diagnostics.
    pub fn variant_name(self) -> &'static str {
        match self {
            Technique::ContrastThreshold => "thresholded",
            Technique::GammaThreshold => "gamma-threshold",
            Technique::Denoise => "denoised",
            Technique::Passthrough => "original",
        }
    }
}

impl std::fmt::Display for Technique {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Technique::ContrastThreshold => write!(f, "contrast-threshold"),
            Technique::GammaThreshold => write!(f, "gamma-threshold"),
            Technique::Denoise => write!(f, "denoise"),
            Technique::Passthrough => write!(f, "passthrough"),
        }
    }
}

impl std::str::FromStr for Technique {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "contrast-threshold" => Ok(Technique::ContrastThreshold),
            "gamma-threshold" => Ok(Technique::GammaThreshold),
            "denoise" => Ok(Technique::Denoise),
            "passthrough" => Ok(Technique::Passthrough),
            other => Err(format!("Unknown preprocessing technique: '{other}'")),
        }
    }
}

/// Tesseract page-segmentation modes used by the presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSegMode {
    AutoOsd = 1,
    Auto = 3,
    SingleColumn = 4,
    SingleBlock = 6,
}

impl PageSegMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    LegacyOnly = 0,
    LstmOnly = 1,
    LegacyAndLstm = 2,
    Default = 3,
}

impl EngineMode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Characters that can appear on the registration form.
pub const FORM_CHARSET: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 :/-.,#+()'";

/// The enumerated set of recognizer configurations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecognitionPreset {
    /// Assume one uniform block of text.
    SingleBlock,
    /// Fully automatic layout analysis.
    Auto,
    /// Automatic layout with orientation and script detection.
    AutoOsd,
    /// Assume a single column of variable-size text.
    SingleColumn,
}

impl RecognitionPreset {
    pub fn name(self) -> &'static str {
        match self {
            RecognitionPreset::SingleBlock => "single-block",
            RecognitionPreset::Auto => "auto",
            RecognitionPreset::AutoOsd => "auto-osd",
            RecognitionPreset::SingleColumn => "single-column",
        }
    }

    pub fn config(self) -> RecognitionConfig {
        let (psm, whitelist, engine) = match self {
            RecognitionPreset::SingleBlock => (PageSegMode::SingleBlock, FORM_CHARSET, EngineMode::LstmOnly),
            RecognitionPreset::Auto => (PageSegMode::Auto, FORM_CHARSET, EngineMode::LstmOnly),
            // Orientation detection works best without a whitelist.
            RecognitionPreset::AutoOsd => (PageSegMode::AutoOsd, "", EngineMode::Default),
            RecognitionPreset::SingleColumn => (PageSegMode::SingleColumn, FORM_CHARSET, EngineMode::Default),
        };
        RecognitionConfig {
            preset: self,
            psm,
            whitelist: whitelist.to_string(),
            engine,
        }
    }
}

impl std::fmt::Display for RecognitionPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for RecognitionPreset {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "single-block" => Ok(RecognitionPreset::SingleBlock),
            "auto" => Ok(RecognitionPreset::Auto),
            "auto-osd" => Ok(RecognitionPreset::AutoOsd),
            "single-column" => Ok(RecognitionPreset::SingleColumn),
            other => Err(format!("Unknown recognition preset: '{other}'")),
        }
    }
}

/// Everything the recognizer needs besides the image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionConfig {
    pub preset: RecognitionPreset,
    pub psm: PageSegMode,
    /// Allowed characters; empty means unrestricted.
    pub whitelist: String,
    pub engine: EngineMode,
}

/// A preprocessed image ready for recognition.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub technique: Technique,
    /// Encoded image bytes handed to the recognizer.
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageVariant {
    pub fn name(&self) -> &'static str {
        self.technique.variant_name()
    }
}

/// How a single recognition pass settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    Recognized(String),
    TimedOut,
    Failed(String),
    /// Abandoned because the request was cancelled.
    Cancelled,
}

impl PassOutcome {
    pub fn text(&self) -> Option<&str> {
        match self {
            PassOutcome::Recognized(text) => Some(text),
            _ => None,
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            PassOutcome::Recognized(_) => OutcomeKind::Recognized,
            PassOutcome::TimedOut => OutcomeKind::TimedOut,
            PassOutcome::Failed(_) => OutcomeKind::Failed,
            PassOutcome::Cancelled => OutcomeKind::Cancelled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    Recognized,
    TimedOut,
    Failed,
    Cancelled,
}

impl std::fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeKind::Recognized => write!(f, "recognized"),
            OutcomeKind::TimedOut => write!(f, "timed_out"),
            OutcomeKind::Failed => write!(f, "failed"),
            OutcomeKind::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Result of one (variant, config) pass, keyed by its position in the plan.
#[derive(Debug, Clone)]
pub struct PassReport {
    pub index: usize,
    pub variant: &'static str,
    pub preset: RecognitionPreset,
    pub outcome: PassOutcome,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn technique_roundtrip() {
        for t in [
            Technique::ContrastThreshold,
            Technique::GammaThreshold,
            Technique::Denoise,
            Technique::Passthrough,
        ] {
            assert_eq!(Technique::from_str(&t.to_string()).unwrap(), t);
        }
        assert!(Technique::from_str("sharpen").is_err());
    }

    #[test]
    fn variant_names() {
        assert_eq!(Technique::ContrastThreshold.variant_name(), "thresholded");
        assert_eq!(Technique::Passthrough.variant_name(), "original");
    }

    #[test]
    fn preset_configs() {
        let c = RecognitionPreset::SingleBlock.config();
        assert_eq!(c.psm.as_u8(), 6);
        assert_eq!(c.engine.as_u8(), 1);
        assert!(c.whitelist.contains('/'));

        let c = RecognitionPreset::AutoOsd.config();
        assert_eq!(c.psm.as_u8(), 1);
        assert!(c.whitelist.is_empty());

        assert_eq!(RecognitionPreset::from_str("single-column").unwrap(), RecognitionPreset::SingleColumn);
    }

    #[test]
    fn outcome_text_only_for_recognized() {
        assert_eq!(PassOutcome::Recognized("x".into()).text(), Some("x"));
        assert_eq!(PassOutcome::TimedOut.text(), None);
        assert_eq!(PassOutcome::Failed("boom".into()).kind(), OutcomeKind::Failed);
    }
}
