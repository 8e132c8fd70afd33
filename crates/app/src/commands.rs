use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use voterform_core::{DraftRecord, FieldName, RecordSink, Sheet, ValidatedRecord};
use voterform_ocr::{
    DispatchEvent, FieldHit, FormExtraction, FormPipeline, MockRecognizer, OcrBackend, PassSummary, PipelineConfig,
};

#[derive(Args)]
pub struct ExtractArgs {
    /// Form image (JPEG, PNG, WEBP, ...)
    #[arg(required_unless_present = "text", conflicts_with = "text")]
    pub image: Option<PathBuf>,

    /// Skip recognition and reconcile this text file instead
    #[arg(long)]
    pub text: Option<PathBuf>,

    /// Run the image pipeline against fixed recognizer output read from this file
    #[arg(long, conflicts_with = "text")]
    pub mock_text: Option<PathBuf>,

    /// Tesseract data directory (tessdata)
    #[arg(long)]
    pub tessdata: Option<String>,

    /// Use one thresholded pass instead of the configured set
    #[arg(long)]
    pub single_pass: bool,

    /// Write the validated record here as JSON, ready for `append`
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Print the full result as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct AppendArgs {
    /// Sheet file (JSON); created if it does not exist
    #[arg(short, long)]
    pub sheet: PathBuf,

    /// Record file written by `extract --output`
    #[arg(short, long)]
    pub record: PathBuf,

    /// Sheet name when creating a new sheet (defaults to the file stem)
    #[arg(long)]
    pub name: Option<String>,

    /// Correct a field before validation, e.g. --set middlename=Chioma
    #[arg(long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    pub overrides: Vec<(FieldName, String)>,
}

#[derive(Args)]
pub struct ExportArgs {
    /// Sheet file (JSON)
    #[arg(short, long)]
    pub sheet: PathBuf,

    /// CSV destination
    #[arg(short, long)]
    pub out: PathBuf,
}

#[derive(Args)]
pub struct ShowArgs {
    /// Sheet file (JSON)
    pub sheet: PathBuf,
}

#[derive(Serialize)]
struct ExtractReport<'a> {
    record: &'a ValidatedRecord,
    rejected: &'a [FieldName],
    missing: Vec<FieldName>,
    hits: &'a [FieldHit],
    passes: Vec<PassSummary>,
    corpus: &'a str,
}

fn parse_assignment(s: &str) -> Result<(FieldName, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    Ok((field.parse()?, value.trim().to_string()))
}

pub async fn extract(args: ExtractArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if args.single_pass {
        config = PipelineConfig {
            context_window: config.context_window,
            preprocess: config.preprocess,
            ..PipelineConfig::single_pass()
        };
    }

    let extraction = if let Some(text_path) = &args.text {
        let corpus = std::fs::read_to_string(text_path)
            .with_context(|| format!("Failed to read {}", text_path.display()))?;
        FormPipeline::new(MockRecognizer::new(""), config).reconcile(&corpus)
    } else if let Some(image) = &args.image {
        match &args.mock_text {
            Some(mock) => {
                let text = std::fs::read_to_string(mock)
                    .with_context(|| format!("Failed to read {}", mock.display()))?;
                run_image(FormPipeline::new(MockRecognizer::new(text), config), image).await?
            }
            None => run_image(FormPipeline::new(engine(args.tessdata.clone())?, config), image).await?,
        }
    } else {
        bail!("either an image or --text is required");
    };

    if extraction.is_empty_corpus() {
        warn!("nothing was recognized; retake the photo or enter the record by hand");
    }

    if let Some(out) = &args.output {
        let json = serde_json::to_string_pretty(&extraction.record)?;
        std::fs::write(out, json).with_context(|| format!("Failed to write {}", out.display()))?;
        info!(path = %out.display(), "record written");
    }

    if args.json {
        let report = ExtractReport {
            record: &extraction.record,
            rejected: &extraction.rejected,
            missing: extraction.record.missing(),
            hits: &extraction.hits,
            passes: extraction.summaries(),
            corpus: &extraction.corpus,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_record(&extraction.record, &extraction.rejected);
    }
    Ok(())
}

#[cfg(feature = "tesseract")]
fn engine(tessdata: Option<String>) -> Result<voterform_ocr::recognizer::tesseract_backend::TesseractRecognizer> {
    Ok(voterform_ocr::recognizer::tesseract_backend::TesseractRecognizer::new(tessdata))
}

#[cfg(not(feature = "tesseract"))]
fn engine(_tessdata: Option<String>) -> Result<MockRecognizer> {
    Err(voterform_ocr::OcrError::NotAvailable).context("pass --mock-text or --text to run without an OCR engine")
}

async fn run_image<R: OcrBackend + 'static>(pipeline: FormPipeline<R>, image: &Path) -> Result<FormExtraction> {
    let total = pipeline.config().passes.len();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let pipeline = pipeline.with_progress(tx);
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let DispatchEvent::Settled { index, kind } = event {
                info!("pass {}/{total} {kind}", index + 1);
            }
        }
    });

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted; abandoning outstanding passes");
            on_interrupt.cancel();
        }
    });

    let bytes = tokio::fs::read(image)
        .await
        .with_context(|| format!("Failed to read {}", image.display()))?;
    let extraction = pipeline.process_bytes_with_cancel(bytes, &cancel).await?;
    Ok(extraction)
}

fn print_record(record: &ValidatedRecord, rejected: &[FieldName]) {
    for field in FieldName::ALL {
        let value = record.get(field);
        let note = if rejected.contains(&field) { "  (rejected)" } else { "" };
        println!("{:<20} {}{}", field.label(), value, note);
    }
}

/// Load a sheet, or start a new one when the file is absent.
fn open_sheet(path: &Path, name: Option<&str>) -> Result<Sheet> {
    if path.exists() {
        return Sheet::load_json(path).with_context(|| format!("Failed to load sheet {}", path.display()));
    }
    let name = match name {
        Some(n) => n.to_string(),
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    Ok(Sheet::new(&name)?)
}

pub fn append_record(
    sheet_path: &Path,
    record_path: &Path,
    name: Option<&str>,
    overrides: &[(FieldName, String)],
) -> Result<Sheet> {
    let content = std::fs::read_to_string(record_path)
        .with_context(|| format!("Failed to read {}", record_path.display()))?;
    let mut draft: DraftRecord = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a record file", record_path.display()))?;
    for (field, value) in overrides {
        draft.set(*field, value.clone());
    }

    let (record, rejected) = ValidatedRecord::validate_with_rejections(&draft);
    if !rejected.is_empty() {
        let names: Vec<&str> = rejected.iter().map(|f| f.key()).collect();
        bail!("fields failed validation: {}", names.join(", "));
    }

    let mut sheet = open_sheet(sheet_path, name)?;
    sheet.append(record)?;
    sheet.save_json(sheet_path)?;
    info!(sheet = sheet.name(), entries = sheet.entries(), "record appended");
    Ok(sheet)
}

pub fn append(args: AppendArgs) -> Result<()> {
    let sheet = append_record(&args.sheet, &args.record, args.name.as_deref(), &args.overrides)?;
    println!("{}: {} entries", sheet.name(), sheet.entries());
    Ok(())
}

pub fn export(args: ExportArgs) -> Result<()> {
    let sheet = Sheet::load_json(&args.sheet)
        .with_context(|| format!("Failed to load sheet {}", args.sheet.display()))?;
    sheet.export_csv(&args.out)?;
    println!("exported {} rows to {}", sheet.entries(), args.out.display());
    Ok(())
}

pub fn show(args: ShowArgs) -> Result<()> {
    let sheet = Sheet::load_json(&args.sheet)
        .with_context(|| format!("Failed to load sheet {}", args.sheet.display()))?;
    println!("{} ({} entries, updated {})", sheet.name(), sheet.entries(), sheet.updated_at().format("%Y-%m-%d %H:%M"));
    sheet.write_csv(std::io::stdout().lock())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_record(dir: &Path, surname: &str, nin: &str) -> PathBuf {
        let path = dir.join(format!("{surname}.json"));
        let json = format!(
            r#"{{"surname":"{surname}","firstname":"Ada","phonenumber":"08098765432","applicationnumber":"VIN12345678","dateofbirth":"12/05/1990","gender":"Female","ward":"Ward 5","unit":"Unit A-1","nin":"{nin}"}}"#
        );
        std::fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn parses_field_assignments() {
        assert_eq!(
            parse_assignment("middlename= Chioma").unwrap(),
            (FieldName::Middlename, "Chioma".to_string())
        );
        assert!(parse_assignment("middlename").is_err());
        assert!(parse_assignment("nickname=Ada").is_err());
    }

    #[test]
    fn append_creates_sheet_then_grows_it() {
        let dir = tempfile::tempdir().unwrap();
        let sheet_path = dir.path().join("ward5.json");

        let first = write_record(dir.path(), "OKORO", "12345678903");
        let sheet = append_record(&sheet_path, &first, None, &[]).unwrap();
        assert_eq!(sheet.name(), "ward5");
        assert_eq!(sheet.entries(), 1);

        let second = write_record(dir.path(), "BELLO", "12345678904");
        let sheet = append_record(&sheet_path, &second, None, &[(FieldName::Middlename, "Chioma".into())]).unwrap();
        assert_eq!(sheet.entries(), 2);
        assert_eq!(sheet.records()[1].get(FieldName::Middlename), "Chioma");
    }

    #[test]
    fn append_refuses_invalid_or_incomplete_records() {
        let dir = tempfile::tempdir().unwrap();
        let sheet_path = dir.path().join("intake.json");

        let bad_nin = write_record(dir.path(), "OKORO", "08012345678");
        let err = append_record(&sheet_path, &bad_nin, None, &[]).unwrap_err();
        assert!(err.to_string().contains("nin"));

        let ok = write_record(dir.path(), "BELLO", "12345678903");
        let err = append_record(&sheet_path, &ok, None, &[(FieldName::Ward, String::new())]).unwrap_err();
        assert!(err.to_string().contains("ward"));
        assert!(!sheet_path.exists());
    }

    #[test]
    fn export_writes_csv() {
        let dir = tempfile::tempdir().unwrap();
        let sheet_path = dir.path().join("intake.json");
        let record = write_record(dir.path(), "OKORO", "12345678903");
        append_record(&sheet_path, &record, Some("Intake"), &[]).unwrap();

        let out = dir.path().join("intake.csv");
        export(ExportArgs { sheet: sheet_path, out: out.clone() }).unwrap();
        let csv = std::fs::read_to_string(out).unwrap();
        assert!(csv.starts_with("surname,middlename,firstname"));
        assert!(csv.contains("OKORO,,Ada"));
    }
}
