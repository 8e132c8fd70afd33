use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::record::{DraftRecord, FieldName};
use crate::validate::ValidatedRecord;

#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Sheet name must not be blank")]
    InvalidName,
    #[error("Record is missing required fields: {}", field_list(.0))]
    Incomplete(Vec<FieldName>),
    #[error("Row {row} failed validation on load: {}", field_list(.fields))]
    Corrupt { row: usize, fields: Vec<FieldName> },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn field_list(fields: &[FieldName]) -> String {
    fields.iter().map(|f| f.key()).collect::<Vec<_>>().join(", ")
}

/// Destination for reviewed records.
pub trait RecordSink {
    fn append(&mut self, record: ValidatedRecord) -> Result<(), SheetError>;
}

/// A named, ordered dataset of validated records: one spreadsheet's worth.
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    records: Vec<ValidatedRecord>,
}

/// On-disk shape. Rows are stored as plain drafts and re-validated on load.
#[derive(Serialize, Deserialize)]
struct SheetFile {
    name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    records: Vec<DraftRecord>,
}

impl Sheet {
    pub fn new(name: &str) -> Result<Self, SheetError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SheetError::InvalidName);
        }
        let now = Utc::now();
        Ok(Self {
            name: name.to_string(),
            created_at: now,
            updated_at: now,
            records: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Number of data rows (the header is not counted).
    pub fn entries(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ValidatedRecord] {
        &self.records
    }

    /// Write a header row of field keys followed by one row per record.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), SheetError> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(FieldName::ALL.iter().map(|f| f.key()))?;
        for record in &self.records {
            wtr.write_record(FieldName::ALL.iter().map(|f| record.get(*f)))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> Result<(), SheetError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)?;
        info!(sheet = %self.name, rows = self.entries(), path = %path.display(), "sheet exported");
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> Result<(), SheetError> {
        let file = SheetFile {
            name: self.name.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            records: self.records.iter().map(|r| r.as_draft().clone()).collect(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load a sheet saved with [`save_json`](Self::save_json). Every row is
    /// re-validated; a row that loses a value fails the whole load.
    pub fn load_json(path: &Path) -> Result<Self, SheetError> {
        let content = std::fs::read_to_string(path)?;
        let file: SheetFile = serde_json::from_str(&content)?;
        if file.name.trim().is_empty() {
            return Err(SheetError::InvalidName);
        }

        let mut records = Vec::with_capacity(file.records.len());
        for (row, draft) in file.records.iter().enumerate() {
            let (record, rejected) = ValidatedRecord::validate_with_rejections(draft);
            if !rejected.is_empty() {
                return Err(SheetError::Corrupt { row, fields: rejected });
            }
            records.push(record);
        }

        Ok(Self {
            name: file.name,
            created_at: file.created_at,
            updated_at: file.updated_at,
            records,
        })
    }
}

impl RecordSink for Sheet {
    fn append(&mut self, record: ValidatedRecord) -> Result<(), SheetError> {
        let missing: Vec<FieldName> = record
            .missing()
            .into_iter()
            .filter(|f| !f.is_optional())
            .collect();
        if !missing.is_empty() {
            return Err(SheetError::Incomplete(missing));
        }
        self.records.push(record);
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::validate;

    fn complete_record(surname: &str) -> ValidatedRecord {
        let mut d = DraftRecord::new();
        d.set(FieldName::Surname, surname);
        d.set(FieldName::Firstname, "Ada");
        d.set(FieldName::Phonenumber, "08098765432");
        d.set(FieldName::Applicationnumber, "VIN12345678");
        d.set(FieldName::Dateofbirth, "12/05/1990");
        d.set(FieldName::Gender, "Female");
        d.set(FieldName::Ward, "Ward 5");
        d.set(FieldName::Unit, "Unit A-1");
        d.set(FieldName::Nin, "12345678903");
        validate(&d)
    }

    #[test]
    fn new_rejects_blank_name() {
        assert!(matches!(Sheet::new("   "), Err(SheetError::InvalidName)));
        assert_eq!(Sheet::new(" Ward 5 intake ").unwrap().name(), "Ward 5 intake");
    }

    #[test]
    fn append_accepts_record_without_middle_name() {
        let mut sheet = Sheet::new("intake").unwrap();
        sheet.append(complete_record("OKORO")).unwrap();
        assert_eq!(sheet.entries(), 1);
    }

    #[test]
    fn append_rejects_incomplete_record() {
        let mut sheet = Sheet::new("intake").unwrap();
        let mut d = complete_record("OKORO").into_draft();
        d.set(FieldName::Nin, "");
        d.set(FieldName::Ward, "");
        let err = sheet.append(validate(&d)).unwrap_err();
        match err {
            SheetError::Incomplete(fields) => {
                assert_eq!(fields, vec![FieldName::Ward, FieldName::Nin]);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(sheet.is_empty());
    }

    #[test]
    fn csv_has_header_and_rows_in_order() {
        let mut sheet = Sheet::new("intake").unwrap();
        sheet.append(complete_record("OKORO")).unwrap();
        sheet.append(complete_record("BELLO")).unwrap();

        let mut buf = Vec::new();
        sheet.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "surname,middlename,firstname,phonenumber,applicationnumber,dateofbirth,gender,ward,unit,nin"
        );
        assert!(lines[1].starts_with("OKORO,,Ada,08098765432"));
        assert!(lines[2].starts_with("BELLO,"));
        assert!(lines[1].contains("Unit A-1"));
    }

    #[test]
    fn json_roundtrip_preserves_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.json");

        let mut sheet = Sheet::new("intake").unwrap();
        sheet.append(complete_record("OKORO")).unwrap();
        sheet.save_json(&path).unwrap();

        let loaded = Sheet::load_json(&path).unwrap();
        assert_eq!(loaded.name(), "intake");
        assert_eq!(loaded.entries(), 1);
        assert_eq!(loaded.records()[0], sheet.records()[0]);
    }

    #[test]
    fn load_rejects_tampered_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("intake.json");
        let content = r#"{
            "name": "intake",
            "created_at": "2024-01-15T10:00:00Z",
            "updated_at": "2024-01-15T10:00:00Z",
            "records": [{"surname": "OKORO", "phonenumber": "12345"}]
        }"#;
        std::fs::write(&path, content).unwrap();

        match Sheet::load_json(&path) {
            Err(SheetError::Corrupt { row, fields }) => {
                assert_eq!(row, 0);
                assert_eq!(fields, vec![FieldName::Phonenumber]);
            }
            other => panic!("expected corrupt row, got {other:?}"),
        }
    }
}
