pub mod record;
pub mod sheet;
pub mod validate;

pub use record::{DraftRecord, FieldName};
pub use sheet::{RecordSink, Sheet, SheetError};
pub use validate::{check_field, is_phone_shaped, is_valid_nin, validate, ValidatedRecord, PHONE_PREFIXES};
