use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::record::{DraftRecord, FieldName};

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

/// National mobile prefixes accepted for an 11-digit phone number.
pub const PHONE_PREFIXES: [&str; 5] = ["070", "080", "081", "090", "091"];

re!(re_name, r"^[A-Za-z]+(?: [A-Za-z]+)*$");
// Fixed-length prefix: exactly three letters, any letters.
re!(re_application, r"^[A-Z]{3}\d{8}$");
re!(re_date, r"^[0-9/.\-]{8,}$");
re!(re_ward, r"^[A-Za-z0-9]+(?: [A-Za-z0-9]+)*$");
re!(re_unit, r"^[A-Za-z0-9,.#\-]+(?: [A-Za-z0-9,.#\-]+)*$");
re!(re_eleven_digits, r"^\d{11}$");

/// True for an 11-digit string that starts with one of [`PHONE_PREFIXES`].
///
/// Used both to accept phone numbers and to keep phone numbers out of the
/// NIN field.
pub fn is_phone_shaped(digits: &str) -> bool {
    re_eleven_digits().is_match(digits) && PHONE_PREFIXES.iter().any(|p| digits.starts_with(p))
}

pub fn is_valid_nin(value: &str) -> bool {
    re_eleven_digits().is_match(value) && !is_phone_shaped(value)
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Apply the format rule for `field` to `raw`. Returns the (possibly
/// normalized) value when it passes, `None` when it must be cleared.
pub fn check_field(field: FieldName, raw: &str) -> Option<String> {
    let value = collapse_whitespace(raw);
    if value.is_empty() {
        return None;
    }
    match field {
        FieldName::Surname | FieldName::Middlename | FieldName::Firstname => {
            re_name().is_match(&value).then_some(value)
        }
        FieldName::Phonenumber => is_phone_shaped(&value).then_some(value),
        FieldName::Applicationnumber => {
            let upper = value.to_uppercase();
            re_application().is_match(&upper).then_some(upper)
        }
        FieldName::Dateofbirth => re_date().is_match(&value).then_some(value),
        FieldName::Gender => match value.to_lowercase().as_str() {
            "male" => Some("Male".to_string()),
            "female" => Some("Female".to_string()),
            _ => None,
        },
        FieldName::Ward => re_ward().is_match(&value).then_some(value),
        FieldName::Unit => re_unit().is_match(&value).then_some(value),
        FieldName::Nin => is_valid_nin(&value).then_some(value),
    }
}

/// A record whose every non-empty field matches its format rule.
///
/// Only obtainable through [`ValidatedRecord::validate`], so holding one is
/// proof that no unchecked value is inside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidatedRecord(DraftRecord);

impl ValidatedRecord {
    /// Narrow a draft to its verified fields. Total: never fails, a field
    /// either survives (normalized) or becomes empty.
    pub fn validate(draft: &DraftRecord) -> ValidatedRecord {
        Self::validate_with_rejections(draft).0
    }

    /// Like [`validate`](Self::validate), also listing the fields that carried
    /// a value but were cleared.
    pub fn validate_with_rejections(draft: &DraftRecord) -> (ValidatedRecord, Vec<FieldName>) {
        let mut out = DraftRecord::new();
        let mut rejected = Vec::new();
        for field in FieldName::ALL {
            let raw = draft.get(field);
            if raw.trim().is_empty() {
                continue;
            }
            match check_field(field, raw) {
                Some(value) => out.set(field, value),
                None => {
                    debug!(field = %field, value = raw, "value rejected by format rule");
                    rejected.push(field);
                }
            }
        }
        (ValidatedRecord(out), rejected)
    }

    pub fn get(&self, field: FieldName) -> &str {
        self.0.get(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Blank fields, in column order.
    pub fn missing(&self) -> Vec<FieldName> {
        self.0.missing()
    }

    pub fn as_draft(&self) -> &DraftRecord {
        &self.0
    }

    /// Hand the values back for human correction; re-validate afterwards.
    pub fn into_draft(self) -> DraftRecord {
        self.0
    }
}

/// Shorthand for [`ValidatedRecord::validate`].
pub fn validate(draft: &DraftRecord) -> ValidatedRecord {
    ValidatedRecord::validate(draft)
}
