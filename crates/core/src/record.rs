use serde::{Deserialize, Serialize};
use std::fmt;

/// The ten fields of a voter-registration record, in sheet column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldName {
    Surname,
    Middlename,
    Firstname,
    Phonenumber,
    Applicationnumber,
    Dateofbirth,
    Gender,
    Ward,
    Unit,
    Nin,
}

impl FieldName {
    pub const ALL: [FieldName; 10] = [
        FieldName::Surname,
        FieldName::Middlename,
        FieldName::Firstname,
        FieldName::Phonenumber,
        FieldName::Applicationnumber,
        FieldName::Dateofbirth,
        FieldName::Gender,
        FieldName::Ward,
        FieldName::Unit,
        FieldName::Nin,
    ];

    /// Key used in serialized records and as the CSV header.
    pub fn key(self) -> &'static str {
        match self {
            FieldName::Surname => "surname",
            FieldName::Middlename => "middlename",
            FieldName::Firstname => "firstname",
            FieldName::Phonenumber => "phonenumber",
            FieldName::Applicationnumber => "applicationnumber",
            FieldName::Dateofbirth => "dateofbirth",
            FieldName::Gender => "gender",
            FieldName::Ward => "ward",
            FieldName::Unit => "unit",
            FieldName::Nin => "nin",
        }
    }

    /// Human-facing label, as printed on the paper form.
    pub fn label(self) -> &'static str {
        match self {
            FieldName::Surname => "Surname",
            FieldName::Middlename => "Middle Name",
            FieldName::Firstname => "First Name",
            FieldName::Phonenumber => "Phone Number",
            FieldName::Applicationnumber => "Application Number",
            FieldName::Dateofbirth => "Date of Birth",
            FieldName::Gender => "Gender",
            FieldName::Ward => "Ward",
            FieldName::Unit => "Unit",
            FieldName::Nin => "NIN",
        }
    }

    /// Whether a record may be appended to a sheet with this field blank.
    pub fn is_optional(self) -> bool {
        matches!(self, FieldName::Middlename)
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl std::str::FromStr for FieldName {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        FieldName::ALL
            .into_iter()
            .find(|f| f.key() == wanted)
            .ok_or_else(|| format!("Unknown field: '{s}'"))
    }
}

/// Best-effort record produced by the field extractor, or edited by a human
/// reviewer. Nothing in here has been checked against a format rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftRecord {
    pub surname: String,
    pub middlename: String,
    pub firstname: String,
    pub phonenumber: String,
    pub applicationnumber: String,
    pub dateofbirth: String,
    pub gender: String,
    pub ward: String,
    pub unit: String,
    pub nin: String,
}

impl DraftRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: FieldName) -> &str {
        match field {
            FieldName::Surname => &self.surname,
            FieldName::Middlename => &self.middlename,
            FieldName::Firstname => &self.firstname,
            FieldName::Phonenumber => &self.phonenumber,
            FieldName::Applicationnumber => &self.applicationnumber,
            FieldName::Dateofbirth => &self.dateofbirth,
            FieldName::Gender => &self.gender,
            FieldName::Ward => &self.ward,
            FieldName::Unit => &self.unit,
            FieldName::Nin => &self.nin,
        }
    }

    fn slot(&mut self, field: FieldName) -> &mut String {
        match field {
            FieldName::Surname => &mut self.surname,
            FieldName::Middlename => &mut self.middlename,
            FieldName::Firstname => &mut self.firstname,
            FieldName::Phonenumber => &mut self.phonenumber,
            FieldName::Applicationnumber => &mut self.applicationnumber,
            FieldName::Dateofbirth => &mut self.dateofbirth,
            FieldName::Gender => &mut self.gender,
            FieldName::Ward => &mut self.ward,
            FieldName::Unit => &mut self.unit,
            FieldName::Nin => &mut self.nin,
        }
    }

    /// Unconditionally overwrite a field (human correction path).
    pub fn set(&mut self, field: FieldName, value: impl Into<String>) {
        *self.slot(field) = value.into();
    }

    /// First-match-wins write: stores `value` only if the field is still blank.
    /// Returns whether the value was taken.
    pub fn fill(&mut self, field: FieldName, value: &str) -> bool {
        let slot = self.slot(field);
        if !slot.is_empty() || value.is_empty() {
            return false;
        }
        slot.push_str(value);
        true
    }

    pub fn is_filled(&self, field: FieldName) -> bool {
        !self.get(field).is_empty()
    }

    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        FieldName::ALL.iter().all(|f| self.get(*f).is_empty())
    }

    /// Fields that are still blank, in column order.
    pub fn missing(&self) -> Vec<FieldName> {
        FieldName::ALL
            .into_iter()
            .filter(|f| self.get(*f).is_empty())
            .collect()
    }
}
