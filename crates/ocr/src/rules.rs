use std::sync::OnceLock;

use regex::Regex;
use voterform_core::{is_phone_shaped, FieldName};

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Any field label, including the common OCR misreadings. Used to cut a value
// where the next field begins when OCR runs several fields together.
re!(re_field_label,
    r"(?i)\b(?:surname|sur\s*name|s[uv]rn[a@]me|sumame|last\s*name|family\s*name|middle\s*name|other\s*names?|first\s*name|f[il1]rst\s*n[a@]me|given\s*name|forename|phone(?:\s*(?:number|no))?|mobile|tel(?:ephone)?|gsm|application(?:\s*(?:number|no))?|app\s*no|date\s*of\s*birth|date\s*0f\s*birth|dob|d\.o\.b|gender|sex|ward|polling\s*unit|unit|nin|national\s*id(?:entification)?(?:\s*(?:number|no))?)\b");

/// Where a pattern looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The current line only.
    Line,
    /// Previous, current and next line joined with `\n`.
    Window,
}

/// Pattern priority band. Every `Labeled` pattern is tried over the whole
/// corpus before any `Fallback` pattern for the same field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Tier {
    Labeled,
    Fallback,
}

/// Post-processing applied to a raw capture, in listed order. Whitespace
/// collapsing and trailing-punctuation stripping always run last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cleanup {
    CollapseWhitespace,
    StripTrailingPunctuation,
    /// Truncate at the first other field label after the value's start.
    CutAtNextLabel,
    DigitsOnly,
    /// `234XXXXXXXXXX` becomes `0XXXXXXXXXX`. Expects digits.
    InternationalPhone,
    Uppercase,
    RemoveSpaces,
}

impl Cleanup {
    pub fn apply(self, value: &str) -> String {
        match self {
            Cleanup::CollapseWhitespace => value.split_whitespace().collect::<Vec<_>>().join(" "),
            Cleanup::StripTrailingPunctuation => value
                .trim_end_matches(|c: char| matches!(c, ':' | '.' | '-') || c.is_whitespace())
                .to_string(),
            Cleanup::CutAtNextLabel => cut_at_next_label(value).to_string(),
            Cleanup::DigitsOnly => value.chars().filter(char::is_ascii_digit).collect(),
            Cleanup::InternationalPhone => match value.strip_prefix("234") {
                Some(rest) if rest.len() == 10 => format!("0{rest}"),
                _ => value.to_string(),
            },
            Cleanup::Uppercase => value.to_uppercase(),
            Cleanup::RemoveSpaces => value.chars().filter(|c| !c.is_whitespace()).collect(),
        }
    }
}

fn cut_at_next_label(value: &str) -> &str {
    match re_field_label().find_iter(value).find(|m| m.start() > 0) {
        Some(m) => &value[..m.start()],
        None => value,
    }
}

/// True when the value itself begins with a field label, i.e. the "value"
/// is really the next field.
pub fn starts_with_label(value: &str) -> bool {
    re_field_label()
        .find(value)
        .is_some_and(|m| m.start() == 0)
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regex whose first capture group is the value. Every match in the
    /// scanned text is tried in order.
    Capture(Regex),
    /// Case-insensitive substring keywords mapped to a fixed value; the first
    /// listed keyword found wins.
    Keywords(&'static [(&'static str, &'static str)]),
}

/// One entry in a field's ordered pattern list.
#[derive(Debug, Clone)]
pub struct PatternRule {
    /// Short identifier reported in extraction traces.
    pub name: &'static str,
    pub matcher: Matcher,
    pub scope: Scope,
    pub tier: Tier,
    pub cleanup: &'static [Cleanup],
    /// Cleaned candidates for which this returns true are skipped.
    pub exclude: Option<fn(&str) -> bool>,
}

impl PatternRule {
    /// Build a capture rule from a pattern literal.
    ///
    /// Panics on an invalid pattern; the built-in table only holds literals.
    pub fn capture(name: &'static str, pattern: &str, scope: Scope, tier: Tier, cleanup: &'static [Cleanup]) -> Self {
        Self {
            name,
            matcher: Matcher::Capture(Regex::new(pattern).expect("invalid field pattern")),
            scope,
            tier,
            cleanup,
            exclude: None,
        }
    }

    pub fn keywords(name: &'static str, keywords: &'static [(&'static str, &'static str)]) -> Self {
        Self {
            name,
            matcher: Matcher::Keywords(keywords),
            scope: Scope::Line,
            tier: Tier::Labeled,
            cleanup: &[],
            exclude: None,
        }
    }

    pub fn excluding(mut self, predicate: fn(&str) -> bool) -> Self {
        self.exclude = Some(predicate);
        self
    }

    /// Candidate values in `text`, cleaned, in match order. Excluded and
    /// empty candidates are dropped.
    pub fn candidates(&self, text: &str) -> Vec<String> {
        let raw: Vec<String> = match &self.matcher {
            Matcher::Capture(re) => re
                .captures_iter(text)
                .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
                .collect(),
            Matcher::Keywords(keywords) => {
                let lower = text.to_lowercase();
                keywords
                    .iter()
                    .find(|(kw, _)| lower.contains(kw))
                    .map(|(_, value)| vec![value.to_string()])
                    .unwrap_or_default()
            }
        };
        raw.into_iter()
            .map(|r| self.clean(&r))
            .filter(|v| !v.is_empty())
            .filter(|v| !self.exclude.is_some_and(|ex| ex(v)))
            .collect()
    }

    fn clean(&self, raw: &str) -> String {
        let value = self
            .cleanup
            .iter()
            .fold(raw.to_string(), |acc, step| step.apply(&acc));
        let value = Cleanup::CollapseWhitespace.apply(&value);
        Cleanup::StripTrailingPunctuation.apply(&value)
    }
}

/// A field and its patterns, most specific first.
#[derive(Debug, Clone)]
pub struct FieldRule {
    pub field: FieldName,
    pub patterns: Vec<PatternRule>,
}

impl FieldRule {
    pub fn new(field: FieldName, patterns: Vec<PatternRule>) -> Self {
        Self { field, patterns }
    }

    pub fn tier(&self, tier: Tier) -> impl Iterator<Item = &PatternRule> {
        self.patterns.iter().filter(move |p| p.tier == tier)
    }
}

const NAME: &[Cleanup] = &[Cleanup::CutAtNextLabel];
const PHONE: &[Cleanup] = &[Cleanup::DigitsOnly, Cleanup::InternationalPhone];
const APPLICATION: &[Cleanup] = &[Cleanup::RemoveSpaces, Cleanup::Uppercase];
const DIGITS: &[Cleanup] = &[Cleanup::DigitsOnly];
const NONE: &[Cleanup] = &[];

const SEP: &str = r"\s*[:;\-.]?\s*";
const NEXT_LINE: &str = r"\s*[:;\-.]?[ \t]*\n\s*";
const NAME_VALUE: &str = r"([A-Za-z][A-Za-z ]*)";
// Eleven local digits or +234 and ten, single separators allowed between digits.
const PHONE_VALUE: &str = r"(\+?234(?:[\s\-]?[0-9]){10}|0(?:[\s\-]?[0-9]){10})\b";
const APPLICATION_VALUE: &str = r"([A-Za-z]{3}\s*[0-9][0-9 ]{6,10}[0-9])";
const DATE_VALUE: &str = r"([0-9]{1,4}\s*[/.\-]\s*[0-9]{1,2}\s*[/.\-]\s*[0-9]{1,4})";
const NIN_VALUE: &str = r"([0-9][0-9 ]{9,13}[0-9])";

fn labeled(label: &str, value: &str) -> String {
    format!(r"(?i)\b(?:{label}){SEP}{value}")
}

fn below(label: &str, value: &str) -> String {
    format!(r"(?i)\b(?:{label}){NEXT_LINE}{value}")
}

fn name_rule(field: FieldName, exact: &str, fuzzy: &str) -> FieldRule {
    use Scope::*;
    use Tier::*;
    FieldRule::new(
        field,
        vec![
            PatternRule::capture("exact", &labeled(exact, NAME_VALUE), Line, Labeled, NAME)
                .excluding(starts_with_label),
            PatternRule::capture("fuzzy", &labeled(fuzzy, NAME_VALUE), Line, Labeled, NAME)
                .excluding(starts_with_label),
            PatternRule::capture("below", &below(&format!("{exact}|{fuzzy}"), NAME_VALUE), Window, Labeled, NAME)
                .excluding(starts_with_label),
        ],
    )
}

/// The built-in rule table for the voter registration form, in field order.
pub fn form_rules() -> &'static [FieldRule] {
    static RULES: OnceLock<Vec<FieldRule>> = OnceLock::new();
    RULES.get_or_init(build_form_rules)
}

fn build_form_rules() -> Vec<FieldRule> {
    use Scope::*;
    use Tier::*;

    let phone_label = r"phone(?:\s*(?:number|no\.?))?|mobile(?:\s*(?:number|no\.?))?|tel(?:ephone)?(?:\s*no\.?)?|gsm(?:\s*no\.?)?";
    let phone_fuzzy = r"ph[o0]ne|pnone|phcne|m[o0]bile";
    let application_label = r"application\s*(?:number|no\.?|num)|app\.?\s*no\.?|appl?\s*#";
    let application_fuzzy = r"appl[il1]cat[il1]on\s*(?:number|no\.?)|applicaton\s*(?:number|no\.?)|aplication\s*(?:number|no\.?)";
    let date_label = r"date\s*of\s*birth|birth\s*date|d\.?\s*o\.?\s*b\.?";
    let date_fuzzy = r"date\s*[o0][fr]\s*b[il1]rth|dat[e3]\s*of\s*brth";
    let ward_label = r"ward(?:\s*(?:number|no\.?))?";
    let unit_label = r"(?:polling\s*)?unit(?:\s*(?:number|no\.?))?";
    let nin_label = r"nin(?:\s*(?:number|no\.?))?|n\.i\.n\.?|national\s*id(?:entification)?(?:\s*(?:number|no\.?))?";
    let nin_fuzzy = r"n[il1]n|nln|national\s*[il1]d";
    let ward_value = r"([A-Za-z0-9][A-Za-z0-9 ]*)";
    let unit_value = r"([A-Za-z0-9][A-Za-z0-9,.#\- ]*)";

    vec![
        name_rule(
            FieldName::Surname,
            r"surname|last\s*name|family\s*name",
            r"sur\s*name|s[uv]rn[a@]me|sumame|surnarne|surnmae",
        ),
        name_rule(
            FieldName::Middlename,
            r"middle\s*name|other\s*names?",
            r"midd?le\s*n[a@]me|m[il1]ddle\s*name",
        ),
        name_rule(
            FieldName::Firstname,
            r"first\s*name|given\s*name|forename",
            r"f[il1]rst\s*n[a@]me|fisrt\s*name|frist\s*name",
        ),
        FieldRule::new(
            FieldName::Phonenumber,
            vec![
                PatternRule::capture("exact", &labeled(phone_label, PHONE_VALUE), Line, Labeled, PHONE),
                PatternRule::capture("fuzzy", &labeled(phone_fuzzy, PHONE_VALUE), Line, Labeled, PHONE),
                PatternRule::capture("below", &below(phone_label, PHONE_VALUE), Window, Labeled, PHONE),
            ],
        ),
        FieldRule::new(
            FieldName::Applicationnumber,
            vec![
                PatternRule::capture("exact", &labeled(application_label, APPLICATION_VALUE), Line, Labeled, APPLICATION),
                PatternRule::capture("fuzzy", &labeled(application_fuzzy, APPLICATION_VALUE), Line, Labeled, APPLICATION),
                PatternRule::capture("below", &below(application_label, APPLICATION_VALUE), Window, Labeled, APPLICATION),
            ],
        ),
        FieldRule::new(
            FieldName::Dateofbirth,
            vec![
                PatternRule::capture("exact", &labeled(date_label, DATE_VALUE), Line, Labeled, &[Cleanup::RemoveSpaces]),
                PatternRule::capture("fuzzy", &labeled(date_fuzzy, DATE_VALUE), Line, Labeled, &[Cleanup::RemoveSpaces]),
                PatternRule::capture("below", &below(date_label, DATE_VALUE), Window, Labeled, &[Cleanup::RemoveSpaces]),
            ],
        ),
        FieldRule::new(
            FieldName::Gender,
            vec![PatternRule::keywords("keyword", &[("female", "Female"), ("male", "Male")])],
        ),
        FieldRule::new(
            FieldName::Ward,
            vec![
                PatternRule::capture("exact", &format!(r"(?i)\b(?:{ward_label})\s*[:;\-]\s*{ward_value}"), Line, Labeled, NAME)
                    .excluding(ward_starts_with_other_label),
                PatternRule::capture("bare", r"(?i)\b(ward\s*[0-9]{1,3})\b", Line, Labeled, NONE),
                PatternRule::capture("below", &below(ward_label, ward_value), Window, Labeled, NAME)
                    .excluding(ward_starts_with_other_label),
            ],
        ),
        FieldRule::new(
            FieldName::Unit,
            vec![
                PatternRule::capture("exact", &format!(r"(?i)\b(?:{unit_label})\s*[:;\-]\s*{unit_value}"), Line, Labeled, NAME)
                    .excluding(unit_starts_with_other_label),
                PatternRule::capture("bare", r"(?i)\b(unit\s*[A-Za-z]?-?[0-9]{1,3})\b", Line, Labeled, NONE),
                PatternRule::capture("below", &below(unit_label, unit_value), Window, Labeled, NAME)
                    .excluding(unit_starts_with_other_label),
            ],
        ),
        FieldRule::new(
            FieldName::Nin,
            vec![
                PatternRule::capture("exact", &labeled(nin_label, NIN_VALUE), Line, Labeled, DIGITS),
                PatternRule::capture("fuzzy", &labeled(nin_fuzzy, NIN_VALUE), Line, Labeled, DIGITS),
                PatternRule::capture("below", &below(nin_label, NIN_VALUE), Window, Labeled, DIGITS),
                PatternRule::capture("any-11-digits", r"\b([0-9]{11})\b", Line, Fallback, NONE)
                    .excluding(is_phone_shaped),
            ],
        ),
    ]
}

/// Ward and unit values legitimately start with their own label word
/// ("Ward 5", "Unit A-1"); any other label at the start is the next field.
fn starts_with_label_other_than(value: &str, own: &[&str]) -> bool {
    let lower = value.to_lowercase();
    if own.iter().any(|word| lower.starts_with(word)) {
        return false;
    }
    starts_with_label(value)
}

fn ward_starts_with_other_label(value: &str) -> bool {
    starts_with_label_other_than(value, &["ward"])
}

fn unit_starts_with_other_label(value: &str) -> bool {
    starts_with_label_other_than(value, &["unit", "polling"])
}
