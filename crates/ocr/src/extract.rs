use std::borrow::Cow;

use serde::Serialize;
use tracing::debug;
use voterform_core::{DraftRecord, FieldName};

use crate::rules::{form_rules, FieldRule, Scope, Tier};

/// Which rule filled a field, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldHit {
    pub field: FieldName,
    pub rule: &'static str,
    #[serde(skip)]
    pub tier: Tier,
    /// Index into the corpus' non-empty lines.
    pub line: usize,
    pub value: String,
}

/// Turns a recognized-text corpus into a best-effort [`DraftRecord`].
///
/// A single deterministic sweep per field: labeled patterns over every line
/// first, fallback patterns only if nothing labeled matched. The first
/// accepted candidate wins and is never overwritten.
#[derive(Debug, Clone)]
pub struct Extractor {
    rules: Cow<'static, [FieldRule]>,
    context_window: bool,
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new()
    }
}

impl Extractor {
    /// Built-in form rules, context-aware.
    pub fn new() -> Self {
        Self {
            rules: Cow::Borrowed(form_rules()),
            context_window: true,
        }
    }

    pub fn with_rules(rules: Vec<FieldRule>) -> Self {
        Self {
            rules: Cow::Owned(rules),
            context_window: true,
        }
    }

    /// When disabled, window-scoped patterns are skipped and every line is
    /// read on its own.
    pub fn context_window(mut self, enabled: bool) -> Self {
        self.context_window = enabled;
        self
    }

    pub fn extract(&self, corpus: &str) -> DraftRecord {
        self.extract_with_trace(corpus).0
    }

    pub fn extract_with_trace(&self, corpus: &str) -> (DraftRecord, Vec<FieldHit>) {
        let lines: Vec<&str> = corpus
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let windows: Vec<String> = if self.context_window {
            (0..lines.len()).map(|i| window(&lines, i)).collect()
        } else {
            Vec::new()
        };

        let mut draft = DraftRecord::new();
        let mut hits = Vec::new();
        for rule in self.rules.iter() {
            if let Some(hit) = self.first_hit(rule, &lines, &windows) {
                draft.fill(hit.field, &hit.value);
                debug!(field = %hit.field, rule = hit.rule, line = hit.line, "field extracted");
                hits.push(hit);
            }
        }
        (draft, hits)
    }

    fn first_hit(&self, rule: &FieldRule, lines: &[&str], windows: &[String]) -> Option<FieldHit> {
        for tier in [Tier::Labeled, Tier::Fallback] {
            for (index, line) in lines.iter().enumerate() {
                for pattern in rule.tier(tier) {
                    let text = match pattern.scope {
                        Scope::Line => *line,
                        Scope::Window if self.context_window => windows[index].as_str(),
                        Scope::Window => continue,
                    };
                    if let Some(value) = pattern.candidates(text).into_iter().next() {
                        return Some(FieldHit {
                            field: rule.field,
                            rule: pattern.name,
                            tier,
                            line: index,
                            value,
                        });
                    }
                }
            }
        }
        None
    }
}

/// The line at `index` plus its immediate neighbours, joined with `\n`.
fn window(lines: &[&str], index: usize) -> String {
    let start = index.saturating_sub(1);
    let end = (index + 2).min(lines.len());
    lines[start..end].join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Cleanup, PatternRule};

    const FORM: &str = "Surname: OKORO\nFirst Name: Ada\nPhone: 08098765432\nNIN: 12345678903\nWard: Ward 5\nUnit: Unit A-1\nGender: Female";

    #[test]
    fn extracts_complete_form() {
        let d = Extractor::new().extract(FORM);
        assert_eq!(d.surname, "OKORO");
        assert_eq!(d.firstname, "Ada");
        assert_eq!(d.middlename, "");
        assert_eq!(d.phonenumber, "08098765432");
        assert_eq!(d.applicationnumber, "");
        assert_eq!(d.dateofbirth, "");
        assert_eq!(d.gender, "Female");
        assert_eq!(d.ward, "Ward 5");
        assert_eq!(d.unit, "Unit A-1");
        assert_eq!(d.nin, "12345678903");
    }

    #[test]
    fn first_match_wins() {
        let d = Extractor::new().extract("Surname: OKORO\nSurname: BELLO");
        assert_eq!(d.surname, "OKORO");
    }

    #[test]
    fn female_is_not_read_as_male() {
        let d = Extractor::new().extract("Female applicant");
        assert_eq!(d.gender, "Female");
    }

    #[test]
    fn label_on_the_line_above() {
        let corpus = "Surname:\nOKORO\nDate of Birth\n12/05/1990\nPhone Number\n0809 876 5432";
        let d = Extractor::new().extract(corpus);
        assert_eq!(d.surname, "OKORO");
        assert_eq!(d.dateofbirth, "12/05/1990");
        assert_eq!(d.phonenumber, "08098765432");
    }

    #[test]
    fn line_only_mode_ignores_neighbours() {
        let corpus = "Surname:\nOKORO";
        assert_eq!(Extractor::new().context_window(false).extract(corpus).surname, "");
        assert_eq!(Extractor::new().extract(corpus).surname, "OKORO");
    }

    #[test]
    fn nin_fallback_skips_phone_numbers() {
        let d = Extractor::new().extract("Tel 08031234567\nref 08098765432 then 12345678903");
        assert_eq!(d.phonenumber, "08031234567");
        assert_eq!(d.nin, "12345678903");
    }

    #[test]
    fn labeled_nin_beats_an_earlier_unlabeled_run() {
        let (d, hits) = Extractor::new().extract_with_trace("12345678901\nNIN: 12345678903");
        assert_eq!(d.nin, "12345678903");
        let hit = hits.iter().find(|h| h.field == FieldName::Nin).unwrap();
        assert_eq!(hit.tier, Tier::Labeled);
        assert_eq!(hit.line, 1);
    }

    #[test]
    fn joined_passes_are_cut_at_labels() {
        // Two passes combined with a space end up on one line.
        let corpus = "Surname: OKORO First Name: Ada Gender: Male Ward: Ward 12 Unit: Unit B-3";
        let d = Extractor::new().extract(corpus);
        assert_eq!(d.surname, "OKORO");
        assert_eq!(d.firstname, "Ada");
        assert_eq!(d.gender, "Male");
        assert_eq!(d.ward, "Ward 12");
        assert_eq!(d.unit, "Unit B-3");
    }

    #[test]
    fn empty_corpus_gives_empty_draft() {
        let (d, hits) = Extractor::new().extract_with_trace("");
        assert!(d.is_empty());
        assert!(hits.is_empty());
        assert!(Extractor::new().extract(" \n\n  ").is_empty());
    }

    #[test]
    fn trace_names_the_rule() {
        let (_, hits) = Extractor::new().extract_with_trace("Sumame: BELLO");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].field, FieldName::Surname);
        assert_eq!(hits[0].rule, "fuzzy");
        assert_eq!(hits[0].value, "BELLO");
    }

    #[test]
    fn custom_rule_table() {
        let rules = vec![FieldRule::new(
            FieldName::Ward,
            vec![PatternRule::capture(
                "registration-area",
                r"(?i)\bRA\s*[:]\s*([A-Za-z0-9 ]+)",
                Scope::Line,
                Tier::Labeled,
                &[Cleanup::Uppercase],
            )],
        )];
        let d = Extractor::with_rules(rules).extract("Surname: OKORO\nRA: ward 9");
        assert_eq!(d.ward, "WARD 9");
        assert_eq!(d.surname, "");
    }
}
