use crate::types::{PassOutcome, PassReport};

/// Join the text of every recognized pass with a single space, in the order
/// given. Timed-out, failed and cancelled passes contribute nothing; if none
/// succeeded the result is empty.
pub fn combine<'a, I>(outcomes: I) -> String
where
    I: IntoIterator<Item = &'a PassOutcome>,
{
    outcomes
        .into_iter()
        .filter_map(PassOutcome::text)
        .collect::<Vec<_>>()
        .join(" ")
}

/// [`combine`] over dispatcher reports, which are already in pass order.
pub fn combine_reports(reports: &[PassReport]) -> String {
    combine(reports.iter().map(|r| &r.outcome))
}
