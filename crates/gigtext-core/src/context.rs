//! Historical-context reconciliation
//!
//! The user's past events are the closest thing the pipeline has to
//! ground truth: freshly extracted text is noisy, history is not. A
//! present field is corrected to a matching historical value (exact or
//! substring match, case-insensitive, historical casing wins). An
//! absent field can be filled from history when the raw text contains a
//! known value; an absent provider additionally defaults to the most
//! recent historical provider — most gigs are with a recurring client,
//! a deliberate bias that can misfire for genuinely new providers.
//!
//! Location and description are never defaulted without textual
//! evidence; they are only corrected or substring-filled.

use tracing::debug;

use crate::event::{HistoricalEventSummary, ParsedEventData};
use crate::normalizer::strip_diacritics;

/// Distinct per-field values from the user's past events, most recent
/// first. Derived on demand per parse; never persisted.
#[derive(Debug, Clone, Default)]
pub struct HistoricalContext {
    pub provider: Vec<String>,
    pub location: Vec<String>,
    pub description: Vec<String>,
}

impl HistoricalContext {
    /// Build from past events, assumed ordered most recent first.
    /// Values are deduplicated case-insensitively, keeping the casing
    /// of their first (most recent) occurrence.
    pub fn from_events(events: &[HistoricalEventSummary]) -> Self {
        let mut ctx = Self::default();
        for event in events {
            push_distinct(&mut ctx.provider, event.provider.as_deref());
            push_distinct(&mut ctx.location, event.location.as_deref());
            push_distinct(&mut ctx.description, event.description.as_deref());
        }
        ctx
    }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
    let Some(value) = value else { return };
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if !values.iter().any(|v| v.eq_ignore_ascii_case(value)) {
        values.push(value.to_string());
    }
}

/// Cross-reference gated fields against history, correcting near-misses
/// and filling gaps the raw text supports.
pub fn reconcile(data: &mut ParsedEventData, events: &[HistoricalEventSummary], text: &str) {
    let ctx = HistoricalContext::from_events(events);
    let folded_text = fold(text);

    data.provider = reconcile_field(data.provider.take(), &ctx.provider, &folded_text);
    data.location = reconcile_field(data.location.take(), &ctx.location, &folded_text);
    data.description = reconcile_field(data.description.take(), &ctx.description, &folded_text);

    // Recurring-client default, for provider only
    if data.provider.is_none() {
        if let Some(recent) = ctx.provider.first() {
            debug!(provider = %recent, "defaulting provider to most recent historical value");
            data.provider = Some(recent.clone());
        }
    }
}

fn reconcile_field(
    extracted: Option<String>,
    historical: &[String],
    folded_text: &str,
) -> Option<String> {
    match extracted {
        Some(value) => {
            let folded = fold(&value);
            let correction = historical.iter().find(|h| {
                let h_folded = fold(h);
                h_folded == folded || h_folded.contains(&folded) || folded.contains(&h_folded)
            });
            match correction {
                Some(h) => Some(h.clone()),
                None => Some(value),
            }
        }
        // No gated value: adopt a historical value only if the raw
        // text itself mentions it
        None => historical
            .iter()
            .find(|h| folded_text.contains(&fold(h)))
            .cloned(),
    }
}

fn fold(text: &str) -> String {
    strip_diacritics(text).to_lowercase()
}
