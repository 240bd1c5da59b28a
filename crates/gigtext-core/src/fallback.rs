//! Deterministic last-resort resolvers
//!
//! Run after gating and reconciliation. The amount fallback hunts the
//! leftover tokens for a plausible fee when nothing was confidently
//! extracted; title-casing is a final cosmetic pass over the three
//! free-text fields.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use crate::event::{Amount, ParsedEventData};
use crate::normalizer::title_case;

static ALL_DIGITS_4PLUS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4,}$").expect("valid regex"));

/// Recover an amount from leftover tokens.
///
/// Only runs when no amount was extracted at all — an explicit small
/// regex match (sub-1000) is tolerated as-is, but when nothing was
/// found we only trust leftovers of at least four digits. Tokens
/// already claimed by recognized fields are skipped.
pub fn fallback_amount(data: &mut ParsedEventData, text: &str) {
    if data.amount_value().is_some() {
        return;
    }

    let claimed: Vec<String> = [
        data.provider.as_deref(),
        data.location.as_deref(),
        data.date.as_deref(),
        data.time.as_deref(),
        data.description.as_deref(),
    ]
    .into_iter()
    .flatten()
    .flat_map(str::split_whitespace)
    .map(str::to_lowercase)
    .collect();

    for token in text.split(|c: char| c.is_whitespace() || c == ',') {
        if token.is_empty() || claimed.contains(&token.to_lowercase()) {
            continue;
        }
        let candidate = token.trim_start_matches('$');
        if ALL_DIGITS_4PLUS.is_match(candidate) {
            if let Ok(value) = candidate.parse::<f64>() {
                debug!(token, value, "amount recovered from leftover token");
                data.amount = Some(Amount::new(value));
                return;
            }
        }
    }
}

/// Final cosmetic pass: each word of provider/location/description gets
/// its first letter capitalized and the rest lowered.
pub fn title_case_fields(data: &mut ParsedEventData) {
    for field in [&mut data.provider, &mut data.location, &mut data.description] {
        if let Some(value) = field.as_deref() {
            *field = Some(title_case(value));
        }
    }
}
