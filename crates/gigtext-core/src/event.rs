//! Event record types shared across the pipeline
//!
//! `ParsedEventData` is the pipeline's output contract: six independently
//! nullable fields plus an in-band error flag. A field is either
//! "confidently known" or absent; the record is never partially invalid.

use serde::{Deserialize, Serialize};

/// Extracted monetary amount.
///
/// Wrapped in its own struct so that "extracted zero" stays
/// distinguishable from "not extracted".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    pub value: Option<f64>,
}

impl Amount {
    pub fn new(value: f64) -> Self {
        Self { value: Some(value) }
    }
}

/// Structured event record produced by the pipeline.
///
/// Every field is independently nullable; no field's presence implies
/// another's. `error`/`message` are set only when the whole pipeline
/// fails unrecoverably, in which case all fields are absent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ParsedEventData {
    /// Person or company the event is with.
    pub provider: Option<String>,
    /// Free-text venue-area descriptor ("lobby", "terraza Maria").
    pub description: Option<String>,
    /// Venue name.
    pub location: Option<String>,
    /// ISO `YYYY-MM-DD`.
    pub date: Option<String>,
    /// 24-hour `HH:MM`.
    pub time: Option<String>,
    pub amount: Option<Amount>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl ParsedEventData {
    /// Total-failure record: all fields absent, error flag set.
    pub fn error_response(message: impl Into<String>) -> Self {
        Self {
            error: true,
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Numeric amount value, if one was extracted.
    pub fn amount_value(&self) -> Option<f64> {
        self.amount.and_then(|a| a.value)
    }
}

/// Per-field confidence scores reported by the scoring model.
///
/// A named struct rather than a positional array so the model's output
/// order cannot silently drift from downstream consumers.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FieldScores {
    pub provider: f32,
    pub description: f32,
    pub location: f32,
    pub date: f32,
    pub time: f32,
    pub amount: f32,
}

impl FieldScores {
    /// Uniform score across all six fields (handy in tests).
    pub fn uniform(score: f32) -> Self {
        Self {
            provider: score,
            description: score,
            location: score,
            date: score,
            time: score,
            amount: score,
        }
    }

    /// Build from the model's fixed output order:
    /// provider, description, location, date, time, amount.
    pub fn from_output(out: &[f32]) -> Self {
        debug_assert_eq!(out.len(), 6, "model must emit exactly 6 scores");
        Self {
            provider: out.first().copied().unwrap_or(0.0),
            description: out.get(1).copied().unwrap_or(0.0),
            location: out.get(2).copied().unwrap_or(0.0),
            date: out.get(3).copied().unwrap_or(0.0),
            time: out.get(4).copied().unwrap_or(0.0),
            amount: out.get(5).copied().unwrap_or(0.0),
        }
    }
}

/// Summary of one of the user's past events, read from the external
/// event store. All fields optional; validated at context building.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalEventSummary {
    pub provider: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub amount: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_has_no_fields() {
        let r = ParsedEventData::error_response("boom");
        assert!(r.error);
        assert_eq!(r.message.as_deref(), Some("boom"));
        assert!(r.provider.is_none());
        assert!(r.amount.is_none());
    }

    #[test]
    fn test_amount_zero_is_extracted() {
        let mut r = ParsedEventData::default();
        r.amount = Some(Amount::new(0.0));
        assert_eq!(r.amount_value(), Some(0.0));
    }

    #[test]
    fn test_scores_from_output_order() {
        let s = FieldScores::from_output(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(s.provider, 0.1);
        assert_eq!(s.amount, 0.6);
    }

    #[test]
    fn test_serde_round_trip() {
        let mut r = ParsedEventData::default();
        r.provider = Some("Juan".into());
        r.amount = Some(Amount::new(5000.0));
        let json = serde_json::to_string(&r).unwrap();
        let back: ParsedEventData = serde_json::from_str(&json).unwrap();
        assert_eq!(r, back);
    }
}
