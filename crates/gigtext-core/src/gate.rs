//! Confidence gating
//!
//! Combines pattern-extracted candidates with the scoring model's
//! per-field confidence: a candidate survives only if its score meets
//! the field's threshold. Pattern match success alone is necessary but
//! never sufficient — with an untrained model the gate rejects by
//! default, which is the safe direction.
//!
//! Exception: "hoy"/"mañana" are unambiguous lexical cues, so a date
//! rejected (or missed) by the gate gets one ungated relative-day pass.

use chrono::NaiveDate;

use crate::event::{Amount, FieldScores, ParsedEventData};
use crate::patterns::{interpret_relative_day, FieldCandidates};

/// Per-field acceptance thresholds. Tunable; 0.5 everywhere by default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateThresholds {
    pub provider: f32,
    pub description: f32,
    pub location: f32,
    pub date: f32,
    pub time: f32,
    pub amount: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            provider: 0.5,
            description: 0.5,
            location: 0.5,
            date: 0.5,
            time: 0.5,
            amount: 0.5,
        }
    }
}

/// Pure threshold comparison: keep each candidate iff its score meets
/// the field's threshold, otherwise null the field.
pub fn apply(
    candidates: FieldCandidates,
    scores: &FieldScores,
    thresholds: &GateThresholds,
) -> ParsedEventData {
    ParsedEventData {
        provider: gated(candidates.provider, scores.provider, thresholds.provider),
        description: gated(
            candidates.description,
            scores.description,
            thresholds.description,
        ),
        location: gated(candidates.location, scores.location, thresholds.location),
        date: gated(candidates.date, scores.date, thresholds.date),
        time: gated(candidates.time, scores.time, thresholds.time),
        amount: candidates
            .amount
            .filter(|_| scores.amount >= thresholds.amount)
            .map(Amount::new),
        error: false,
        message: None,
    }
}

fn gated(candidate: Option<String>, score: f32, threshold: f32) -> Option<String> {
    candidate.filter(|_| score >= threshold)
}

/// Secondary, ungated date pass: if the gate left the date absent and
/// the raw text carries a relative-day cue, adopt it directly.
pub fn rescue_date(data: &mut ParsedEventData, text: &str, today: NaiveDate) {
    if data.date.is_none() {
        data.date = interpret_relative_day(text, today);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates() -> FieldCandidates {
        FieldCandidates {
            provider: Some("Juan Pérez".into()),
            description: Some("lobby".into()),
            location: Some("hotel plaza".into()),
            date: Some("2025-06-13".into()),
            time: Some("19:00".into()),
            amount: Some(5000.0),
        }
    }

    #[test]
    fn test_low_scores_reject_everything() {
        let data = apply(
            candidates(),
            &FieldScores::uniform(0.1),
            &GateThresholds::default(),
        );
        assert_eq!(data, ParsedEventData::default());
    }

    #[test]
    fn test_high_scores_keep_everything() {
        let data = apply(
            candidates(),
            &FieldScores::uniform(0.9),
            &GateThresholds::default(),
        );
        assert_eq!(data.provider.as_deref(), Some("Juan Pérez"));
        assert_eq!(data.amount, Some(Amount::new(5000.0)));
        assert_eq!(data.date.as_deref(), Some("2025-06-13"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let data = apply(
            candidates(),
            &FieldScores::uniform(0.5),
            &GateThresholds::default(),
        );
        assert!(data.provider.is_some());
    }

    #[test]
    fn test_gate_is_monotone_in_score() {
        let thresholds = GateThresholds::default();
        let mut last_present = false;
        for step in 0..=10 {
            let score = step as f32 / 10.0;
            let data = apply(candidates(), &FieldScores::uniform(score), &thresholds);
            let present = data.provider.is_some();
            // Raising the score can only flip absent -> present
            assert!(present || !last_present || score < thresholds.provider);
            if present {
                last_present = true;
            }
        }
        assert!(last_present);
    }

    #[test]
    fn test_mixed_scores_gate_independently() {
        let scores = FieldScores {
            provider: 0.9,
            description: 0.1,
            location: 0.9,
            date: 0.1,
            time: 0.9,
            amount: 0.1,
        };
        let data = apply(candidates(), &scores, &GateThresholds::default());
        assert!(data.provider.is_some());
        assert!(data.description.is_none());
        assert!(data.location.is_some());
        assert!(data.date.is_none());
        assert!(data.time.is_some());
        assert!(data.amount.is_none());
    }

    #[test]
    fn test_rescue_date_only_when_absent() {
        let today = chrono::NaiveDate::from_ymd_opt(2025, 6, 11).unwrap();
        let mut data = ParsedEventData::default();
        rescue_date(&mut data, "nos vemos mañana", today);
        assert_eq!(data.date.as_deref(), Some("2025-06-12"));

        let mut data = ParsedEventData::default();
        data.date = Some("2025-01-01".into());
        rescue_date(&mut data, "nos vemos mañana", today);
        assert_eq!(data.date.as_deref(), Some("2025-01-01"));
    }
}
