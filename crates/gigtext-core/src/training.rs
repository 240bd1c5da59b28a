//! Reward computation and retrain scheduling primitives
//!
//! A user correction becomes a `TrainingExample` whose reward is a
//! weighted per-field similarity between prediction and correction.
//! String fields use a character-overlap similarity; the amount is
//! exact equality. Weights favor provider and description, the fields
//! users care most about getting right.
//!
//! Retraining is batch-over-full-history, triggered once the number of
//! examples accumulated since the last completed pass reaches
//! `RETRAIN_THRESHOLD`. At most one pass runs at a time: `TrainLock` is
//! a single atomic flag, checked-and-set before any training work and
//! released by a drop guard on every exit path. A request that loses
//! the race is dropped, not queued.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::event::ParsedEventData;
use crate::model::FIELD_COUNT;

/// New-example count that triggers a retraining pass.
pub const RETRAIN_THRESHOLD: usize = 5;

/// Per-field reward weights; normalized over their sum when combined.
const REWARD_WEIGHTS: [(Field, f64); FIELD_COUNT] = [
    (Field::Provider, 0.4),
    (Field::Description, 0.3),
    (Field::Location, 0.2),
    (Field::Date, 0.1),
    (Field::Time, 0.05),
    (Field::Amount, 0.05),
];

#[derive(Debug, Clone, Copy)]
enum Field {
    Provider,
    Description,
    Location,
    Date,
    Time,
    Amount,
}

/// Scalar reward in [0, 1] summarizing how close a prediction came to
/// the user's correction. Equal records score exactly 1.
pub fn calculate_reward(prediction: &ParsedEventData, correction: &ParsedEventData) -> f64 {
    let mut total = 0.0;
    let mut weight_sum = 0.0;
    for (field, weight) in REWARD_WEIGHTS {
        total += weight * field_similarity(field, prediction, correction);
        weight_sum += weight;
    }
    (total / weight_sum).clamp(0.0, 1.0)
}

fn field_similarity(field: Field, prediction: &ParsedEventData, correction: &ParsedEventData) -> f64 {
    match field {
        Field::Amount => match (prediction.amount_value(), correction.amount_value()) {
            (Some(a), Some(b)) if a == b => 1.0,
            (Some(_), Some(_)) => 0.0,
            (None, None) => 1.0,
            _ => 0.0,
        },
        _ => {
            let (a, b) = match field {
                Field::Provider => (&prediction.provider, &correction.provider),
                Field::Description => (&prediction.description, &correction.description),
                Field::Location => (&prediction.location, &correction.location),
                Field::Date => (&prediction.date, &correction.date),
                Field::Time => (&prediction.time, &correction.time),
                Field::Amount => unreachable!(),
            };
            match (a, b) {
                (Some(a), Some(b)) => string_similarity(a, b),
                (None, None) => 1.0,
                _ => 0.0,
            }
        }
    }
}

/// Order-insensitive character-overlap similarity: the share of
/// predicted characters that also appear anywhere in the correction,
/// over the longer string's length. Common function words are dropped
/// first so "en el lobby" and "lobby" compare as equals.
pub fn string_similarity(a: &str, b: &str) -> f64 {
    let a = drop_function_words(a);
    let b = drop_function_words(b);
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let common = a.chars().filter(|c| b.contains(*c)).count();
    common as f64 / a.chars().count().max(b.chars().count()) as f64
}

fn drop_function_words(s: &str) -> String {
    s.to_lowercase()
        .split_whitespace()
        .filter(|w| !matches!(*w, "en" | "de" | "la" | "el"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Per-field presence indicators used as training targets, in the
/// model's fixed output order.
pub fn presence_targets(correction: &ParsedEventData) -> [f32; FIELD_COUNT] {
    fn present(p: bool) -> f32 {
        if p {
            1.0
        } else {
            0.0
        }
    }
    [
        present(correction.provider.is_some()),
        present(correction.description.is_some()),
        present(correction.location.is_some()),
        present(correction.date.is_some()),
        present(correction.time.is_some()),
        present(correction.amount_value().is_some()),
    ]
}

/// Single-flag mutual exclusion for retraining: Idle <-> Training.
///
/// `try_acquire` is the Idle -> Training transition and fails (returns
/// None) when already Training; dropping the guard is the guaranteed
/// Training -> Idle transition.
#[derive(Debug, Default)]
pub struct TrainLock {
    training: AtomicBool,
}

impl TrainLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt the Idle -> Training transition.
    pub fn try_acquire(&self) -> Option<TrainGuard<'_>> {
        self.training
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| TrainGuard { lock: self })
    }

    pub fn is_training(&self) -> bool {
        self.training.load(Ordering::Relaxed)
    }
}

/// Held for the duration of a retraining pass; releases on drop
/// regardless of success or failure.
pub struct TrainGuard<'a> {
    lock: &'a TrainLock,
}

impl Drop for TrainGuard<'_> {
    fn drop(&mut self) {
        self.lock.training.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Amount;

    fn record(provider: &str, amount: f64) -> ParsedEventData {
        ParsedEventData {
            provider: Some(provider.into()),
            description: Some("lobby".into()),
            location: Some("Hotel Plaza".into()),
            date: Some("2025-06-13".into()),
            time: Some("19:00".into()),
            amount: Some(Amount::new(amount)),
            ..Default::default()
        }
    }

    #[test]
    fn test_identical_records_score_one() {
        let r = record("Juan Pérez", 5000.0);
        assert_eq!(calculate_reward(&r, &r), 1.0);
    }

    #[test]
    fn test_empty_records_score_one() {
        // Agreeing that every field is unknown is still agreement
        let empty = ParsedEventData::default();
        assert_eq!(calculate_reward(&empty, &empty), 1.0);
    }

    #[test]
    fn test_reward_bounded_for_arbitrary_pairs() {
        let pairs = [
            (record("Juan", 5000.0), record("Maria Elena", 300.0)),
            (record("x", 1.0), ParsedEventData::default()),
            (ParsedEventData::default(), record("Juan", 0.0)),
        ];
        for (p, c) in &pairs {
            let reward = calculate_reward(p, c);
            assert!((0.0..=1.0).contains(&reward), "reward {reward} out of range");
        }
    }

    #[test]
    fn test_wrong_amount_lowers_reward() {
        let p = record("Juan", 5000.0);
        let c = record("Juan", 6000.0);
        let reward = calculate_reward(&p, &c);
        assert!(reward < 1.0);
        assert!(reward > 0.9, "amount carries low weight, got {reward}");
    }

    #[test]
    fn test_string_similarity() {
        assert_eq!(string_similarity("lobby", "lobby"), 1.0);
        assert_eq!(string_similarity("en el lobby", "lobby"), 1.0);
        assert_eq!(string_similarity("", "algo"), 0.0);
        let s = string_similarity("juan", "juana maria");
        assert!(s > 0.0 && s < 1.0);
    }

    #[test]
    fn test_presence_targets() {
        let mut r = ParsedEventData::default();
        r.provider = Some("Juan".into());
        r.amount = Some(Amount::new(5000.0));
        assert_eq!(presence_targets(&r), [1.0, 0.0, 0.0, 0.0, 0.0, 1.0]);
        // An amount wrapper with no value is not a present amount
        r.amount = Some(Amount { value: None });
        assert_eq!(presence_targets(&r), [1.0, 0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_lock_rejects_second_acquire() {
        let lock = TrainLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_training());
        assert!(lock.try_acquire().is_none());
        drop(guard);
        assert!(!lock.is_training());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_concurrent_acquire_admits_exactly_one() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Barrier};

        let lock = Arc::new(TrainLock::new());
        let barrier = Arc::new(Barrier::new(8));
        let admitted = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let barrier = Arc::clone(&barrier);
                let admitted = Arc::clone(&admitted);
                std::thread::spawn(move || {
                    barrier.wait();
                    if let Some(_guard) = lock.try_acquire() {
                        admitted.fetch_add(1, Ordering::SeqCst);
                        // Hold the guard long enough that the others race it
                        std::thread::sleep(std::time::Duration::from_millis(20));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert!(!lock.is_training());
    }
}
