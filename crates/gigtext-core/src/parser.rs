//! Pipeline orchestration
//!
//! `EventParser` wires the stages together in strict order: normalize ->
//! {pattern extraction, model scoring} -> confidence gate -> context
//! reconciliation -> fallback resolvers. Parsing is a pure function of
//! the input text plus the current model/vocabulary snapshot; `learn`
//! is the only mutating entry point.
//!
//! The parser is an explicitly constructed value, not a process-wide
//! singleton: tests build isolated instances over in-memory stores with
//! independent vocabularies.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::context;
use crate::event::{HistoricalEventSummary, ParsedEventData};
use crate::fallback;
use crate::gate::{self, GateThresholds};
use crate::model::{ScoringModel, TrainingSample};
use crate::patterns;
use crate::remote::FallbackExtractor;
use crate::storage::{Store, TrainingExample};
use crate::training::{self, TrainLock, RETRAIN_THRESHOLD};
use crate::vocab::MAX_VOCAB_SIZE;

/// The one user-visible failure message; everything milder is just an
/// absent field.
pub const PARSE_ERROR_MESSAGE: &str = "No se pudo procesar el texto automáticamente.";

pub struct EventParser {
    model: ScoringModel,
    store: Store,
    thresholds: GateThresholds,
    train_lock: TrainLock,
}

impl EventParser {
    /// Open the persisted pipeline under `data_dir`: vocabulary and
    /// weights are loaded if present, otherwise a fresh model starts.
    pub fn open(data_dir: &std::path::Path) -> Result<Self> {
        let store = Store::open(data_dir)?;
        Self::with_store(store)
    }

    /// Build over an existing store (in-memory in tests).
    pub fn with_store(store: Store) -> Result<Self> {
        let vocab = store.load_vocabulary(MAX_VOCAB_SIZE)?;
        let model = ScoringModel::load_or_new(store.weights_path(), vocab)?;
        Ok(Self {
            model,
            store,
            thresholds: GateThresholds::default(),
            train_lock: TrainLock::new(),
        })
    }

    pub fn thresholds_mut(&mut self) -> &mut GateThresholds {
        &mut self.thresholds
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn model(&self) -> &ScoringModel {
        &self.model
    }

    /// Parse free-form gig text into a structured event record.
    ///
    /// Never fails at the type level: an unrecoverable pipeline error
    /// yields the in-band error record with every field absent.
    /// `history` is the user's past events, most recent first; `today`
    /// anchors relative dates.
    pub fn parse(
        &self,
        text: &str,
        history: &[HistoricalEventSummary],
        today: NaiveDate,
    ) -> ParsedEventData {
        match self.parse_inner(text, history, today) {
            Ok(data) => data,
            Err(err) => {
                warn!(%err, "pipeline failed unrecoverably");
                ParsedEventData::error_response(PARSE_ERROR_MESSAGE)
            }
        }
    }

    fn parse_inner(
        &self,
        text: &str,
        history: &[HistoricalEventSummary],
        today: NaiveDate,
    ) -> Result<ParsedEventData> {
        if text.trim().is_empty() {
            bail!("empty input text");
        }

        let candidates = patterns::extract(text, today);
        let scores = self.model.predict(text)?;
        debug!(?scores, "model confidence");

        let mut data = gate::apply(candidates, &scores, &self.thresholds);
        gate::rescue_date(&mut data, text, today);
        context::reconcile(&mut data, history, text);
        fallback::fallback_amount(&mut data, text);
        fallback::title_case_fields(&mut data);
        Ok(data)
    }

    /// Bootstrap/alternate path: ask the remote extractor first and use
    /// its result as a pseudo-label with reward 1. Any remote failure
    /// is "no result" and falls through to the local pipeline.
    pub fn parse_with_fallback(
        &mut self,
        text: &str,
        history: &[HistoricalEventSummary],
        today: NaiveDate,
        remote: &dyn FallbackExtractor,
    ) -> ParsedEventData {
        match remote.extract(text) {
            Ok(parsed) if !parsed.error => {
                if let Err(err) = self.record_pseudo_label(text, &parsed) {
                    warn!(%err, "failed to record bootstrap example");
                }
                parsed
            }
            Ok(_) => self.parse(text, history, today),
            Err(err) => {
                warn!(%err, "remote fallback unavailable, using local pipeline");
                self.parse(text, history, today)
            }
        }
    }

    fn record_pseudo_label(&mut self, text: &str, parsed: &ParsedEventData) -> Result<()> {
        self.store.add_example(&TrainingExample {
            text: text.to_string(),
            prediction: parsed.clone(),
            correction: parsed.clone(),
            reward: 1.0,
            timestamp: chrono::Utc::now(),
        })?;
        self.maybe_retrain()
    }

    /// Record a user correction and retrain once enough new examples
    /// have accumulated.
    ///
    /// Fails fast on malformed input; the prediction/correction records
    /// are required by the signature, so the remaining malformed case
    /// is an empty original text.
    pub fn learn(
        &mut self,
        original_text: &str,
        correction: &ParsedEventData,
        prediction: &ParsedEventData,
    ) -> Result<()> {
        if original_text.trim().is_empty() {
            bail!("incomplete training input: original text is empty");
        }
        let reward = training::calculate_reward(prediction, correction);
        debug!(reward, "recording correction");
        self.store.add_example(&TrainingExample {
            text: original_text.to_string(),
            prediction: prediction.clone(),
            correction: correction.clone(),
            reward,
            timestamp: chrono::Utc::now(),
        })?;
        self.maybe_retrain()
    }

    /// Retrain over the full example history when the threshold of new
    /// examples is reached. A request that arrives while another pass
    /// holds the lock is dropped with a warning, not queued; the next
    /// `learn` call will retry.
    fn maybe_retrain(&mut self) -> Result<()> {
        let count = self.store.example_count()?;
        let trained_through = self.store.trained_through()?;
        if count.saturating_sub(trained_through) < RETRAIN_THRESHOLD {
            return Ok(());
        }

        let Some(_guard) = self.train_lock.try_acquire() else {
            warn!("retraining already in progress, dropping request");
            return Ok(());
        };

        let examples = self.store.load_examples()?;
        let samples: Vec<TrainingSample> = examples
            .iter()
            .map(|e| TrainingSample {
                text: e.text.clone(),
                targets: training::presence_targets(&e.correction),
            })
            .collect();

        self.model.retrain(&samples)?;
        // Vocabulary first: weights without their token indices are
        // worse than no weights at all
        self.store.save_vocabulary(self.model.vocab())?;
        self.model.save(self.store.weights_path())?;
        self.store.set_trained_through(count)?;
        Ok(())
    }

    /// Drop every training example, the vocabulary, and the persisted
    /// weights. The in-memory model keeps its current state until the
    /// parser is reconstructed.
    pub fn clear_training_data(&self) -> Result<()> {
        self.store.clear_all()
    }
}
