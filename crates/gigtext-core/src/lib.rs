//! gigtext-core: event-text extraction and learning pipeline
//!
//! This crate provides:
//! - Regex-based field extraction for Spanish gig announcements
//! - A small trainable scoring model (embedding + pooling + dense) that
//!   gates which extracted fields are trusted
//! - Historical-context reconciliation against the user's past events
//! - A correction-driven feedback loop with periodic batch retraining
//! - SQLite persistence for training examples and vocabulary, with
//!   model weights in a sibling safetensors file

pub mod context;
pub mod event;
pub mod fallback;
pub mod gate;
pub mod model;
pub mod normalizer;
pub mod parser;
pub mod patterns;
pub mod remote;
pub mod storage;
pub mod training;
pub mod vocab;

// Re-exports
pub use context::HistoricalContext;
pub use event::{Amount, FieldScores, HistoricalEventSummary, ParsedEventData};
pub use gate::GateThresholds;
pub use model::{ScoringModel, TrainingSample, EMBEDDING_DIM, FIELD_COUNT};
pub use normalizer::{normalize, to_vector, tokenize, SEQUENCE_LENGTH};
pub use parser::{EventParser, PARSE_ERROR_MESSAGE};
pub use patterns::{extract, FieldCandidates};
pub use remote::{FallbackExtractor, HttpFallback};
pub use storage::{Store, TrainingExample};
pub use training::{calculate_reward, TrainLock, RETRAIN_THRESHOLD};
pub use vocab::{Vocabulary, MAX_VOCAB_SIZE};
