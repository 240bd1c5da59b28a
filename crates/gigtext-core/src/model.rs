//! Trainable per-field confidence model
//!
//! Maps a normalized token sequence to six independent confidence
//! scores (provider, description, location, date, time, amount).
//! Architecture: embedding lookup -> mean pooling over the sequence ->
//! dense layer to 6 outputs with sigmoid. Multi-label confidence, not a
//! softmax distribution.
//!
//! Trained with binary cross-entropy over per-field presence targets,
//! AdamW at a low learning rate, small batches, and a held-out
//! validation split per retraining pass. Weights persist as a
//! safetensors file via `VarMap::save`/`load`; a missing or unreadable
//! file means "no model yet" and yields a fresh, untrained instance
//! whose predictions are low-confidence noise by construction.

use std::path::Path;

use anyhow::{Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    embedding, linear, loss, ops, AdamW, Embedding, Linear, Module, Optimizer, ParamsAdamW,
    VarBuilder, VarMap,
};
use tracing::{debug, info, warn};

use crate::event::FieldScores;
use crate::normalizer::{self, SEQUENCE_LENGTH};
use crate::vocab::{Vocabulary, MAX_VOCAB_SIZE};

/// Width of each token embedding.
pub const EMBEDDING_DIM: usize = 16;

/// Number of scored fields.
pub const FIELD_COUNT: usize = 6;

const LEARNING_RATE: f64 = 5e-4;
const EPOCHS: usize = 8;
const BATCH_SIZE: usize = 32;
const VALIDATION_SPLIT: f64 = 0.2;

/// One (text, per-field presence targets) pair for retraining.
#[derive(Debug, Clone)]
pub struct TrainingSample {
    pub text: String,
    pub targets: [f32; FIELD_COUNT],
}

pub struct ScoringModel {
    device: Device,
    varmap: VarMap,
    embeddings: Embedding,
    dense: Linear,
    vocab: Vocabulary,
}

impl ScoringModel {
    /// Fresh model with randomly initialized weights over `vocab`.
    pub fn new(vocab: Vocabulary) -> Result<Self> {
        let device = Device::Cpu;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let embeddings = embedding(MAX_VOCAB_SIZE, EMBEDDING_DIM, vb.pp("embeddings"))?;
        let dense = linear(EMBEDDING_DIM, FIELD_COUNT, vb.pp("dense"))?;
        Ok(Self {
            device,
            varmap,
            embeddings,
            dense,
            vocab,
        })
    }

    /// Load persisted weights if present, otherwise keep the fresh
    /// initialization. A load failure is "no model yet", not an error.
    pub fn load_or_new(weights_path: &Path, vocab: Vocabulary) -> Result<Self> {
        let mut model = Self::new(vocab)?;
        if weights_path.exists() {
            match model.varmap.load(weights_path) {
                Ok(()) => info!(path = %weights_path.display(), "loaded scoring model weights"),
                Err(err) => {
                    warn!(path = %weights_path.display(), %err, "failed to load weights, starting fresh");
                }
            }
        } else {
            debug!(path = %weights_path.display(), "no persisted model, starting fresh");
        }
        Ok(model)
    }

    /// Persist current weights. Unlike load, a save failure propagates:
    /// a retrained-but-unpersisted model silently reverts on next load.
    pub fn save(&self, weights_path: &Path) -> Result<()> {
        self.varmap
            .save(weights_path)
            .with_context(|| format!("failed to save model weights to {}", weights_path.display()))
    }

    pub fn vocab(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Per-field confidence scores for a raw text.
    pub fn predict(&self, text: &str) -> Result<FieldScores> {
        let vector = normalizer::to_vector(text, &self.vocab, SEQUENCE_LENGTH);
        self.predict_vector(&vector)
    }

    /// Per-field confidence scores for an already-vectorized input.
    pub fn predict_vector(&self, vector: &[u32]) -> Result<FieldScores> {
        let input = Tensor::from_vec(vector.to_vec(), (1, vector.len()), &self.device)?;
        let logits = self.forward(&input)?;
        let scores = ops::sigmoid(&logits)?.to_vec2::<f32>()?;
        Ok(FieldScores::from_output(&scores[0]))
    }

    fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let embedded = self.embeddings.forward(input)?;
        let pooled = embedded.mean(1)?;
        Ok(self.dense.forward(&pooled)?)
    }

    /// Grow the vocabulary from normalized sample tokens, then run one
    /// batch-retraining pass over all samples.
    ///
    /// New tokens are appended up to the vocabulary cap; embedding rows
    /// are preallocated at `MAX_VOCAB_SIZE`, so growth never resizes or
    /// renumbers anything.
    pub fn retrain(&mut self, samples: &[TrainingSample]) -> Result<()> {
        if samples.is_empty() {
            warn!("retrain called with no samples, skipping");
            return Ok(());
        }
        self.absorb_tokens(samples.iter().map(|s| s.text.as_str()));

        let (inputs, targets) = self.training_tensors(samples)?;
        let held_out = ((samples.len() as f64) * VALIDATION_SPLIT).floor() as usize;
        let train_n = samples.len() - held_out;

        let mut optimizer = AdamW::new(
            self.varmap.all_vars(),
            ParamsAdamW {
                lr: LEARNING_RATE,
                ..Default::default()
            },
        )?;

        info!(
            samples = samples.len(),
            train = train_n,
            validation = held_out,
            epochs = EPOCHS,
            "retraining scoring model"
        );

        for epoch in 0..EPOCHS {
            let mut epoch_loss = 0.0f32;
            let mut batches = 0usize;
            for start in (0..train_n).step_by(BATCH_SIZE) {
                let len = BATCH_SIZE.min(train_n - start);
                let batch_x = inputs.narrow(0, start, len)?;
                let batch_y = targets.narrow(0, start, len)?;
                let logits = self.forward(&batch_x)?;
                let batch_loss = loss::binary_cross_entropy_with_logit(&logits, &batch_y)?;
                optimizer.backward_step(&batch_loss)?;
                epoch_loss += batch_loss.to_scalar::<f32>()?;
                batches += 1;
            }
            let train_loss = epoch_loss / batches.max(1) as f32;
            let val_loss = if held_out > 0 {
                let val_x = inputs.narrow(0, train_n, held_out)?;
                let val_y = targets.narrow(0, train_n, held_out)?;
                let logits = self.forward(&val_x)?;
                Some(loss::binary_cross_entropy_with_logit(&logits, &val_y)?.to_scalar::<f32>()?)
            } else {
                None
            };
            debug!(epoch, train_loss, ?val_loss, "retrain epoch complete");
        }
        info!("retraining complete");
        Ok(())
    }

    fn training_tensors(&self, samples: &[TrainingSample]) -> Result<(Tensor, Tensor)> {
        let mut xs: Vec<u32> = Vec::with_capacity(samples.len() * SEQUENCE_LENGTH);
        let mut ys: Vec<f32> = Vec::with_capacity(samples.len() * FIELD_COUNT);
        for sample in samples {
            xs.extend(normalizer::to_vector(&sample.text, &self.vocab, SEQUENCE_LENGTH));
            ys.extend(sample.targets);
        }
        let inputs = Tensor::from_vec(xs, (samples.len(), SEQUENCE_LENGTH), &self.device)?;
        let targets = Tensor::from_vec(ys, (samples.len(), FIELD_COUNT), &self.device)?;
        Ok((inputs, targets))
    }

    fn absorb_tokens<'a>(&mut self, texts: impl Iterator<Item = &'a str>) {
        for text in texts {
            for token in normalizer::normalize(text).split_whitespace() {
                if self.vocab.insert(token).is_none() {
                    debug!(token, "vocabulary full, token dropped");
                }
            }
        }
    }
}
