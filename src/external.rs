//! Contracts with the collaborators the registry does not implement: the
//! relational tender store, the training routine and the inference-time text
//! pipeline.

use crate::core::model::{LinearClassifier, Vectorizer};
use crate::core::types::{Label, TenderId, TenderRecord};
use crate::core::vocabulary::VocabularyEditSet;
use crate::error::TenderError;
use std::collections::BTreeSet;
use thiserror::Error;

/// Failure reported by the tender store.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct StoreError(pub String);

impl From<StoreError> for TenderError {
    fn from(err: StoreError) -> Self {
        TenderError::StoreUnavailable(err.0)
    }
}

/// Failure reported by the trainer.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TrainError(pub String);

/// One tender row as stored in the external table.
#[derive(Debug, Clone, PartialEq)]
pub struct TenderRow {
    pub tender_id: TenderId,
    /// Free-text fields (title, description, ...) in column order.
    pub texts: Vec<String>,
    /// Nullable ground-truth column; `None` means unset.
    pub label: Option<i64>,
}

impl TenderRow {
    pub fn ground_truth(&self) -> Label {
        Label::from_column(self.label)
    }
}

/// Source of scoped connections to the tender store.
///
/// A connection is not shared between operations; it is released when the
/// returned box is dropped, on success and on error alike.
pub trait TenderStore: Send + Sync {
    fn connect(&self) -> Result<Box<dyn StoreConnection + '_>, StoreError>;
}

pub trait StoreConnection {
    /// Distinct country codes present in the store.
    fn countries(&mut self) -> Result<Vec<String>, StoreError>;

    fn fetch_dataset(&mut self, country: &str) -> Result<Vec<TenderRow>, StoreError>;

    /// `Ok(None)` if the tender does not exist.
    fn fetch_tender(&mut self, country: &str, tender_id: &str)
        -> Result<Option<TenderRow>, StoreError>;

    fn write_label(&mut self, country: &str, tender_id: &str, label: Label)
        -> Result<(), StoreError>;

    fn write_prediction(
        &mut self,
        country: &str,
        tender_id: &str,
        predicted_label: Label,
        predicted_probability: f64,
    ) -> Result<(), StoreError>;
}

/// Output of one training run for one language.
#[derive(Debug, Clone)]
pub struct TrainedBundle {
    pub vectorizer: Vectorizer,
    pub classifier: LinearClassifier,
    /// Stop words the trainer applied; only kept on a language's first training.
    pub stop_words: BTreeSet<String>,
    /// One record per dataset row.
    pub tenders: Vec<TenderRecord>,
}

/// Turns raw rows into a fitted vectorizer and classifier. Must be
/// deterministic for identical inputs.
pub trait Trainer: Send + Sync {
    fn train(
        &self,
        dataset: &[TenderRow],
        language: &str,
        vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError>;
}

/// Aligned surface and lemma tokens of one tender.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenizedText {
    pub original: Vec<String>,
    pub lemmas: Vec<String>,
}

/// Same tokenization and lemmatization the trainer uses, for inference.
pub trait Preprocessor: Send + Sync {
    fn tokenize_and_lemmatize(&self, row: &TenderRow, language: &str)
        -> Result<TokenizedText, TrainError>;
}
