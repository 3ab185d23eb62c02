// src/core/model.rs
use crate::core::types::{Label, SparseVector, TenderRecord};
use crate::core::vocabulary::VocabularyEditSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A fitted TF-IDF vectorizer: lemma -> column index plus per-column idf.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vectorizer {
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    normalize: bool,
}

impl Vectorizer {
    /// Lower-casing, raw term counts, l2-normalised rows.
    pub fn new(vocabulary: BTreeMap<String, usize>, idf: Vec<f64>) -> Self {
        Self {
            vocabulary,
            idf,
            normalize: true,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Normalisation applied to every token before lookup.
    pub fn preprocess(&self, token: &str) -> String {
        token.to_lowercase()
    }

    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.vocabulary.get(token).copied()
    }

    pub fn len(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocabulary.is_empty()
    }

    /// Tokens ordered by column index.
    pub fn feature_names(&self) -> Vec<&str> {
        let mut names = vec![""; self.vocabulary.len()];
        for (token, &index) in &self.vocabulary {
            if let Some(slot) = names.get_mut(index) {
                *slot = token.as_str();
            }
        }
        names
    }

    /// Vectorizes one document given as lemma tokens.
    pub fn transform<S: AsRef<str>>(&self, tokens: &[S]) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in tokens {
            if let Some(index) = self.index_of(&self.preprocess(token.as_ref())) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        }

        let mut row = SparseVector::from_pairs(counts.into_iter().map(|(index, count)| {
            let idf = self.idf.get(index).copied().unwrap_or(1.0);
            (index, count * idf)
        }));

        if self.normalize {
            let norm = row.l2_norm();
            if norm > 0.0 {
                row.scale(1.0 / norm);
            }
        }
        row
    }

    fn validate(&self) -> Result<(), String> {
        if self.idf.len() != self.vocabulary.len() {
            return Err(format!(
                "idf has {} entries for a vocabulary of {}",
                self.idf.len(),
                self.vocabulary.len()
            ));
        }
        let mut seen = vec![false; self.vocabulary.len()];
        for (token, &index) in &self.vocabulary {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => return Err(format!("token {token:?} has invalid column {index}")),
            }
        }
        Ok(())
    }
}

/// Binary linear classifier: `score = w · x + bias`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LinearClassifier {
    pub fn new(weights: Vec<f64>, bias: f64) -> Self {
        Self { weights, bias }
    }

    pub fn weight(&self, index: usize) -> f64 {
        self.weights.get(index).copied().unwrap_or(0.0)
    }

    pub fn decision_function(&self, features: &SparseVector) -> f64 {
        features.dot(&self.weights) + self.bias
    }

    /// Probability of the innovative class.
    pub fn predict_proba(&self, features: &SparseVector) -> f64 {
        sigmoid(self.decision_function(features))
    }

    /// Argmax over `[1 - p, p]`; an exact tie resolves to index 0
    /// (not innovative).
    pub fn predict(&self, features: &SparseVector) -> Label {
        let p = self.predict_proba(features);
        Label::from_prediction(p > 1.0 - p)
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Vectorizer, classifier, vocabulary mask and tender records for one
/// language. Replaced wholesale on retrain, never patched field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageModel {
    pub language: String,
    pub vectorizer: Vectorizer,
    pub classifier: LinearClassifier,
    pub vocabulary: VocabularyEditSet,
    pub tenders: Vec<TenderRecord>,
}

impl LanguageModel {
    pub fn tender_position(&self, tender_id: &str) -> Option<usize> {
        self.tenders.iter().position(|t| t.tender_id == tender_id)
    }

    pub fn tender(&self, tender_id: &str) -> Option<&TenderRecord> {
        self.tenders.iter().find(|t| t.tender_id == tender_id)
    }

    /// Checks that the vectorizer, classifier and records agree on the
    /// vocabulary and that tender ids are unique.
    pub fn validate(&self) -> Result<(), String> {
        self.vectorizer.validate()?;

        let width = self.vectorizer.len();
        if self.classifier.weights.len() != width {
            return Err(format!(
                "classifier has {} weights for a vocabulary of {}",
                self.classifier.weights.len(),
                width
            ));
        }
        if !self.classifier.bias.is_finite() || self.classifier.weights.iter().any(|w| !w.is_finite()) {
            return Err("classifier has non-finite coefficients".into());
        }

        let mut ids = HashSet::with_capacity(self.tenders.len());
        for tender in &self.tenders {
            if !ids.insert(tender.tender_id.as_str()) {
                return Err(format!("duplicate tender id {}", tender.tender_id));
            }
            if tender.features.max_index().map_or(false, |i| i >= width) {
                return Err(format!("tender {} has features outside the vocabulary", tender.tender_id));
            }
            if !(0.0..=1.0).contains(&tender.predicted_probability) {
                return Err(format!(
                    "tender {} has probability {}",
                    tender.tender_id, tender.predicted_probability
                ));
            }
        }
        Ok(())
    }
}
