// src/core/vocabulary.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-language vocabulary mask handed to the trainer.
///
/// `stop_words` is fixed when a language is first trained and carried forward
/// untouched; `deleted_words` only changes through a [`VocabularyEdit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEditSet {
    pub stop_words: BTreeSet<String>,
    pub deleted_words: BTreeSet<String>,
}

/// A user's request to delete and re-enable vocabulary tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyEdit {
    pub deleted: Vec<String>,
    pub reenabled: Vec<String>,
}

impl VocabularyEditSet {
    pub fn new(stop_words: impl IntoIterator<Item = String>) -> Self {
        Self {
            stop_words: stop_words.into_iter().collect(),
            deleted_words: BTreeSet::new(),
        }
    }

    /// True if the trainer must leave `token` out of the vocabulary.
    pub fn is_masked(&self, token: &str) -> bool {
        self.stop_words.contains(token) || self.deleted_words.contains(token)
    }

    /// Returns the edit set a retrain should use:
    /// `(deleted_words ∪ edit.deleted) \ edit.reenabled`, stop words unchanged.
    pub fn apply(&self, edit: &VocabularyEdit) -> Self {
        let mut deleted_words = self.deleted_words.clone();
        deleted_words.extend(edit.deleted.iter().cloned());
        for word in &edit.reenabled {
            deleted_words.remove(word);
        }
        Self {
            stop_words: self.stop_words.clone(),
            deleted_words,
        }
    }

    pub fn deleted_list(&self) -> Vec<String> {
        self.deleted_words.iter().cloned().collect()
    }
}

impl VocabularyEdit {
    pub fn new(deleted: Vec<String>, reenabled: Vec<String>) -> Self {
        Self { deleted, reenabled }
    }

    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.reenabled.is_empty()
    }
}
