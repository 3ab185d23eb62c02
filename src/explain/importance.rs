//! Corpus-wide token importance: the vocabulary ranked by classifier weight,
//! with the tenders each ranked token occurs in.

use crate::core::model::LanguageModel;
use crate::core::types::TenderId;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenImportance {
    pub token: String,
    pub weight: f64,
    /// Tenders whose feature row is non-zero at this token, in record order.
    pub tender_ids: Vec<TenderId>,
}

/// Cached per-country ranking, rebuilt whenever the country's model changes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GlobalImportanceSnapshot {
    pub country: String,
    /// Strictly positive weights, largest first.
    pub top_words: Vec<TokenImportance>,
    /// Strictly negative weights, most negative first.
    pub bottom_words: Vec<TokenImportance>,
    pub deleted_words: Vec<String>,
}

pub struct GlobalImportanceRanker {
    n_words: usize,
}

impl GlobalImportanceRanker {
    pub fn new(n_words: usize) -> Self {
        Self { n_words }
    }

    /// Ranks the vocabulary of `model`.
    ///
    /// Weights are sorted descending with ties broken by column index. The
    /// top pass reads at most `n` tokens from the head and stops at the first
    /// weight <= 0; the bottom pass reads at most `n` from the tail and stops
    /// at the first weight >= 0. Zero-weight tokens appear in neither list.
    pub fn rank(&self, country: &str, model: &LanguageModel) -> GlobalImportanceSnapshot {
        let names = model.vectorizer.feature_names();

        let mut scored: Vec<(usize, f64)> = (0..names.len())
            .map(|index| (index, model.classifier.weight(index)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let top: Vec<(usize, f64)> = scored
            .iter()
            .take(self.n_words)
            .take_while(|&&(_, weight)| weight > 0.0)
            .copied()
            .collect();
        let bottom: Vec<(usize, f64)> = scored
            .iter()
            .rev()
            .take(self.n_words)
            .take_while(|&&(_, weight)| weight < 0.0)
            .copied()
            .collect();

        let mut postings: HashMap<usize, Vec<TenderId>> = top
            .iter()
            .chain(bottom.iter())
            .map(|&(index, _)| (index, Vec::new()))
            .collect();
        for tender in &model.tenders {
            for (index, value) in tender.features.iter() {
                if value == 0.0 {
                    continue;
                }
                if let Some(ids) = postings.get_mut(&index) {
                    ids.push(tender.tender_id.clone());
                }
            }
        }

        let mut build = |list: Vec<(usize, f64)>| -> Vec<TokenImportance> {
            list.into_iter()
                .map(|(index, weight)| TokenImportance {
                    token: names[index].to_string(),
                    weight,
                    tender_ids: postings.remove(&index).unwrap_or_default(),
                })
                .collect()
        };

        GlobalImportanceSnapshot {
            country: country.to_string(),
            top_words: build(top),
            bottom_words: build(bottom),
            deleted_words: model.vocabulary.deleted_list(),
        }
    }
}
