//! Single-tender explanation: the linear decision score split into per-lemma
//! contributions and laid out as a running-total waterfall.

use crate::core::model::LanguageModel;
use crate::core::types::{Label, TenderId};
use crate::external::{TenderRow, TokenizedText};
use serde::Serialize;
use std::collections::HashSet;
use tracing::warn;

pub const REMAINING_POSITIVE: &str = "remaining POSITIVE";
pub const REMAINING_NEGATIVE: &str = "remaining NEGATIVE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BarKind {
    Positive,
    Negative,
}

/// One bar of the waterfall, spanning `start..end` of the running sum.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WaterfallBar {
    pub label: String,
    pub contribution: f64,
    pub start: f64,
    pub end: f64,
    pub kind: BarKind,
    /// True for the two collapsed "remaining" bars.
    pub remainder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Waterfall {
    pub bars: Vec<WaterfallBar>,
    pub bias: f64,
    /// Running-sum position where the decision score crosses zero: `-bias`.
    pub decision_boundary: f64,
}

impl Waterfall {
    /// Sum of all bar contributions, i.e. the decision score without bias.
    pub fn total(&self) -> f64 {
        self.bars.iter().map(|bar| bar.contribution).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TokenScore {
    pub token: String,
    pub score: f64,
}

/// A lemma's contribution, labelled with its first surface form.
#[derive(Debug, Clone, PartialEq)]
pub struct LemmaContribution {
    pub lemma: String,
    pub label: String,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TenderExplanation {
    pub country: String,
    pub tender_id: TenderId,
    /// Every surface token in text order with its lemma's contribution.
    pub word_scores: Vec<TokenScore>,
    pub waterfall: Waterfall,
    pub decision_score: f64,
    pub prediction: Label,
    /// Probability of the predicted class, so never below 0.5.
    pub prediction_probability: f64,
    pub label: Label,
}

pub struct TenderExplainer {
    top_k: usize,
}

impl TenderExplainer {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    /// Explains `row` under `model`. `tokens` must come from the same
    /// preprocessing the model was trained with.
    pub fn explain(
        &self,
        country: &str,
        model: &LanguageModel,
        row: &TenderRow,
        tokens: TokenizedText,
    ) -> TenderExplanation {
        let vectorizer = &model.vectorizer;
        let classifier = &model.classifier;

        if tokens.original.len() != tokens.lemmas.len() {
            warn!(
                country,
                tender_id = %row.tender_id,
                original = tokens.original.len(),
                lemmas = tokens.lemmas.len(),
                "surface and lemma tokens are misaligned"
            );
        }
        // an unpaired token stands in for its missing counterpart
        let width = tokens.original.len().max(tokens.lemmas.len());
        let (original, lemmas): (Vec<String>, Vec<String>) = (0..width)
            .map(|i| {
                let surface = tokens.original.get(i).or(tokens.lemmas.get(i));
                let lemma = tokens.lemmas.get(i).or(tokens.original.get(i));
                (
                    vectorizer.preprocess(surface.map_or("", String::as_str)),
                    vectorizer.preprocess(lemma.map_or("", String::as_str)),
                )
            })
            .unzip();

        let features = vectorizer.transform(&lemmas);

        let mut word_scores = Vec::with_capacity(original.len());
        let mut contributions: Vec<LemmaContribution> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for (surface, lemma) in original.iter().zip(lemmas.iter()) {
            let score = vectorizer
                .index_of(lemma)
                .map(|index| features.get(index) * classifier.weight(index))
                .unwrap_or(0.0);

            word_scores.push(TokenScore {
                token: surface.clone(),
                score,
            });
            if seen.insert(lemma.as_str()) {
                contributions.push(LemmaContribution {
                    lemma: lemma.clone(),
                    label: surface.to_lowercase(),
                    score,
                });
            }
        }

        let p_innovative = classifier.predict_proba(&features);
        let prediction = classifier.predict(&features);
        let prediction_probability = match prediction {
            Label::Innovative => p_innovative,
            _ => 1.0 - p_innovative,
        };

        TenderExplanation {
            country: country.to_string(),
            tender_id: row.tender_id.clone(),
            word_scores,
            waterfall: self.waterfall(&contributions, classifier.bias),
            decision_score: classifier.decision_function(&features),
            prediction,
            prediction_probability,
            label: row.ground_truth(),
        }
    }

    /// Lays out contributions as bars: the `top_k` largest positives in
    /// descending order, then one bar for the remaining positives, then the
    /// `top_k` most negative in ascending order, then one bar for the
    /// remaining negatives. Both remainder bars are always present; zero
    /// contributions never get a bar. Equal scores keep their input order.
    pub fn waterfall(&self, contributions: &[LemmaContribution], bias: f64) -> Waterfall {
        let mut positives: Vec<&LemmaContribution> =
            contributions.iter().filter(|c| c.score > 0.0).collect();
        positives.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut negatives: Vec<&LemmaContribution> =
            contributions.iter().filter(|c| c.score < 0.0).collect();
        negatives.sort_by(|a, b| a.score.total_cmp(&b.score));

        let mut bars = Vec::with_capacity(2 * self.top_k + 2);
        let mut running = 0.0;
        Self::walk(&mut bars, &mut running, &positives, self.top_k, BarKind::Positive, REMAINING_POSITIVE);
        Self::walk(&mut bars, &mut running, &negatives, self.top_k, BarKind::Negative, REMAINING_NEGATIVE);

        Waterfall {
            bars,
            bias,
            decision_boundary: -bias,
        }
    }

    fn walk(
        bars: &mut Vec<WaterfallBar>,
        running: &mut f64,
        sorted: &[&LemmaContribution],
        top_k: usize,
        kind: BarKind,
        remainder_label: &str,
    ) {
        let split = sorted.len().min(top_k);
        let (shown, rest) = sorted.split_at(split);

        for contribution in shown {
            bars.push(WaterfallBar {
                label: contribution.label.clone(),
                contribution: contribution.score,
                start: *running,
                end: *running + contribution.score,
                kind,
                remainder: false,
            });
            *running += contribution.score;
        }

        let remainder: f64 = rest.iter().map(|c| c.score).sum();
        bars.push(WaterfallBar {
            label: remainder_label.to_string(),
            contribution: remainder,
            start: *running,
            end: *running + remainder,
            kind,
            remainder: true,
        });
        *running += remainder;
    }
}

#[cfg(test)]
#[path = "waterfall_tests.rs"]
mod tests;
