//! Descriptive statistics of a country's tenders for the dashboard.

use crate::core::model::LanguageModel;
use crate::core::types::{Label, TenderId};
use crate::countries;
use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CountryMetadata {
    pub num_examples: usize,
    /// Tenders annotated as innovative.
    pub num_innovative: usize,
    /// `num_examples - num_innovative`: everything not annotated innovative.
    pub num_non_innovative: usize,
    pub num_labeled: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountrySummary {
    pub country_name: String,
    pub country_code: String,
    pub metadata: CountryMetadata,
}

/// Tender ids grouped by how the prediction compares to the annotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PredictionBuckets {
    pub true_positive: Vec<TenderId>,
    pub true_negative: Vec<TenderId>,
    pub false_positive: Vec<TenderId>,
    pub false_negative: Vec<TenderId>,
    pub unlabeled_positive: Vec<TenderId>,
    pub unlabeled_negative: Vec<TenderId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CountryDetail {
    pub metadata: CountryMetadata,
    pub details: PredictionBuckets,
}

pub fn metadata(model: &LanguageModel) -> CountryMetadata {
    let num_examples = model.tenders.len();
    let num_innovative = model
        .tenders
        .iter()
        .filter(|t| t.ground_truth == Label::Innovative)
        .count();
    let num_labeled = model
        .tenders
        .iter()
        .filter(|t| t.ground_truth.is_labeled())
        .count();
    CountryMetadata {
        num_examples,
        num_innovative,
        num_non_innovative: num_examples - num_innovative,
        num_labeled,
    }
}

pub fn summary(country: &str, model: &LanguageModel) -> CountrySummary {
    CountrySummary {
        country_name: countries::display_name(country)
            .unwrap_or(country)
            .to_string(),
        country_code: country.to_string(),
        metadata: metadata(model),
    }
}

pub fn detail(model: &LanguageModel) -> CountryDetail {
    let mut details = PredictionBuckets::default();
    for tender in &model.tenders {
        let predicted_innovative = tender.predicted_label == Label::Innovative;
        let bucket = match tender.ground_truth {
            Label::Innovative if predicted_innovative => &mut details.true_positive,
            Label::Innovative => &mut details.false_negative,
            Label::NotInnovative if predicted_innovative => &mut details.false_positive,
            Label::NotInnovative => &mut details.true_negative,
            Label::Unlabeled if predicted_innovative => &mut details.unlabeled_positive,
            Label::Unlabeled => &mut details.unlabeled_negative,
        };
        bucket.push(tender.tender_id.clone());
    }
    CountryDetail {
        metadata: metadata(model),
        details,
    }
}
