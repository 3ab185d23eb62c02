// src/core/types.rs
use serde::{Deserialize, Serialize};

/// Tender identifier, unique within a country.
pub type TenderId = String;

/// Binary innovation label with an explicit "unset" state.
///
/// Serialized as its numeric code: 0, 1, or 2 for unlabeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    NotInnovative,
    Innovative,
    #[default]
    Unlabeled,
}

impl Label {
    /// Code stored for tenders nobody has annotated yet.
    pub const UNLABELED_CODE: u8 = 2;

    pub fn code(self) -> u8 {
        match self {
            Label::NotInnovative => 0,
            Label::Innovative => 1,
            Label::Unlabeled => Self::UNLABELED_CODE,
        }
    }

    /// Parses a user-supplied annotation. Only 0 and 1 are valid.
    pub fn from_annotation(value: i64) -> Option<Self> {
        match value {
            0 => Some(Label::NotInnovative),
            1 => Some(Label::Innovative),
            _ => None,
        }
    }

    /// Reads the nullable label column of the tender store.
    pub fn from_column(value: Option<i64>) -> Self {
        value
            .and_then(Self::from_annotation)
            .unwrap_or(Label::Unlabeled)
    }

    pub fn from_prediction(innovative: bool) -> Self {
        if innovative {
            Label::Innovative
        } else {
            Label::NotInnovative
        }
    }

    pub fn is_labeled(self) -> bool {
        self != Label::Unlabeled
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> u8 {
        label.code()
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Label::NotInnovative),
            1 => Ok(Label::Innovative),
            Self::UNLABELED_CODE => Ok(Label::Unlabeled),
            other => Err(format!("unknown label code {other}")),
        }
    }
}

/// Sparse feature row over a vocabulary: `(index, value)` pairs sorted by
/// index, without explicit zeros.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    /// Builds a vector from unordered pairs. Duplicate indices are summed.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut entries: Vec<(usize, f64)> = pairs.into_iter().collect();
        entries.sort_by_key(|&(index, _)| index);

        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(entries.len());
        for (index, value) in entries {
            match merged.last_mut() {
                Some((last, sum)) if *last == index => *sum += value,
                _ => merged.push((index, value)),
            }
        }
        merged.retain(|&(_, value)| value != 0.0);
        Self { entries: merged }
    }

    /// Value at `index`, zero when absent. O(log nnz).
    pub fn get(&self, index: usize) -> f64 {
        self.entries
            .binary_search_by_key(&index, |&(i, _)| i)
            .map(|pos| self.entries[pos].1)
            .unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().copied()
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest stored index, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.entries.last().map(|&(index, _)| index)
    }

    /// Dot product with a dense weight vector. Indices past its end count as 0.
    pub fn dot(&self, weights: &[f64]) -> f64 {
        self.entries
            .iter()
            .filter_map(|&(index, value)| weights.get(index).map(|w| w * value))
            .sum()
    }

    pub fn scale(&mut self, factor: f64) {
        for (_, value) in self.entries.iter_mut() {
            *value *= factor;
        }
    }

    pub fn l2_norm(&self) -> f64 {
        self.entries.iter().map(|&(_, v)| v * v).sum::<f64>().sqrt()
    }
}

/// Everything the registry keeps about one tender of a country.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TenderRecord {
    pub tender_id: TenderId,
    pub features: SparseVector,
    pub predicted_label: Label,
    /// Probability of the innovative class, in [0, 1].
    pub predicted_probability: f64,
    pub ground_truth: Label,
}
