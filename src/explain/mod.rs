//! Read-only explanations of a trained country model.

pub mod importance;
pub mod waterfall;

pub use importance::{GlobalImportanceRanker, GlobalImportanceSnapshot, TokenImportance};
pub use waterfall::{
    BarKind, TenderExplainer, TenderExplanation, TokenScore, Waterfall, WaterfallBar,
};
