// src/lib.rs

pub mod config;
pub mod core;
pub mod countries;
pub mod error;
pub mod explain;
pub mod external;
pub mod learning;
pub mod persistence;
pub mod report;

#[cfg(test)]
mod test_utils;

pub use crate::config::RegistryConfig;
pub use crate::core::model::LanguageModel;
pub use crate::core::registry::{InitReport, ModelRegistry};
pub use crate::core::store::CountryModelStore;
pub use crate::core::types::Label;
pub use crate::error::{PersistenceError, Result, TenderError};
