//! Error types for the tender model registry.

use thiserror::Error;

/// Main error type for registry, ranking and explanation operations.
#[derive(Debug, Error)]
pub enum TenderError {
    /// The external trainer failed, timed out, or returned an unusable bundle.
    #[error("Training failed for country {country}: {reason}")]
    TrainingFailure { country: String, reason: String },

    /// The inference-time text pipeline could not tokenize a tender.
    #[error("Preprocessing failed for tender {tender_id} of country {country}: {reason}")]
    PreprocessingFailure {
        country: String,
        tender_id: String,
        reason: String,
    },

    /// The country has no successfully trained model.
    #[error("No trained model for country {0}")]
    ModelNotTrained(String),

    /// The tender id is unknown for the country.
    #[error("Tender {tender_id} not found for country {country}")]
    TenderNotFound { country: String, tender_id: String },

    /// The country is absent from the static language table.
    #[error("Country {0} is not supported")]
    CountryNotSupported(String),

    /// The external data store could not be reached.
    #[error("Tender store unavailable: {0}")]
    StoreUnavailable(String),

    /// Annotations must be 0 (not innovative) or 1 (innovative).
    #[error("Invalid annotation label {0}, expected 0 or 1")]
    InvalidLabel(i64),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

/// Errors raised while saving or loading a country archive.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),

    #[error("Atomic rename failed: {0}")]
    Persist(#[from] tempfile::PersistError),

    /// The archive file holds a different country than the one requested.
    #[error("Archive for {requested} contains country {found}")]
    CountryMismatch { requested: String, found: String },
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, TenderError>;
