// src/core/store.rs
use crate::core::model::LanguageModel;
use crate::countries;
use crate::error::{Result, TenderError};
use crate::persistence::{CountryArchive, ModelArchive};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Owns the active [`LanguageModel`] of one country and its durable copy.
///
/// Readers clone the inner `Arc` and keep working on that model even while a
/// replacement is installed; nobody ever sees a half-updated model.
pub struct CountryModelStore {
    country: String,
    language: &'static str,
    archive: Arc<dyn ModelArchive>,
    current: RwLock<Option<Arc<LanguageModel>>>,
}

impl CountryModelStore {
    pub fn new(country: &str, archive: Arc<dyn ModelArchive>) -> Result<Self> {
        let language = countries::language_for(country)
            .ok_or_else(|| TenderError::CountryNotSupported(country.to_string()))?;
        Ok(Self {
            country: country.to_string(),
            language,
            archive,
            current: RwLock::new(None),
        })
    }

    pub fn language(&self) -> &'static str {
        self.language
    }

    pub fn is_trained(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn get(&self) -> Result<Arc<LanguageModel>> {
        self.current
            .read()
            .clone()
            .ok_or_else(|| TenderError::ModelNotTrained(self.country.clone()))
    }

    /// Persists `model` and then swaps it in. If saving fails the previous
    /// model stays active.
    pub fn replace(&self, model: LanguageModel) -> Result<Arc<LanguageModel>> {
        self.archive.save(&self.to_archive(&model))?;
        let model = self.install(model);
        info!(country = %self.country, tenders = model.tenders.len(), "model replaced");
        Ok(model)
    }

    /// Swaps `model` in without saving it. Follow with [`persist`](Self::persist)
    /// when the change must reach the archive.
    pub fn install(&self, model: LanguageModel) -> Arc<LanguageModel> {
        let model = Arc::new(model);
        *self.current.write() = Some(Arc::clone(&model));
        model
    }

    /// Writes the active model to the archive again.
    pub fn persist(&self) -> Result<()> {
        let model = self.get()?;
        self.archive.save(&self.to_archive(&model))?;
        Ok(())
    }

    /// Loads the archived model, if any. Returns whether a model is now active.
    pub fn reload(&self) -> Result<bool> {
        let Some(mut archive) = self.archive.load(&self.country)? else {
            debug!(country = %self.country, "no archived model");
            return Ok(false);
        };
        let Some(model) = archive.languages.remove(self.language) else {
            debug!(country = %self.country, language = self.language, "archive lacks active language");
            return Ok(false);
        };
        model.validate().map_err(|reason| TenderError::TrainingFailure {
            country: self.country.clone(),
            reason: format!("archived model is inconsistent: {reason}"),
        })?;

        self.install(model);
        info!(country = %self.country, "model loaded from archive");
        Ok(true)
    }

    fn to_archive(&self, model: &LanguageModel) -> CountryArchive {
        let mut languages = BTreeMap::new();
        languages.insert(self.language.to_string(), model.clone());
        CountryArchive {
            country: self.country.clone(),
            languages,
        }
    }
}
