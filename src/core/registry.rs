// src/core/registry.rs
use crate::config::RegistryConfig;
use crate::core::model::LanguageModel;
use crate::core::store::CountryModelStore;
use crate::core::types::Label;
use crate::core::vocabulary::VocabularyEdit;
use crate::countries;
use crate::error::{Result, TenderError};
use crate::explain::{GlobalImportanceRanker, GlobalImportanceSnapshot, TenderExplainer, TenderExplanation};
use crate::external::{Preprocessor, TenderRow, TenderStore, Trainer};
use crate::learning::LearningEngine;
use crate::persistence::{DiskArchive, ModelArchive};
use crate::report::{self, CountryDetail, CountrySummary};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything the registry keeps for one country.
struct CountrySlot {
    store: CountryModelStore,
    importance: RwLock<Option<Arc<GlobalImportanceSnapshot>>>,
    /// Serializes training, retraining and annotation for the country.
    writer: Mutex<()>,
}

/// Outcome of [`ModelRegistry::initialize`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InitReport {
    pub loaded: Vec<String>,
    pub trained: Vec<String>,
    pub excluded: Vec<String>,
    pub unsupported: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Cached,
    Loaded,
    Trained,
}

/// Owns every country's model and importance snapshot.
///
/// Reads run concurrently and always see one whole model. Writes for a
/// country are serialized by its slot's writer lock; a failed retrain keeps
/// the previous model and snapshot.
pub struct ModelRegistry {
    config: RegistryConfig,
    store: Arc<dyn TenderStore>,
    preprocessor: Arc<dyn Preprocessor>,
    archive: Arc<dyn ModelArchive>,
    learning: LearningEngine,
    ranker: GlobalImportanceRanker,
    explainer: TenderExplainer,
    slots: RwLock<BTreeMap<String, Arc<CountrySlot>>>,
    /// Countries whose first training failed; not retried until restart.
    excluded: RwLock<BTreeSet<String>>,
}

impl ModelRegistry {
    pub fn new(
        config: RegistryConfig,
        store: Arc<dyn TenderStore>,
        trainer: Arc<dyn Trainer>,
        preprocessor: Arc<dyn Preprocessor>,
        archive: Arc<dyn ModelArchive>,
    ) -> Self {
        Self {
            learning: LearningEngine::new(trainer, config.training_timeout()),
            ranker: GlobalImportanceRanker::new(config.importance_words),
            explainer: TenderExplainer::new(config.waterfall_words),
            config,
            store,
            preprocessor,
            archive,
            slots: RwLock::new(BTreeMap::new()),
            excluded: RwLock::new(BTreeSet::new()),
        }
    }

    /// Registry persisting to `config.data_dir`.
    pub fn with_disk_archive(
        config: RegistryConfig,
        store: Arc<dyn TenderStore>,
        trainer: Arc<dyn Trainer>,
        preprocessor: Arc<dyn Preprocessor>,
    ) -> Self {
        let archive = Arc::new(DiskArchive::new(config.data_dir.clone()));
        Self::new(config, store, trainer, preprocessor, archive)
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Loads or trains every supported country found in the tender store.
    /// Countries whose training fails are reported and skipped.
    pub fn initialize(&self) -> Result<InitReport> {
        let found = {
            let mut conn = self.store.connect()?;
            conn.countries()?
        };
        info!(countries = found.len(), "initializing registry");

        let mut report = InitReport::default();
        for country in found {
            if !countries::is_supported(&country) {
                debug!(country, "skipping unsupported country");
                report.unsupported.push(country);
                continue;
            }
            match self.ensure(&country) {
                Ok((_, Origin::Trained)) => report.trained.push(country),
                Ok(_) => report.loaded.push(country),
                Err(TenderError::TrainingFailure { .. }) => report.excluded.push(country),
                Err(e) => return Err(e),
            }
        }
        info!(
            loaded = report.loaded.len(),
            trained = report.trained.len(),
            excluded = report.excluded.len(),
            "registry initialized"
        );
        Ok(report)
    }

    /// Returns the country's model, loading it from the archive or training
    /// it on first use. A failed first training, or an archived model that
    /// fails validation, excludes the country until restart.
    pub fn ensure_trained(&self, country: &str) -> Result<Arc<LanguageModel>> {
        self.ensure(country).map(|(model, _)| model)
    }

    fn ensure(&self, country: &str) -> Result<(Arc<LanguageModel>, Origin)> {
        if !countries::is_supported(country) {
            return Err(TenderError::CountryNotSupported(country.to_string()));
        }
        self.check_not_excluded(country)?;

        let slot = self.slot_or_insert(country)?;
        if let Ok(model) = slot.store.get() {
            return Ok((model, Origin::Cached));
        }

        let _writer = slot.writer.lock();
        if let Ok(model) = slot.store.get() {
            return Ok((model, Origin::Cached));
        }
        // another caller may have failed and excluded the country while we waited
        self.check_not_excluded(country)?;

        let reloaded = match slot.store.reload() {
            Ok(reloaded) => reloaded,
            Err(e @ TenderError::TrainingFailure { .. }) => return Err(self.exclude(country, e)),
            Err(e) => return Err(e),
        };
        if reloaded {
            let model = slot.store.get()?;
            *slot.importance.write() = Some(Arc::new(self.ranker.rank(country, &model)));
            return Ok((model, Origin::Loaded));
        }

        info!(country, "no archived model, training");
        let dataset = self.fetch_dataset(country)?;
        let model = self
            .learning
            .train_new(country, slot.store.language(), dataset)
            .map_err(|e| self.exclude(country, e))?;

        let snapshot = self.ranker.rank(country, &model);
        let model = slot.store.replace(model)?;
        *slot.importance.write() = Some(Arc::new(snapshot));
        self.push_predictions(country, &model)?;
        Ok((model, Origin::Trained))
    }

    /// Refits the country's model over its edited vocabulary and installs
    /// the result. On any failure the previous model stays active.
    pub fn retrain(
        &self,
        country: &str,
        deleted_words: Vec<String>,
        reenabled_words: Vec<String>,
    ) -> Result<Arc<LanguageModel>> {
        let slot = self.trained_slot(country)?;
        let _writer = slot.writer.lock();
        let current = slot.store.get()?;

        let edit = VocabularyEdit::new(deleted_words, reenabled_words);
        let vocabulary = current.vocabulary.apply(&edit);
        info!(
            country,
            deleted = vocabulary.deleted_words.len(),
            "retraining with edited vocabulary"
        );

        let dataset = self.fetch_dataset(country)?;
        let model = self
            .learning
            .retrain(country, slot.store.language(), dataset, vocabulary)?;

        let snapshot = self.ranker.rank(country, &model);
        let model = slot.store.replace(model)?;
        *slot.importance.write() = Some(Arc::new(snapshot));
        self.push_predictions(country, &model)?;
        Ok(model)
    }

    /// Stores a manual annotation (0 or 1) in the tender store and in the
    /// cached records.
    pub fn annotate(&self, country: &str, tender_id: &str, label: i64) -> Result<()> {
        let label = Label::from_annotation(label).ok_or(TenderError::InvalidLabel(label))?;
        let slot = self.trained_slot(country)?;
        let _writer = slot.writer.lock();
        let current = slot.store.get()?;

        let position = current
            .tender_position(tender_id)
            .ok_or_else(|| TenderError::TenderNotFound {
                country: country.to_string(),
                tender_id: tender_id.to_string(),
            })?;

        {
            let mut conn = self.store.connect()?;
            conn.write_label(country, tender_id, label)?;
        }

        // The tender store already holds the label, so memory follows it
        // even if the archive write below fails. Labels do not move the
        // ranking, so the snapshot stays valid.
        let mut next = LanguageModel::clone(&current);
        next.tenders[position].ground_truth = label;
        slot.store.install(next);
        info!(country, tender_id, label = label.code(), "tender annotated");
        slot.store.persist()
    }

    /// Active model of a trained country. Never trains.
    pub fn model(&self, country: &str) -> Result<Arc<LanguageModel>> {
        self.trained_slot(country)?.store.get()
    }

    pub fn global_importance(&self, country: &str) -> Result<Arc<GlobalImportanceSnapshot>> {
        let slot = self.trained_slot(country)?;
        if let Some(snapshot) = slot.importance.read().clone() {
            return Ok(snapshot);
        }
        let model = slot.store.get()?;
        let snapshot = Arc::new(self.ranker.rank(country, &model));
        *slot.importance.write() = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    pub fn explain(&self, country: &str, tender_id: &str) -> Result<TenderExplanation> {
        let slot = self.trained_slot(country)?;
        let model = slot.store.get()?;

        let row: TenderRow = {
            let mut conn = self.store.connect()?;
            conn.fetch_tender(country, tender_id)?
        }
        .ok_or_else(|| TenderError::TenderNotFound {
            country: country.to_string(),
            tender_id: tender_id.to_string(),
        })?;

        let tokens = self
            .preprocessor
            .tokenize_and_lemmatize(&row, slot.store.language())
            .map_err(|e| TenderError::PreprocessingFailure {
                country: country.to_string(),
                tender_id: tender_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(self.explainer.explain(country, &model, &row, tokens))
    }

    /// Summaries of all countries with a trained model, by country code.
    pub fn countries_summary(&self) -> Vec<CountrySummary> {
        self.slots
            .read()
            .iter()
            .filter_map(|(country, slot)| {
                let model = slot.store.get().ok()?;
                Some(report::summary(country, &model))
            })
            .collect()
    }

    pub fn country_detail(&self, country: &str) -> Result<CountryDetail> {
        let model = self.model(country)?;
        Ok(report::detail(&model))
    }

    pub fn available_countries(&self) -> Vec<String> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.store.is_trained())
            .map(|(country, _)| country.clone())
            .collect()
    }

    pub fn is_excluded(&self, country: &str) -> bool {
        self.excluded.read().contains(country)
    }

    fn check_not_excluded(&self, country: &str) -> Result<()> {
        if self.is_excluded(country) {
            return Err(TenderError::TrainingFailure {
                country: country.to_string(),
                reason: "excluded after an earlier training failure".into(),
            });
        }
        Ok(())
    }

    /// Marks `country` as unusable until restart and drops its slot.
    fn exclude(&self, country: &str, error: TenderError) -> TenderError {
        warn!(country, error = %error, "excluding country");
        self.excluded.write().insert(country.to_string());
        self.slots.write().remove(country);
        error
    }

    fn slot_or_insert(&self, country: &str) -> Result<Arc<CountrySlot>> {
        if let Some(slot) = self.slots.read().get(country) {
            return Ok(Arc::clone(slot));
        }
        let mut slots = self.slots.write();
        if let Some(slot) = slots.get(country) {
            return Ok(Arc::clone(slot));
        }
        let slot = Arc::new(CountrySlot {
            store: CountryModelStore::new(country, Arc::clone(&self.archive))?,
            importance: RwLock::new(None),
            writer: Mutex::new(()),
        });
        slots.insert(country.to_string(), Arc::clone(&slot));
        Ok(slot)
    }

    fn trained_slot(&self, country: &str) -> Result<Arc<CountrySlot>> {
        if !countries::is_supported(country) {
            return Err(TenderError::CountryNotSupported(country.to_string()));
        }
        self.slots
            .read()
            .get(country)
            .filter(|slot| slot.store.is_trained())
            .cloned()
            .ok_or_else(|| TenderError::ModelNotTrained(country.to_string()))
    }

    fn fetch_dataset(&self, country: &str) -> Result<Vec<TenderRow>> {
        let mut conn = self.store.connect()?;
        let dataset = conn.fetch_dataset(country)?;
        debug!(country, rows = dataset.len(), "dataset fetched");
        Ok(dataset)
    }

    fn push_predictions(&self, country: &str, model: &LanguageModel) -> Result<()> {
        let mut conn = self.store.connect()?;
        for tender in &model.tenders {
            conn.write_prediction(
                country,
                &tender.tender_id,
                tender.predicted_label,
                round_probability(tender.predicted_probability),
            )?;
        }
        debug!(country, tenders = model.tenders.len(), "predictions written");
        Ok(())
    }
}

/// Five decimals, as stored in the tender table.
fn round_probability(p: f64) -> f64 {
    (p * 100_000.0).round() / 100_000.0
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
