//! Test fixtures shared across the crate's test modules: an in-memory tender
//! store, an in-memory archive, and a small deterministic trainer.

use crate::core::model::{LanguageModel, LinearClassifier, Vectorizer};
use crate::core::types::{Label, SparseVector, TenderRecord};
use crate::core::vocabulary::VocabularyEditSet;
use crate::error::PersistenceError;
use crate::external::{
    Preprocessor, StoreConnection, StoreError, TenderRow, TenderStore, TokenizedText, TrainError,
    TrainedBundle, Trainer,
};
use crate::persistence::{CountryArchive, ModelArchive};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

// ============================================================================
// Models
// ============================================================================

/// A model over the given `(token, weight)` vocabulary, with raw counts
/// (no idf, no normalisation) so feature values are easy to predict.
pub fn model_with_weights(
    weights: &[(&str, f64)],
    tenders: &[(&str, Vec<(&str, f64)>)],
) -> LanguageModel {
    let vocabulary: BTreeMap<String, usize> = weights
        .iter()
        .enumerate()
        .map(|(i, (token, _))| (token.to_string(), i))
        .collect();
    let vectorizer = Vectorizer::new(vocabulary, vec![1.0; weights.len()]).with_normalize(false);
    let classifier = LinearClassifier::new(weights.iter().map(|&(_, w)| w).collect(), 0.0);

    let tenders = tenders
        .iter()
        .map(|(id, features)| {
            let features = SparseVector::from_pairs(
                features
                    .iter()
                    .filter_map(|(token, value)| vectorizer.index_of(token).map(|i| (i, *value))),
            );
            TenderRecord {
                tender_id: id.to_string(),
                predicted_label: classifier.predict(&features),
                predicted_probability: classifier.predict_proba(&features),
                features,
                ground_truth: Label::Unlabeled,
            }
        })
        .collect();

    LanguageModel {
        language: "de".to_string(),
        vectorizer,
        classifier,
        vocabulary: VocabularyEditSet::default(),
        tenders,
    }
}

pub fn tiny_model() -> LanguageModel {
    let mut model = model_with_weights(
        &[("innovativ", 0.8), ("standard", -0.3)],
        &[("1", vec![("innovativ", 1.0)]), ("2", vec![("standard", 1.0)])],
    );
    model.classifier.bias = -0.1;
    model.vocabulary.stop_words.insert("und".into());
    model
}

pub fn tokens(original: &[&str], lemmas: &[&str]) -> TokenizedText {
    TokenizedText {
        original: original.iter().map(|s| s.to_string()).collect(),
        lemmas: lemmas.iter().map(|s| s.to_string()).collect(),
    }
}

// ============================================================================
// Datasets
// ============================================================================

pub fn row(id: &str, text: &str, label: Option<i64>) -> TenderRow {
    TenderRow {
        tender_id: id.to_string(),
        texts: vec![text.to_string()],
        label,
    }
}

pub fn rows_de() -> Vec<TenderRow> {
    vec![
        row("101", "Innovativ KI Forschung und Entwicklung", Some(1)),
        row("102", "Forschung zu innovativ Sensorik", Some(1)),
        row("103", "Reinigung der Standard Büros", Some(0)),
        row("104", "Lieferung Standard Papier", Some(0)),
        row("105", "KI gestützte Reinigung", None),
        row("106", "Standard Lieferung und Montage", None),
    ]
}

/// Every row labeled innovative: the lexicon trainer refuses it.
pub fn rows_single_class() -> Vec<TenderRow> {
    vec![
        row("201", "Innovativ Forschung", Some(1)),
        row("202", "Innovativ Sensorik", Some(1)),
    ]
}

// ============================================================================
// Text pipeline and trainers
// ============================================================================

const LEXICON_STOP_WORDS: [&str; 4] = ["und", "der", "die", "zu"];

fn surface_tokens(row: &TenderRow) -> Vec<String> {
    row.texts
        .iter()
        .flat_map(|text| text.split_whitespace())
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Whitespace tokenizer whose "lemma" is the lower-cased token.
#[derive(Default)]
pub struct WhitespacePreprocessor;

impl Preprocessor for WhitespacePreprocessor {
    fn tokenize_and_lemmatize(
        &self,
        row: &TenderRow,
        _language: &str,
    ) -> Result<TokenizedText, TrainError> {
        let original = surface_tokens(row);
        let lemmas = original.iter().map(|t| t.to_lowercase()).collect();
        Ok(TokenizedText { original, lemmas })
    }
}

/// Always refuses to tokenize.
pub struct FailingPreprocessor;

impl Preprocessor for FailingPreprocessor {
    fn tokenize_and_lemmatize(
        &self,
        _row: &TenderRow,
        language: &str,
    ) -> Result<TokenizedText, TrainError> {
        Err(TrainError(format!("no tokenizer for {language}")))
    }
}

/// Deterministic trainer: weights are the difference between the mean
/// feature rows of innovative and non-innovative labeled tenders.
#[derive(Default)]
pub struct LexiconTrainer;

impl Trainer for LexiconTrainer {
    fn train(
        &self,
        dataset: &[TenderRow],
        _language: &str,
        vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError> {
        let mut stop_words: BTreeSet<String> =
            LEXICON_STOP_WORDS.iter().map(|s| s.to_string()).collect();
        stop_words.extend(vocabulary.stop_words.iter().cloned());

        let documents: Vec<Vec<String>> = dataset
            .iter()
            .map(|row| surface_tokens(row).iter().map(|t| t.to_lowercase()).collect())
            .collect();

        let terms: BTreeSet<&str> = documents
            .iter()
            .flatten()
            .map(String::as_str)
            .filter(|t| !stop_words.contains(*t) && !vocabulary.deleted_words.contains(*t))
            .collect();
        let index: BTreeMap<String, usize> = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();

        let n = documents.len() as f64;
        let idf: Vec<f64> = terms
            .iter()
            .map(|term| {
                let df = documents.iter().filter(|d| d.iter().any(|t| t == term)).count() as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();
        let vectorizer = Vectorizer::new(index, idf);
        let rows: Vec<SparseVector> = documents.iter().map(|d| vectorizer.transform(d)).collect();

        let mut sums = [vec![0.0; vectorizer.len()], vec![0.0; vectorizer.len()]];
        let mut counts = [0usize; 2];
        for (row, features) in dataset.iter().zip(&rows) {
            let class = match row.ground_truth() {
                Label::NotInnovative => 0,
                Label::Innovative => 1,
                Label::Unlabeled => continue,
            };
            counts[class] += 1;
            for (i, value) in features.iter() {
                sums[class][i] += value;
            }
        }
        if counts[0] == 0 || counts[1] == 0 {
            return Err(TrainError("dataset contains only one class".into()));
        }
        let weights: Vec<f64> = (0..vectorizer.len())
            .map(|i| sums[1][i] / counts[1] as f64 - sums[0][i] / counts[0] as f64)
            .collect();
        let classifier = LinearClassifier::new(weights, -0.05);

        let tenders = dataset
            .iter()
            .zip(rows)
            .map(|(row, features)| TenderRecord {
                tender_id: row.tender_id.clone(),
                predicted_label: classifier.predict(&features),
                predicted_probability: classifier.predict_proba(&features),
                features,
                ground_truth: row.ground_truth(),
            })
            .collect();

        Ok(TrainedBundle {
            vectorizer,
            classifier,
            stop_words,
            tenders,
        })
    }
}

pub struct FailingTrainer;

impl Trainer for FailingTrainer {
    fn train(
        &self,
        _dataset: &[TenderRow],
        _language: &str,
        _vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError> {
        Err(TrainError("lemmatizer crashed".into()))
    }
}

/// Sleeps before delegating to [`LexiconTrainer`].
pub struct SlowTrainer(pub Duration);

impl Trainer for SlowTrainer {
    fn train(
        &self,
        dataset: &[TenderRow],
        language: &str,
        vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError> {
        std::thread::sleep(self.0);
        LexiconTrainer.train(dataset, language, vocabulary)
    }
}

/// Sleeps, then fails. Counts its invocations.
pub struct SlowFailingTrainer {
    delay: Duration,
    calls: AtomicUsize,
}

impl SlowFailingTrainer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Trainer for SlowFailingTrainer {
    fn train(
        &self,
        _dataset: &[TenderRow],
        _language: &str,
        _vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        Err(TrainError("tokenizer ran out of memory".into()))
    }
}

/// Delegates to [`LexiconTrainer`] until switched to failing.
#[derive(Default)]
pub struct SwitchableTrainer {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl SwitchableTrainer {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Trainer for SwitchableTrainer {
    fn train(
        &self,
        dataset: &[TenderRow],
        language: &str,
        vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle, TrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(TrainError("switched off".into()));
        }
        LexiconTrainer.train(dataset, language, vocabulary)
    }
}

// ============================================================================
// Tender store
// ============================================================================

/// In-memory tender table that records every write-back and tracks how many
/// connections are currently open.
#[derive(Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<String, Vec<TenderRow>>>,
    open: AtomicUsize,
    unavailable: AtomicBool,
    label_writes: Mutex<Vec<(String, String, Label)>>,
    prediction_writes: Mutex<Vec<(String, String, Label, f64)>>,
}

impl InMemoryStore {
    pub fn with_country(self, country: &str, rows: Vec<TenderRow>) -> Self {
        self.rows.lock().insert(country.to_string(), rows);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn open_connections(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    pub fn label_writes(&self) -> Vec<(String, String, Label)> {
        self.label_writes.lock().clone()
    }

    pub fn prediction_writes(&self, country: &str) -> usize {
        self.prediction_writes
            .lock()
            .iter()
            .filter(|(c, ..)| c == country)
            .count()
    }

    pub fn clear_writes(&self) {
        self.label_writes.lock().clear();
        self.prediction_writes.lock().clear();
    }
}

impl TenderStore for InMemoryStore {
    fn connect(&self) -> Result<Box<dyn StoreConnection + '_>, StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError("connection refused".into()));
        }
        self.open.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemoryConnection { store: self }))
    }
}

struct InMemoryConnection<'a> {
    store: &'a InMemoryStore,
}

impl Drop for InMemoryConnection<'_> {
    fn drop(&mut self) {
        self.store.open.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StoreConnection for InMemoryConnection<'_> {
    fn countries(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self.store.rows.lock().keys().cloned().collect())
    }

    fn fetch_dataset(&mut self, country: &str) -> Result<Vec<TenderRow>, StoreError> {
        if self.store.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError("connection lost".into()));
        }
        Ok(self.store.rows.lock().get(country).cloned().unwrap_or_default())
    }

    fn fetch_tender(
        &mut self,
        country: &str,
        tender_id: &str,
    ) -> Result<Option<TenderRow>, StoreError> {
        Ok(self
            .store
            .rows
            .lock()
            .get(country)
            .and_then(|rows| rows.iter().find(|r| r.tender_id == tender_id).cloned()))
    }

    fn write_label(&mut self, country: &str, tender_id: &str, label: Label) -> Result<(), StoreError> {
        if let Some(row) = self
            .store
            .rows
            .lock()
            .get_mut(country)
            .and_then(|rows| rows.iter_mut().find(|r| r.tender_id == tender_id))
        {
            row.label = Some(i64::from(label.code()));
        }
        self.store
            .label_writes
            .lock()
            .push((country.to_string(), tender_id.to_string(), label));
        Ok(())
    }

    fn write_prediction(
        &mut self,
        country: &str,
        tender_id: &str,
        predicted_label: Label,
        predicted_probability: f64,
    ) -> Result<(), StoreError> {
        self.store.prediction_writes.lock().push((
            country.to_string(),
            tender_id.to_string(),
            predicted_label,
            predicted_probability,
        ));
        Ok(())
    }
}

// ============================================================================
// Archive
// ============================================================================

/// Archive kept in memory, with a switch to make saves fail.
#[derive(Default)]
pub struct MemoryArchive {
    saved: Mutex<HashMap<String, CountryArchive>>,
    fail_saves: AtomicBool,
}

impl MemoryArchive {
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn contains(&self, country: &str) -> bool {
        self.saved.lock().contains_key(country)
    }

    /// Stores `model` as the country's only language without any checks.
    pub fn insert_raw(&self, country: &str, model: LanguageModel) {
        let mut languages = BTreeMap::new();
        languages.insert(model.language.clone(), model);
        self.saved.lock().insert(
            country.to_string(),
            CountryArchive {
                country: country.to_string(),
                languages,
            },
        );
    }
}

impl ModelArchive for MemoryArchive {
    fn save(&self, archive: &CountryArchive) -> Result<(), PersistenceError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(PersistenceError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }
        self.saved
            .lock()
            .insert(archive.country.clone(), archive.clone());
        Ok(())
    }

    fn load(&self, country: &str) -> Result<Option<CountryArchive>, PersistenceError> {
        Ok(self.saved.lock().get(country).cloned())
    }
}
