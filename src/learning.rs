// File: src/learning.rs
use crate::core::model::LanguageModel;
use crate::core::vocabulary::VocabularyEditSet;
use crate::error::{Result, TenderError};
use crate::external::{TenderRow, TrainedBundle, Trainer};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Runs the external trainer under a time bound and turns its output into a
/// validated [`LanguageModel`].
pub struct LearningEngine {
    trainer: Arc<dyn Trainer>,
    timeout: Duration,
}

impl LearningEngine {
    pub fn new(trainer: Arc<dyn Trainer>, timeout: Duration) -> Self {
        Self { trainer, timeout }
    }

    /// First training of a language. The trainer's stop words become the
    /// language's fixed stop words.
    pub fn train_new(
        &self,
        country: &str,
        language: &str,
        dataset: Vec<TenderRow>,
    ) -> Result<LanguageModel> {
        let vocabulary = VocabularyEditSet::default();
        let bundle = self.run(country, language, dataset, &vocabulary)?;
        let vocabulary = VocabularyEditSet {
            stop_words: bundle.stop_words.clone(),
            deleted_words: vocabulary.deleted_words,
        };
        self.assemble(country, language, bundle, vocabulary)
    }

    /// Full refit over an edited vocabulary. `vocabulary` is stored as-is;
    /// stop words reported by the trainer are ignored.
    pub fn retrain(
        &self,
        country: &str,
        language: &str,
        dataset: Vec<TenderRow>,
        vocabulary: VocabularyEditSet,
    ) -> Result<LanguageModel> {
        let bundle = self.run(country, language, dataset, &vocabulary)?;
        self.assemble(country, language, bundle, vocabulary)
    }

    fn run(
        &self,
        country: &str,
        language: &str,
        dataset: Vec<TenderRow>,
        vocabulary: &VocabularyEditSet,
    ) -> Result<TrainedBundle> {
        let rows = dataset.len();
        let failure = |reason: String| TenderError::TrainingFailure {
            country: country.to_string(),
            reason,
        };

        let (tx, rx) = mpsc::channel();
        let trainer = Arc::clone(&self.trainer);
        let thread_language = language.to_string();
        let thread_vocabulary = vocabulary.clone();
        let started = Instant::now();

        // The worker is detached: on timeout it finishes in the background
        // and its result is dropped with the channel.
        thread::Builder::new()
            .name(format!("train-{country}"))
            .spawn(move || {
                let result = trainer.train(&dataset, &thread_language, &thread_vocabulary);
                let _ = tx.send(result);
            })
            .map_err(|e| failure(format!("could not start trainer: {e}")))?;

        let bundle = match rx.recv_timeout(self.timeout) {
            Ok(Ok(bundle)) => bundle,
            Ok(Err(e)) => return Err(failure(e.to_string())),
            Err(RecvTimeoutError::Timeout) => {
                warn!(country, timeout = ?self.timeout, "trainer timed out");
                return Err(failure(format!("trainer timed out after {:?}", self.timeout)));
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(failure("trainer terminated without a result".into()))
            }
        };

        if bundle.tenders.len() != rows {
            return Err(failure(format!(
                "trainer returned {} records for {} rows",
                bundle.tenders.len(),
                rows
            )));
        }
        info!(country, language, rows, elapsed = ?started.elapsed(), "training finished");
        Ok(bundle)
    }

    fn assemble(
        &self,
        country: &str,
        language: &str,
        bundle: TrainedBundle,
        vocabulary: VocabularyEditSet,
    ) -> Result<LanguageModel> {
        let model = LanguageModel {
            language: language.to_string(),
            vectorizer: bundle.vectorizer,
            classifier: bundle.classifier,
            vocabulary,
            tenders: bundle.tenders,
        };
        model
            .validate()
            .map_err(|reason| TenderError::TrainingFailure {
                country: country.to_string(),
                reason: format!("unusable trainer output: {reason}"),
            })?;
        Ok(model)
    }
}
