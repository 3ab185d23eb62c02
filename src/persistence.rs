// File: src/persistence.rs
use crate::core::model::LanguageModel;
use crate::error::PersistenceError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// The serializable state of one country: every language model it owns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CountryArchive {
    pub country: String,
    pub languages: BTreeMap<String, LanguageModel>,
}

/// Durable storage for country archives, keyed by country code.
pub trait ModelArchive: Send + Sync {
    fn save(&self, archive: &CountryArchive) -> Result<(), PersistenceError>;

    /// `Ok(None)` when nothing was saved for `country`.
    fn load(&self, country: &str) -> Result<Option<CountryArchive>, PersistenceError>;
}

/// One bincode file per country under a data directory.
#[derive(Debug, Clone)]
pub struct DiskArchive {
    root: PathBuf,
}

impl DiskArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn path_for(&self, country: &str) -> PathBuf {
        self.root.join(format!("{country}.bin"))
    }
}

impl ModelArchive for DiskArchive {
    fn save(&self, archive: &CountryArchive) -> Result<(), PersistenceError> {
        save_to_disk(archive, &self.path_for(&archive.country))
    }

    fn load(&self, country: &str) -> Result<Option<CountryArchive>, PersistenceError> {
        let archive = match load_from_disk(&self.path_for(country)) {
            Ok(archive) => archive,
            Err(PersistenceError::Io(e)) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if archive.country != country {
            return Err(PersistenceError::CountryMismatch {
                requested: country.to_string(),
                found: archive.country,
            });
        }
        Ok(Some(archive))
    }
}

/// Writes to a temp file in the target directory and renames it over `path`,
/// so readers never see a partially written archive.
pub fn save_to_disk(archive: &CountryArchive, path: &Path) -> Result<(), PersistenceError> {
    let parent_dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent_dir)?;

    let temp_file = NamedTempFile::new_in(parent_dir)?;
    {
        let mut writer = BufWriter::new(temp_file.as_file());
        bincode::serialize_into(&mut writer, archive)?;
        writer.flush()?;
    }
    temp_file.as_file().sync_all()?;

    temp_file.persist(path)?;
    debug!(country = %archive.country, path = %path.display(), "archive written");
    Ok(())
}

pub fn load_from_disk(path: &Path) -> Result<CountryArchive, PersistenceError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let archive: CountryArchive = bincode::deserialize_from(reader)?;
    Ok(archive)
}
