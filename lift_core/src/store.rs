//! File-backed persistence for the per-user documents.
//!
//! The cache's fetchers plug into the [`ProgressStore`] seam; this module
//! also provides the JSON-file implementation used by the CLI, with file
//! locking for concurrent access and atomic temp-file writes.

use crate::{decode, CompletedWorkout, Error, GeneratedProgram, ProgressRecord, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// The persistence collaborator the progress cache revalidates from
///
/// Implementations own where the documents live; the core only cares that
/// fetches are fallible and mutations land before the next fetch.
pub trait ProgressStore {
    fn fetch_progress_record(&self) -> Result<ProgressRecord>;
    fn fetch_generated_program(&self) -> Result<GeneratedProgram>;
    fn append_completed_workout(&self, workout: &CompletedWorkout) -> Result<()>;
    fn update_progress_record(&self, record: &ProgressRecord) -> Result<()>;
}

/// JSON-file store: one file per document under a data directory
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn progress_path(&self) -> PathBuf {
        self.dir.join("progress.json")
    }

    pub fn program_path(&self) -> PathBuf {
        self.dir.join("program.json")
    }

    /// Load a document with a shared lock, resolving problems to defaults
    ///
    /// Missing file, unreadable file and undecodable content all load as the
    /// default document with a log line; the store never propagates shape
    /// errors into the core.
    fn load_document<T>(&self, path: &Path, what: &str) -> T
    where
        T: DeserializeOwned + Default,
    {
        if !path.exists() {
            tracing::info!("No {} file at {:?}, using defaults", what, path);
            return T::default();
        }

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!("Unable to open {} at {:?}: {}. Using defaults.", what, path, e);
                return T::default();
            }
        };

        if let Err(e) = file.lock_shared() {
            tracing::warn!("Unable to lock {} at {:?}: {}. Using defaults.", what, path, e);
            return T::default();
        }

        let mut contents = String::new();
        let mut reader = std::io::BufReader::new(&file);
        let read = reader.read_to_string(&mut contents);
        let _ = file.unlock();
        if let Err(e) = read {
            tracing::warn!("Failed to read {} at {:?}: {}. Using defaults.", what, path, e);
            return T::default();
        }

        match serde_json::from_str::<serde_json::Value>(&contents) {
            // The document may itself be stored as a JSON-encoded string
            Ok(value) => decode::decode_document(value, what),
            Err(e) => {
                tracing::warn!("Failed to parse {} at {:?}: {}. Using defaults.", what, path, e);
                T::default()
            }
        }
    }

    /// Atomically write a document: temp file, exclusive lock, sync, rename
    fn save_document<T: Serialize>(&self, path: &Path, document: &T) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let temp = NamedTempFile::new_in(path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "document path missing parent")
        })?)?;

        temp.as_file().lock_exclusive()?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(document)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        temp.persist(path).map_err(|e| Error::Io(e.error))?;
        tracing::debug!("Saved document to {:?}", path);
        Ok(())
    }
}

impl ProgressStore for JsonFileStore {
    fn fetch_progress_record(&self) -> Result<ProgressRecord> {
        Ok(self.load_document(&self.progress_path(), "progress record"))
    }

    fn fetch_generated_program(&self) -> Result<GeneratedProgram> {
        Ok(self.load_document(&self.program_path(), "generated program"))
    }

    fn append_completed_workout(&self, workout: &CompletedWorkout) -> Result<()> {
        let mut record = self.fetch_progress_record()?;
        record.completed_workouts.push(workout.clone());
        self.update_progress_record(&record)?;
        tracing::info!("Appended completed workout {}", workout.id);
        Ok(())
    }

    fn update_progress_record(&self, record: &ProgressRecord) -> Result<()> {
        self.save_document(&self.progress_path(), record)
    }
}
