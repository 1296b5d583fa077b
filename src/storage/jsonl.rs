//! JSONL (JSON Lines) journals.
//!
//! Every committed write is appended as one JSON object per line. On startup
//! the journal is replayed and the last line per key wins.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::hash::Hash;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::StorageError;

/// JSONL file writer.
pub struct JsonlWriter<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: Serialize> JsonlWriter<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Ensure the parent directory exists.
    fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Append a single entity to the file.
    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        self.ensure_dir()?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let mut writer = BufWriter::new(file);
        let json = serde_json::to_string(entity)?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;

        debug!("Appended entity to {:?}", self.path);
        Ok(())
    }
}

/// JSONL file reader.
pub struct JsonlReader<T> {
    path: PathBuf,
    _marker: PhantomData<T>,
}

impl<T: DeserializeOwned> JsonlReader<T> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _marker: PhantomData,
        }
    }

    /// Read all entities from the file. A missing file reads as empty;
    /// unparseable lines are skipped with a warning.
    pub fn read_all(&self) -> Result<Vec<T>, StorageError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut entities = Vec::new();

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;

            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str(&line) {
                Ok(entity) => entities.push(entity),
                Err(e) => {
                    warn!(
                        "Failed to parse line {} in {:?}: {}",
                        idx + 1,
                        self.path,
                        e
                    );
                }
            }
        }

        debug!("Read {} entities from {:?}", entities.len(), self.path);
        Ok(entities)
    }
}

/// Append-only journal backing an in-memory store. A disabled journal
/// drops writes and replays nothing.
pub struct Journal<T> {
    path: Option<PathBuf>,
    // Serializes appends so lines from concurrent writers never interleave.
    lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T: Serialize + DeserializeOwned> Journal<T> {
    pub fn disabled() -> Self {
        Self {
            path: None,
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn at(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            lock: Mutex::new(()),
            _marker: PhantomData,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.path.is_some()
    }

    pub fn append(&self, entity: &T) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        JsonlWriter::new(path.clone()).append(entity)
    }

    /// Every journaled entry in write order.
    pub fn replay_all(&self) -> Result<Vec<T>, StorageError> {
        match &self.path {
            Some(path) => JsonlReader::new(path.clone()).read_all(),
            None => Ok(Vec::new()),
        }
    }

    /// The last journaled entry per key, in order of first appearance.
    pub fn replay_latest<K, F>(&self, key: F) -> Result<Vec<T>, StorageError>
    where
        K: Eq + Hash,
        F: Fn(&T) -> K,
    {
        Ok(latest_by_key(self.replay_all()?, key))
    }
}

/// Keep the last occurrence of each key, preserving first-seen order.
fn latest_by_key<T, K, F>(items: Vec<T>, key: F) -> Vec<T>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut out: Vec<T> = Vec::new();
    for item in items {
        let k = key(&item);
        if let Some(&idx) = slots.get(&k) {
            out[idx] = item;
        } else {
            slots.insert(k, out.len());
            out.push(item);
        }
    }
    out
}
