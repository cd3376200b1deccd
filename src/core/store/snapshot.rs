//! Durable snapshots of store state.
//!
//! Each storage key maps to one JSON document shaped `{"state": ..., "version": 0}`
//! that is overwritten wholesale on every write. There is no merge logic: the
//! last write wins.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::error::Error as StdError;
use std::fmt;
use std::fs;
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;

use crate::core::config::data::path_display;

pub const CHAT_STORE_KEY: &str = "chat-store";
pub const AUTH_STORE_KEY: &str = "auth-store";

const SNAPSHOT_VERSION: u32 = 0;

/// Persistence port injected into stores at construction time.
pub trait Persistence<S>: Send {
    fn load(&self) -> Result<Option<S>, PersistError>;
    fn save(&self, snapshot: &S) -> Result<(), PersistError>;
}

#[derive(Debug)]
pub enum PersistError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Decode(serde_json::Error),
    Encode(serde_json::Error),
}

impl fmt::Display for PersistError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::Read { path, source } => {
                write!(f, "Failed to read snapshot at {}: {}", path_display(path), source)
            }
            PersistError::Write { path, source } => {
                write!(f, "Failed to write snapshot at {}: {}", path_display(path), source)
            }
            PersistError::Decode(source) => write!(f, "Snapshot is not valid JSON: {source}"),
            PersistError::Encode(source) => write!(f, "Failed to encode snapshot: {source}"),
        }
    }
}

impl StdError for PersistError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            PersistError::Read { source, .. } | PersistError::Write { source, .. } => Some(source),
            PersistError::Decode(source) | PersistError::Encode(source) => Some(source),
        }
    }
}

#[derive(Serialize)]
struct EnvelopeRef<'a, S> {
    state: &'a S,
    version: u32,
}

#[derive(Deserialize)]
struct Envelope<S> {
    state: S,
    #[serde(default)]
    #[allow(dead_code)]
    version: u32,
}

fn encode<S: Serialize>(snapshot: &S) -> Result<String, PersistError> {
    serde_json::to_string(&EnvelopeRef {
        state: snapshot,
        version: SNAPSHOT_VERSION,
    })
    .map_err(PersistError::Encode)
}

fn decode<S: DeserializeOwned>(raw: &str) -> Result<S, PersistError> {
    serde_json::from_str::<Envelope<S>>(raw)
        .map(|envelope| envelope.state)
        .map_err(PersistError::Decode)
}

/// Snapshot stored as `<dir>/<key>.json`, replaced atomically on save.
pub struct JsonFileStorage<S> {
    path: PathBuf,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S> JsonFileStorage<S> {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            _snapshot: PhantomData,
        }
    }

    pub fn for_key(dir: &Path, key: &str) -> Self {
        Self::new(dir.join(format!("{key}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<S> Persistence<S> for JsonFileStorage<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<S>, PersistError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| PersistError::Read {
            path: self.path.clone(),
            source,
        })?;
        decode(&raw).map(Some)
    }

    fn save(&self, snapshot: &S) -> Result<(), PersistError> {
        let contents = encode(snapshot)?;
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(write_err)?;
        }

        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(write_err)?;
        temp_file.write_all(contents.as_bytes()).map_err(write_err)?;
        temp_file.as_file_mut().sync_all().map_err(write_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|err| write_err(err.error))?;
        Ok(())
    }
}

/// In-process snapshot slot. Clones share the slot, so a test can keep a
/// handle and reopen a store from whatever the previous one wrote.
pub struct MemoryStorage<S> {
    slot: Arc<Mutex<Option<String>>>,
    _snapshot: PhantomData<fn() -> S>,
}

impl<S> Clone for MemoryStorage<S> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            _snapshot: PhantomData,
        }
    }
}

impl<S> Default for MemoryStorage<S> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
            _snapshot: PhantomData,
        }
    }
}

impl<S> MemoryStorage<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw JSON document last written, if any.
    pub fn raw(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_raw(&self, raw: impl Into<String>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(raw.into());
    }
}

impl<S> Persistence<S> for MemoryStorage<S>
where
    S: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Option<S>, PersistError> {
        match self.raw() {
            Some(raw) => decode(&raw).map(Some),
            None => Ok(None),
        }
    }

    fn save(&self, snapshot: &S) -> Result<(), PersistError> {
        let contents = encode(snapshot)?;
        self.set_raw(contents);
        Ok(())
    }
}
