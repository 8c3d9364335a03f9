//! Persistent file store.
//!
//! The engine only ever calls [`FileStore::read`] for a submission's entry
//! file. Writes go through the HTTP layer, never through the engine.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use rustc_hash::FxHashMap;
use thiserror::Error;

use crate::toolchain::ToolchainRegistry;
use crate::validate::{NameValidator, PathValidationError};

/// Errors from a file store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    InvalidName(#[from] PathValidationError),

    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Flat, named text-file storage.
pub trait FileStore: Send + Sync + 'static {
    /// Names of all stored files, sorted.
    fn list(&self) -> impl Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Content of `name`.
    fn read(&self, name: &str) -> impl Future<Output = Result<String, StoreError>> + Send;

    /// Create or replace `name`.
    fn write(
        &self,
        name: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Delete `name`.
    fn remove(&self, name: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

fn default_validator() -> NameValidator {
    NameValidator::new(ToolchainRegistry::builtin().extensions())
}

/// File store backed by a single directory.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    max_file_bytes: usize,
    validator: NameValidator,
}

impl DirectoryStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>, max_file_bytes: usize) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            max_file_bytes,
            validator: default_validator(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, StoreError> {
        self.validator.bare(name)?;
        Ok(self.dir.join(name))
    }
}

fn not_found(name: &str) -> impl FnOnce(io::Error) -> StoreError + '_ {
    move |e| {
        if e.kind() == io::ErrorKind::NotFound {
            StoreError::NotFound(name.to_string())
        } else {
            StoreError::Io(e)
        }
    }
}

impl FileStore for DirectoryStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        let mut names = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if self.validator.bare(&name).is_ok() {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<String, StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::read_to_string(&path).await.map_err(not_found(name))
    }

    async fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        if content.len() > self.max_file_bytes {
            return Err(StoreError::TooLarge {
                size: content.len(),
                limit: self.max_file_bytes,
            });
        }

        // Write then rename so concurrent readers never see a partial file.
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()));
        tokio::fs::write(&tmp, content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!("Stored {} ({} bytes)", name, content.len());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path_for(name)?;
        tokio::fs::remove_file(&path).await.map_err(not_found(name))
    }
}

/// In-memory file store.
#[derive(Debug)]
pub struct MemoryStore {
    files: RwLock<FxHashMap<String, String>>,
    max_file_bytes: usize,
    validator: NameValidator,
}

impl MemoryStore {
    pub fn new(max_file_bytes: usize) -> Self {
        Self {
            files: RwLock::new(FxHashMap::default()),
            max_file_bytes,
            validator: default_validator(),
        }
    }

    /// Seed the store with files, bypassing size checks.
    pub fn with_files<I, N, C>(self, files: I) -> Self
    where
        I: IntoIterator<Item = (N, C)>,
        N: Into<String>,
        C: Into<String>,
    {
        if let Ok(mut map) = self.files.write() {
            for (name, content) in files {
                map.insert(name.into(), content.into());
            }
        }
        self
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_FILE_BYTES)
    }
}

fn poisoned() -> StoreError {
    StoreError::Io(io::Error::other("file store lock poisoned"))
}

impl FileStore for MemoryStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        let map = self.files.read().map_err(|_| poisoned())?;
        let mut names: Vec<String> = map.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn read(&self, name: &str) -> Result<String, StoreError> {
        self.validator.bare(name)?;
        let map = self.files.read().map_err(|_| poisoned())?;
        map.get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    async fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        self.validator.bare(name)?;
        if content.len() > self.max_file_bytes {
            return Err(StoreError::TooLarge {
                size: content.len(),
                limit: self.max_file_bytes,
            });
        }
        let mut map = self.files.write().map_err(|_| poisoned())?;
        map.insert(name.to_string(), content.to_string());
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.validator.bare(name)?;
        let mut map = self.files.write().map_err(|_| poisoned())?;
        map.remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }
}
