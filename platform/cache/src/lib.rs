//! On-disk cache for raw roster payloads.
//!
//! Each cached batch is a directory holding one file per payload, named by
//! position (`data0`, `data1`, ...). Every operation on a cache is serialized
//! behind a single async mutex and runs its file I/O on the blocking pool.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

const FILE_PREFIX: &str = "data";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache root directory available on this platform")]
    NoCacheRoot,
    #[error("cache i/o failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cache task aborted: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type CacheResult<T> = Result<T, CacheError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> CacheError + '_ {
    move |source| CacheError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Where the cache directory lives.
#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub root: Option<PathBuf>,
    pub directory_name: String,
}

fn default_directory_name() -> String {
    "employee-roster".to_string()
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: None,
            directory_name: default_directory_name(),
        }
    }
}

impl CacheSettings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
            ..Self::default()
        }
    }

    /// Reads `DIRECTORY_CACHE_DIR` through `env`; without it the platform
    /// cache directory is used.
    pub fn from_lookup(env: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            root: env("DIRECTORY_CACHE_DIR")
                .filter(|root| !root.trim().is_empty())
                .map(PathBuf::from),
            ..Self::default()
        }
    }

    pub fn with_directory_name(mut self, name: impl Into<String>) -> Self {
        self.directory_name = name.into();
        self
    }

    pub fn cache_directory(&self) -> CacheResult<PathBuf> {
        let root = match &self.root {
            Some(root) => root.clone(),
            None => dirs::cache_dir().ok_or(CacheError::NoCacheRoot)?,
        };
        Ok(root.join(&self.directory_name))
    }
}

/// Serialized access to one cache directory.
#[derive(Debug)]
pub struct PayloadCache {
    directory: Arc<PathBuf>,
    lock: Mutex<()>,
    cached: AtomicBool,
}

impl PayloadCache {
    /// Creates the cache directory when missing. An already existing directory
    /// counts as cached data.
    pub fn open(settings: &CacheSettings) -> CacheResult<Self> {
        let directory = settings.cache_directory()?;
        let cached = if directory.is_dir() {
            true
        } else {
            fs::create_dir_all(&directory).map_err(io_error(&directory))?;
            false
        };
        debug!(path = %directory.display(), cached, "payload cache opened");
        Ok(Self {
            directory: Arc::new(directory),
            lock: Mutex::new(()),
            cached: AtomicBool::new(cached),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn is_data_cached(&self) -> bool {
        self.cached.load(Ordering::SeqCst)
    }

    /// Replaces the cached batch. The new files are staged next to the cache
    /// directory and swapped in only once all of them are written, so a failed
    /// write keeps the previous batch.
    pub async fn write(&self, payloads: &[Bytes]) -> CacheResult<()> {
        let _guard = self.lock.lock().await;
        let directory = Arc::clone(&self.directory);
        let payloads = payloads.to_vec();
        tokio::task::spawn_blocking(move || write_batch(&directory, &payloads)).await??;
        self.cached.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Loads every cached payload in positional order.
    pub async fn read(&self) -> CacheResult<Vec<Bytes>> {
        let _guard = self.lock.lock().await;
        let directory = Arc::clone(&self.directory);
        let payloads = tokio::task::spawn_blocking(move || read_batch(&directory)).await??;
        Ok(payloads)
    }
}

fn payload_file_name(index: usize) -> String {
    format!("{FILE_PREFIX}{index}")
}

/// Only canonical names count: `data01` or `data+1` are foreign files.
fn payload_index(name: &str) -> Option<usize> {
    let index = name.strip_prefix(FILE_PREFIX)?.parse().ok()?;
    (payload_file_name(index) == name).then_some(index)
}

fn sibling(directory: &Path, suffix: &str) -> PathBuf {
    let name = directory
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cache".to_string());
    directory.with_file_name(format!(".{name}.{suffix}-{}", Uuid::new_v4().simple()))
}

fn write_batch(directory: &Path, payloads: &[Bytes]) -> CacheResult<()> {
    let staging = sibling(directory, "staging");
    if let Err(err) = stage_batch(&staging, payloads) {
        let _ = fs::remove_dir_all(&staging);
        return Err(err);
    }

    let retired = sibling(directory, "retired");
    let had_previous = directory.exists();
    if had_previous {
        if let Err(source) = fs::rename(directory, &retired) {
            let _ = fs::remove_dir_all(&staging);
            return Err(CacheError::Io {
                path: directory.to_path_buf(),
                source,
            });
        }
    }
    if let Err(source) = fs::rename(&staging, directory) {
        if had_previous {
            let _ = fs::rename(&retired, directory);
        }
        let _ = fs::remove_dir_all(&staging);
        return Err(CacheError::Io {
            path: directory.to_path_buf(),
            source,
        });
    }
    if had_previous {
        if let Err(err) = fs::remove_dir_all(&retired) {
            warn!(path = %retired.display(), error = %err, "failed to remove retired cache batch");
        }
    }
    Ok(())
}

fn stage_batch(staging: &Path, payloads: &[Bytes]) -> CacheResult<()> {
    fs::create_dir_all(staging).map_err(io_error(staging))?;
    for (index, payload) in payloads.iter().enumerate() {
        let path = staging.join(payload_file_name(index));
        fs::write(&path, payload).map_err(io_error(&path))?;
        debug!(path = %path.display(), bytes = payload.len(), "payload staged");
    }
    Ok(())
}

fn read_batch(directory: &Path) -> CacheResult<Vec<Bytes>> {
    let mut indexed = Vec::new();
    for entry in fs::read_dir(directory).map_err(io_error(directory))? {
        let entry = entry.map_err(io_error(directory))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        let Some(index) = payload_index(name) else {
            debug!(file = name, "ignoring foreign file in cache directory");
            continue;
        };
        let path = entry.path();
        let bytes = fs::read(&path).map_err(io_error(&path))?;
        indexed.push((index, Bytes::from(bytes)));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, bytes)| bytes).collect())
}
