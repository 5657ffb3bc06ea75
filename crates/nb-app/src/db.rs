//! Plain JSON files read and written wholesale, shared with the dashboard
//! scripts that consume them.

pub mod history;
pub mod stats;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::warn;

pub use history::{HistoryEntry, HistoryStore};
pub use stats::{GenerationStats, StatsStore};

/// One JSON document on disk. Every access holds the file's lock, so an
/// [`JsonFile::update`] is an atomic read-modify-write within the process.
#[derive(Debug)]
pub struct JsonFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn read<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn update<T, R>(&self, apply: impl FnOnce(&mut T) -> R) -> Result<R>
    where
        T: DeserializeOwned + Serialize + Default,
    {
        let _guard = self.lock.lock().await;
        let mut value: T = self.load().await?;
        let out = apply(&mut value);
        self.store(&value).await?;
        Ok(out)
    }

    /// A missing file is an empty document. An unparsable one is moved to
    /// `<name>.corrupt` and read as empty.
    async fn load<T>(&self) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(T::default()),
            Err(err) => {
                return Err(err).with_context(|| format!("reading {}", self.path.display()));
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => {
                let aside = self.corrupt_path();
                warn!(
                    "could not parse {}: {}; moving it to {}",
                    self.path.display(),
                    err,
                    aside.display()
                );
                tokio::fs::rename(&self.path, &aside)
                    .await
                    .with_context(|| format!("moving aside {}", self.path.display()))?;
                Ok(T::default())
            }
        }
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    async fn store<T: Serialize>(&self, value: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(value)?;
        let staging = self.path.with_extension("json.tmp");
        tokio::fs::write(&staging, body)
            .await
            .with_context(|| format!("writing {}", staging.display()))?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn test_missing_and_corrupt_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("nested/list.json"));
        assert_eq!(file.read::<Vec<u32>>().await.unwrap(), Vec::<u32>::new());

        tokio::fs::create_dir_all(dir.path().join("nested")).await.unwrap();
        tokio::fs::write(file.path(), b"{ not json").await.unwrap();
        assert_eq!(file.read::<Vec<u32>>().await.unwrap(), Vec::<u32>::new());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_kept_aside() {
        let dir = tempfile::tempdir().unwrap();
        let file = JsonFile::new(dir.path().join("history.json"));
        tokio::fs::write(file.path(), b"[1, 2,").await.unwrap();

        file.update(|list: &mut Vec<u32>| list.push(7)).await.unwrap();

        let aside = tokio::fs::read(dir.path().join("history.json.corrupt"))
            .await
            .unwrap();
        assert_eq!(aside, b"[1, 2,");
        assert_eq!(file.read::<Vec<u32>>().await.unwrap(), vec![7]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_are_not_lost() {
        let dir = tempfile::tempdir().unwrap();
        let file = Arc::new(JsonFile::new(dir.path().join("counter.json")));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let file = file.clone();
                tokio::spawn(async move { file.update(|n: &mut u64| *n += 1).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(file.read::<u64>().await.unwrap(), 20);
    }
}
