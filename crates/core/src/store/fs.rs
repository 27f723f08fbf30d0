//! Filesystem object store implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::types::{ObjectCreated, ObjectMeta, ObjectStore, StoreError};

/// Capacity of the object-created event channel. Watchers that fall further
/// behind than this observe a lag error and must rescan.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Filesystem-backed object store rooted at a directory.
///
/// Object keys map to paths relative to the root. Writes are atomic: data is
/// written to a temp file next to the destination, then renamed into place, so
/// readers never observe partial objects. Every completed write publishes an
/// [`ObjectCreated`] event on a broadcast channel.
pub struct FsObjectStore {
    root: PathBuf,
    events_tx: broadcast::Sender<ObjectCreated>,
}

impl FsObjectStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| StoreError::io(root.display().to_string(), e))?;

        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self { root, events_tx })
    }

    /// Root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Subscribe to object-created events.
    ///
    /// Receivers that lag behind the channel capacity get a `Lagged` error and
    /// should rescan the prefixes they care about.
    pub fn subscribe(&self) -> broadcast::Receiver<ObjectCreated> {
        self.events_tx.subscribe()
    }

    /// Resolve a key to a path under the root, rejecting escapes.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.starts_with('/') || key.split('/').any(|c| c == "..") {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(key))
    }

    fn meta_from_std(key: &str, meta: &std::fs::Metadata) -> ObjectMeta {
        let last_modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());
        ObjectMeta {
            key: key.to_string(),
            size_bytes: meta.len(),
            last_modified,
        }
    }

    /// Recursively collect object metadata under `dir`.
    async fn collect(
        &self,
        dir: PathBuf,
        prefix: &str,
        out: &mut Vec<ObjectMeta>,
    ) -> Result<(), StoreError> {
        let mut stack = vec![dir];

        while let Some(current) = stack.pop() {
            let mut entries = match fs::read_dir(&current).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(prefix, e)),
            };

            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| StoreError::io(prefix, e))?
            {
                let path = entry.path();
                let file_type = entry
                    .file_type()
                    .await
                    .map_err(|e| StoreError::io(prefix, e))?;

                if file_type.is_dir() {
                    stack.push(path);
                    continue;
                }

                let Ok(relative) = path.strip_prefix(&self.root) else {
                    continue;
                };
                let key = relative.to_string_lossy().replace('\\', "/");
                if !key.starts_with(prefix) {
                    continue;
                }

                let meta = entry
                    .metadata()
                    .await
                    .map_err(|e| StoreError::io(&key, e))?;
                out.push(Self::meta_from_std(&key, &meta));
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    fn name(&self) -> &str {
        "fs"
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<ObjectMeta, StoreError> {
        let path = self.resolve(key)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(key, e))?;
        }

        // Write to a temp file next to the destination, then rename. Readers
        // never see a partially written object.
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("object");
        let tmp = path.with_file_name(format!(".{file_name}.tmp-write"));
        fs::write(&tmp, data)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(key, e))?;

        let meta = fs::metadata(&path)
            .await
            .map_err(|e| StoreError::io(key, e))?;
        let meta = Self::meta_from_std(key, &meta);

        debug!(key = key, size = meta.size_bytes, "Stored object");

        // No subscribers is fine; the event is only advisory.
        let event = ObjectCreated {
            key: key.to_string(),
            created_at: Utc::now(),
        };
        if self.events_tx.send(event).is_err() {
            debug!(key = key, "No object event subscribers");
        }

        Ok(meta)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    async fn head(&self, key: &str) -> Result<ObjectMeta, StoreError> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) => Ok(Self::meta_from_std(key, &meta)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::io(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>, StoreError> {
        // Descend from the deepest whole directory component of the prefix so
        // "aggregated/part" style prefixes also work.
        let dir_part = match prefix.rfind('/') {
            Some(idx) => &prefix[..idx + 1],
            None => "",
        };
        let start = if dir_part.is_empty() {
            self.root.clone()
        } else {
            self.resolve(dir_part.trim_end_matches('/'))?
        };

        let mut out = Vec::new();
        self.collect(start, prefix, &mut out).await?;
        out.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(out)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = key, "Delete of missing object");
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(StoreError::io(key, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::AGGREGATED_PREFIX;
    use tempfile::TempDir;

    async fn test_store() -> (FsObjectStore, TempDir) {
        let temp = TempDir::new().unwrap();
        let store = FsObjectStore::new(temp.path().join("store")).await.unwrap();
        (store, temp)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (store, _temp) = test_store().await;

        let meta = store.put("raw/part-000.jsonl", b"hello").await.unwrap();
        assert_eq!(meta.key, "raw/part-000.jsonl");
        assert_eq!(meta.size_bytes, 5);

        let data = store.get("raw/part-000.jsonl").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let (store, _temp) = test_store().await;

        let result = store.get("raw/nope").await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let (store, _temp) = test_store().await;

        store.put("clean/data", b"first").await.unwrap();
        store.put("clean/data", b"second").await.unwrap();

        let data = store.get("clean/data").await.unwrap();
        assert_eq!(data, b"second");
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (store, _temp) = test_store().await;

        store.put("raw/a.jsonl", b"1").await.unwrap();
        store.put("raw/b.jsonl", b"2").await.unwrap();
        store.put("clean/c.arrow", b"3").await.unwrap();

        let raw = store.list("raw/").await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].key, "raw/a.jsonl");
        assert_eq!(raw[1].key, "raw/b.jsonl");

        let clean = store.list("clean/").await.unwrap();
        assert_eq!(clean.len(), 1);

        let empty = store.list("aggregated/").await.unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_list_nested_keys() {
        let (store, _temp) = test_store().await;

        store.put("raw/2024/01/a.jsonl", b"1").await.unwrap();
        store.put("raw/2024/02/b.jsonl", b"2").await.unwrap();

        let raw = store.list("raw/").await.unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].key, "raw/2024/01/a.jsonl");
    }

    #[tokio::test]
    async fn test_invalid_keys_rejected() {
        let (store, _temp) = test_store().await;

        assert!(matches!(
            store.put("", b"x").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("/abs", b"x").await,
            Err(StoreError::InvalidKey(_))
        ));
        assert!(matches!(
            store.put("raw/../escape", b"x").await,
            Err(StoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_put_publishes_object_created_event() {
        let (store, _temp) = test_store().await;

        let mut rx = store.subscribe();
        store
            .put("aggregated/windows-000.jsonl", b"{}")
            .await
            .unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.key, "aggregated/windows-000.jsonl");
        assert!(event.key.starts_with(AGGREGATED_PREFIX));
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _temp) = test_store().await;

        store.put("scripts/job.sql", b"select 1").await.unwrap();
        store.delete("scripts/job.sql").await.unwrap();

        assert!(matches!(
            store.get("scripts/job.sql").await,
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(
            store.delete("scripts/job.sql").await,
            Err(StoreError::NotFound(_))
        ));
    }
}
