//!
//! folio storage module
//! --------------------
//! A small document database. A `DocumentStore` is rooted at a folder and
//! hands out named `Collection`s; each collection keeps its documents in memory behind a
//! `parking_lot::RwLock` and mirrors them to `<root>/<name>.json` on every write.
//!
//! Writes go to `<name>.json.tmp` first and are then renamed over the live file, so a
//! crash mid-write leaves the previous version intact. A store without a root keeps
//! everything in memory, which is what the tests use.
//!
//! Open each collection once (at startup) and share the handle: two handles opened
//! from the same file do not see each other's writes.
//!
//! Writes hold the collection lock across file i/o. From async code, run them through
//! [`blocking`] so they stay off the runtime worker threads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

/// Anything stored in a collection. Ids are unique within a collection.
pub trait Document: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("duplicate key '{0}'")]
    Duplicate(String),
    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt collection file {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Run a store operation on the blocking thread pool.
pub async fn blocking<T, F>(f: F) -> anyhow::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.context("storage task failed")
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io { path: path.to_path_buf(), source }
}

/// Root handle for all collections.
#[derive(Clone, Debug)]
pub struct DocumentStore {
    root: Option<PathBuf>,
}

impl DocumentStore {
    /// Open (creating if needed) a store rooted at the given folder.
    pub fn open<P: AsRef<Path>>(root: P) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(io_err(&root))?;
        debug!(target: "folio::storage", "opened document store at '{}'", root.display());
        Ok(Self { root: Some(root) })
    }

    pub fn in_memory() -> Self { Self { root: None } }

    /// Load a named collection. A missing file is an empty collection.
    pub fn collection<T: Document>(&self, name: &str) -> StoreResult<Collection<T>> {
        let path = self.root.as_ref().map(|r| r.join(format!("{name}.json")));
        Collection::load(name, path)
    }
}

#[derive(Clone)]
pub struct Collection<T> {
    name: String,
    path: Option<PathBuf>,
    docs: Arc<RwLock<Vec<T>>>,
}

impl<T: Document> Collection<T> {
    fn load(name: &str, path: Option<PathBuf>) -> StoreResult<Self> {
        let docs: Vec<T> = match &path {
            Some(p) if p.exists() => {
                let bytes = fs::read(p).map_err(io_err(p))?;
                if bytes.iter().all(|b| b.is_ascii_whitespace()) {
                    Vec::new()
                } else {
                    serde_json::from_slice(&bytes).map_err(|source| StoreError::Decode { path: p.clone(), source })?
                }
            }
            _ => Vec::new(),
        };
        debug!(target: "folio::storage", collection = name, count = docs.len(), "collection loaded");
        Ok(Self { name: name.to_string(), path, docs: Arc::new(RwLock::new(docs)) })
    }

    pub fn len(&self) -> usize { self.docs.read().len() }
    pub fn is_empty(&self) -> bool { self.docs.read().is_empty() }

    pub fn all(&self) -> Vec<T> { self.docs.read().clone() }

    pub fn find_by_id(&self, id: &str) -> Option<T> {
        self.docs.read().iter().find(|d| d.id() == id).cloned()
    }

    pub fn find_one(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.docs.read().iter().find(|d| pred(d)).cloned()
    }

    pub fn count_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        self.docs.read().iter().filter(|d| pred(d)).count()
    }

    /// Insert a document; fails if its id is already present.
    pub fn insert(&self, doc: T) -> StoreResult<T> {
        self.insert_unique_by(doc, |d| d.id().to_string())
    }

    /// Insert a document unless another one already has the same key (and always unless
    /// the id collides). The check and the insert happen under one write lock.
    pub fn insert_unique_by(&self, doc: T, key: impl Fn(&T) -> String) -> StoreResult<T> {
        let mut guard = self.docs.write();
        if guard.iter().any(|d| d.id() == doc.id()) {
            return Err(StoreError::Duplicate(doc.id().to_string()));
        }
        let k = key(&doc);
        if guard.iter().any(|d| key(d) == k) {
            return Err(StoreError::Duplicate(k));
        }
        let mut next = guard.clone();
        next.push(doc.clone());
        self.persist(&next)?;
        *guard = next;
        Ok(doc)
    }

    /// Apply `f` to the document with the given id. Returns the updated copy, or `None`
    /// when no such document exists.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut T)) -> StoreResult<Option<T>> {
        let mut guard = self.docs.write();
        let Some(pos) = guard.iter().position(|d| d.id() == id) else { return Ok(None); };
        let mut next = guard.clone();
        f(&mut next[pos]);
        let updated = next[pos].clone();
        self.persist(&next)?;
        *guard = next;
        Ok(Some(updated))
    }

    pub fn delete(&self, id: &str) -> StoreResult<Option<T>> {
        let mut guard = self.docs.write();
        let Some(pos) = guard.iter().position(|d| d.id() == id) else { return Ok(None); };
        let mut next = guard.clone();
        let removed = next.remove(pos);
        self.persist(&next)?;
        *guard = next;
        Ok(Some(removed))
    }

    fn persist(&self, docs: &[T]) -> StoreResult<()> {
        let Some(path) = &self.path else { return Ok(()); };
        let bytes = serde_json::to_vec_pretty(docs).map_err(|source| StoreError::Decode { path: path.clone(), source })?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, bytes).map_err(io_err(&tmp))?;
        fs::rename(&tmp, path).map_err(io_err(path))?;
        debug!(target: "folio::storage", collection = %self.name, count = docs.len(), "collection persisted");
        Ok(())
    }
}

#[cfg(test)]
#[path = "storage_tests.rs"]
mod storage_tests;
