use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::IndexConfig;
use crate::error::Result;
use crate::index::Bm25Index;
use crate::persist::{load_snapshot, save_snapshot, Snapshot};
use crate::tokenizer::{DefaultSegmenter, Segmenter};
use crate::{DocId, Metadata};

#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub doc_id: DocId,
    pub score: f64,
    pub text: String,
}

/// Raw documents, their metadata and the BM25 index over them, backed by a
/// snapshot file that is rewritten after every insert.
///
/// `add` needs `&mut self` and `search` only `&self`; hosts that share a store
/// across threads should wrap it in a [`SharedStore`].
#[derive(Debug)]
pub struct DocumentStore<S = DefaultSegmenter> {
    path: PathBuf,
    texts: Vec<String>,
    metadata: Vec<Metadata>,
    doc_ids: HashMap<String, DocId>,
    index: Bm25Index<S>,
}

impl DocumentStore<DefaultSegmenter> {
    /// Load the snapshot at `path`, or start empty if there is none.
    pub fn open<P: AsRef<Path>>(path: P, config: IndexConfig) -> Result<Self> {
        Self::open_with_segmenter(path, config, DefaultSegmenter)
    }
}

impl<S: Segmenter> DocumentStore<S> {
    pub fn open_with_segmenter<P: AsRef<Path>>(path: P, config: IndexConfig, segmenter: S) -> Result<Self> {
        let mut store = Self {
            path: path.as_ref().to_path_buf(),
            texts: Vec::new(),
            metadata: Vec::new(),
            doc_ids: HashMap::new(),
            index: Bm25Index::with_segmenter(config, segmenter),
        };
        store.reload()?;
        Ok(store)
    }

    /// Drop everything held in memory. The snapshot on disk is left alone
    /// until the next `add` or `save`.
    pub fn init(&mut self) {
        self.texts.clear();
        self.metadata.clear();
        self.doc_ids.clear();
        self.index.reset();
    }

    /// Replace the in-memory state with the snapshot on disk. On error the
    /// current state is kept.
    pub fn reload(&mut self) -> Result<()> {
        let Some(snapshot) = load_snapshot(&self.path)? else {
            self.init();
            return Ok(());
        };
        let (texts, metadata, stats) = snapshot.restore(&self.path)?;

        let mut doc_ids = HashMap::with_capacity(texts.len());
        for (id, text) in texts.iter().enumerate() {
            doc_ids.entry(text.clone()).or_insert(id);
        }
        self.texts = texts;
        self.metadata = metadata;
        self.doc_ids = doc_ids;
        self.index.replace_stats(stats);
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let snapshot = Snapshot::capture(&self.texts, &self.metadata, self.index.stats());
        save_snapshot(&self.path, &snapshot)
    }

    /// Append a document and persist the store.
    ///
    /// Empty text and exact duplicates are skipped with a warning and yield `Ok(None)`.
    pub fn add(&mut self, text: &str, metadata: Metadata) -> Result<Option<DocId>> {
        if text.is_empty() {
            tracing::warn!("refusing to add empty text");
            return Ok(None);
        }
        if let Some(existing) = self.doc_ids.get(text) {
            tracing::warn!(doc_id = *existing, "text already stored, skipping");
            return Ok(None);
        }

        self.texts.push(text.to_string());
        self.metadata.push(metadata);
        let doc_id = self.index.add(text);
        self.doc_ids.insert(text.to_string(), doc_id);
        debug_assert_eq!(self.texts.len(), self.index.len());

        self.save()?;
        tracing::debug!(doc_id, docs = self.texts.len(), "added document");
        Ok(Some(doc_id))
    }

    /// Raw texts of the `n` best matching documents, best first.
    pub fn search(&self, query: &str, n: usize) -> Result<Vec<String>> {
        Ok(self.search_hits(query, n)?.into_iter().map(|h| h.text).collect())
    }

    pub fn search_hits(&self, query: &str, n: usize) -> Result<Vec<Hit>> {
        if query.is_empty() || self.texts.is_empty() {
            return Ok(Vec::new());
        }
        let ranked = self.index.search(query, n)?;
        Ok(ranked
            .into_iter()
            .map(|d| Hit { doc_id: d.doc_id, score: d.score, text: self.texts[d.doc_id].clone() })
            .collect())
    }

    pub fn text(&self, doc_id: DocId) -> Option<&str> { self.texts.get(doc_id).map(String::as_str) }

    pub fn metadata(&self, doc_id: DocId) -> Option<&Metadata> { self.metadata.get(doc_id) }

    pub fn contains(&self, text: &str) -> bool { self.doc_ids.contains_key(text) }

    pub fn len(&self) -> usize { self.texts.len() }

    pub fn is_empty(&self) -> bool { self.texts.is_empty() }

    pub fn path(&self) -> &Path { &self.path }

    pub fn config(&self) -> &IndexConfig { self.index.config() }

    pub fn index(&self) -> &Bm25Index<S> { &self.index }
}

/// A [`DocumentStore`] behind a reader/writer lock, for hosts that add and
/// search from several threads. Clones share the same store.
#[derive(Debug)]
pub struct SharedStore<S = DefaultSegmenter> {
    inner: Arc<RwLock<DocumentStore<S>>>,
}

impl<S> Clone for SharedStore<S> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<S: Segmenter> SharedStore<S> {
    pub fn new(store: DocumentStore<S>) -> Self { Self { inner: Arc::new(RwLock::new(store)) } }

    pub fn add(&self, text: &str, metadata: Metadata) -> Result<Option<DocId>> { self.inner.write().add(text, metadata) }

    pub fn search(&self, query: &str, n: usize) -> Result<Vec<String>> { self.inner.read().search(query, n) }

    pub fn reload(&self) -> Result<()> { self.inner.write().reload() }

    pub fn len(&self) -> usize { self.inner.read().len() }

    pub fn is_empty(&self) -> bool { self.inner.read().is_empty() }

    pub fn read(&self) -> RwLockReadGuard<'_, DocumentStore<S>> { self.inner.read() }

    pub fn write(&self) -> RwLockWriteGuard<'_, DocumentStore<S>> { self.inner.write() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::WhitespaceSegmenter;
    use tempfile::tempdir;

    #[test]
    fn empty_and_duplicate_adds_are_skipped() {
        let dir = tempdir().unwrap();
        let mut store = DocumentStore::open_with_segmenter(dir.path().join("m.json"), IndexConfig::default(), WhitespaceSegmenter).unwrap();
        assert_eq!(store.add("", Metadata::new()).unwrap(), None);
        assert_eq!(store.add("hello world", Metadata::new()).unwrap(), Some(0));
        assert_eq!(store.add("hello world", Metadata::new()).unwrap(), None);
        assert_eq!(store.len(), 1);
        assert!(store.contains("hello world"));
    }

    #[test]
    fn init_clears_memory_but_not_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.json");
        let mut store = DocumentStore::open(&path, IndexConfig::default()).unwrap();
        store.add("rust memory store", Metadata::new()).unwrap();
        store.init();
        assert!(store.is_empty());
        assert!(store.search("rust", 5).unwrap().is_empty());
        store.reload().unwrap();
        assert_eq!(store.len(), 1);
    }
}
