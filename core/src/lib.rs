//! In-process BM25 memory store.
//!
//! Documents are appended to a [`DocumentStore`], folded into incremental
//! term statistics, and persisted as a single JSON snapshot after every
//! insert. Queries score the whole corpus in parallel and return the best
//! matching raw texts.

pub mod config;
pub mod error;
pub mod index;
pub mod persist;
pub mod scorer;
pub mod stats;
pub mod store;
pub mod tokenizer;

use std::collections::HashMap;

pub use config::{IdfPolicy, IndexConfig};
pub use error::{Error, Result};
pub use index::{Bm25Index, ScoredDoc};
pub use store::{DocumentStore, Hit, SharedStore};
pub use tokenizer::{DefaultSegmenter, Segmenter, WhitespaceSegmenter};

/// Position of a document in the corpus, assigned at insertion.
pub type DocId = usize;

/// Caller-supplied key/value pairs stored next to a document and never interpreted.
pub type Metadata = HashMap<String, String>;

/// Number of results callers get when they don't ask for a specific count.
pub const DEFAULT_SEARCH_LIMIT: usize = 5;
