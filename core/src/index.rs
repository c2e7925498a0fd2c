use std::cmp::Reverse;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;

use crate::config::IndexConfig;
use crate::error::Result;
use crate::scorer::Scorer;
use crate::stats::TermStats;
use crate::tokenizer::{DefaultSegmenter, Segmenter};
use crate::DocId;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredDoc {
    pub doc_id: DocId,
    pub score: f64,
    /// Query term occurrences found in the document.
    pub matched: usize,
}

impl ScoredDoc {
    /// Higher is better: score, then matched terms, then the lower document id.
    fn rank_key(&self) -> (OrderedFloat<f64>, usize, Reverse<DocId>) {
        (OrderedFloat(self.score), self.matched, Reverse(self.doc_id))
    }
}

#[derive(Debug, Clone, Copy)]
struct Ranked(ScoredDoc);

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == std::cmp::Ordering::Equal }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> { Some(self.cmp(other)) }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering { self.0.rank_key().cmp(&other.0.rank_key()) }
}

/// Min-heap holding at most `k` entries; the weakest is evicted first.
type TopK = BinaryHeap<Reverse<Ranked>>;

fn push_bounded(mut heap: TopK, doc: ScoredDoc, k: usize) -> TopK {
    heap.push(Reverse(Ranked(doc)));
    if heap.len() > k {
        heap.pop();
    }
    heap
}

/// Term statistics plus the tokenizer and constants needed to rank them.
#[derive(Debug, Clone)]
pub struct Bm25Index<S = DefaultSegmenter> {
    stats: TermStats,
    segmenter: S,
    config: IndexConfig,
}

impl Bm25Index<DefaultSegmenter> {
    pub fn new(config: IndexConfig) -> Self { Self::with_segmenter(config, DefaultSegmenter) }
}

impl<S: Segmenter> Bm25Index<S> {
    pub fn with_segmenter(config: IndexConfig, segmenter: S) -> Self {
        Self { stats: TermStats::new(), segmenter, config }
    }

    pub fn add(&mut self, raw_text: &str) -> DocId {
        self.stats.add(raw_text, &self.segmenter, self.config.idf_policy)
    }

    pub fn score(&self, doc_id: DocId, query: &str) -> f64 {
        Scorer::new(&self.stats, &self.config).score(doc_id, query, &self.segmenter)
    }

    /// Rank every document against `query` and return the best `n`, best first.
    ///
    /// Scoring runs on a pool that lives only for the duration of the call.
    /// Documents with a zero score can still appear when fewer than `n`
    /// documents match.
    pub fn search(&self, query: &str, n: usize) -> Result<Vec<ScoredDoc>> {
        if n == 0 || self.stats.is_empty() {
            return Ok(Vec::new());
        }
        let tokenized = self.segmenter.segment(query);
        let terms: Vec<&str> = tokenized.split_whitespace().collect();
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let scorer = Scorer::new(&self.stats, &self.config);
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.config.pool_size())
            .thread_name(|i| format!("bm25-score-{i}"))
            .build()?;

        let heap = pool.install(|| {
            (0..self.stats.len())
                .into_par_iter()
                .map(|doc_id| {
                    let s = scorer.score_terms(doc_id, &terms);
                    ScoredDoc { doc_id, score: s.score, matched: s.matched }
                })
                .fold(TopK::new, |heap, doc| push_bounded(heap, doc, n))
                .reduce(TopK::new, |a, b| b.into_iter().fold(a, |heap, Reverse(r)| push_bounded(heap, r.0, n)))
        });

        let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));
        tracing::debug!(docs = self.stats.len(), terms = terms.len(), n, returned = ranked.len(), "ranked corpus");
        Ok(ranked.into_iter().map(|r| r.0).collect())
    }

    pub fn stats(&self) -> &TermStats { &self.stats }

    pub fn config(&self) -> &IndexConfig { &self.config }

    pub fn segmenter(&self) -> &S { &self.segmenter }

    pub fn len(&self) -> usize { self.stats.len() }

    pub fn is_empty(&self) -> bool { self.stats.is_empty() }

    pub(crate) fn reset(&mut self) { self.stats = TermStats::new(); }

    pub(crate) fn replace_stats(&mut self, stats: TermStats) { self.stats = stats; }
}
