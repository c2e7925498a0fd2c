//! BM25 Okapi scoring of a single document.

use crate::config::IndexConfig;
use crate::stats::TermStats;
use crate::tokenizer::Segmenter;
use crate::DocId;

/// Score of one document plus the number of query terms that contributed to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermScore {
    pub score: f64,
    pub matched: usize,
}

/// Reads a [`TermStats`] and scores documents against queries. Holds no state
/// of its own beyond the two BM25 constants.
#[derive(Debug, Clone, Copy)]
pub struct Scorer<'a> {
    stats: &'a TermStats,
    k1: f64,
    b: f64,
    avg_len: f64,
}

impl<'a> Scorer<'a> {
    pub fn new(stats: &'a TermStats, config: &IndexConfig) -> Self {
        Self { stats, k1: config.k1, b: config.b, avg_len: stats.average_document_length() }
    }

    pub fn score<S: Segmenter + ?Sized>(&self, doc_id: DocId, query: &str, segmenter: &S) -> f64 {
        let tokenized = segmenter.segment(query);
        let terms: Vec<&str> = tokenized.split_whitespace().collect();
        self.score_terms(doc_id, &terms).score
    }

    /// Score an already tokenized query. Terms absent from the document are
    /// skipped; repeated query terms count once per occurrence.
    pub fn score_terms(&self, doc_id: DocId, terms: &[&str]) -> TermScore {
        let Some(term_set) = self.stats.term_set(doc_id) else {
            return TermScore { score: 0.0, matched: 0 };
        };
        let doc_len = self.stats.term_count(doc_id).unwrap_or(0) as f64;
        let norm = self.k1 * (1.0 - self.b + self.b * doc_len / self.avg_len);

        let mut score = 0.0;
        let mut matched = 0;
        for term in terms {
            if !term_set.contains(*term) {
                continue;
            }
            let tf = self.stats.term_frequency(term, doc_id);
            let idf = self.stats.inverse_document_frequency(term);
            let saturation = (self.k1 + 1.0) / (tf + norm);
            score += tf * idf * saturation;
            matched += 1;
        }
        TermScore { score, matched }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdfPolicy;
    use crate::tokenizer::WhitespaceSegmenter;

    fn build(docs: &[&str], policy: IdfPolicy) -> TermStats {
        let mut stats = TermStats::new();
        for d in docs {
            stats.add(d, &WhitespaceSegmenter, policy);
        }
        stats
    }

    #[test]
    fn matches_closed_form() {
        // idf(b) is computed when doc 1 arrives: ln(2/1)
        let stats = build(&["a a c c", "b a"], IdfPolicy::Frozen);
        let cfg = IndexConfig::default();
        let scorer = Scorer::new(&stats, &cfg);

        let tf = 0.5;
        let idf = 2.0f64.ln();
        let avg = 3.0;
        let expected = tf * idf * (1.5 + 1.0) / (tf + 1.5 * (1.0 - 0.75 + 0.75 * 2.0 / avg));
        let got = scorer.score(1, "b", &WhitespaceSegmenter);
        assert!((got - expected).abs() < 1e-12, "{got} vs {expected}");
    }

    #[test]
    fn unmatched_terms_contribute_nothing() {
        let stats = build(&["a b", "c d"], IdfPolicy::Recompute);
        let cfg = IndexConfig::default();
        let scorer = Scorer::new(&stats, &cfg);
        assert_eq!(scorer.score_terms(0, &["c", "zzz"]), TermScore { score: 0.0, matched: 0 });
        assert_eq!(scorer.score_terms(9, &["a"]).matched, 0);
    }

    #[test]
    fn repeated_query_terms_accumulate() {
        let stats = build(&["a b", "c d"], IdfPolicy::Recompute);
        let cfg = IndexConfig::default();
        let scorer = Scorer::new(&stats, &cfg);
        let once = scorer.score_terms(0, &["a"]);
        let twice = scorer.score_terms(0, &["a", "a"]);
        assert_eq!(twice.matched, 2);
        assert!((twice.score - 2.0 * once.score).abs() < 1e-12);
    }

    #[test]
    fn more_occurrences_score_at_least_as_high() {
        let stats = build(&["x x x y", "x y z w", "q"], IdfPolicy::Recompute);
        let cfg = IndexConfig::default();
        let scorer = Scorer::new(&stats, &cfg);
        let dense = scorer.score(0, "x", &WhitespaceSegmenter);
        let sparse = scorer.score(1, "x", &WhitespaceSegmenter);
        assert!(dense >= sparse);
        assert!(sparse > 0.0);
    }
}
