//! Whole-state JSON snapshots.
//!
//! The entire store is one JSON object. Term sets are written as sorted lists
//! and turned back into sets on load; term frequencies are flattened to
//! `"{term}_{doc_id}"` keys. Maps are written in key order so the same state
//! always produces the same bytes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::stats::TermStats;
use crate::Metadata;

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub texts: Vec<String>,
    /// Older snapshots may lack this key; every document then gets empty metadata.
    #[serde(default)]
    pub metadata: Vec<BTreeMap<String, String>>,
    pub preprocessed_texts: Vec<String>,
    pub word_sets: Vec<Vec<String>>,
    pub text_lens: Vec<usize>,
    pub tf_values: BTreeMap<String, f64>,
    pub idf_values: BTreeMap<String, f64>,
    pub sum_len: f64,
}

impl Snapshot {
    pub fn capture(texts: &[String], metadata: &[Metadata], stats: &TermStats) -> Self {
        let word_sets = stats
            .term_sets
            .iter()
            .map(|set| {
                let mut words: Vec<String> = set.iter().cloned().collect();
                words.sort_unstable();
                words
            })
            .collect();

        let mut tf_values = BTreeMap::new();
        for (doc_id, terms) in stats.tf.iter().enumerate() {
            for (term, tf) in terms {
                tf_values.insert(tf_key(term, doc_id), *tf);
            }
        }

        Self {
            texts: texts.to_vec(),
            metadata: metadata.iter().map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect()).collect(),
            preprocessed_texts: stats.tokenized.clone(),
            word_sets,
            text_lens: stats.term_counts.clone(),
            tf_values,
            idf_values: stats.idf.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            sum_len: stats.sum_term_count,
        }
    }

    /// Split the snapshot back into document texts, metadata and term statistics.
    ///
    /// `path` is only used to label errors.
    pub fn restore(self, path: &Path) -> Result<(Vec<String>, Vec<Metadata>, TermStats)> {
        let n = self.texts.len();
        let mut metadata = self.metadata;
        if metadata.is_empty() && n > 0 {
            tracing::debug!(path = %path.display(), "snapshot has no metadata, defaulting to empty maps");
            metadata = vec![BTreeMap::new(); n];
        }

        let lens = [
            ("metadata", metadata.len()),
            ("preprocessed_texts", self.preprocessed_texts.len()),
            ("word_sets", self.word_sets.len()),
            ("text_lens", self.text_lens.len()),
        ];
        for (field, len) in lens {
            if len != n {
                return Err(corrupt(path, format!("{field} has {len} entries, texts has {n}")));
            }
        }

        let mut tf: Vec<HashMap<String, f64>> = vec![HashMap::new(); n];
        for (key, value) in self.tf_values {
            let (term, doc_id) = split_tf_key(&key)
                .filter(|(_, id)| *id < n)
                .ok_or_else(|| corrupt(path, format!("bad tf_values key {key:?}")))?;
            tf[doc_id].insert(term.to_string(), value);
        }

        let mut stats = TermStats {
            tokenized: self.preprocessed_texts,
            term_sets: self.word_sets.into_iter().map(|w| w.into_iter().collect::<HashSet<_>>()).collect(),
            term_counts: self.text_lens,
            sum_term_count: self.sum_len,
            tf,
            idf: self.idf_values.into_iter().collect(),
            doc_freq: HashMap::new(),
        };
        stats.rebuild_doc_freq();

        let metadata = metadata.into_iter().map(|m| m.into_iter().collect()).collect();
        Ok((self.texts, metadata, stats))
    }
}

fn tf_key(term: &str, doc_id: usize) -> String { format!("{term}_{doc_id}") }

/// Terms may contain underscores, so the id is whatever follows the last one.
fn split_tf_key(key: &str) -> Option<(&str, usize)> {
    let (term, id) = key.rsplit_once('_')?;
    Some((term, id.parse().ok()?))
}

fn corrupt(path: &Path, reason: String) -> Error {
    tracing::error!(path = %path.display(), reason = reason.as_str(), "corrupt snapshot");
    Error::corrupt(path, reason)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write the snapshot next to `path` and rename it into place.
pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    let tmp = temp_path(path);
    {
        let mut w = BufWriter::new(File::create(&tmp)?);
        serde_json::to_writer(&mut w, snapshot)?;
        w.flush()?;
    }
    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), docs = snapshot.texts.len(), "saved snapshot");
    Ok(())
}

/// Read a snapshot. A missing or blank file is `Ok(None)`; unparseable content is an error.
pub fn load_snapshot(path: &Path) -> Result<Option<Snapshot>> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no snapshot yet, starting empty");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    if raw.trim().is_empty() {
        return Ok(None);
    }
    let snapshot: Snapshot = serde_json::from_str(&raw).map_err(|e| corrupt(path, e.to_string()))?;
    tracing::info!(path = %path.display(), docs = snapshot.texts.len(), "loaded snapshot");
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdfPolicy;
    use crate::tokenizer::WhitespaceSegmenter;
    use tempfile::tempdir;

    fn sample() -> (Vec<String>, Vec<Metadata>, TermStats) {
        let texts = vec!["snake_case names".to_string(), "plain words here".to_string()];
        let mut stats = TermStats::new();
        for t in &texts {
            stats.add(t, &WhitespaceSegmenter, IdfPolicy::Frozen);
        }
        let mut meta = Metadata::new();
        meta.insert("source".into(), "test".into());
        (texts, vec![meta, Metadata::new()], stats)
    }

    #[test]
    fn tf_keys_split_on_last_underscore() {
        assert_eq!(split_tf_key("snake_case_12"), Some(("snake_case", 12)));
        assert_eq!(split_tf_key("plain"), None);
        assert_eq!(split_tf_key("x_y"), None);
    }

    #[test]
    fn capture_uses_documented_keys() {
        let (texts, meta, stats) = sample();
        let value = serde_json::to_value(Snapshot::capture(&texts, &meta, &stats)).unwrap();
        for key in ["texts", "metadata", "preprocessed_texts", "word_sets", "text_lens", "tf_values", "idf_values", "sum_len"] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
        assert_eq!(value["word_sets"][0], serde_json::json!(["names", "snake_case"]));
        assert_eq!(value["tf_values"]["snake_case_0"], serde_json::json!(0.5));
        assert_eq!(value["sum_len"], serde_json::json!(5.0));
    }

    #[test]
    fn save_then_load_restores_state() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");
        let (texts, meta, stats) = sample();
        let snap = Snapshot::capture(&texts, &meta, &stats);
        save_snapshot(&path, &snap).unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = load_snapshot(&path).unwrap().unwrap();
        assert_eq!(loaded, snap);
        let (texts2, meta2, stats2) = loaded.restore(&path).unwrap();
        assert_eq!(texts2, texts);
        assert_eq!(meta2, meta);
        assert_eq!(stats2.term_sets, stats.term_sets);
        assert_eq!(stats2.tf, stats.tf);
        assert_eq!(stats2.idf, stats.idf);
        assert_eq!(stats2.doc_freq, stats.doc_freq);
    }

    #[test]
    fn missing_and_blank_files_are_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(load_snapshot(&path).unwrap().is_none());
        fs::write(&path, "  \n").unwrap();
        assert!(load_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn malformed_json_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{\"texts\": [").unwrap();
        assert!(matches!(load_snapshot(&path), Err(Error::CorruptSnapshot { .. })));
    }

    #[test]
    fn misaligned_lists_are_rejected() {
        let (texts, meta, stats) = sample();
        let mut snap = Snapshot::capture(&texts, &meta, &stats);
        snap.text_lens.pop();
        assert!(matches!(snap.restore(Path::new("x.json")), Err(Error::CorruptSnapshot { .. })));

        let mut snap = Snapshot::capture(&texts, &meta, &stats);
        snap.tf_values.insert("orphan_9".into(), 1.0);
        assert!(matches!(snap.restore(Path::new("x.json")), Err(Error::CorruptSnapshot { .. })));
    }

    #[test]
    fn absent_metadata_defaults_to_empty_maps() {
        let (texts, meta, stats) = sample();
        let mut snap = Snapshot::capture(&texts, &meta, &stats);
        snap.metadata.clear();
        let (_, meta2, _) = snap.restore(Path::new("x.json")).unwrap();
        assert_eq!(meta2, vec![Metadata::new(), Metadata::new()]);
    }
}
