use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use recall_core::{DocumentStore, IdfPolicy, IndexConfig, Metadata, DEFAULT_SEARCH_LIMIT};
use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};
use walkdir::WalkDir;

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct InputDoc {
    text: String,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Parser)]
#[command(name = "recall")]
#[command(about = "Add to and search a BM25 memory snapshot", long_about = None)]
struct Cli {
    /// Snapshot file to load and update
    #[arg(long, default_value = "./memory.json")]
    snapshot: PathBuf,
    /// Term-frequency saturation (BM25 k1)
    #[arg(long, default_value_t = recall_core::config::DEFAULT_K1)]
    k1: f64,
    /// Length normalization strength (BM25 b)
    #[arg(long, default_value_t = recall_core::config::DEFAULT_B)]
    b: f64,
    /// Refresh every IDF after each insert instead of freezing it at first sighting
    #[arg(long, default_value_t = false)]
    recompute_idf: bool,
    /// Scoring threads (defaults to all cores)
    #[arg(long)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a single document
    Add {
        text: String,
        /// Metadata entry as key=value; may be repeated
        #[arg(long = "meta", value_parser = parse_meta)]
        meta: Vec<(String, String)>,
    },
    /// Add documents from JSON/JSONL files or a directory of them
    Ingest {
        /// Input path (file or directory)
        #[arg(long)]
        input: PathBuf,
    },
    /// Print the best matching documents as JSON
    Search {
        query: String,
        #[arg(short, long, default_value_t = DEFAULT_SEARCH_LIMIT)]
        n: usize,
        /// Include document ids and scores
        #[arg(long, default_value_t = false)]
        scores: bool,
    },
    /// Print one document with its metadata
    Show { doc_id: usize },
    /// Corpus size and vocabulary statistics
    Stats,
}

impl Cli {
    fn index_config(&self) -> IndexConfig {
        let policy = if self.recompute_idf { IdfPolicy::Recompute } else { IdfPolicy::Frozen };
        IndexConfig { k1: self.k1, b: self.b, idf_policy: policy, threads: self.threads }
    }
}

fn parse_meta(s: &str) -> Result<(String, String)> {
    let (k, v) = s.split_once('=').ok_or_else(|| anyhow!("expected key=value, got {s:?}"))?;
    if k.is_empty() {
        bail!("metadata key must not be empty");
    }
    Ok((k.to_string(), v.to_string()))
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = cli.index_config();
    let mut store = DocumentStore::open(&cli.snapshot, config)
        .with_context(|| format!("opening snapshot {}", cli.snapshot.display()))?;

    match cli.command {
        Commands::Add { text, meta } => {
            match store.add(&text, meta.into_iter().collect())? {
                Some(doc_id) => println!("{doc_id}"),
                None => eprintln!("skipped: empty or already stored"),
            }
        }
        Commands::Ingest { input } => ingest(&mut store, &input)?,
        Commands::Search { query, n, scores } => {
            let out = if scores {
                let hits: Vec<_> = store
                    .search_hits(&query, n)?
                    .into_iter()
                    .map(|h| serde_json::json!({ "doc_id": h.doc_id, "score": h.score, "text": h.text }))
                    .collect();
                serde_json::to_string_pretty(&hits)?
            } else {
                serde_json::to_string_pretty(&store.search(&query, n)?)?
            };
            println!("{out}");
        }
        Commands::Show { doc_id } => {
            let text = store.text(doc_id).ok_or_else(|| anyhow!("no document with id {doc_id}"))?;
            let obj = serde_json::json!({
                "doc_id": doc_id,
                "text": text,
                "metadata": store.metadata(doc_id),
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
        Commands::Stats => {
            let stats = store.index().stats();
            let obj = serde_json::json!({
                "documents": store.len(),
                "vocabulary": stats.vocabulary_size(),
                "average_length": stats.average_document_length(),
                "idf_policy": store.config().idf_policy,
            });
            println!("{}", serde_json::to_string_pretty(&obj)?);
        }
    }
    Ok(())
}

fn ingest(store: &mut DocumentStore, input: &Path) -> Result<()> {
    let mut files: Vec<PathBuf> = Vec::new();
    if input.is_dir() {
        for entry in WalkDir::new(input).into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(p.extension().and_then(|s| s.to_str()), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
        files.sort();
    } else if input.is_file() {
        files.push(input.to_path_buf());
    } else {
        bail!("input {} does not exist", input.display());
    }

    let before = store.len();
    let mut seen = 0usize;
    for file in files {
        let docs = if file.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            read_jsonl(&file)?
        } else {
            read_json(&file)?
        };
        for doc in docs {
            seen += 1;
            store.add(&doc.text, doc.metadata)?;
        }
    }
    tracing::info!(seen, added = store.len() - before, docs = store.len(), "ingest complete");
    Ok(())
}

fn read_jsonl(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let mut docs = Vec::new();
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}", file.display(), lineno + 1))?;
        docs.push(doc);
    }
    Ok(docs)
}

fn read_json(file: &Path) -> Result<Vec<InputDoc>> {
    let reader = BufReader::new(File::open(file)?);
    let json: serde_json::Value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", file.display()))?;
    let docs = match json {
        serde_json::Value::Array(arr) => arr
            .into_iter()
            .map(serde_json::from_value)
            .collect::<std::result::Result<Vec<InputDoc>, _>>()?,
        serde_json::Value::Object(_) => vec![serde_json::from_value(json)?],
        _ => Vec::new(),
    };
    Ok(docs)
}
