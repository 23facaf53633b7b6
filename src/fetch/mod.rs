use anyhow::{Context, Result};
use chrono::Local;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use tracing::{error, info};

use crate::sanitize_filename;

mod client;
pub use client::{OpenAlexClient, WorksMeta, WorksPage};

#[derive(Args)]
pub struct FetchArgs {
    /// JSON roster mapping professor names to OpenAlex author ids
    #[arg(short, long, default_value = "data/cs_prof_list.json")]
    pub roster: PathBuf,

    /// Department label recorded in each output file
    #[arg(short, long, default_value = "computer_science")]
    pub department: String,

    /// Output directory (files land in a per-department subdirectory)
    #[arg(short, long, default_value = "data/output")]
    pub output: PathBuf,

    /// OpenAlex API base URL
    #[arg(short = 'u', long, default_value = "https://api.openalex.org")]
    pub base_url: String,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "30")]
    pub timeout: u64,
}

#[derive(Debug, Serialize)]
pub struct ProfessorInfo {
    pub name: String,
    pub author_id: String,
    pub department: String,
    pub total_papers: usize,
    pub fetch_date: String,
}

#[derive(Debug, Serialize)]
pub struct ProfessorDetail {
    pub professor_info: ProfessorInfo,
    pub papers: Vec<Value>,
}

/// Work-record fields the analysis pipeline consumes.
const KEPT_FIELDS: [&str; 7] = [
    "id",
    "doi",
    "title",
    "publication_date",
    "open_access",
    "primary_topic",
    "cited_by_count",
];

/// Reduces a work record to the fields downstream analysis consumes,
/// rewriting the abstract inverted index as plain text.
pub fn filter_work_fields(work: &Value) -> Value {
    let mut filtered = Map::new();

    if let Some(map) = work.as_object() {
        for key in KEPT_FIELDS {
            if let Some(value) = map.get(key) {
                filtered.insert(key.to_string(), value.clone());
            }
        }
        if let Some(index) = map.get("abstract_inverted_index").and_then(Value::as_object) {
            filtered.insert(
                "abstract".to_string(),
                Value::String(abstract_from_inverted_index(index)),
            );
        }
    }

    Value::Object(filtered)
}

/// Rebuilds a readable abstract from the word → positions inverted index.
pub fn abstract_from_inverted_index(index: &Map<String, Value>) -> String {
    let mut positions: Vec<(i64, &str)> = Vec::new();
    for (word, value) in index {
        if let Some(list) = value.as_array() {
            for position in list {
                if let Some(position) = position.as_i64() {
                    positions.push((position, word.as_str()));
                }
            }
        }
    }
    positions.sort_by_key(|(position, _)| *position);

    positions
        .iter()
        .map(|(_, word)| *word)
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn run(args: FetchArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(args))
}

pub async fn run_async(args: FetchArgs) -> Result<()> {
    let roster_file = File::open(&args.roster)
        .with_context(|| format!("Failed to open {}", args.roster.display()))?;
    let roster: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(roster_file))
        .with_context(|| format!("Failed to parse {}", args.roster.display()))?;
    info!("Loaded {} professors from {}", roster.len(), args.roster.display());

    let output_dir = args.output.join(&args.department);
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let client = OpenAlexClient::new(args.base_url.clone(), args.timeout);

    let progress = ProgressBar::new(roster.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut fetched = 0usize;
    let mut failed = 0usize;

    for (name, author_id) in &roster {
        match client.author_works(author_id).await {
            Ok(works) => {
                let papers: Vec<Value> = works.iter().map(filter_work_fields).collect();
                info!("Fetched {} papers for {} ({})", papers.len(), name, author_id);

                let detail = ProfessorDetail {
                    professor_info: ProfessorInfo {
                        name: name.clone(),
                        author_id: author_id.clone(),
                        department: args.department.clone(),
                        total_papers: papers.len(),
                        fetch_date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
                    },
                    papers,
                };

                let path = output_dir
                    .join(format!("{}_{}_detail.json", sanitize_filename(name), author_id));
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), &detail)?;
                fetched += 1;
            }
            Err(e) => {
                error!("Failed to fetch works for {} ({}): {}", name, author_id, e);
                failed += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish();

    println!(
        "Fetch complete: {} succeeded, {} failed, {} total",
        fetched,
        failed,
        roster.len()
    );
    Ok(())
}
