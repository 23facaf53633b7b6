use anyhow::{bail, Context, Result};
use clap::Args;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::{sanitize_filename, HierarchyRelationship};

mod aggregate;
pub use aggregate::{
    aggregate, AnalysisResult, PaperSummary, Taxonomy, TopicAnalysis, TopicInfo, TopicReport,
};

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Professor detail file or a directory of *_detail.json files
    pub input: PathBuf,

    /// Hierarchy relationship file produced by the hierarchy subcommand
    #[arg(short, long, default_value = "data/computer_science_relationships.json")]
    pub relationships: PathBuf,

    /// Output directory for per-professor analysis files
    #[arg(short, long, default_value = "professor_topics_output")]
    pub output: PathBuf,
}

/// Loads the optional hierarchy relationship file. Fails soft: a missing or
/// unparsable file logs a warning and yields no hierarchy edges.
pub fn load_relationships(path: &Path) -> Vec<HierarchyRelationship> {
    if !path.exists() {
        warn!(
            "Relationships file {} not found, proceeding without hierarchical relationships",
            path.display()
        );
        return Vec::new();
    }

    let parsed: Result<Vec<HierarchyRelationship>> =
        File::open(path).map_err(anyhow::Error::from).and_then(|file| {
            serde_json::from_reader(BufReader::new(file)).map_err(anyhow::Error::from)
        });
    match parsed {
        Ok(relationships) => relationships,
        Err(e) => {
            warn!("Failed to load relationships from {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

/// Parses one professor detail file and aggregates it. An unreadable or
/// non-JSON file is an error for this file only.
pub fn analyze_professor_file(
    path: &Path,
    relationships: &[HierarchyRelationship],
) -> Result<AnalysisResult> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let data: Value = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(aggregate(&data, relationships))
}

fn write_result(result: &AnalysisResult, output_dir: &Path) -> Result<PathBuf> {
    let name = result
        .professor_info
        .get("name")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    let author_id = result
        .professor_info
        .get("author_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");

    let filename = format!("topics_analysis_{}_{}.json", sanitize_filename(name), author_id);
    let path = output_dir.join(filename);
    let file =
        File::create(&path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;
    Ok(path)
}

pub fn find_detail_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let pattern = directory.join("*_detail.json");
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    files.sort();
    Ok(files)
}

fn process_file(
    path: &Path,
    relationships: &[HierarchyRelationship],
    output_dir: &Path,
) -> Result<PathBuf> {
    let result = analyze_professor_file(path, relationships)?;
    let written = write_result(&result, output_dir)?;
    info!(
        "{}: {} topics over {} papers -> {}",
        result
            .professor_info
            .get("name")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unknown"),
        result.topic_analysis.total_topics,
        result.topic_analysis.total_papers_analyzed,
        written.display()
    );
    Ok(written)
}

fn run_batch(
    directory: &Path,
    relationships: &[HierarchyRelationship],
    output_dir: &Path,
) -> Result<()> {
    let files = find_detail_files(directory)?;
    if files.is_empty() {
        info!("No professor detail files found in {}", directory.display());
        return Ok(());
    }
    info!("Found {} professor files to process", files.len());

    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut successful = 0usize;
    let mut failed = 0usize;
    for file in &files {
        match process_file(file, relationships, output_dir) {
            Ok(_) => successful += 1,
            Err(e) => {
                error!("Failed to process {}: {:#}", file.display(), e);
                failed += 1;
            }
        }
        progress.inc(1);
    }
    progress.finish();

    println!(
        "Processing complete: {} succeeded, {} failed, {} total",
        successful,
        failed,
        files.len()
    );
    Ok(())
}

pub fn run(args: AnalyzeArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let relationships = load_relationships(&args.relationships);
    if !relationships.is_empty() {
        info!(
            "Loaded {} hierarchical relationships from {}",
            relationships.len(),
            args.relationships.display()
        );
    }

    let is_detail_file = args.input.is_file()
        && args
            .input
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with("_detail.json"));

    if is_detail_file {
        fs::create_dir_all(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
        process_file(&args.input, &relationships, &args.output)?;
        println!("Processing complete: 1 succeeded, 0 failed, 1 total");
        Ok(())
    } else if args.input.is_dir() {
        fs::create_dir_all(&args.output)
            .with_context(|| format!("Failed to create {}", args.output.display()))?;
        run_batch(&args.input, &relationships, &args.output)
    } else {
        bail!("'{}' is not a valid file or directory", args.input.display());
    }
}
