use anyhow::{Context, Result};
use clap::Args;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tracing::{error, info, warn};

use crate::nested_object;

#[derive(Args)]
pub struct DownloadArgs {
    /// Directory containing professor detail JSON files
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory to store downloaded PDFs
    #[arg(short, long, default_value = "downloads")]
    pub output: PathBuf,

    /// Concurrent downloads (0 = auto)
    #[arg(short, long, default_value = "0")]
    pub concurrency: usize,

    /// Request timeout in seconds
    #[arg(short, long, default_value = "60")]
    pub timeout: u64,
}

/// One open-access download candidate.
#[derive(Debug, Clone)]
pub struct OaPaper {
    pub openalex_id: String,
    pub title: String,
    pub oa_url: String,
}

#[derive(Debug, Default)]
pub struct DownloadStats {
    pub candidates: u64,
    pub downloaded: u64,
    pub skipped: u64,
    pub http_errors: u64,
    pub network_errors: u64,
    pub integrity_failures: u64,
    pub write_errors: u64,
}

enum Outcome {
    Downloaded,
    Skipped,
    HttpError,
    NetworkError,
    IntegrityFailure,
    WriteError,
}

/// Trailing path segment of an OpenAlex work URL (the W-number), or the id
/// itself when it is not a URL.
fn short_openalex_id(id: &str) -> &str {
    id.rsplit('/').next().unwrap_or(id)
}

/// Scans professor detail files for papers flagged open access with a URL.
/// Candidates are deduplicated by work id across files; an unparsable file
/// is logged and the scan continues.
pub fn collect_oa_papers(directory: &Path) -> Result<Vec<OaPaper>> {
    let pattern = directory.join("*_detail.json");
    let mut files: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
        .filter_map(Result::ok)
        .collect();
    files.sort();

    let mut seen: HashSet<String> = HashSet::new();
    let mut papers = Vec::new();

    for file in files {
        let parsed = File::open(&file).map_err(anyhow::Error::from).and_then(|f| {
            serde_json::from_reader::<_, Value>(BufReader::new(f)).map_err(anyhow::Error::from)
        });
        let data = match parsed {
            Ok(data) => data,
            Err(e) => {
                error!("Error parsing {}: {}", file.display(), e);
                continue;
            }
        };

        let Some(list) = data.get("papers").and_then(Value::as_array) else {
            continue;
        };
        for paper in list {
            let Some(open_access) = nested_object(paper, &["open_access"]) else {
                continue;
            };
            if open_access.get("is_oa").and_then(Value::as_bool) != Some(true) {
                continue;
            }
            let Some(oa_url) = open_access
                .get("oa_url")
                .and_then(Value::as_str)
                .filter(|u| !u.is_empty())
            else {
                continue;
            };
            let Some(id) = paper
                .get("id")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
            else {
                continue;
            };

            let short_id = short_openalex_id(id).to_string();
            if !seen.insert(short_id.clone()) {
                continue;
            }
            papers.push(OaPaper {
                openalex_id: short_id,
                title: paper
                    .get("title")
                    .and_then(Value::as_str)
                    .unwrap_or("Untitled")
                    .to_string(),
                oa_url: oa_url.to_string(),
            });
        }
    }

    Ok(papers)
}

/// Accepts only bodies that look like complete PDF documents. Small bodies
/// and HTML error pages served with a 200 status are integrity failures.
pub fn looks_like_pdf(content: &[u8]) -> bool {
    content.len() >= 1024 && content.starts_with(b"%PDF")
}

async fn download_paper(client: &Client, paper: &OaPaper, target: &Path) -> Outcome {
    if target.exists() {
        return Outcome::Skipped;
    }

    let max_retries = 3;
    for attempt in 0..max_retries {
        let response = match client.get(&paper.oa_url).send().await {
            Ok(response) => response,
            Err(e) => {
                if attempt < max_retries - 1 {
                    let wait = 2u64.pow(attempt as u32);
                    warn!("Request error for {}, retrying in {}s: {}", paper.oa_url, wait, e);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    continue;
                }
                return Outcome::NetworkError;
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!("HTTP {} for {} ({})", status, paper.openalex_id, paper.oa_url);
            return Outcome::HttpError;
        }

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                if attempt < max_retries - 1 {
                    let wait = 2u64.pow(attempt as u32);
                    warn!("Body read error for {}, retrying in {}s: {}", paper.oa_url, wait, e);
                    tokio::time::sleep(Duration::from_secs(wait)).await;
                    continue;
                }
                return Outcome::NetworkError;
            }
        };

        if !looks_like_pdf(&body) {
            warn!(
                "{} did not return a PDF document for '{}'",
                paper.oa_url, paper.title
            );
            return Outcome::IntegrityFailure;
        }

        return match fs::write(target, &body) {
            Ok(()) => Outcome::Downloaded,
            Err(e) => {
                error!("Failed to write {}: {}", target.display(), e);
                Outcome::WriteError
            }
        };
    }

    Outcome::NetworkError
}

pub fn run(args: DownloadArgs) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init()
        .ok();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_async(args))
}

pub async fn run_async(args: DownloadArgs) -> Result<()> {
    let papers = collect_oa_papers(&args.input)?;
    info!("Found {} open-access papers to download", papers.len());

    fs::create_dir_all(&args.output)
        .with_context(|| format!("Failed to create {}", args.output.display()))?;
    if papers.is_empty() {
        return Ok(());
    }

    let workers = if args.concurrency > 0 {
        args.concurrency
    } else {
        num_cpus::get()
    };
    info!("Using {} concurrent downloads", workers);

    let client = Client::builder()
        .timeout(Duration::from_secs(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;
    let semaphore = Arc::new(Semaphore::new(workers));
    let stats = Arc::new(Mutex::new(DownloadStats {
        candidates: papers.len() as u64,
        ..Default::default()
    }));

    let progress = ProgressBar::new(papers.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut handles = Vec::with_capacity(papers.len());
    for paper in papers {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let stats = Arc::clone(&stats);
        let target = args.output.join(format!("{}.pdf", paper.openalex_id));
        let progress = progress.clone();

        handles.push(tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(_) => return,
            };

            let outcome = download_paper(&client, &paper, &target).await;

            let mut stats = stats.lock().await;
            match outcome {
                Outcome::Downloaded => stats.downloaded += 1,
                Outcome::Skipped => stats.skipped += 1,
                Outcome::HttpError => stats.http_errors += 1,
                Outcome::NetworkError => stats.network_errors += 1,
                Outcome::IntegrityFailure => stats.integrity_failures += 1,
                Outcome::WriteError => stats.write_errors += 1,
            }
            progress.inc(1);
        }));
    }

    for handle in handles {
        if let Err(e) = handle.await {
            error!("Task failed: {}", e);
        }
    }
    progress.finish();

    let stats = stats.lock().await;
    eprintln!(
        "\nResults:\n  Candidates: {}\n  Downloaded: {}\n  Skipped (already present): {}\n  HTTP errors: {}\n  Network errors: {}\n  Integrity failures: {}\n  Write errors: {}",
        stats.candidates,
        stats.downloaded,
        stats.skipped,
        stats.http_errors,
        stats.network_errors,
        stats.integrity_failures,
        stats.write_errors
    );

    Ok(())
}
