use anyhow::Result;
use clap::{Parser, Subcommand};
use openalex_taxonomy::{analyze, download, fetch, hierarchy};

#[derive(Parser)]
#[command(name = "openalex-taxonomy")]
#[command(about = "Extract taxonomy subtrees, fetch professor publications, build topic graphs")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract entities and parent-child relationships for a taxonomy subtree
    Hierarchy(hierarchy::HierarchyArgs),
    /// Fetch publication records for professors from the OpenAlex works API
    Fetch(fetch::FetchArgs),
    /// Aggregate professor publication records into topic reports and graphs
    Analyze(analyze::AnalyzeArgs),
    /// Download open-access PDFs referenced by fetched records
    Download(download::DownloadArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }

    match cli.command {
        Commands::Hierarchy(args) => hierarchy::run(args),
        Commands::Fetch(args) => fetch::run(args),
        Commands::Analyze(args) => analyze::run(args),
        Commands::Download(args) => download::run(args),
    }
}
