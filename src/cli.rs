use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "docintel",
    version,
    about = "Persona-driven document section extraction and ranking"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Analyze(AnalyzeArgs),
    Inventory(InventoryArgs),
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Input collection spec: documents, persona, and job-to-be-done.
    #[arg(long, short = 'i')]
    pub input: PathBuf,

    /// Destination for the ranked-section output JSON.
    #[arg(long, short = 'o')]
    pub output: PathBuf,

    /// Directory holding the PDFs named by the input spec.
    /// Defaults to a `PDFs` directory next to the input file.
    #[arg(long)]
    pub pdf_dir: Option<PathBuf>,

    /// Where to write the analysis run manifest.
    /// Defaults to `analysis_run_<timestamp>.json` next to the output file.
    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// How many top-ranked sections to keep.
    #[arg(long, default_value_t = 5)]
    pub top_k: usize,

    /// Minimum trimmed length for a paragraph to count as a subsection.
    #[arg(long, default_value_t = 50)]
    pub min_subsection_length: usize,

    /// How many top-frequency keywords to attach per section.
    #[arg(long, default_value_t = 10)]
    pub max_keywords: usize,

    /// How many leading sentences to attach per section.
    #[arg(long, default_value_t = 5)]
    pub max_sentences: usize,

    /// Character cap for refined excerpts taken from raw section bodies.
    #[arg(long, default_value_t = 200)]
    pub refined_excerpt_cap: usize,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long, default_value = "PDFs")]
    pub pdf_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct InspectArgs {
    #[arg(long)]
    pub pdf: PathBuf,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
