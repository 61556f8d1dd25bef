//! photosweep - Find reclaimable space in a photo library.
//!
//! Usage:
//!   photosweep scan <DIR>                  Run or resume the analysis
//!   photosweep report <DIR>                Show the last saved dashboard
//!   photosweep groups <DIR> -c duplicate   List similar or duplicate groups
//!   photosweep delete <DIR> <IDS>...       Move assets to the trash
//!   photosweep reset <DIR>                 Discard saved progress
//!   photosweep --help                      Show help

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, bail};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use photosweep_analyze::{ImageFileDecoder, NoTextDetector};
use photosweep_core::{
    AssetId, Category, DashboardSnapshot, MIB, PhaseProgress, PipelineConfig, PipelineState,
    SweepError,
};
use photosweep_pipeline::{AnalyzerSet, Pipeline, StateStore};
use photosweep_scan::DirectoryLibrary;

/// State directory created inside the library when `--state-dir` is not given.
const STATE_DIR_NAME: &str = ".photosweep";

#[derive(Parser)]
#[command(
    name = "photosweep",
    version,
    about = "Classify a photo library into reclaimable categories",
    long_about = "photosweep sorts a photo library into screenshots, videos, blurry shots, \
                  similar and duplicate groups and more, so you can see where the space goes.\n\n\
                  Scans are resumable: an interrupted `photosweep scan` continues where it \
                  stopped."
)]
struct Cli {
    #[command(flatten)]
    options: GlobalOptions,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalOptions {
    /// Directory for saved progress (defaults to <DIR>/.photosweep)
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    /// JSON file with pipeline settings
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run or resume the analysis and show the dashboard
    Scan {
        /// Library directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Assets per segment
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        chunk_size: Option<u64>,

        /// Minimum size of a large video, in MiB
        #[arg(long)]
        large_video_mb: Option<u32>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show the last saved dashboard without scanning
    Report {
        /// Library directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List the groups of a grouped category
    Groups {
        /// Library directory
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Which groups to list
        #[arg(short, long, default_value = "duplicate")]
        category: GroupKind,

        /// Maximum number of groups to show
        #[arg(short = 'n', long, default_value = "20")]
        top: usize,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Move assets to the trash and update the saved categories
    Delete {
        /// Library directory
        path: PathBuf,

        /// Asset ids (paths relative to the library directory)
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Discard saved progress and categories
    Reset {
        /// Library directory
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum GroupKind {
    Similar,
    Duplicate,
}

impl From<GroupKind> for Category {
    fn from(kind: GroupKind) -> Self {
        match kind {
            GroupKind::Similar => Category::Similar,
            GroupKind::Duplicate => Category::Duplicate,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.options.verbose);

    match cli.command {
        Command::Scan {
            path,
            chunk_size,
            large_video_mb,
            format,
        } => {
            let path = canonical(&path)?;
            let mut config = load_config(&cli.options, &path)?;
            if let Some(chunk_size) = chunk_size {
                config.chunk_size = chunk_size as usize;
            }
            if let Some(mb) = large_video_mb {
                config.large_video_threshold = i64::from(mb) * MIB;
            }
            run_scan(&path, config, format).await?;
        }
        Command::Report { path, format } => {
            let path = canonical(&path)?;
            let config = load_config(&cli.options, &path)?;
            run_report(&path, &config, format).await?;
        }
        Command::Groups {
            path,
            category,
            top,
            format,
        } => {
            let path = canonical(&path)?;
            let config = load_config(&cli.options, &path)?;
            run_groups(&config, category.into(), top, format).await?;
        }
        Command::Delete { path, ids } => {
            let path = canonical(&path)?;
            let config = load_config(&cli.options, &path)?;
            run_delete(&path, config, ids).await?;
        }
        Command::Reset { path } => {
            let path = canonical(&path)?;
            let config = load_config(&cli.options, &path)?;
            let removed = StateStore::new(&config.state_dir)
                .clear()
                .await
                .context("Failed to clear saved state")?;
            println!("Removed {} file(s) from {}", removed, config.state_dir.display());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

fn canonical(path: &Path) -> Result<PathBuf> {
    path.canonicalize()
        .with_context(|| format!("Invalid library path {}", path.display()))
}

/// Settings from `--config` (or defaults), with the state directory resolved.
fn load_config(options: &GlobalOptions, library: &Path) -> Result<PipelineConfig> {
    let mut config = match &options.config {
        Some(file) => {
            let text = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            serde_json::from_str::<PipelineConfig>(&text)
                .with_context(|| format!("Invalid config file {}", file.display()))?
        }
        None => PipelineConfig::new(PathBuf::new()),
    };
    if let Some(dir) = &options.state_dir {
        config.state_dir = dir.clone();
    }
    if config.state_dir.as_os_str().is_empty() {
        config.state_dir = library.join(STATE_DIR_NAME);
    }
    Ok(config)
}

fn build_pipeline(path: &Path, config: PipelineConfig) -> Pipeline {
    let library = Arc::new(DirectoryLibrary::new(path));
    let analyzers = AnalyzerSet::standard(
        &config,
        Arc::new(ImageFileDecoder::new(path)),
        Arc::new(NoTextDetector),
    );
    Pipeline::new(config, library, analyzers)
}

/// Run or resume the pipeline and print the dashboard.
async fn run_scan(path: &Path, config: PipelineConfig, format: OutputFormat) -> Result<()> {
    eprintln!("Scanning {}...", path.display());

    let pipeline = build_pipeline(path, config);
    let mut updates = pipeline.subscribe();
    let reporter = tokio::spawn(async move {
        let mut shown: Vec<PhaseProgress> = Vec::new();
        while updates.changed().await.is_ok() {
            let progress = updates.borrow_and_update().progress.clone();
            for entry in progress.iter().filter(|p| !shown.contains(p)) {
                eprintln!(
                    "  {:<16} {:>4}/{:<4} {}",
                    entry.phase.to_string(),
                    entry.segment + 1,
                    entry.segment_count,
                    make_bar(entry.fraction(), 20)
                );
            }
            shown = progress;
        }
    });

    let result = pipeline.start().await;
    reporter.abort();

    let snapshot = pipeline.snapshot();
    if let Err(SweepError::PermissionDenied { status }) = &result {
        if let PipelineState::PermissionDenied(guidance) = &snapshot.state {
            eprintln!();
            eprintln!(" {}", guidance.title);
            eprintln!(" {}", guidance.body);
        }
        bail!("Library access not granted ({status})");
    }
    result.context("Scan failed")?;

    if let Some(guidance) = &snapshot.guidance {
        eprintln!(" {}: {}", guidance.title, guidance.body);
    }
    print_dashboard(path, &snapshot.dashboard, format)
}

/// Print the persisted dashboard.
async fn run_report(path: &Path, config: &PipelineConfig, format: OutputFormat) -> Result<()> {
    let store = StateStore::new(&config.state_dir);
    match store.load_dashboard().await {
        Some(dashboard) => print_dashboard(path, &dashboard, format),
        None => {
            println!(
                "No saved analysis for {}. Run `photosweep scan` first.",
                path.display()
            );
            Ok(())
        }
    }
}

/// Print the groups of a grouped category.
async fn run_groups(
    config: &PipelineConfig,
    category: Category,
    top_n: usize,
    format: OutputFormat,
) -> Result<()> {
    let store = StateStore::new(&config.state_dir);
    let Some(book) = store.load_categories().await else {
        println!("No saved analysis. Run `photosweep scan` first.");
        return Ok(());
    };
    let Some(grouped) = book.grouped(category) else {
        bail!("{} is not a grouped category", category.label());
    };
    let groups: Vec<_> = grouped.groups().iter().take(top_n).collect();

    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(70));
            println!(" {} Groups", category.label());
            println!("{}", "─".repeat(70));
            println!();

            if groups.is_empty() {
                println!(" No groups found.");
                return Ok(());
            }
            println!(
                " {} groups ({} items), {} total",
                grouped.group_count(),
                grouped.member_count(),
                format_size(grouped.total_bytes())
            );
            println!();
            for (i, group) in groups.iter().enumerate() {
                let bytes: i64 = group.iter().map(|r| r.size_bytes).sum();
                println!(
                    " Group {} ({} items, {})",
                    i + 1,
                    group.len(),
                    format_size(bytes)
                );
                for record in group.iter() {
                    println!("   {:<56} {:>10}", record.id, format_size(record.size_bytes));
                }
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&groups)?);
        }
    }

    Ok(())
}

/// Trash the given assets and reconcile the saved categories.
async fn run_delete(path: &Path, config: PipelineConfig, ids: Vec<String>) -> Result<()> {
    let ids: Vec<AssetId> = ids.into_iter().map(AssetId::from).collect();
    let pipeline = build_pipeline(path, config);
    pipeline.restore().await;

    let removed = pipeline
        .delete_assets(&ids)
        .await
        .context("Delete failed")?;
    println!(
        "Moved {} asset(s) to the trash; category totals reduced by {}",
        ids.len(),
        format_size(removed)
    );
    Ok(())
}

fn print_dashboard(path: &Path, dashboard: &DashboardSnapshot, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!();
            println!("{}", "─".repeat(60));
            println!(
                " {} - {} reclaimable",
                path.display(),
                format_size(dashboard.total_bytes)
            );
            println!(" Updated {}", dashboard.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("{}", "─".repeat(60));
            println!();

            let max = dashboard
                .cells
                .iter()
                .map(|c| c.total_bytes)
                .max()
                .unwrap_or(0)
                .max(1);
            for cell in &dashboard.cells {
                println!(
                    "   {:<14} {:>10} {:>7} items  {}",
                    cell.category.label(),
                    format_size(cell.total_bytes),
                    cell.item_count,
                    make_bar(cell.total_bytes as f64 / max as f64, 20)
                );
            }
            println!();
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(dashboard)?);
        }
    }
    Ok(())
}

/// Create a simple bar.
fn make_bar(ratio: f64, width: usize) -> String {
    let filled = (ratio.clamp(0.0, 1.0) * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

/// Format size in human-readable form.
fn format_size(bytes: i64) -> String {
    humansize::format_size(bytes.max(0) as u64, humansize::BINARY)
}
