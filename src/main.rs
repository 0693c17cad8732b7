//! reqsight CLI - stream LLM explanations and categorize captured requests

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqsight::{
    api::{explain_capture, stream_completion, CompletionRequest},
    cache::CategoryCache,
    config::Settings,
    surface::{categorize_requests, AnalysisProgress, CapturedRequest},
};
use std::io::Write;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "reqsight")]
#[command(about = "AI assistance for inspecting captured HTTP traffic")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level
    #[arg(short, long, default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream an explanation of one captured request/response
    Explain {
        /// File holding the raw request/response text
        input: PathBuf,

        /// Optional file with a system prompt to use instead of the
        /// built-in explanation preamble
        #[arg(short, long)]
        system: Option<PathBuf>,
    },

    /// Categorize a batch of captured requests by attack surface
    Categorize {
        /// JSON file holding an array of {method, url, headers} records
        input: PathBuf,

        /// Skip writing results to the category cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Initialize configuration file with defaults
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Show current configuration (API keys masked)
    Show,

    /// Show configuration file path
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.log_level.parse::<Level>().unwrap_or(Level::WARN);
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("failed to initialize logging")?;

    match cli.command {
        Commands::Explain { input, system } => cmd_explain(input, system).await,
        Commands::Categorize { input, no_cache } => cmd_categorize(input, no_cache).await,
        Commands::Config(command) => cmd_config(command),
    }
}

async fn cmd_explain(input: PathBuf, system: Option<PathBuf>) -> Result<()> {
    let raw = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let settings = Settings::load()?;
    let config = settings.active_provider();

    // Print only the suffix each update adds; cumulative text is
    // append-only, so the previous length is always a char boundary.
    let mut printed = 0;
    let print_update = |cumulative: &str| {
        print!("{}", &cumulative[printed..]);
        let _ = std::io::stdout().flush();
        printed = cumulative.len();
    };

    match system {
        Some(path) => {
            let system = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let request = CompletionRequest::new(raw)
                .with_system(system)
                .with_max_tokens(4096);
            stream_completion(&config, request, print_update).await?;
        }
        None => {
            explain_capture(&config, &raw, print_update).await?;
        }
    }

    println!();
    Ok(())
}

async fn cmd_categorize(input: PathBuf, no_cache: bool) -> Result<()> {
    let content = std::fs::read_to_string(&input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let requests: Vec<CapturedRequest> =
        serde_json::from_str(&content).context("capture file is not a JSON request array")?;

    let settings = Settings::load()?;
    let config = settings.active_provider();

    let categories = categorize_requests(&config, &requests, |event| match event {
        AnalysisProgress::BuildingPrompt => eprintln!("building prompt..."),
        AnalysisProgress::Analyzing => eprintln!("analyzing {} requests...", requests.len()),
        AnalysisProgress::Streaming { text } => {
            eprint!("\rreceived {} bytes", text.len());
            let _ = std::io::stderr().flush();
        }
        AnalysisProgress::Parsing => eprintln!("\nparsing reply..."),
        AnalysisProgress::Complete { .. } => {}
    })
    .await?;

    let mut indices: Vec<_> = categories.keys().copied().collect();
    indices.sort_unstable();
    for index in indices {
        let category = &categories[&index];
        println!(
            "[{index:>3}] {} {} ({:?}) - {}",
            category.icon, category.category, category.confidence, category.reasoning
        );
    }

    if !no_cache {
        let cache = CategoryCache::new();
        cache.save(&categories)?;
        eprintln!("cached {} categories at {}", categories.len(), cache.path().display());
    }

    Ok(())
}

fn cmd_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Init { force } => {
            let path = Settings::default_path();
            if path.exists() && !force {
                anyhow::bail!(
                    "config already exists at {} (use --force to overwrite)",
                    path.display()
                );
            }
            Settings::default().save()?;
            println!("wrote {}", path.display());
        }
        ConfigCommands::Show => {
            let mut settings = Settings::load()?;
            if settings.anthropic.api_key.is_some() {
                settings.anthropic.api_key = Some("***".to_string());
            }
            if settings.gemini.api_key.is_some() {
                settings.gemini.api_key = Some("***".to_string());
            }
            print!("{}", toml::to_string_pretty(&settings)?);
        }
        ConfigCommands::Path => {
            println!("{}", Settings::default_path().display());
        }
    }
    Ok(())
}
