use recon_triage::config::{LlmBackend, LlmConfig, ReconConfig};
use recon_triage::llm::build_model;
use recon_triage::notify::build_notifier;
use recon_triage::ReconPipeline;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recon-triage")]
#[command(about = "Reconcile two transaction systems and triage unresolved discrepancies")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,

    /// Directory holding the input CSV files (or set RECON_DATA_DIR)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output root directory (or set RECON_OUTPUT_DIR)
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    /// Maximum rows considered per input file (default: 200)
    #[arg(long, global = true)]
    row_cap: Option<usize>,

    /// Unresolved cases triaged concurrently (default: 4)
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Per model call timeout in seconds, 0 disables it (default: 60)
    #[arg(long, global = true)]
    model_timeout_secs: Option<u64>,

    /// Model backend: huggingface, openai or offline
    #[arg(long, global = true)]
    backend: Option<LlmBackend>,

    /// Model name for the selected backend
    #[arg(long, global = true)]
    model: Option<String>,

    /// API key (or set HF_API_TOKEN / OPENAI_API_KEY)
    #[arg(long, global = true)]
    api_key: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Categorize, join replies, triage unresolved cases and write every output
    Run {
        /// Send a notification for each triaged unresolved case
        #[arg(long)]
        notify: bool,
    },
    /// Only categorize the raw file and write the three category files
    Categorize,
    /// Ask the model for the key resolution pattern in a comment
    Pattern {
        /// The discrepancy comment
        comment: String,
    },
}

impl Args {
    /// Environment first, then flags; validated once both are in place.
    fn apply<F>(&self, lookup: F) -> recon_triage::Result<ReconConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = ReconConfig::from_lookup(&lookup)?;

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(cap) = self.row_cap {
            config.row_cap = cap;
        }
        if let Some(n) = self.concurrency {
            config.concurrency = n;
        }
        if let Some(secs) = self.model_timeout_secs {
            config.model_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(backend) = self.backend {
            config.llm = LlmConfig::from_lookup(Some(backend), &lookup)?;
        }
        if let Some(key) = &self.api_key {
            config.llm.api_key = Some(key.clone());
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Commands::Run { notify: true } = self.command {
            config.notify.enabled = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.apply(|key| std::env::var(key).ok())?;

    let model = build_model(&config.llm)?;
    let notifier = config.notify.enabled.then(|| build_notifier(&config.notify));
    let mut pipeline = ReconPipeline::new(config, model);
    if let Some(notifier) = notifier {
        pipeline = pipeline.with_notifier(notifier);
    }

    match &args.command {
        Commands::Run { .. } => {
            info!("Reconciliation pipeline starting...");
            let summary = pipeline.run().await?;

            println!("\n=== Reconciliation Results ===");
            println!("{}", summary);
            if !summary.failed.is_empty() {
                warn!("{} unresolved cases could not be triaged", summary.failed.len());
            }
        }
        Commands::Categorize => {
            let (categorized, _files) = pipeline.categorize()?;
            println!(
                "\nMatched: {} | Not Found-SysB: {} | Not Matched: {} | Uncategorized: {}",
                categorized.matched.len(),
                categorized.not_found_sys_b.len(),
                categorized.not_matched.len(),
                categorized.uncategorized
            );
        }
        Commands::Pattern { comment } => {
            let pattern = pipeline.assist().identify_pattern(comment).await?;
            println!("{}", pattern);
        }
    }

    Ok(())
}
