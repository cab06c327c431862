//! `adpilot run`: run one recommendation loop.

use adpilot_agent::{LoopController, LoopSettings, RunRequest, SeedContext};
use adpilot_config::{AppConfig, ExecutorKind, ToolsConfig};
use adpilot_core::decision::DecisionStore;
use adpilot_core::scope::OrgScope;
use adpilot_core::tool::ToolExecutor;
use adpilot_providers::AnthropicClient;
use adpilot_store::{InMemoryDecisionStore, SqliteDecisionStore};
use adpilot_tools::{FixtureToolExecutor, HttpToolExecutor};
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Args)]
pub struct RunArgs {
    /// Organization to run for
    #[arg(long)]
    pub org: String,

    /// Correlation id of the analysis run (generated when omitted)
    #[arg(long)]
    pub run_id: Option<String>,

    /// Seed file: JSON `{"summary": .., "platform_summaries": {..}}`
    #[arg(long, conflicts_with = "summary")]
    pub seed: Option<PathBuf>,

    /// Seed summary text
    #[arg(long)]
    pub summary: Option<String>,

    /// Connected platforms (comma-separated); empty offers every tool
    #[arg(long, value_delimiter = ',')]
    pub platforms: Vec<String>,

    /// Replay exploration calls from this fixtures file
    #[arg(long)]
    pub fixtures: Option<PathBuf>,

    /// Keep decisions in memory instead of the configured store
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(config: &AppConfig, args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set ADPILOT_API_KEY or ANTHROPIC_API_KEY, or add api_key to:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let seed = load_seed(args.seed.as_deref(), args.summary.as_deref())?;

    let mut client = AnthropicClient::new(api_key)?;
    if let Some(base_url) = &config.provider.base_url {
        client = client.with_base_url(base_url);
    }

    let executor = build_executor(&config.tools, args.fixtures.as_deref())?;
    let store: Arc<dyn DecisionStore> = if args.dry_run {
        Arc::new(InMemoryDecisionStore::new().with_expiry_days(config.store.expiry_days))
    } else {
        Arc::new(
            SqliteDecisionStore::new(&config.store.path)
                .await?
                .with_expiry_days(config.store.expiry_days),
        )
    };

    let org = OrgScope::new(args.org);
    let prior_decisions = if config.run.prior_decisions_limit == 0 {
        Vec::new()
    } else {
        match store.recent(&org, config.run.prior_decisions_limit).await {
            Ok(decisions) => decisions,
            Err(e) => {
                warn!(org = %org, error = %e, "Could not read prior decisions, continuing without");
                Vec::new()
            }
        }
    };

    let settings = LoopSettings {
        max_recommendations: config.run.max_recommendations,
        max_iterations: config.run.max_iterations,
        enable_exploration: config.run.enable_exploration,
        enable_recommendations: config.run.enable_recommendations,
    };
    let catalog = Arc::new(adpilot_tools::default_catalog()?);
    let controller = LoopController::new(Arc::new(client), catalog, executor, store, settings)
        .with_model_params(&config.model, config.temperature, Some(config.max_tokens));

    let run_id = args.run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let mut request = RunRequest::new(org, run_id, seed)
        .with_prior_decisions(prior_decisions)
        .with_connected_platforms(args.platforms);
    if let Some(context) = &config.run.business_context {
        request = request.with_business_context(context.clone());
    }
    if let Some(secs) = config.run.deadline_secs {
        request = request.with_deadline(Instant::now() + Duration::from_secs(secs));
    }

    // Ctrl-C stops the run at the next turn boundary
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after the current batch");
            on_signal.cancel();
        }
    });

    let output = controller.run_with_cancel(&request, cancel).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn load_seed(
    path: Option<&Path>,
    summary: Option<&str>,
) -> Result<SeedContext, Box<dyn std::error::Error>> {
    match (path, summary) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("Failed to read seed {}: {e}", path.display()))?;
            let seed: SeedContext = serde_json::from_str(&content)
                .map_err(|e| format!("Invalid seed {}: {e}", path.display()))?;
            Ok(seed)
        }
        (None, Some(summary)) => Ok(SeedContext::new(summary)),
        (None, None) => Err("Provide a seed with --seed <file> or --summary <text>".into()),
    }
}

fn build_executor(
    tools: &ToolsConfig,
    fixtures_override: Option<&Path>,
) -> Result<Arc<dyn ToolExecutor>, Box<dyn std::error::Error>> {
    if let Some(path) = fixtures_override {
        return Ok(Arc::new(FixtureToolExecutor::from_file(path)?));
    }

    match tools.executor {
        ExecutorKind::Fixtures => {
            let path = tools
                .fixtures_path
                .as_deref()
                .ok_or("tools.fixtures_path is required for the fixtures executor")?;
            Ok(Arc::new(FixtureToolExecutor::from_file(Path::new(path))?))
        }
        ExecutorKind::Http => {
            let endpoint = tools
                .endpoint
                .as_deref()
                .ok_or("tools.endpoint is required for the http executor")?;
            Ok(Arc::new(HttpToolExecutor::with_timeout(endpoint, tools.timeout_secs)?))
        }
    }
}
