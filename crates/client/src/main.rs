use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;
use vidgen_client::api::{HttpVideoApi, DEFAULT_API_URL};
use vidgen_client::cache::QueryCache;
use vidgen_client::orchestrator::{
    GenerationCallbacks, GenerationOrchestrator, OrchestratorOptions, ToastLevel,
};
use vidgen_client::polling::{PollEvent, StatusPoller};
use vidgen_client::session::{SessionStore, DEFAULT_IDLE_TIMEOUT};
use vidgen_client::status::StatusEndpointClient;
use vidgen_core::generation::GenerationStatus;
use vidgen_core::polling::PollBudget;

#[derive(Debug, Parser)]
#[command(name = "vidgen")]
#[command(about = "Generate videos and follow their progress")]
struct Args {
    /// Base URL of the vidgen API
    #[arg(long, env = "VIDGEN_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,

    /// Bearer token for the API
    #[arg(long, env = "VIDGEN_ACCESS_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Seconds between status checks
    #[arg(long, default_value_t = 5)]
    interval_secs: u64,

    /// Give up polling after this many seconds
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current status of a generation
    Status { generation_id: String },

    /// Poll a generation until it finishes
    Watch { generation_id: String },

    /// Submit a prompt and wait for the video
    Generate {
        prompt: String,

        /// Existing project to generate into
        #[arg(long)]
        project_id: Option<Uuid>,

        /// Source image for a new project
        #[arg(long)]
        image_url: Option<String>,
    },
}

/// Prints progress lines to stderr.
struct ConsoleCallbacks;

impl GenerationCallbacks for ConsoleCallbacks {
    fn on_progress(&self, progress: u8, status: GenerationStatus) {
        eprintln!("[{progress:>3}%] {status}");
    }

    fn on_insufficient_credits(&self, message: &str) {
        eprintln!("{message}. Buy more tokens to continue.");
    }

    fn toast(&self, level: ToastLevel, message: &str) {
        match level {
            ToastLevel::Success => tracing::info!("{message}"),
            ToastLevel::Error => tracing::error!("{message}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let session = Arc::new(SessionStore::new(DEFAULT_IDLE_TIMEOUT));
    if let Some(token) = &args.token {
        session.set_tokens(token.clone(), None);
    }
    let api = Arc::new(HttpVideoApi::new(&args.api_url, session));
    let budget = PollBudget {
        interval: Duration::from_secs(args.interval_secs),
        timeout: Duration::from_secs(args.timeout_secs),
        ..PollBudget::default()
    };

    match args.command {
        Command::Status { generation_id } => {
            let report = StatusEndpointClient::new(api)
                .check_status(&generation_id)
                .await
                .context("status check failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Watch { generation_id } => {
            let poller = StatusPoller::new(StatusEndpointClient::new(api), budget);
            let mut events = poller.start(&generation_id);
            while let Some(event) = events.recv().await {
                match event {
                    PollEvent::StatusUpdate(report) => {
                        eprintln!("[{:>3}%] {}", report.status.progress_percent(), report.status);
                    }
                    PollEvent::Completed(report) if report.status == GenerationStatus::Failed => {
                        anyhow::bail!(
                            "generation failed: {}",
                            report.error.unwrap_or_else(|| "no reason given".into())
                        );
                    }
                    PollEvent::Completed(_) => {}
                    PollEvent::VideoReady(url) => println!("{url}"),
                    PollEvent::Error(message) => anyhow::bail!(message),
                }
            }
        }
        Command::Generate {
            prompt,
            project_id,
            image_url,
        } => {
            let orchestrator = GenerationOrchestrator::new(
                api,
                Arc::new(QueryCache::new()),
                Arc::new(ConsoleCallbacks),
                OrchestratorOptions {
                    project_id,
                    image_url,
                    budget,
                    ..OrchestratorOptions::default()
                },
            );
            orchestrator.set_prompt(prompt);
            let generation_id = orchestrator.handle_generate().await?;
            eprintln!("Submitted generation {generation_id}");

            let mut state = orchestrator.subscribe();
            let snapshot = state
                .wait_for(|s| !s.is_generating)
                .await
                .context("generation tracking stopped unexpectedly")?
                .clone();
            match (snapshot.video_url, snapshot.error) {
                (Some(url), _) => println!("{url}"),
                (None, Some(error)) => anyhow::bail!(error),
                (None, None) => anyhow::bail!("generation finished without a video"),
            }
        }
    }

    Ok(())
}
