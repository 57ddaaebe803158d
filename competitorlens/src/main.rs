/*
competitorlens - main.rs
CLI entry point: analyze a single URL / pasted text, or serve the HTTP API.
*/

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use common::{Config, Credentials};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use competitorlens::cancel::cancel_pair;
use competitorlens::pipeline::{classify_input, AnalysisInput, AnalysisStatus, Pipeline};
use competitorlens::report::render_report;
use competitorlens::server::{launch_rocket, AppState};

#[derive(Parser, Debug)]
#[command(name = "competitorlens", about = "Competitor page analysis powered by an LLM")]
struct Args {
    /// Path to config.toml
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Override log level (info, debug, warn, error)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a product page URL or pasted page text
    Analyze {
        /// URL or text; omit when using --file
        #[arg(required_unless_present = "file")]
        input: Option<String>,

        /// Read pasted page text from a file
        #[arg(long, value_name = "PATH", conflicts_with = "input")]
        file: Option<PathBuf>,

        /// Print the raw JSON result instead of the report
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API server
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI args
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = load_config(args.config.as_deref()).await?;

    // Credentials are resolved once here and injected; nothing below reads the environment.
    let credentials = Credentials::from_env(&config.llm);
    let pipeline = match Pipeline::from_config(&config, credentials) {
        Ok(p) => Arc::new(p),
        Err(e) => {
            error!(kind = e.kind(), "startup failed: {}", e);
            return Err(e.into());
        }
    };
    info!(model = pipeline.model(), strategies = ?pipeline.strategy_names(), "pipeline ready");

    match args.command {
        Command::Analyze { input, file, json } => {
            // A file always holds pasted page text, whatever it looks like.
            let input = match (input, file) {
                (_, Some(path)) => AnalysisInput::Text(
                    tokio::fs::read_to_string(&path)
                        .await
                        .with_context(|| format!("Failed to read input file: {}", path.display()))?,
                ),
                (Some(raw), None) => classify_input(&raw)?,
                (None, None) => anyhow::bail!("no input given"),
            };
            run_analyze(pipeline, input, json).await
        }
        Command::Serve => {
            let state = AppState {
                started_at: Utc::now(),
                pipeline,
            };
            launch_rocket(state, &config.server).await
        }
    }
}

async fn load_config(explicit: Option<&std::path::Path>) -> Result<Config> {
    let default_path = PathBuf::from("config.default.toml");

    let override_path = if let Some(p) = explicit {
        if !p.exists() {
            error!(path = ?p, "specified config file not found");
            return Err(anyhow::anyhow!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        let p = PathBuf::from("config.toml");
        if p.exists() { Some(p) } else { None }
    };

    let config = Config::load_with_defaults(
        if default_path.exists() { Some(&default_path) } else { None },
        override_path.as_deref(),
    )
    .await?;
    info!(default = ?default_path, override = ?override_path, "configuration loaded");
    Ok(config)
}

async fn run_analyze(pipeline: Arc<Pipeline>, input: AnalysisInput, json: bool) -> Result<()> {
    let (cancel_handle, cancel) = cancel_pair();

    // Ctrl-C cancels the in-flight request
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, cancelling analysis");
            cancel_handle.cancel();
        }
    });

    let mut status_rx = pipeline.subscribe();
    let progress = tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let status = *status_rx.borrow_and_update();
            match status {
                AnalysisStatus::Fetching => info!("正在获取网页内容..."),
                AnalysisStatus::Analyzing => info!("深度解析中..."),
                AnalysisStatus::Success | AnalysisStatus::Error => break,
                AnalysisStatus::Idle => {}
            }
        }
    });

    let outcome = pipeline.run_input(input, &cancel).await;
    let _ = progress.await;

    match outcome {
        Ok(result) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print!("{}", render_report(&result));
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("分析中断: {}", e);
            Err(e.into())
        }
    }
}
