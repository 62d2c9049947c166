//! `gitlab-shell-check`: call the internal API from the command line.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use gitlab_shell_client::config::load_config;
use gitlab_shell_client::observability::logging::init_logging;
use gitlab_shell_client::{ApiClient, CallContext, RequestMetadata};

#[derive(Parser)]
#[command(name = "gitlab-shell-check")]
#[command(about = "Call the GitLab internal API the way gitlab-shell does", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: PathBuf,

    /// Correlation ID forwarded as X-Request-Id
    #[arg(long, env = "CORRELATION_ID")]
    correlation_id: Option<String>,

    /// Client address forwarded as X-Forwarded-For
    #[arg(long)]
    remote_ip: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check internal API health
    Check,
    /// GET a path under the internal API
    Get { path: String },
    /// POST a JSON document to a path under the internal API
    Post {
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&cli.config)?;
    init_logging(&config.observability)?;

    let client = ApiClient::new(&config)?;

    let token = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(token.clone()));
    let ctx = CallContext::with_cancellation(token);

    let mut meta = RequestMetadata::new();
    if let Some(id) = cli.correlation_id {
        meta = meta.with_correlation_id(id);
    }
    if let Some(ip) = cli.remote_ip {
        meta = meta.with_original_remote_ip(ip);
    }

    let response = match cli.command {
        Commands::Check => client.get(&ctx, &meta, "/check").await?,
        Commands::Get { path } => client.get(&ctx, &meta, &path).await?,
        Commands::Post { path, data } => {
            let body: Value = serde_json::from_str(&data)?;
            client.post(&ctx, &meta, &path, &body).await?
        }
    };

    print_response(response).await
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl+C, cancelling request");
        token.cancel();
    }
}

async fn print_response(response: http::Response<Incoming>) -> Result<(), Box<dyn std::error::Error>> {
    let body = response.into_body().collect().await?.to_bytes();

    match serde_json::from_slice::<Value>(&body) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", String::from_utf8_lossy(&body)),
    }
    Ok(())
}
