use std::net::SocketAddr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;
use trellis_config::ConfigLoader;

mod bootstrap;

#[derive(Parser)]
#[command(name = "trellis", version, about = "LLM agent workflow service")]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "trellis.toml")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP gateway.
    Serve {
        /// Override the configured listen port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Validate configuration and upstream connectivity, then exit.
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::new(&cli.config).load()?;

    match cli.command {
        Command::Serve { port } => serve(config, port).await,
        Command::Check => check(config).await,
    }
}

async fn serve(mut config: trellis_config::AppConfig, port: Option<u16>) -> anyhow::Result<()> {
    if let Some(port) = port {
        config.gateway.port = port;
    }

    let addr: SocketAddr = format!("{}:{}", config.gateway.host, config.gateway.port)
        .parse()
        .context("invalid gateway host/port")?;

    let state = bootstrap::build_state(config).await?;
    let router = trellis_gateway::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("server error")
}

async fn check(config: trellis_config::AppConfig) -> anyhow::Result<()> {
    let report = bootstrap::check_connectivity(&config).await;
    for line in &report {
        println!("{line}");
    }
    if report.iter().any(|line| line.starts_with("FAIL")) {
        anyhow::bail!("one or more checks failed");
    }
    Ok(())
}
