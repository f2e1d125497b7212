#![deny(unsafe_code)]
//! The `mcp-router` binary: wires configuration, both backends, and the
//! router together behind the stdio JSON-RPC adapter (spec.md §6).

mod catalog;
mod stdio;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcp_cache::ResponseCache;
use mcp_config::RouterConfig;
use mcp_fastpath::FastPath;
use mcp_local::{CallContext, LocalBackend, ReqwestHttpClient};
use mcp_remote::RemoteBackend;
use mcp_router::{Backend, LocalAdapter, RemoteAdapter, Router};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "mcp-router", version, about = "MCP request router and tiered read-cache")]
struct Cli {
    /// Enable debug-level logging.
    #[arg(long)]
    debug: bool,

    /// Path to a TOML configuration overlay.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print resolved configuration and backend reachability, then exit.
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("mcp_router=debug,mcp_local=debug,mcp_remote=debug,mcp_server=debug")
    } else {
        EnvFilter::new("mcp_router=info,mcp_server=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = RouterConfig::load(cli.config.as_deref()).context("loading configuration")?;
    for warning in config.warnings() {
        tracing::warn!(%warning, "configuration warning");
    }

    match cli.command {
        Some(Command::Doctor) => run_doctor(&config).await,
        None => run_server(&config).await,
    }
}

async fn run_doctor(config: &RouterConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    let remote = build_remote_spec(config)?;
    let backend = RemoteBackend::new(remote);
    match backend.connect().await {
        Ok(()) => println!("remote backend: reachable"),
        Err(err) => println!("remote backend: unreachable ({err})"),
    }
    backend.disconnect().await;
    Ok(())
}

async fn run_server(config: &RouterConfig) -> Result<()> {
    let catalog_path = env_path("MCP_ROUTER_OPERATIONS_CATALOG_PATH")
        .context("MCP_ROUTER_OPERATIONS_CATALOG_PATH must be set to a readable operations catalog")?;
    let (operations, allowlist) = catalog::load(&catalog_path)?;
    let base_url = std::env::var("MCP_ROUTER_REMOTE_BASE_URL")
        .unwrap_or_else(|_| "https://api.notion.com".to_string());

    let local_backend = build_local_backend(config, operations, allowlist, &base_url);
    let remote_spec = build_remote_spec(config)?;
    let remote_backend = RemoteBackend::new(remote_spec);

    // The local backend has no async connect step (its SQLite fast-path
    // already opened synchronously above), so only the remote connect
    // needs to run here; spec.md §5's "all_settled" concurrency applies
    // when both sides have real handshakes to race.
    if let Err(err) = remote_backend.connect().await {
        tracing::warn!(error = %err, "remote backend failed to connect at startup");
    }
    let remote_ok = remote_backend.is_connected().await;

    let official: Option<Box<dyn Backend>> = if remote_ok {
        Some(Box::new(RemoteAdapter::new(remote_backend)))
    } else {
        None
    };
    let local: Option<Box<dyn Backend>> = Some(Box::new(local_backend));

    let mut router = Router::new();
    router.start(official, local).await.context("starting router")?;
    info!(state = ?router.state().await, "router started");

    let router = Arc::new(router);
    let shutdown_router = router.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        info!("shutdown signal received, tearing down backends");
        shutdown_router.shutdown().await;
        std::process::exit(0);
    });

    stdio::serve(router).await
}

fn build_local_backend(
    config: &RouterConfig,
    operations: Vec<mcp_local::OperationSpec>,
    allowlist: BTreeMap<String, String>,
    base_url: &str,
) -> LocalAdapter<ReqwestHttpClient> {
    let cache = ResponseCache::new(
        if config.cache_enabled { config.cache_ttl_ms } else { 0 },
        config.cache_max_entries,
        config.cache_path.clone(),
    );
    let fastpath = if config.fast_path_active() {
        config
            .local_app_cache_db_path
            .as_deref()
            .and_then(|path| FastPath::open(path, config.local_app_cache_max_page_size))
    } else {
        None
    };
    let http = ReqwestHttpClient::new(base_url);
    let inner = LocalBackend::new(operations, allowlist, base_url, http, cache, fastpath);
    LocalAdapter::new(inner, CallContext::default())
}

fn build_remote_spec(config: &RouterConfig) -> Result<mcp_remote::RemoteSpec> {
    let command = std::env::var("MCP_ROUTER_REMOTE_COMMAND").context(
        "MCP_ROUTER_REMOTE_COMMAND must name the remote backend's launch command",
    )?;
    let args = std::env::var("MCP_ROUTER_REMOTE_ARGS")
        .map(|raw| raw.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();
    let cwd = env_path("MCP_ROUTER_REMOTE_CWD").ok();
    let default_url = std::env::var("MCP_ROUTER_REMOTE_DEFAULT_URL").ok();
    let token_cache_dir = config
        .token_cache_dir
        .clone()
        .or_else(|| env_path("MCP_ROUTER_TOKEN_CACHE_DIR").ok())
        .unwrap_or_else(std::env::temp_dir);

    Ok(mcp_remote::RemoteSpec {
        command,
        args,
        cwd,
        extra_env: BTreeMap::new(),
        default_url,
        token_cache_dir,
    })
}

fn env_path(key: &str) -> Result<PathBuf> {
    std::env::var(key)
        .map(PathBuf::from)
        .with_context(|| format!("{key} not set"))
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = sigterm.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
