//! Serve command implementation for the coderun CLI.
//!
//! Starts the HTTP execution server backed by a directory file store.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use coderun_core::config::{DEFAULT_MAX_FILE_BYTES, DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_TIMEOUT_MS};
use coderun_core::{DirectoryStore, Engine, EngineConfig};
use coderun_server::{DEFAULT_BODY_LIMIT, ServerConfig};

use crate::colors;

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Host address to bind to
    #[arg(long, env = "CODERUN_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    /// Directory of persisted files [default: <data dir>/coderun/files]
    #[arg(long, env = "STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Directory for per-run workspaces [default: <tmp>/coderun-sessions]
    #[arg(long, env = "WORKSPACE_ROOT")]
    workspace_root: Option<PathBuf>,

    /// Time budget per stage in milliseconds
    #[arg(long, env = "EXEC_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Output ceiling per stream in bytes
    #[arg(long, env = "MAX_OUTPUT_BYTES", default_value_t = DEFAULT_MAX_OUTPUT_BYTES)]
    max_output_bytes: usize,

    /// Largest file accepted by the file store, in bytes
    #[arg(long, env = "MAX_FILE_BYTES", default_value_t = DEFAULT_MAX_FILE_BYTES)]
    max_file_bytes: usize,

    /// Comma-separated CORS origins; empty allows any origin
    #[arg(long, env = "ALLOWED_ORIGINS", value_delimiter = ',')]
    allowed_origins: Vec<String>,

    /// Built editor client to serve for non-API paths
    #[arg(long, env = "STATIC_DIR")]
    static_dir: Option<PathBuf>,
}

impl ServeArgs {
    fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().timeout_ms(self.timeout_ms);
        if let Some(root) = &self.workspace_root {
            config.workspace_root = root.clone();
        }
        config.max_output_bytes = self.max_output_bytes;
        config.max_file_bytes = self.max_file_bytes;
        config
    }

    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
            allowed_origins: self
                .allowed_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
            static_dir: self.static_dir.clone(),
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    fn store_dir(&self) -> PathBuf {
        match &self.store_dir {
            Some(dir) => dir.clone(),
            None => dirs::data_local_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("coderun")
                .join("files"),
        }
    }
}

/// Start the execution server.
pub async fn execute(args: ServeArgs) -> anyhow::Result<()> {
    let engine_config = args.engine_config();
    let server_config = args.server_config();
    let store_dir = args.store_dir();

    let store = DirectoryStore::open(&store_dir, engine_config.max_file_bytes)
        .with_context(|| format!("Failed to open file store at {}", store_dir.display()))?;

    if let Some(dir) = &server_config.static_dir {
        if !dir.is_dir() {
            anyhow::bail!("Static directory not found: {}", dir.display());
        }
    }

    let workspace_root = engine_config.workspace_root.clone();
    let timeout = engine_config.timeout;
    let engine = Engine::new(engine_config, store);

    let (available, missing): (Vec<_>, Vec<_>) = engine
        .registry()
        .profiles()
        .iter()
        .partition(|profile| engine.prober().is_available(profile));

    println!(
        "\n{}coderun{} - Multi-language execution server",
        colors::BOLD,
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    println!(
        "{}  ◆ Server:{} http://{}:{}",
        colors::CYAN,
        colors::RESET,
        server_config.host,
        server_config.port
    );
    println!(
        "{}  ◆ Files:{} {}",
        colors::CYAN,
        colors::RESET,
        store_dir.display()
    );
    println!(
        "{}  ◆ Workspaces:{} {}",
        colors::CYAN,
        colors::RESET,
        workspace_root.display()
    );
    println!(
        "{}  ◆ Timeout:{} {} ms per stage",
        colors::CYAN,
        colors::RESET,
        timeout.as_millis()
    );
    println!(
        "{}  ◆ Languages:{} {}",
        colors::CYAN,
        colors::RESET,
        available
            .iter()
            .map(|p| p.id())
            .collect::<Vec<_>>()
            .join(", ")
    );
    if !missing.is_empty() {
        println!(
            "{}  ◆ Missing toolchains:{} {}",
            colors::YELLOW,
            colors::RESET,
            missing.iter().map(|p| p.id()).collect::<Vec<_>>().join(", ")
        );
    }
    println!("{}", "─".repeat(50));
    println!("{}Press Ctrl+C to stop{}", colors::GREEN, colors::RESET);
    println!();

    coderun_server::serve(engine, server_config).await?;

    Ok(())
}
