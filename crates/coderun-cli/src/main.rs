//! coderun CLI - compile and run code in many languages.

mod colors;
mod languages;
mod run;
mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use coderun_core::config::DEFAULT_TIMEOUT_MS;

#[derive(Parser)]
#[command(name = "coderun")]
#[command(about = "Compile and run code submissions in many languages")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP execution server
    Serve(serve::ServeArgs),

    /// Run local files headlessly and exit with the program's exit code
    Run {
        /// Files to submit; the language is detected from the first known extension
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Language id or alias (overrides detection)
        #[arg(short, long)]
        language: Option<String>,

        /// Compiler flags, whitespace separated
        #[arg(long, allow_hyphen_values = true)]
        flags: Option<String>,

        /// Time budget per stage in milliseconds
        #[arg(long, env = "EXEC_TIMEOUT_MS", default_value_t = DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,
    },

    /// List supported languages and whether their toolchain is installed
    Languages,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = match (&cli.command, cli.verbose) {
        (_, true) => tracing::Level::DEBUG,
        (Commands::Serve(_), false) => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };
    let filter =
        tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Serve(args) => serve::execute(args).await?,

        Commands::Run {
            files,
            language,
            flags,
            timeout_ms,
        } => {
            let code = run::execute(&files, language, flags, timeout_ms).await?;
            if code != 0 {
                std::process::exit(code);
            }
        }

        Commands::Languages => languages::execute(),
    }

    Ok(())
}
