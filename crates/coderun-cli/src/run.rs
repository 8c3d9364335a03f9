//! Run command implementation for the coderun CLI.
//!
//! Submits local files to an in-process engine and replays the program's
//! output streams.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use coderun_core::{Engine, EngineConfig, MemoryStore, SourceFile, Submission};

use crate::colors;

/// Run `files`; returns the process exit code to use.
pub async fn execute(
    files: &[PathBuf],
    language: Option<String>,
    flags: Option<String>,
    timeout_ms: u64,
) -> anyhow::Result<i32> {
    let mut submission = Submission::default();
    for path in files {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("Not a file name: {}", path.display()))?;
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        submission = submission.with_file(SourceFile::new(name, content));
    }
    if let Some(language) = language {
        submission = submission.with_language(language);
    }
    if let Some(flags) = flags {
        submission = submission.with_flags(flags);
    }

    let config = EngineConfig::default()
        .timeout_ms(timeout_ms)
        .without_cleanup_delay();
    let engine = Engine::new(config, MemoryStore::default());

    let (result, cleanup) = engine.execute_deferred(submission).await;
    if let Some(cleanup) = cleanup {
        let outcome = cleanup.run().await;
        tracing::debug!("Workspace cleanup: {:?}", outcome);
    }

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(result.stdout.as_bytes())?;
    stdout.flush()?;

    let mut stderr = std::io::stderr().lock();
    stderr.write_all(result.stderr.as_bytes())?;
    if let Some(kind) = result.error_kind {
        if !result.stderr.is_empty() && !result.stderr.ends_with('\n') {
            writeln!(stderr)?;
        }
        writeln!(stderr, "{}error{}: {:?}", colors::RED, colors::RESET, kind)?;
    }
    stderr.flush()?;

    tracing::debug!(
        language = result.language.as_deref().unwrap_or("-"),
        compile_ms = ?result.compile_duration_ms(),
        execution_ms = ?result.execution_duration_ms(),
        "Run finished"
    );

    Ok(exit_code(&result))
}

/// The program's own exit code, or 1 for anything the engine reported.
fn exit_code(result: &coderun_core::ExecutionResult) -> i32 {
    match (result.error_kind, result.exit_code) {
        (None, Some(code)) => code,
        _ => 1,
    }
}
