//! The execution pipeline.
//!
//! ```text
//! RESOLVING ──► TOOLCHAIN_CHECK ──► (COMPILING ──►) RUNNING ──► REPORTING ──► CLEANUP
//!     │               │                   │              │
//!     └ InputError    └ ToolchainMissing  └ Compile-     └ Timeout / RuntimeFailure
//!       UnknownLanguage                     Failure /
//!                                           Timeout
//! ```

use std::fmt;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::error::ErrorKind;
use crate::report::{ExecutionResult, Report};
use crate::resolve::{Resolved, Resolver, Submission};
use crate::session::{CleanupTask, Session};
use crate::store::FileStore;
use crate::toolchain::{AvailabilityProber, Substitution, ToolchainRegistry};

use super::command::{Limits, run_bounded};

/// Pipeline stage, used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    ToolchainCheck,
    Compiling,
    Running,
    Reporting,
    Cleanup,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Resolving => "resolving",
            Stage::ToolchainCheck => "toolchain_check",
            Stage::Compiling => "compiling",
            Stage::Running => "running",
            Stage::Reporting => "reporting",
            Stage::Cleanup => "cleanup",
        };
        f.write_str(name)
    }
}

/// Multi-language execution engine.
///
/// Each call to [`Engine::execute`] is independent; the only shared state is
/// the immutable registry and the prober's cache.
pub struct Engine<S> {
    registry: Arc<ToolchainRegistry>,
    prober: AvailabilityProber,
    store: Arc<S>,
    config: EngineConfig,
}

impl<S: FileStore> Engine<S> {
    /// Create an engine with the built-in language registry.
    pub fn new(config: EngineConfig, store: S) -> Self {
        Self::with_registry(config, Arc::new(store), ToolchainRegistry::builtin().clone())
    }

    /// Create an engine with a custom registry and a shared store.
    pub fn with_registry(config: EngineConfig, store: Arc<S>, registry: ToolchainRegistry) -> Self {
        let prober = if config.cache_probes {
            AvailabilityProber::cached()
        } else {
            AvailabilityProber::new()
        };
        Self {
            registry: Arc::new(registry),
            prober,
            store,
            config,
        }
    }

    pub fn registry(&self) -> &ToolchainRegistry {
        &self.registry
    }

    pub fn prober(&self) -> &AvailabilityProber {
        &self.prober
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute a submission; the workspace is deleted in the background.
    pub async fn execute(&self, submission: Submission) -> ExecutionResult {
        let (result, cleanup) = self.execute_deferred(submission).await;
        if let Some(cleanup) = cleanup {
            cleanup.spawn();
        }
        result
    }

    /// Execute a submission and hand back the workspace cleanup.
    ///
    /// The cleanup is `None` when the submission was rejected before a
    /// workspace was created.
    pub async fn execute_deferred(
        &self,
        submission: Submission,
    ) -> (ExecutionResult, Option<CleanupTask>) {
        let resolver = Resolver::new(&self.registry);

        tracing::debug!(stage = %Stage::Resolving, "Resolving submission");
        let plan = match resolver.plan(submission) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::debug!("Rejected submission: {}", e);
                return (ExecutionResult::rejected(&e, None), None);
            }
        };
        let language = plan.profile().id().to_string();

        let mut session = match Session::create(&self.config.workspace_root).await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to create workspace: {}", e);
                let result = Report::new(Some(language))
                    .fail(ErrorKind::RuntimeFailure, format!("Failed to create workspace: {}", e));
                return (result, None);
            }
        };

        let result = match plan.materialize(self.store.as_ref(), &mut session).await {
            Ok(resolved) => self.run_resolved(&resolved, &session).await,
            Err(e) => ExecutionResult::rejected(&e, Some(language)),
        };

        tracing::debug!(stage = %Stage::Reporting, session = %session.id(), "Reporting result");
        log_outcome(&result, &session);

        let cleanup = session.finish(self.config.cleanup_delay, self.config.cleanup_retry_delay);
        (result, Some(cleanup))
    }

    /// Toolchain check, optional compile, run.
    async fn run_resolved(&self, resolved: &Resolved<'_>, session: &Session) -> ExecutionResult {
        let profile = resolved.profile;
        let mut report = Report::new(Some(profile.id().to_string()));

        tracing::debug!(
            stage = %Stage::ToolchainCheck,
            language = profile.id(),
            "Probing toolchain"
        );
        if let Some(binary) = self.prober.missing_binary(profile) {
            return report.fail(
                ErrorKind::ToolchainMissing,
                format!(
                    "Missing toolchain for {}: `{}` was not found on PATH. \
                     Install the required compiler/interpreter or choose another language.",
                    profile.id(),
                    binary
                ),
            );
        }

        let artifact = session.artifact_path();
        let subst = Substitution {
            sources: &resolved.sources,
            output: &artifact,
            flags: &resolved.flags,
        };
        let limits = Limits {
            timeout: self.config.timeout,
            max_output_bytes: self.config.max_output_bytes,
        };

        if let Some(compile) = profile.compile() {
            tracing::debug!(stage = %Stage::Compiling, session = %session.id(), "Compiling");
            let invocation = compile.expand(subst);
            let output = match run_bounded(&invocation, session.dir(), limits).await {
                Ok(output) => output,
                Err(e) => {
                    report.compiled(e.elapsed());
                    return report.command_failed("Compilation", e);
                }
            };
            report.compiled(output.elapsed);

            let artifact_present = tokio::fs::metadata(&artifact)
                .await
                .map(|m| m.is_file())
                .unwrap_or(false);

            if !output.status.success() || !artifact_present {
                report.capture(&output.stdout, &output.stderr);
                let reason = if output.status.success() {
                    "no executable was produced".to_string()
                } else {
                    exit_description(&output.status)
                };
                return report.fail(
                    ErrorKind::CompileFailure,
                    format!("Compilation failed ({})", reason),
                );
            }

            // Warnings still surface to the caller.
            report.capture(&output.stdout, &output.stderr);
        }

        tracing::debug!(stage = %Stage::Running, session = %session.id(), "Running");
        let invocation = profile.run().expand(subst);
        match run_bounded(&invocation, session.dir(), limits).await {
            Ok(output) => {
                report.ran(output.elapsed);
                report.capture(&output.stdout, &output.stderr);
                match terminating_signal(&output.status) {
                    Some(signal) => report.fail(
                        ErrorKind::RuntimeFailure,
                        format!("Program terminated by signal {}", signal),
                    ),
                    None => report.exited(output.status.code()),
                }
            }
            Err(e) => {
                report.ran(e.elapsed());
                report.command_failed("Execution", e)
            }
        }
    }
}

fn log_outcome(result: &ExecutionResult, session: &Session) {
    let language = result.language.as_deref().unwrap_or("-");
    match result.error_kind {
        None => tracing::info!(
            session = %session.id(),
            language,
            exit_code = ?result.exit_code,
            compile_ms = ?result.compile_duration_ms(),
            execution_ms = ?result.execution_duration_ms(),
            "Execution finished"
        ),
        Some(kind) if kind.is_input() || kind == ErrorKind::CompileFailure => tracing::info!(
            session = %session.id(),
            language,
            kind = ?kind,
            "Execution rejected"
        ),
        Some(kind) => tracing::warn!(
            session = %session.id(),
            language,
            kind = ?kind,
            message = result.message.as_deref().unwrap_or(""),
            "Execution failed"
        ),
    }
    tracing::debug!(stage = %Stage::Cleanup, session = %session.id(), "Scheduling cleanup");
}

fn exit_description(status: &std::process::ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {}", code),
        None => match terminating_signal(status) {
            Some(signal) => format!("terminated by signal {}", signal),
            None => "abnormal exit".to_string(),
        },
    }
}

#[cfg(unix)]
fn terminating_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn terminating_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
