//! Engine configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default budget for each of the compile and run stages.
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

/// Default ceiling for each captured output stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 2 * 1024 * 1024;

/// Default ceiling for a persisted file.
pub const DEFAULT_MAX_FILE_BYTES: usize = 1024 * 1024;

/// Configuration for the execution engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Directory under which per-session workspaces are created.
    pub workspace_root: PathBuf,

    /// Time budget for the compile stage and, independently, the run stage.
    pub timeout: Duration,

    /// Maximum bytes captured per stream before the stage is aborted.
    pub max_output_bytes: usize,

    /// Maximum size of a file accepted by the file store.
    pub max_file_bytes: usize,

    /// Delay before the first workspace deletion attempt.
    pub cleanup_delay: Duration,

    /// Delay before the single deletion retry.
    pub cleanup_retry_delay: Duration,

    /// Remember toolchain probe results.
    pub cache_probes: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("coderun-sessions"),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            cleanup_delay: Duration::from_millis(100),
            cleanup_retry_delay: Duration::from_millis(1_000),
            cache_probes: true,
        }
    }
}

impl EngineConfig {
    /// Config rooted at `workspace_root`, everything else default.
    pub fn with_workspace_root(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            ..Self::default()
        }
    }

    /// Set the stage timeout in milliseconds.
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout = Duration::from_millis(ms);
        self
    }

    /// Remove cleanup delays (tests, one-shot CLI runs).
    pub fn without_cleanup_delay(mut self) -> Self {
        self.cleanup_delay = Duration::ZERO;
        self.cleanup_retry_delay = Duration::ZERO;
        self
    }
}
