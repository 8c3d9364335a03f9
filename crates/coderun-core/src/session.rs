//! Per-submission workspaces.
//!
//! A [`Session`] exclusively owns one freshly created directory. When the
//! pipeline is done the session is consumed into a [`CleanupTask`], which is
//! the only way to delete the directory, so deletion happens at most once
//! per session by construction.

use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use uuid::Uuid;

/// Fixed name of the compiled artifact inside a workspace.
pub const ARTIFACT_NAME: &str = "program.out";

/// Ephemeral workspace for one submission.
#[derive(Debug)]
pub struct Session {
    id: Uuid,
    dir: PathBuf,
    created_files: Vec<PathBuf>,
    started: Instant,
}

impl Session {
    /// Create a fresh workspace directory under `root`.
    ///
    /// The directory is created with `create_dir`, never `create_dir_all`, so
    /// an existing directory is an error rather than silently reused.
    pub async fn create(root: &Path) -> io::Result<Self> {
        tokio::fs::create_dir_all(root).await?;

        let id = Uuid::new_v4();
        let dir = root.join(id.to_string());
        tokio::fs::create_dir(&dir).await?;
        // Canonical form so paths handed to toolchains are absolute.
        let dir = tokio::fs::canonicalize(&dir).await?;

        tracing::debug!("Created session {} at {}", id, dir.display());

        Ok(Self {
            id,
            dir,
            created_files: Vec::new(),
            started: Instant::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Workspace directory (absolute).
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Materialized files, absolute, in materialization order.
    pub fn created_files(&self) -> &[PathBuf] {
        &self.created_files
    }

    /// Absolute path of the compiled artifact.
    pub fn artifact_path(&self) -> PathBuf {
        self.dir.join(ARTIFACT_NAME)
    }

    /// Time since the session was created.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Write `content` at `relative`, creating parent directories.
    ///
    /// `relative` must already be validated. Writing the same path twice
    /// replaces the content and keeps the original position.
    pub async fn materialize(&mut self, relative: &Path, content: &str) -> io::Result<&Path> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        let index = match self.created_files.iter().position(|p| p == &path) {
            Some(index) => index,
            None => {
                self.created_files.push(path);
                self.created_files.len() - 1
            }
        };
        Ok(&self.created_files[index])
    }

    /// Hand the workspace over for deletion.
    pub fn finish(self, delay: Duration, retry_delay: Duration) -> CleanupTask {
        tracing::debug!(
            "Session {} finished after {:?}",
            self.id,
            self.started.elapsed()
        );
        CleanupTask {
            session_id: self.id,
            dir: self.dir,
            delay,
            retry_delay,
        }
    }
}

/// How a cleanup attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupOutcome {
    /// Deleted on the first attempt.
    Removed,
    /// Deleted on the retry.
    RemovedOnRetry,
    /// Both attempts failed; the directory was left behind.
    Abandoned,
}

/// Deferred deletion of a finished session's workspace.
///
/// Performs one attempt after `delay` and, if that fails, exactly one retry
/// after `retry_delay`.
#[derive(Debug)]
#[must_use = "a CleanupTask does nothing unless run"]
pub struct CleanupTask {
    session_id: Uuid,
    dir: PathBuf,
    delay: Duration,
    retry_delay: Duration,
}

impl CleanupTask {
    /// Directory this task deletes.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Delete the workspace from disk.
    pub async fn run(self) -> CleanupOutcome {
        self.run_with(|dir| async move {
            match tokio::fs::remove_dir_all(&dir).await {
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
                other => other,
            }
        })
        .await
    }

    /// Delete the workspace using `remove` for each attempt.
    pub async fn run_with<F, Fut>(self, mut remove: F) -> CleanupOutcome
    where
        F: FnMut(PathBuf) -> Fut,
        Fut: Future<Output = io::Result<()>>,
    {
        tokio::time::sleep(self.delay).await;
        let first = match remove(self.dir.clone()).await {
            Ok(()) => {
                tracing::debug!("Removed workspace of session {}", self.session_id);
                return CleanupOutcome::Removed;
            }
            Err(e) => e,
        };

        tracing::debug!(
            "Removing workspace {} failed ({}), retrying in {:?}",
            self.dir.display(),
            first,
            self.retry_delay
        );
        tokio::time::sleep(self.retry_delay).await;

        match remove(self.dir.clone()).await {
            Ok(()) => CleanupOutcome::RemovedOnRetry,
            Err(e) => {
                tracing::warn!(
                    "Abandoning workspace {} of session {}: {}",
                    self.dir.display(),
                    self.session_id,
                    e
                );
                CleanupOutcome::Abandoned
            }
        }
    }

    /// Run the cleanup in the background.
    pub fn spawn(self) -> tokio::task::JoinHandle<CleanupOutcome> {
        tokio::spawn(self.run())
    }
}
