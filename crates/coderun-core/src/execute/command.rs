//! Bounded subprocess execution.
//!
//! Runs one command with a wall-clock budget and a per-stream output
//! ceiling. The child is placed in its own process group so a timeout or an
//! output overflow can take down everything it spawned.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::toolchain::Invocation;

const READ_CHUNK: usize = 8 * 1024;

/// Limits applied to one subprocess.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    pub timeout: Duration,
    pub max_output_bytes: usize,
}

/// Captured output of a completed subprocess.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub elapsed: Duration,
}

/// Why a subprocess did not complete normally.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The program could not be started.
    #[error("failed to start `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The budget elapsed; the process group was killed.
    #[error("timed out after {} ms", budget.as_millis())]
    Timeout {
        budget: Duration,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        elapsed: Duration,
    },

    /// A stream exceeded the output ceiling; the process group was killed.
    #[error("output exceeded {limit} bytes")]
    OutputOverflow {
        limit: usize,
        stdout: Vec<u8>,
        stderr: Vec<u8>,
        elapsed: Duration,
    },

    /// Reading output or waiting for the child failed.
    #[error("IO error while running `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

impl CommandError {
    /// Output captured before the failure, if any.
    pub fn partial_output(&self) -> (&[u8], &[u8]) {
        match self {
            CommandError::Timeout { stdout, stderr, .. }
            | CommandError::OutputOverflow { stdout, stderr, .. } => {
                (stdout.as_slice(), stderr.as_slice())
            }
            _ => (&[][..], &[][..]),
        }
    }

    /// Wall-clock time spent before the failure.
    pub fn elapsed(&self) -> Duration {
        match self {
            CommandError::Timeout { elapsed, .. }
            | CommandError::OutputOverflow { elapsed, .. } => *elapsed,
            _ => Duration::ZERO,
        }
    }
}

/// Bytes read from one stream.
#[derive(Debug, Default)]
struct Captured {
    bytes: Vec<u8>,
}

/// Why stream collection stopped early.
#[derive(Debug)]
enum Stop {
    Overflow,
    Io(io::Error),
}

impl From<io::Error> for Stop {
    fn from(e: io::Error) -> Self {
        Stop::Io(e)
    }
}

/// Shared buffers so partial output survives a timeout.
#[derive(Debug, Default)]
struct Buffers {
    stdout: Captured,
    stderr: Captured,
}

/// Run `invocation` in `cwd` under `limits`.
pub async fn run_bounded(
    invocation: &Invocation,
    cwd: &Path,
    limits: Limits,
) -> Result<CommandOutput, CommandError> {
    let program = invocation.program.to_string_lossy().into_owned();

    let mut command = Command::new(&invocation.program);
    command
        .args(&invocation.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    tracing::debug!("Spawning {} {:?} in {}", program, invocation.args, cwd.display());

    let start = Instant::now();
    let mut child = command.spawn().map_err(|source| CommandError::Spawn {
        program: program.clone(),
        source,
    })?;
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        terminate(&mut child).await;
        return Err(CommandError::Io {
            program,
            source: io::Error::other("child stdio was not captured"),
        });
    };

    let mut buffers = Buffers::default();
    let waited = tokio::time::timeout(
        limits.timeout,
        collect(&mut child, stdout, stderr, &mut buffers, limits.max_output_bytes),
    )
    .await;
    let elapsed = start.elapsed();

    match waited {
        Ok(Ok(status)) => Ok(CommandOutput {
            status,
            stdout: buffers.stdout.bytes,
            stderr: buffers.stderr.bytes,
            elapsed,
        }),
        Ok(Err(Stop::Overflow)) => {
            terminate(&mut child).await;
            Err(CommandError::OutputOverflow {
                limit: limits.max_output_bytes,
                stdout: buffers.stdout.bytes,
                stderr: buffers.stderr.bytes,
                elapsed,
            })
        }
        Ok(Err(Stop::Io(source))) => {
            terminate(&mut child).await;
            Err(CommandError::Io { program, source })
        }
        Err(_) => {
            terminate(&mut child).await;
            tracing::debug!("{} timed out after {:?}", program, limits.timeout);
            Err(CommandError::Timeout {
                budget: limits.timeout,
                stdout: buffers.stdout.bytes,
                stderr: buffers.stderr.bytes,
                elapsed,
            })
        }
    }
}

/// Drain both streams while waiting for the child to exit.
///
/// Once the child has exited, anything left in its process group is killed
/// before the child is reaped, so background processes holding the pipes
/// open cannot stall the read.
async fn collect<O, E>(
    child: &mut Child,
    stdout: O,
    stderr: E,
    buffers: &mut Buffers,
    limit: usize,
) -> Result<ExitStatus, Stop>
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let Buffers {
        stdout: out_buf,
        stderr: err_buf,
    } = buffers;
    let pgid = child.id();

    {
        // An overflow on either stream short-circuits the join.
        let drain = async {
            tokio::try_join!(
                read_bounded(stdout, out_buf, limit),
                read_bounded(stderr, err_buf, limit)
            )
            .map(|_| ())
        };
        tokio::pin!(drain);
        let exited = wait_for_exit(child);
        tokio::pin!(exited);

        let mut drained = false;
        tokio::select! {
            result = &mut drain => {
                result?;
                drained = true;
                (&mut exited).await?;
            }
            result = &mut exited => result?,
        }

        // The unreaped child still pins the group id.
        kill_group(pgid);
        if !drained {
            drain.await?;
        }
    }

    Ok(child.wait().await?)
}

/// Resolve once the child has exited, leaving it unreaped.
#[cfg(unix)]
async fn wait_for_exit(child: &mut Child) -> io::Result<()> {
    let Some(pid) = child.id() else {
        return Ok(());
    };
    tokio::task::spawn_blocking(move || {
        loop {
            let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
            let rc = unsafe {
                libc::waitid(
                    libc::P_PID,
                    pid as libc::id_t,
                    &mut info,
                    libc::WEXITED | libc::WNOWAIT,
                )
            };
            if rc == 0 {
                return Ok(());
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    })
    .await
    .map_err(io::Error::other)?
}

#[cfg(not(unix))]
async fn wait_for_exit(child: &mut Child) -> io::Result<()> {
    child.wait().await.map(|_| ())
}

/// Read `reader` into `captured` until EOF or until `limit` is exceeded.
async fn read_bounded<R: AsyncRead + Unpin>(
    mut reader: R,
    captured: &mut Captured,
    limit: usize,
) -> Result<(), Stop> {
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        let room = limit.saturating_sub(captured.bytes.len());
        if n > room {
            captured.bytes.extend_from_slice(&chunk[..room]);
            return Err(Stop::Overflow);
        }
        captured.bytes.extend_from_slice(&chunk[..n]);
    }
}

/// Kill the child's process group and reap the child.
async fn terminate(child: &mut Child) {
    kill_group(child.id());
    if let Err(e) = child.kill().await {
        tracing::debug!("Failed to kill child: {}", e);
    }
}

#[cfg(unix)]
fn kill_group(pgid: Option<u32>) {
    if let Some(pgid) = pgid {
        // The child leads its own group (process_group(0)), so its pid is the pgid.
        unsafe {
            libc::killpg(pgid as libc::pid_t, libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: Option<u32>) {}
