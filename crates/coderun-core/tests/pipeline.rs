//! Integration tests for the execution pipeline.
//!
//! Tests that need a host interpreter skip themselves when it is missing.
//! Compile-stage behavior is exercised with a "shc" language whose
//! compiler is `sh`, so it runs anywhere a POSIX shell exists.

#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use coderun_core::{
    CleanupOutcome, Engine, EngineConfig, ErrorKind, FileStore, LanguageProfile, MemoryStore,
    SourceFile, StoreError, Submission, ToolchainRegistry,
};
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn have(binary: &str) -> bool {
    if which::which(binary).is_ok() {
        true
    } else {
        eprintln!("Skipping: {} not found", binary);
        false
    }
}

fn config(root: &Path) -> EngineConfig {
    EngineConfig::with_workspace_root(root.join("sessions"))
        .timeout_ms(5_000)
        .without_cleanup_delay()
}

fn builtin_engine(root: &Path, store: MemoryStore) -> Engine<MemoryStore> {
    Engine::new(config(root), store)
}

/// Registry with a fake compiled language driven by `sh`.
///
/// The "compiler" runs the source as a shell script with the artifact path
/// as `$1`; the script decides whether to produce an executable.
fn shc_registry() -> ToolchainRegistry {
    let profiles = vec![
        LanguageProfile::new(
            "shc",
            Some("sh {sources} {output} {flags}"),
            "./{output}",
            ".shc",
            "shell-compiled test language",
        )
        .unwrap(),
        LanguageProfile::new("bash", None, "bash {sources}", ".sh", "Bash").unwrap(),
        LanguageProfile::new("ghost", None, "coderun-missing-interp {sources}", ".ghost", "")
            .unwrap(),
    ];
    ToolchainRegistry::from_profiles(profiles).unwrap()
}

fn shc_engine(config: EngineConfig) -> Engine<MemoryStore> {
    Engine::with_registry(config, Arc::new(MemoryStore::default()), shc_registry())
}

const SHC_OK: &str = r#"echo "warning: nothing to optimize" >&2
printf '#!/bin/sh\necho built-ok\n' > "$1"
chmod +x "$1"
"#;

/// Store that counts reads.
#[derive(Default)]
struct CountingStore {
    inner: MemoryStore,
    reads: AtomicUsize,
}

impl FileStore for CountingStore {
    async fn list(&self) -> Result<Vec<String>, StoreError> {
        self.inner.list().await
    }

    async fn read(&self, name: &str) -> Result<String, StoreError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(name).await
    }

    async fn write(&self, name: &str, content: &str) -> Result<(), StoreError> {
        self.inner.write(name, content).await
    }

    async fn remove(&self, name: &str) -> Result<(), StoreError> {
        self.inner.remove(name).await
    }
}

#[cfg(target_os = "linux")]
fn process_alive(pid: i32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        // Field 3 is the state; zombies are dead for our purposes.
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .and_then(|rest| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z" && state != "X"),
        Err(_) => false,
    }
}

#[cfg(not(target_os = "linux"))]
fn process_alive(pid: i32) -> bool {
    unsafe { libc::kill(pid, 0) == 0 }
}

async fn wait_until_gone(path: &Path) -> bool {
    for _ in 0..50 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    !path.exists()
}

// =============================================================================
// Interpreted languages
// =============================================================================

#[tokio::test]
async fn test_python_prints_ok() {
    if !have("python3") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let result = engine
        .execute(Submission::inline("python", "print(\"ok\")"))
        .await;

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert!(result.stdout.contains("ok"));
    assert_eq!(result.error_kind, None);
    assert_eq!(result.language.as_deref(), Some("python"));
    assert!(result.execution_duration_ms().unwrap() > 0);
    assert_eq!(result.compile_duration_ms(), None);
}

#[tokio::test]
async fn test_bash_from_aux_file_only() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let sub = Submission::default()
        .with_file(SourceFile::new("data/input.txt", "42"))
        .with_file(SourceFile::new("run.sh", "cat data/input.txt; echo; echo done"));
    let result = engine.execute(sub).await;

    assert_eq!(result.language.as_deref(), Some("bash"));
    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "42\ndone\n");
}

#[tokio::test]
async fn test_nonzero_exit_reports_output() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let result = engine
        .execute(Submission::inline("bash", "echo out; echo err >&2; exit 3"))
        .await;

    assert!(!result.succeeded);
    assert_eq!(result.error_kind, None);
    assert_eq!(result.exit_code, Some(3));
    assert_eq!(result.stdout, "out\n");
    assert_eq!(result.stderr, "err\n");
    assert!(result.execution_duration.is_some());
}

#[tokio::test]
async fn test_signal_termination_is_runtime_failure() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let result = engine
        .execute(Submission::inline("bash", "echo before; kill -9 $$"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeFailure));
    assert!(result.stdout.contains("before"));
    assert!(result.stderr.contains("signal 9"));
}

#[tokio::test]
async fn test_output_overflow_is_runtime_failure() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let mut config = config(temp.path());
    config.max_output_bytes = 1024;
    let engine = Engine::new(config, MemoryStore::default());

    let result = engine.execute(Submission::inline("bash", "yes flood")).await;

    assert_eq!(result.error_kind, Some(ErrorKind::RuntimeFailure));
    assert!(!result.succeeded);
    assert!(result.stderr.contains("1024 byte"));
    assert_eq!(result.stdout.len(), 1024);
}

// =============================================================================
// Timeouts
// =============================================================================

#[tokio::test]
async fn test_timeout_leaves_no_orphans() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let config = config(temp.path()).timeout_ms(500);
    let engine = Engine::new(config, MemoryStore::default());

    let code = "sleep 30 & echo $! > bg.pid; sleep 30";
    let (result, cleanup) = engine
        .execute_deferred(Submission::inline("bash", code))
        .await;
    let cleanup = cleanup.expect("workspace was created");

    assert_eq!(result.error_kind, Some(ErrorKind::Timeout));
    assert!(!result.succeeded);
    assert!(result.stderr.contains("500 ms"), "stderr: {}", result.stderr);

    let pid: i32 = std::fs::read_to_string(cleanup.dir().join("bg.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();

    let dir = cleanup.dir().to_path_buf();
    assert_eq!(cleanup.run().await, CleanupOutcome::Removed);
    assert!(!dir.exists());

    let mut alive = process_alive(pid);
    for _ in 0..20 {
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        alive = process_alive(pid);
    }
    assert!(!alive, "background process {} survived the timeout", pid);
}

#[tokio::test]
async fn test_clean_exit_with_background_process_succeeds() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let config = config(temp.path()).timeout_ms(2_000);
    let engine = Engine::new(config, MemoryStore::default());

    let code = "sleep 30 & echo $! > bg.pid; echo done";
    let (result, cleanup) = engine
        .execute_deferred(Submission::inline("bash", code))
        .await;
    let cleanup = cleanup.expect("workspace was created");

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.error_kind, None);
    assert_eq!(result.exit_code, Some(0));
    assert_eq!(result.stdout, "done\n");
    assert!(result.execution_duration.unwrap() < Duration::from_millis(1_500));

    let pid: i32 = std::fs::read_to_string(cleanup.dir().join("bg.pid"))
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    cleanup.run().await;

    let mut alive = process_alive(pid);
    for _ in 0..20 {
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
        alive = process_alive(pid);
    }
    assert!(!alive, "background process {} outlived the program", pid);
}

#[tokio::test]
async fn test_compile_and_run_have_independent_budgets() {
    let temp = TempDir::new().unwrap();
    let config = config(temp.path()).timeout_ms(1_500);
    let engine = shc_engine(config);

    // Each stage takes ~1s: together they exceed one budget, separately they fit.
    let source = r#"sleep 1
printf '#!/bin/sh\nsleep 1\necho finished\n' > "$1"
chmod +x "$1"
"#;
    let result = engine.execute(Submission::inline("shc", source)).await;

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "finished\n");
}

// =============================================================================
// Compile stage
// =============================================================================

#[tokio::test]
async fn test_compiled_language_success_keeps_warnings() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    let result = engine.execute(Submission::inline("shc", SHC_OK)).await;

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "built-ok\n");
    assert!(result.stderr.contains("warning: nothing to optimize"));
    assert!(result.compile_duration.is_some());
    assert!(result.execution_duration.is_some());
}

#[tokio::test]
async fn test_compile_failure_skips_run() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    let source = "echo 'main.shc:1: error: expected ;' >&2\nexit 1\n";
    let result = engine.execute(Submission::inline("shc", source)).await;

    assert_eq!(result.error_kind, Some(ErrorKind::CompileFailure));
    assert!(!result.succeeded);
    assert!(result.stderr.contains("expected ;"));
    assert!(result.stderr.contains("exit status 1"));
    assert!(result.compile_duration.is_some());
    assert_eq!(result.execution_duration, None);
}

#[tokio::test]
async fn test_missing_artifact_is_compile_failure() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    // Exit status 0 but nothing produced.
    let result = engine
        .execute(Submission::inline("shc", "echo 'all good' >&2\n"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::CompileFailure));
    assert!(result.stderr.contains("no executable"));
    assert_eq!(result.execution_duration, None);
}

#[tokio::test]
async fn test_flags_reach_the_compiler() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    let source = r#"printf '#!/bin/sh\necho %s %s\n' "$2" "$3" > "$1"
chmod +x "$1"
"#;
    let sub = Submission::inline("shc", source).with_flags("-O2   -DDEBUG=1");
    let result = engine.execute(sub).await;

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "-O2 -DDEBUG=1\n");
}

#[tokio::test]
async fn test_multiple_sources_in_materialization_order() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    // The first source is the script; the second arrives as $1, so the
    // artifact path shifts to $2.
    let first = r#"basename "$1" > order.txt
printf '#!/bin/sh\ncat order.txt\n' > "$2"
chmod +x "$2"
"#;
    let sub = Submission::default()
        .with_file(SourceFile::new("a.shc", first))
        .with_file(SourceFile::new("b.shc", ""));
    let result = engine.execute(sub).await;

    assert!(result.succeeded, "stderr: {}", result.stderr);
    assert_eq!(result.stdout, "b.shc\n");
}

#[tokio::test]
async fn test_gcc_syntax_error() {
    if !have("gcc") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let result = engine
        .execute(Submission::inline("c", "int main( { return 0 }"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::CompileFailure));
    assert_eq!(result.execution_duration, None);
    assert!(result.compile_duration.is_some());
}

// =============================================================================
// Toolchain and input errors
// =============================================================================

#[tokio::test]
async fn test_toolchain_missing() {
    let temp = TempDir::new().unwrap();
    let engine = shc_engine(config(temp.path()));

    let result = engine
        .execute(Submission::inline("ghost", "boo"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::ToolchainMissing));
    assert!(result.stderr.contains("coderun-missing-interp"));
    assert_eq!(result.stdout, "");
    assert_eq!(result.execution_duration, None);
    assert_eq!(result.language.as_deref(), Some("ghost"));
}

#[tokio::test]
async fn test_no_code_creates_no_workspace() {
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let (result, cleanup) = engine.execute_deferred(Submission::default()).await;

    assert_eq!(result.error_kind, Some(ErrorKind::InputError));
    assert!(result.stderr.contains("No code provided"));
    assert!(cleanup.is_none());
    assert!(!temp.path().join("sessions").exists());
}

#[tokio::test]
async fn test_unknown_language() {
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let (result, cleanup) = engine
        .execute_deferred(Submission::inline("brainfudge", "+++"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::UnknownLanguage));
    assert!(cleanup.is_none());
}

#[tokio::test]
async fn test_entry_traversal_rejected_before_store_read() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(CountingStore::default());
    let engine = Engine::with_registry(
        config(temp.path()),
        store.clone(),
        ToolchainRegistry::builtin().clone(),
    );

    for name in ["../secret.py", "a/b.py", "a\\b.py"] {
        let (result, cleanup) = engine.execute_deferred(Submission::entry(name)).await;
        assert_eq!(result.error_kind, Some(ErrorKind::InputError), "{}", name);
        assert!(cleanup.is_none());
    }
    assert_eq!(store.reads.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_entry_is_input_error_and_cleaned_up() {
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let (result, cleanup) = engine
        .execute_deferred(Submission::entry("absent.py"))
        .await;

    assert_eq!(result.error_kind, Some(ErrorKind::InputError));
    assert!(result.stderr.contains("absent.py"));
    let cleanup = cleanup.expect("workspace was created");
    let dir = cleanup.dir().to_path_buf();
    cleanup.run().await;
    assert!(!dir.exists());
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
async fn test_concurrent_submissions_are_isolated() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let store = MemoryStore::default().with_files([("main.sh", "pwd; ls -1 | sort")]);
    let engine = Arc::new(builtin_engine(temp.path(), store));

    let a = Submission::entry("main.sh").with_file(SourceFile::new("only_a.txt", "a"));
    let b = Submission::entry("main.sh").with_file(SourceFile::new("only_b.txt", "b"));

    let (ra, rb) = tokio::join!(engine.execute(a), engine.execute(b));
    assert!(ra.succeeded && rb.succeeded);

    let dir_a = ra.stdout.lines().next().unwrap();
    let dir_b = rb.stdout.lines().next().unwrap();
    assert_ne!(dir_a, dir_b);

    assert!(ra.stdout.contains("only_a.txt") && !ra.stdout.contains("only_b.txt"));
    assert!(rb.stdout.contains("only_b.txt") && !rb.stdout.contains("only_a.txt"));
}

#[tokio::test]
async fn test_workspace_removed_after_completion() {
    if !have("bash") {
        return;
    }
    let temp = TempDir::new().unwrap();
    let engine = builtin_engine(temp.path(), MemoryStore::default());

    let result = engine.execute(Submission::inline("bash", "pwd")).await;
    assert!(result.succeeded);

    let dir = PathBuf::from(result.stdout.trim());
    assert!(wait_until_gone(&dir).await, "{} still exists", dir.display());
}
