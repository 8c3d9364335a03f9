//! Execution engine for coderun.
//!
//! This crate provides:
//! - Toolchain registry (language id → compile/run templates)
//! - Availability probing of compilers and interpreters
//! - Submission resolution and filename validation
//! - Ephemeral per-submission workspaces with deferred cleanup
//! - Bounded compile/run pipeline with outcome classification
//! - A flat persistent file store
//!
//! The engine does not sandbox anything: it expects to run inside an
//! already isolated, resource-limited host.

pub mod config;
pub mod error;
pub mod execute;
pub mod report;
pub mod resolve;
pub mod session;
pub mod store;
pub mod toolchain;
pub mod validate;

pub use config::EngineConfig;
pub use error::{Error, ErrorKind, Result};
pub use execute::{Engine, Stage};
pub use report::ExecutionResult;
pub use resolve::{SourceFile, Submission};
pub use session::{CleanupOutcome, CleanupTask, Session};
pub use store::{DirectoryStore, FileStore, MemoryStore, StoreError};
pub use toolchain::{AvailabilityProber, LanguageProfile, ToolchainRegistry};
pub use validate::PathValidationError;
