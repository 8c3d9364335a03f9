//! Error types for coderun-core.

use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;
use crate::validate::PathValidationError;

/// Result type for coderun-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while validating, resolving or preparing a submission.
///
/// Everything after workspace preparation is classified into an
/// [`crate::ExecutionResult`] instead of surfacing as an `Error`.
#[derive(Debug, Error)]
pub enum Error {
    /// A submitted filename failed validation.
    #[error(transparent)]
    InvalidFilename(#[from] PathValidationError),

    /// A compiler flag was rejected.
    #[error("invalid compiler flag `{0}`")]
    InvalidFlag(String),

    /// Inline code was given without a way to know its language.
    #[error("Language required when using inline code.")]
    LanguageRequired,

    /// Nothing to run.
    #[error("No code provided.")]
    NoCode,

    /// None of the materialized files belong to the resolved language.
    #[error("No {language} source files provided.")]
    NoSources { language: String },

    /// Language could not be inferred from any file.
    #[error(
        "Could not detect language. Provide a language or a file with a known extension \
         (supported: {}).",
        supported.join(", ")
    )]
    UndetectedLanguage { supported: Vec<String> },

    /// Language id does not name a registered profile.
    #[error("Unsupported language: {0}")]
    UnknownLanguage(String),

    /// Entry file could not be fetched from the file store.
    #[error("entry file `{name}`: {source}")]
    Entry {
        name: String,
        #[source]
        source: StoreError,
    },

    /// A command template could not be parsed.
    #[error("invalid command template `{template}`: {message}")]
    Template { template: String, message: String },

    /// Two profiles claim the same id or extension.
    #[error("duplicate {what} `{value}` registered by `{first}` and `{second}`")]
    DuplicateProfile {
        what: &'static str,
        value: String,
        first: String,
        second: String,
    },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Outcome class reported for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::UnknownLanguage(_) => ErrorKind::UnknownLanguage,
            Error::Entry {
                source: StoreError::Io(_),
                ..
            }
            | Error::Io(_)
            | Error::Template { .. }
            | Error::DuplicateProfile { .. } => ErrorKind::RuntimeFailure,
            _ => ErrorKind::InputError,
        }
    }
}

/// Classification of a failed submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing/ambiguous language, no code, invalid filename or flag.
    InputError,
    /// Language id not in the registry.
    UnknownLanguage,
    /// A required compiler or interpreter is not installed.
    ToolchainMissing,
    /// The compile stage failed.
    CompileFailure,
    /// A stage exceeded its time budget.
    Timeout,
    /// Spawn failure, signal termination or output overflow.
    RuntimeFailure,
}

impl ErrorKind {
    /// Whether this failure was detected before any subprocess was spawned.
    pub fn is_input(self) -> bool {
        matches!(self, ErrorKind::InputError | ErrorKind::UnknownLanguage)
    }
}
