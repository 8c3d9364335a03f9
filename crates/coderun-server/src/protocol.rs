//! JSON request and response bodies.

use coderun_core::{ErrorKind, ExecutionResult, LanguageProfile, SourceFile, Submission};
use serde::{Deserialize, Serialize};

/// Body of `POST /api/run`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub flags: Option<String>,
    #[serde(default)]
    pub entry: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub files: Vec<FileBody>,
}

impl From<RunRequest> for Submission {
    fn from(req: RunRequest) -> Self {
        Submission {
            language: req.language,
            flags: req.flags.unwrap_or_default(),
            entry: req.entry,
            code: req.code,
            files: req
                .files
                .into_iter()
                .map(|f| SourceFile::new(f.name, f.content))
                .collect(),
        }
    }
}

/// A named file, as sent in `files` and returned by `GET /api/files/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileBody {
    pub name: String,
    pub content: String,
}

/// Body of `PUT /api/files/{name}`.
#[derive(Debug, Clone, Deserialize)]
pub struct WriteFile {
    pub content: String,
}

/// One entry of `GET /api/files`.
///
/// The editor client keys its file list on `path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileEntry {
    pub path: String,
    pub name: String,
}

impl FileEntry {
    pub fn new(name: String) -> Self {
        Self {
            path: name.clone(),
            name,
        }
    }
}

/// `?path=` query of the editor client's `/api/file` routes.
#[derive(Debug, Clone, Deserialize)]
pub struct PathQuery {
    pub path: String,
}

/// Body of `PUT /api/file` and `POST /api/file`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveFile {
    pub path: String,
    #[serde(default)]
    pub content: String,
}

/// Reply to a successful write.
#[derive(Debug, Clone, Serialize)]
pub struct WriteReply {
    pub name: String,
    pub size: usize,
}

/// Body of the `POST /api/run` reply.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_time: Option<u64>,
    /// Absent when the run stage never started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl RunResponse {
    /// Reply for a body that never decoded into a [`RunRequest`].
    pub fn rejected(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: message.clone(),
            error: Some(message),
            error_kind: Some(ErrorKind::InputError),
            compile_time: None,
            execution_time: None,
            language: None,
            success: false,
            exit_code: None,
        }
    }
}

impl From<ExecutionResult> for RunResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            compile_time: result.compile_duration_ms(),
            execution_time: result.execution_duration_ms(),
            stdout: result.stdout,
            stderr: result.stderr,
            error: result.message,
            error_kind: result.error_kind,
            language: result.language,
            success: result.succeeded,
            exit_code: result.exit_code,
        }
    }
}

/// One entry of `GET /api/languages`.
#[derive(Debug, Clone, Serialize)]
pub struct LanguageInfo {
    pub id: String,
    pub description: String,
    pub extension: String,
    pub compiled: bool,
    pub available: bool,
}

impl LanguageInfo {
    pub fn new(profile: &LanguageProfile, available: bool) -> Self {
        Self {
            id: profile.id().to_string(),
            description: profile.description().to_string(),
            extension: profile.extension().to_string(),
            compiled: profile.is_compiled(),
            available,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub ok: bool,
    pub time: String,
    pub version: &'static str,
}
