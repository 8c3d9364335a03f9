//! Submission resolution.
//!
//! Turns a [`Submission`] into a resolved language and an ordered list of
//! files to materialize. Everything that can be decided from names alone is
//! checked in [`Resolver::plan`], before the store is read or a workspace
//! exists; [`Plan::materialize`] then writes the files into a session.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::session::Session;
use crate::store::FileStore;
use crate::toolchain::{LanguageProfile, ToolchainRegistry};
use crate::validate::{NameValidator, extension_of, tokenize_flags};

/// A named text file supplied with a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// A code submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Submission {
    /// Explicit language id or alias.
    pub language: Option<String>,
    /// Compiler flags, whitespace separated.
    pub flags: String,
    /// Name of an entry file in the persistent store.
    pub entry: Option<String>,
    /// Inline code, materialized as `main<ext>` when no entry is given.
    pub code: Option<String>,
    /// Auxiliary files, materialized in order.
    pub files: Vec<SourceFile>,
}

impl Submission {
    /// Inline code in `language`.
    pub fn inline(language: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    /// Run the store's `entry` file.
    pub fn entry(name: impl Into<String>) -> Self {
        Self {
            entry: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_file(mut self, file: SourceFile) -> Self {
        self.files.push(file);
        self
    }

    pub fn with_flags(mut self, flags: impl Into<String>) -> Self {
        self.flags = flags.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Treat empty strings as absent.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// One file to write into the workspace.
#[derive(Debug)]
enum Pending {
    /// Entry file; content comes from the store.
    Entry(String),
    /// Auxiliary or inline file with known content.
    File(PathBuf, String),
}

/// A validated submission, ready to materialize.
#[derive(Debug)]
pub struct Plan<'r> {
    profile: &'r LanguageProfile,
    flags: Vec<String>,
    pending: Vec<Pending>,
}

/// Materialized submission: the files the toolchain receives.
#[derive(Debug)]
pub struct Resolved<'r> {
    pub profile: &'r LanguageProfile,
    pub flags: Vec<String>,
    /// Source files of the resolved language, in materialization order.
    pub sources: Vec<PathBuf>,
}

/// Resolves submissions against a registry.
#[derive(Debug, Clone)]
pub struct Resolver<'r> {
    registry: &'r ToolchainRegistry,
    validator: NameValidator,
}

impl<'r> Resolver<'r> {
    pub fn new(registry: &'r ToolchainRegistry) -> Self {
        Self {
            registry,
            validator: NameValidator::new(registry.extensions()),
        }
    }

    pub fn validator(&self) -> &NameValidator {
        &self.validator
    }

    /// Validate names, flags and language without touching disk or store.
    pub fn plan(&self, submission: Submission) -> Result<Plan<'r>> {
        let Submission {
            language,
            flags,
            entry,
            code,
            files,
        } = submission;
        let language = non_empty(language);
        let entry = non_empty(entry);
        let code = non_empty(code);

        // Explicit language wins and must be known.
        let mut profile = match &language {
            Some(id) => Some(self.registry.get(id)?),
            None => None,
        };

        let flags = tokenize_flags(&flags)?;
        let mut pending = Vec::new();

        if let Some(name) = entry {
            self.validator.bare(&name)?;
            if profile.is_none() {
                profile = self.detect(&name);
            }
            pending.push(Pending::Entry(name));
        }

        for file in files {
            let path = self.validator.relative(&file.name)?;
            if profile.is_none() {
                profile = self.detect(&file.name);
            }
            pending.push(Pending::File(path, file.content));
        }

        let has_entry = pending.iter().any(|p| matches!(p, Pending::Entry(_)));
        if let Some(code) = code {
            if !has_entry {
                let Some(p) = profile else {
                    return Err(Error::LanguageRequired);
                };
                pending.push(Pending::File(PathBuf::from(p.main_file_name()), code));
            }
        }

        if pending.is_empty() {
            return Err(Error::NoCode);
        }

        let profile = profile.ok_or_else(|| Error::UndetectedLanguage {
            supported: self.registry.language_ids(),
        })?;

        Ok(Plan {
            profile,
            flags,
            pending,
        })
    }

    fn detect(&self, name: &str) -> Option<&'r LanguageProfile> {
        self.registry
            .detect(name)
            .and_then(|id| self.registry.get(id).ok())
    }
}

impl<'r> Plan<'r> {
    pub fn profile(&self) -> &'r LanguageProfile {
        self.profile
    }

    /// Name of the entry file, if the plan has one.
    pub fn entry(&self) -> Option<&str> {
        self.pending.iter().find_map(|p| match p {
            Pending::Entry(name) => Some(name.as_str()),
            Pending::File(..) => None,
        })
    }

    /// Fetch the entry from `store` and write every file into `session`.
    pub async fn materialize<S: FileStore>(
        self,
        store: &S,
        session: &mut Session,
    ) -> Result<Resolved<'r>> {
        for pending in self.pending {
            match pending {
                Pending::Entry(name) => {
                    let content = store.read(&name).await.map_err(|source| Error::Entry {
                        name: name.clone(),
                        source,
                    })?;
                    session.materialize(Path::new(&name), &content).await?;
                }
                Pending::File(path, content) => {
                    session.materialize(&path, &content).await?;
                }
            }
        }

        if session.created_files().is_empty() {
            return Err(Error::NoCode);
        }

        let extension = self.profile.extension();
        let sources: Vec<PathBuf> = session
            .created_files()
            .iter()
            .filter(|path| {
                path.file_name()
                    .and_then(|n| extension_of(&n.to_string_lossy()))
                    .is_some_and(|ext| ext == extension)
            })
            .cloned()
            .collect();

        if sources.is_empty() {
            return Err(Error::NoSources {
                language: self.profile.id().to_string(),
            });
        }

        Ok(Resolved {
            profile: self.profile,
            flags: self.flags,
            sources,
        })
    }
}
