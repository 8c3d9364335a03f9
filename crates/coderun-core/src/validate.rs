//! Filename and flag validation for submitted content.
//!
//! Entry files and persisted files must be bare names. Auxiliary files may
//! carry a relative directory structure, validated component by component.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::error::{Error, Result};

/// Longest accepted path component, in bytes.
const MAX_COMPONENT_LEN: usize = 255;

/// Extensions accepted besides the registered source extensions.
const EXTRA_EXTENSIONS: &[&str] = &[
    ".h", ".hpp", ".hh", ".txt", ".md", ".json", ".csv", ".toml", ".yaml", ".yml", ".mod",
    ".sum", ".in", ".dat",
];

/// Windows device names that are unsafe as file stems on any host.
const RESERVED_NAMES: &[&str] = &[
    "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
    "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
];

/// Characters allowed in a compiler flag token.
fn is_flag_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_+=.,:/@-".contains(c)
}

/// A rejected filename.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathValidationError {
    #[error("filename is empty")]
    Empty,

    #[error("filename `{0}` escapes the workspace")]
    Traversal(String),

    #[error("filename `{0}` must not contain path separators")]
    Separator(String),

    #[error("filename `{0}` is absolute")]
    Absolute(String),

    #[error("filename `{0}` contains control characters")]
    InvalidCharacter(String),

    #[error("filename `{0}` is too long")]
    TooLong(String),

    #[error("filename `{0}` uses a reserved device name")]
    ReservedName(String),

    #[error("filename `{name}` has a disallowed extension (allowed: {})", allowed.join(" "))]
    DisallowedExtension { name: String, allowed: Vec<String> },
}

/// Validates submitted filenames against an extension allow-list.
#[derive(Debug, Clone)]
pub struct NameValidator {
    allowed_extensions: Vec<String>,
}

impl NameValidator {
    /// Create a validator accepting `source_extensions` plus the common
    /// header, data and manifest extensions.
    pub fn new<I, S>(source_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut allowed_extensions: Vec<String> =
            source_extensions.into_iter().map(Into::into).collect();
        for ext in EXTRA_EXTENSIONS {
            if !allowed_extensions.iter().any(|e| e == ext) {
                allowed_extensions.push((*ext).to_string());
            }
        }
        Self { allowed_extensions }
    }

    /// Validate a flat filename (entry files, persisted files).
    pub fn bare(&self, name: &str) -> std::result::Result<(), PathValidationError> {
        if name.is_empty() {
            return Err(PathValidationError::Empty);
        }
        if name.contains('/') || name.contains('\\') {
            return Err(PathValidationError::Separator(name.to_string()));
        }
        check_component(name, name)?;
        self.check_extension(name, name)
    }

    /// Validate a relative path (auxiliary files) and return it as a `PathBuf`.
    pub fn relative(&self, name: &str) -> std::result::Result<PathBuf, PathValidationError> {
        if name.is_empty() {
            return Err(PathValidationError::Empty);
        }
        if name.contains('\\') {
            return Err(PathValidationError::Separator(name.to_string()));
        }
        if name.starts_with('/') {
            return Err(PathValidationError::Absolute(name.to_string()));
        }

        let components: Vec<&str> = name.split('/').collect();
        for component in &components {
            check_component(name, component)?;
        }
        // split never yields zero items
        let last = components.last().copied().unwrap_or(name);
        self.check_extension(name, last)?;

        Ok(components.iter().collect())
    }

    fn check_extension(
        &self,
        name: &str,
        file_name: &str,
    ) -> std::result::Result<(), PathValidationError> {
        let ext = extension_of(file_name);
        let allowed = ext
            .as_deref()
            .is_some_and(|ext| self.allowed_extensions.iter().any(|a| a == ext));
        if allowed {
            Ok(())
        } else {
            Err(PathValidationError::DisallowedExtension {
                name: name.to_string(),
                allowed: self.allowed_extensions.clone(),
            })
        }
    }
}

fn check_component(name: &str, component: &str) -> std::result::Result<(), PathValidationError> {
    if component.is_empty() || component == "." {
        return Err(PathValidationError::Traversal(name.to_string()));
    }
    if component.contains("..") {
        return Err(PathValidationError::Traversal(name.to_string()));
    }
    if component.chars().any(|c| c.is_control()) {
        return Err(PathValidationError::InvalidCharacter(name.to_string()));
    }
    if component.len() > MAX_COMPONENT_LEN {
        return Err(PathValidationError::TooLong(name.to_string()));
    }

    let stem = component.split('.').next().unwrap_or(component).trim_end();
    if RESERVED_NAMES.iter().any(|r| r.eq_ignore_ascii_case(stem)) {
        return Err(PathValidationError::ReservedName(name.to_string()));
    }

    Ok(())
}

/// Lowercased extension of `name` including the leading dot.
pub fn extension_of(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}

/// Split a flag string into validated tokens.
///
/// Tokens are whitespace separated and must look like options: they start
/// with `-` and use a conservative character set. Overriding the artifact
/// path with `-o` is refused.
pub fn tokenize_flags(flags: &str) -> Result<Vec<String>> {
    flags
        .split_whitespace()
        .map(|token| {
            let well_formed = token.len() > 1
                && token.starts_with('-')
                && token.chars().all(is_flag_char)
                && !token.contains("..");
            // `-o` and `--output` in any spelling would redirect the artifact.
            if !well_formed || token.starts_with("-o") || token.starts_with("--output") {
                return Err(Error::InvalidFlag(token.to_string()));
            }
            Ok(token.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> NameValidator {
        NameValidator::new([".py", ".c", ".sh"])
    }

    #[test]
    fn test_bare_accepts_simple_names() {
        let v = validator();
        assert!(v.bare("main.py").is_ok());
        assert!(v.bare("Main.PY").is_ok());
        assert!(v.bare("util.h").is_ok());
    }

    #[test]
    fn test_bare_rejects_separators_and_traversal() {
        let v = validator();
        assert!(matches!(
            v.bare("../main.py"),
            Err(PathValidationError::Separator(_))
        ));
        assert!(matches!(
            v.bare("dir\\main.py"),
            Err(PathValidationError::Separator(_))
        ));
        assert!(matches!(
            v.bare("..main.py"),
            Err(PathValidationError::Traversal(_))
        ));
        assert_eq!(v.bare(""), Err(PathValidationError::Empty));
    }

    #[test]
    fn test_reserved_names() {
        let v = validator();
        assert!(matches!(
            v.bare("con.py"),
            Err(PathValidationError::ReservedName(_))
        ));
        assert!(matches!(
            v.bare("LPT1.c"),
            Err(PathValidationError::ReservedName(_))
        ));
        assert!(v.bare("console.py").is_ok());
    }

    #[test]
    fn test_disallowed_extension() {
        let v = validator();
        assert!(matches!(
            v.bare("payload.exe"),
            Err(PathValidationError::DisallowedExtension { .. })
        ));
        assert!(matches!(
            v.bare("Makefile"),
            Err(PathValidationError::DisallowedExtension { .. })
        ));
    }

    #[test]
    fn test_relative_paths() {
        let v = validator();
        assert_eq!(
            v.relative("lib/util/helpers.py").unwrap(),
            PathBuf::from("lib/util/helpers.py")
        );
        assert!(matches!(
            v.relative("lib/../../etc/x.py"),
            Err(PathValidationError::Traversal(_))
        ));
        assert!(matches!(
            v.relative("/etc/x.py"),
            Err(PathValidationError::Absolute(_))
        ));
        assert!(matches!(
            v.relative("lib//x.py"),
            Err(PathValidationError::Traversal(_))
        ));
        assert!(matches!(
            v.relative("./x.py"),
            Err(PathValidationError::Traversal(_))
        ));
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("A.CPP").as_deref(), Some(".cpp"));
        assert_eq!(extension_of("noext"), None);
    }

    #[test]
    fn test_tokenize_flags() {
        assert_eq!(
            tokenize_flags("  -O2 -Wall   -std=c++17 -lm ").unwrap(),
            vec!["-O2", "-Wall", "-std=c++17", "-lm"]
        );
        assert!(tokenize_flags("").unwrap().is_empty());
        assert!(tokenize_flags("-O2; rm -rf /").is_err());
        assert!(tokenize_flags("$(whoami)").is_err());
        assert!(tokenize_flags("-o /tmp/x").is_err());
        assert!(tokenize_flags("-oprog").is_err());
        assert!(tokenize_flags("--output=/elsewhere").is_err());
        assert!(tokenize_flags("--output /elsewhere").is_err());
        assert!(tokenize_flags("-I../secret").is_err());
    }
}
