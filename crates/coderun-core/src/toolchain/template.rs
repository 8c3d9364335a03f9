//! Command templates.
//!
//! Templates are written the way a shell command would be
//! (`gcc {sources} -o {output} {flags}`) and parsed once into a program plus
//! an argument list, so nothing is ever handed to a shell.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The program a template invokes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Program {
    /// A binary resolved on the search path.
    Binary(String),
    /// The artifact produced by the compile stage (`./{output}`).
    Artifact,
}

/// One argument of a template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateArg {
    Literal(String),
    /// Expands to every source path, one argument each.
    Sources,
    /// Expands to the artifact path.
    Output,
    /// Expands to the validated flag tokens, one argument each.
    Flags,
}

/// A parsed compile or run command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    source: String,
    program: Program,
    args: Vec<TemplateArg>,
}

/// Values substituted into a template.
#[derive(Debug, Clone, Copy)]
pub struct Substitution<'a> {
    pub sources: &'a [PathBuf],
    pub output: &'a Path,
    pub flags: &'a [String],
}

/// A fully expanded command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: OsString,
    pub args: Vec<OsString>,
}

impl CommandTemplate {
    /// Parse a template string.
    ///
    /// Placeholders must be whole tokens. The first token is the program;
    /// `./{output}` (or a bare `{output}`) selects the compiled artifact.
    pub fn parse(template: &str) -> Result<Self> {
        let err = |message: &str| Error::Template {
            template: template.to_string(),
            message: message.to_string(),
        };

        let mut tokens = template.split_whitespace();
        let first = tokens.next().ok_or_else(|| err("empty template"))?;

        let program = match first {
            "./{output}" | "{output}" => Program::Artifact,
            token if token.contains('{') || token.contains('}') => {
                return Err(err("program must be a binary name or ./{output}"));
            }
            token => Program::Binary(token.to_string()),
        };

        let args = tokens
            .map(|token| match token {
                "{sources}" => Ok(TemplateArg::Sources),
                "{output}" => Ok(TemplateArg::Output),
                "{flags}" => Ok(TemplateArg::Flags),
                token if token.contains('{') || token.contains('}') => {
                    Err(err(&format!("unknown placeholder in `{}`", token)))
                }
                token => Ok(TemplateArg::Literal(token.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            source: template.to_string(),
            program,
            args,
        })
    }

    /// The template as originally written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn args(&self) -> &[TemplateArg] {
        &self.args
    }

    /// The binary this template needs on the search path, if any.
    pub fn required_binary(&self) -> Option<&str> {
        match &self.program {
            Program::Binary(name) => Some(name),
            Program::Artifact => None,
        }
    }

    /// Expand the template into a concrete invocation.
    pub fn expand(&self, subst: Substitution<'_>) -> Invocation {
        let program = match &self.program {
            Program::Binary(name) => OsString::from(name),
            Program::Artifact => subst.output.as_os_str().to_owned(),
        };

        let mut args = Vec::new();
        for arg in &self.args {
            match arg {
                TemplateArg::Literal(s) => args.push(OsString::from(s)),
                TemplateArg::Sources => {
                    args.extend(subst.sources.iter().map(|p| p.as_os_str().to_owned()));
                }
                TemplateArg::Output => args.push(subst.output.as_os_str().to_owned()),
                TemplateArg::Flags => args.extend(subst.flags.iter().map(OsString::from)),
            }
        }

        Invocation { program, args }
    }
}
