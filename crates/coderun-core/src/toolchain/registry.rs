//! Language profiles and the registry that indexes them.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use super::template::CommandTemplate;
use crate::error::{Error, Result};
use crate::validate::extension_of;

/// Built-in language table: id, compile template, run template, extension, description.
const BUILTIN_LANGUAGES: &[(&str, Option<&str>, &str, &str, &str)] = &[
    ("c", Some("gcc {sources} -o {output} {flags}"), "./{output}", ".c", "C (gcc)"),
    ("cpp", Some("g++ {sources} -o {output} {flags}"), "./{output}", ".cpp", "C++ (g++)"),
    ("python", None, "python3 {sources}", ".py", "Python 3"),
    ("rust", Some("rustc {sources} -o {output} {flags}"), "./{output}", ".rs", "Rust (rustc)"),
    ("go", Some("go build -o {output} {flags} {sources}"), "./{output}", ".go", "Go"),
    ("bash", None, "bash {sources}", ".sh", "Bash"),
    ("php", None, "php {sources}", ".php", "PHP"),
    ("lua", None, "lua {sources}", ".lua", "Lua"),
    ("ruby", None, "ruby {sources}", ".rb", "Ruby"),
    ("javascript", None, "node {sources}", ".js", "JavaScript (Node.js)"),
];

/// Alternative spellings accepted for built-in language ids.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("c++", "cpp"),
    ("cxx", "cpp"),
    ("py", "python"),
    ("python3", "python"),
    ("rs", "rust"),
    ("golang", "go"),
    ("sh", "bash"),
    ("shell", "bash"),
    ("rb", "ruby"),
    ("js", "javascript"),
    ("node", "javascript"),
];

static BUILTIN: LazyLock<ToolchainRegistry> = LazyLock::new(|| {
    let profiles = BUILTIN_LANGUAGES
        .iter()
        .map(|&(id, compile, run, ext, description)| {
            LanguageProfile::new(id, compile, run, ext, description)
        })
        .collect::<Result<Vec<_>>>();

    // Static table, checked by test_builtin_has_all_languages.
    match profiles.and_then(ToolchainRegistry::from_profiles) {
        Ok(registry) => registry.with_aliases(BUILTIN_ALIASES),
        Err(e) => panic!("built-in language table is invalid: {}", e),
    }
});

/// Static compile/run description for one language.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    id: String,
    compile: Option<CommandTemplate>,
    run: CommandTemplate,
    extension: String,
    description: String,
}

impl LanguageProfile {
    /// Build a profile from template strings.
    ///
    /// The extension is normalized to lowercase with a leading dot.
    pub fn new(
        id: &str,
        compile: Option<&str>,
        run: &str,
        extension: &str,
        description: &str,
    ) -> Result<Self> {
        let extension = extension.trim_start_matches('.').to_lowercase();
        Ok(Self {
            id: id.to_lowercase(),
            compile: compile.map(CommandTemplate::parse).transpose()?,
            run: CommandTemplate::parse(run)?,
            extension: format!(".{}", extension),
            description: description.to_string(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn compile(&self) -> Option<&CommandTemplate> {
        self.compile.as_ref()
    }

    pub fn run(&self) -> &CommandTemplate {
        &self.run
    }

    /// Source extension, lowercase with leading dot (e.g. `.py`).
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Binaries that must be on the search path, compile stage first.
    pub fn required_binaries(&self) -> Vec<&str> {
        let mut bins = Vec::new();
        for template in self.compile.iter().chain(std::iter::once(&self.run)) {
            if let Some(bin) = template.required_binary() {
                if !bins.contains(&bin) {
                    bins.push(bin);
                }
            }
        }
        bins
    }

    /// Synthetic filename used for inline code.
    pub fn main_file_name(&self) -> String {
        format!("main{}", self.extension)
    }
}

/// Immutable map of language id to profile.
#[derive(Debug, Clone)]
pub struct ToolchainRegistry {
    profiles: Vec<LanguageProfile>,
    by_id: FxHashMap<String, usize>,
    by_extension: FxHashMap<String, usize>,
    aliases: FxHashMap<String, String>,
}

impl ToolchainRegistry {
    /// The process-wide built-in registry.
    pub fn builtin() -> &'static ToolchainRegistry {
        &BUILTIN
    }

    /// Build a registry, rejecting duplicate ids and extensions.
    pub fn from_profiles(profiles: Vec<LanguageProfile>) -> Result<Self> {
        let mut by_id = FxHashMap::default();
        let mut by_extension = FxHashMap::default();

        for (index, profile) in profiles.iter().enumerate() {
            if let Some(&first) = by_id.get(profile.id()) {
                return Err(duplicate("id", profile.id(), &profiles[first], profile));
            }
            if let Some(&first) = by_extension.get(profile.extension()) {
                return Err(duplicate(
                    "extension",
                    profile.extension(),
                    &profiles[first],
                    profile,
                ));
            }
            by_id.insert(profile.id().to_string(), index);
            by_extension.insert(profile.extension().to_string(), index);
        }

        Ok(Self {
            profiles,
            by_id,
            by_extension,
            aliases: FxHashMap::default(),
        })
    }

    /// Register alternative spellings for existing ids.
    ///
    /// Aliases pointing at unknown ids are ignored.
    pub fn with_aliases(mut self, aliases: &[(&str, &str)]) -> Self {
        for &(alias, id) in aliases {
            if self.by_id.contains_key(id) {
                self.aliases.insert(alias.to_lowercase(), id.to_string());
            }
        }
        self
    }

    /// Look up a profile by id or alias, case-insensitively.
    pub fn get(&self, language: &str) -> Result<&LanguageProfile> {
        let key = language.trim().to_lowercase();
        let id = self.aliases.get(&key).unwrap_or(&key);
        self.by_id
            .get(id)
            .map(|&i| &self.profiles[i])
            .ok_or_else(|| Error::UnknownLanguage(language.to_string()))
    }

    /// Detect a language id from a filename's extension.
    pub fn detect(&self, filename: &str) -> Option<&str> {
        let ext = extension_of(filename)?;
        self.by_extension
            .get(&ext)
            .map(|&i| self.profiles[i].id())
    }

    /// All profiles in registration order.
    pub fn profiles(&self) -> &[LanguageProfile] {
        &self.profiles
    }

    /// Supported language ids in registration order.
    pub fn language_ids(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.id().to_string()).collect()
    }

    /// Registered source extensions.
    pub fn extensions(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.extension())
    }
}

fn duplicate(
    what: &'static str,
    value: &str,
    first: &LanguageProfile,
    second: &LanguageProfile,
) -> Error {
    Error::DuplicateProfile {
        what,
        value: value.to_string(),
        first: first.id().to_string(),
        second: second.id().to_string(),
    }
}
