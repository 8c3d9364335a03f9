//! Toolchain availability checks.

use std::sync::RwLock;

use rustc_hash::FxHashMap;

use super::registry::LanguageProfile;

/// Checks whether a profile's binaries are on the search path.
///
/// Results can be cached. Concurrent probes of the same binary may both hit
/// the filesystem; they write the same answer, so the race is harmless.
#[derive(Debug, Default)]
pub struct AvailabilityProber {
    cache: Option<RwLock<FxHashMap<String, bool>>>,
}

impl AvailabilityProber {
    /// Create a prober that always consults the search path.
    pub fn new() -> Self {
        Self { cache: None }
    }

    /// Create a prober that remembers lookups.
    pub fn cached() -> Self {
        Self {
            cache: Some(RwLock::new(FxHashMap::default())),
        }
    }

    /// Whether every binary the profile needs is present.
    pub fn is_available(&self, profile: &LanguageProfile) -> bool {
        self.missing_binary(profile).is_none()
    }

    /// The first required binary that cannot be found, if any.
    pub fn missing_binary<'p>(&self, profile: &'p LanguageProfile) -> Option<&'p str> {
        profile
            .required_binaries()
            .into_iter()
            .find(|bin| !self.binary_present(bin))
    }

    /// Whether `binary` resolves on the search path.
    pub fn binary_present(&self, binary: &str) -> bool {
        let Some(cache) = &self.cache else {
            return lookup(binary);
        };

        if let Ok(map) = cache.read() {
            if let Some(&present) = map.get(binary) {
                return present;
            }
        }

        let present = lookup(binary);
        if let Ok(mut map) = cache.write() {
            map.insert(binary.to_string(), present);
        }
        present
    }

    /// Forget cached lookups (e.g. after installing a toolchain).
    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            if let Ok(mut map) = cache.write() {
                map.clear();
            }
        }
    }
}

fn lookup(binary: &str) -> bool {
    let found = which::which(binary).is_ok();
    let state = if found { "found" } else { "missing" };
    tracing::debug!("Probed toolchain binary {}: {}", binary, state);
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolchainRegistry;

    #[test]
    fn test_missing_binary_returns_false() {
        let prober = AvailabilityProber::new();
        assert!(!prober.binary_present("coderun-definitely-not-installed"));
    }

    #[test]
    fn test_missing_profile_names_binary() {
        let profile =
            LanguageProfile::new("fake", None, "coderun-no-such-interp {sources}", ".fake", "")
                .unwrap();
        let prober = AvailabilityProber::cached();
        assert!(!prober.is_available(&profile));
        assert_eq!(
            prober.missing_binary(&profile),
            Some("coderun-no-such-interp")
        );
    }

    #[test]
    fn test_cached_probe_is_stable() {
        let Ok(_) = which::which("sh") else {
            eprintln!("Skipping: sh not found");
            return;
        };
        let prober = AvailabilityProber::cached();
        assert!(prober.binary_present("sh"));
        assert!(prober.binary_present("sh"));
        prober.clear();
        assert!(prober.binary_present("sh"));
    }

    #[test]
    fn test_concurrent_probes() {
        let prober = std::sync::Arc::new(AvailabilityProber::cached());
        let registry = ToolchainRegistry::builtin();
        let expected: Vec<bool> = registry
            .profiles()
            .iter()
            .map(|p| AvailabilityProber::new().is_available(p))
            .collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let prober = prober.clone();
                std::thread::spawn(move || {
                    ToolchainRegistry::builtin()
                        .profiles()
                        .iter()
                        .map(|p| prober.is_available(p))
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    }
}
