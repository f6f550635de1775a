//! Caller-side retries for missing target files.

use std::sync::Arc;

use morphkit_core::{FallbackOptions, MorphError, Result};
use morphkit_mesh::{Mesh, MorphTarget, TargetStore};

/// Ordered substring substitutions tried when a target key is not found.
///
/// The store itself never guesses alternative names; this policy sits on top
/// of it and is driven entirely by configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackPolicy {
    substitutions: Vec<(String, String)>,
}

impl FallbackPolicy {
    /// Creates a policy with no substitutions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a policy from configuration.
    pub fn from_options(options: &FallbackOptions) -> Self {
        Self {
            substitutions: options.substitutions.clone(),
        }
    }

    /// Adds a substitution, tried after the existing ones.
    pub fn with_substitution(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.substitutions.push((from.into(), to.into()));
        self
    }

    /// Returns the keys to try for `key`, starting with `key` itself.
    ///
    /// Each substitution whose `from` occurs in `key` contributes one
    /// candidate with every occurrence replaced. Duplicates are dropped.
    pub fn candidates(&self, key: &str) -> Vec<String> {
        let mut candidates = vec![key.to_string()];
        for (from, to) in &self.substitutions {
            if from.is_empty() || !key.contains(from.as_str()) {
                continue;
            }
            let candidate = key.replace(from.as_str(), to);
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    /// Loads `key` through `store`, trying the substitutes in order while the
    /// target is not found.
    ///
    /// Errors other than [`MorphError::TargetNotFound`] stop the search. If no
    /// candidate exists, the error names the original key.
    pub fn get_or_load(
        &self,
        store: &TargetStore,
        mesh: &Mesh,
        key: &str,
    ) -> Result<Arc<MorphTarget>> {
        for candidate in self.candidates(key) {
            match store.get_or_load(mesh, &candidate) {
                Ok(target) => {
                    if candidate != key {
                        log::warn!("morph target '{key}' not found, using '{candidate}'");
                    }
                    return Ok(target);
                }
                Err(MorphError::TargetNotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Err(MorphError::TargetNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates() {
        let policy = FallbackPolicy::new()
            .with_substitution("asian", "caucasian")
            .with_substitution("female", "male")
            .with_substitution("nowhere", "x");
        assert_eq!(
            policy.candidates("data/asian-female-young.target"),
            vec![
                "data/asian-female-young.target".to_string(),
                "data/caucasian-female-young.target".to_string(),
                "data/asian-male-young.target".to_string(),
            ]
        );
        assert_eq!(policy.candidates("plain.target"), vec!["plain.target"]);
    }

    #[test]
    fn test_candidates_skip_duplicates_and_empty_patterns() {
        let policy = FallbackPolicy::from_options(&FallbackOptions {
            substitutions: vec![
                (String::new(), "x".to_string()),
                ("a".to_string(), "a".to_string()),
            ],
        });
        assert_eq!(policy.candidates("a.target"), vec!["a.target"]);
    }
}
