// src/engine/branch.rs

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::{DeployError, Result};

/// Which branches trigger a deploy.
///
/// Patterns are globs where `*` does not cross `/`, so `release/*` matches
/// `release/1.2` but not `release/1.2/hotfix`.
#[derive(Debug, Clone)]
pub struct BranchMatcher {
    patterns: Vec<String>,
    set: GlobSet,
}

impl BranchMatcher {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let mut builder = GlobSetBuilder::new();
        let mut kept = Vec::with_capacity(patterns.len());

        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                return Err(DeployError::ConfigError(
                    "empty branch pattern in [trigger].branches".to_string(),
                ));
            }
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    DeployError::ConfigError(format!("invalid branch pattern '{pattern}': {e}"))
                })?;
            builder.add(glob);
            kept.push(pattern.to_string());
        }

        let set = builder
            .build()
            .map_err(|e| DeployError::ConfigError(format!("building branch matcher: {e}")))?;

        Ok(Self {
            patterns: kept,
            set,
        })
    }

    pub fn matches(&self, branch: &str) -> bool {
        !branch.is_empty() && self.set.is_match(branch)
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}
