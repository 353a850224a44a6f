// src/secrets/mod.rs

//! Secret store adapter.
//!
//! Deploy credentials come from the CI environment. Everything read through
//! this module is wrapped in [`Secret`], whose `Debug`/`Display` never show the
//! value, so secrets can travel through logged structs safely.

use std::collections::BTreeMap;
use std::fmt;

use crate::errors::{DeployError, Result};

pub mod mock;

/// An opaque secret value.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value. Only call this at the point of use.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Read-only source of named secrets.
pub trait SecretSource: Send + Sync + fmt::Debug {
    /// Look up a single secret. Empty values count as absent.
    fn lookup(&self, name: &str) -> Option<Secret>;

    /// Resolve every name or fail with all the names that are missing.
    fn resolve(&self, names: &[&str]) -> Result<SecretMap> {
        let mut found = BTreeMap::new();
        let mut missing = Vec::new();

        for name in names {
            match self.lookup(name) {
                Some(value) => {
                    found.insert(name.to_string(), value);
                }
                None => missing.push(name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(DeployError::MissingSecret(missing));
        }

        Ok(SecretMap { values: found })
    }
}

/// Secrets read from the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretStore;

impl SecretSource for EnvSecretStore {
    fn lookup(&self, name: &str) -> Option<Secret> {
        std::env::var(name)
            .ok()
            .filter(|v| !v.is_empty())
            .map(Secret::new)
    }
}

/// Resolved name → value mapping.
#[derive(Debug, Clone, Default)]
pub struct SecretMap {
    values: BTreeMap<String, Secret>,
}

impl SecretMap {
    pub fn get(&self, name: &str) -> Option<&Secret> {
        self.values.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: Secret) {
        self.values.insert(name.into(), value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Names only; safe to log.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Masker that hides every value in this map.
    pub fn masker(&self) -> Masker {
        let mut masker = Masker::default();
        for secret in self.values.values() {
            masker.add(secret);
        }
        masker
    }
}

/// Replaces secret values in text with `***`.
///
/// Multi-line secrets (private keys) are also masked line by line so that a
/// partially echoed key does not leak.
#[derive(Clone, Default)]
pub struct Masker {
    needles: Vec<String>,
}

impl fmt::Debug for Masker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Masker")
            .field("needles", &self.needles.len())
            .finish()
    }
}

/// Key lines shorter than this are too likely to appear in ordinary output.
const MIN_FRAGMENT_LEN: usize = 4;

impl Masker {
    /// Hide `secret` in full, whatever its length.
    pub fn add(&mut self, secret: &Secret) {
        let value = secret.expose();
        self.push(value.trim());
        if value.contains('\n') {
            for line in value.lines().map(str::trim) {
                if line.len() >= MIN_FRAGMENT_LEN {
                    self.push(line);
                }
            }
        }
        // Longest first so a line of a key never pre-empts the whole key.
        self.needles.sort_by_key(|n| std::cmp::Reverse(n.len()));
    }

    fn push(&mut self, needle: &str) {
        if !needle.is_empty() && !self.needles.iter().any(|n| n == needle) {
            self.needles.push(needle.to_string());
        }
    }

    pub fn mask(&self, text: &str) -> String {
        let mut out = text.to_string();
        for needle in &self.needles {
            if out.contains(needle.as_str()) {
                out = out.replace(needle.as_str(), "***");
            }
        }
        out
    }
}
