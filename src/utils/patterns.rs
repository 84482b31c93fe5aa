//! Blacklist patterns, compiled once per process.
//!
//! A policy is built for every store and CLI context; the pattern it carries
//! is the same each time.

use crate::error::{OneconfError, Result};
use regex::Regex;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

static COMPILED: LazyLock<Mutex<HashMap<String, Regex>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Compile a package-name pattern, reusing an earlier compilation.
///
/// ```
/// use oneconf::utils::patterns::package_pattern;
///
/// let regex = package_pattern(r"^.*-dev").unwrap();
/// assert!(regex.is_match("libssl-dev"));
/// ```
pub fn package_pattern(pattern: &str) -> Result<Regex> {
    let mut compiled = COMPILED
        .lock()
        .map_err(|_| OneconfError::LockError("pattern cache poisoned".to_string()))?;
    if let Some(regex) = compiled.get(pattern) {
        return Ok(regex.clone());
    }

    let regex = Regex::new(pattern)
        .map_err(|e| OneconfError::InvalidRegex(format!("{}: {}", pattern, e)))?;
    compiled.insert(pattern.to_string(), regex.clone());
    Ok(regex)
}

#[cfg(test)]
fn is_compiled(pattern: &str) -> bool {
    COMPILED
        .lock()
        .map(|compiled| compiled.contains_key(pattern))
        .unwrap_or(false)
}
