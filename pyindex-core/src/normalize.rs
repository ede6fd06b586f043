//! Project name normalization (PEP 503).

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

fn separator_runs() -> &'static Regex {
    static SEPARATOR_RUNS: OnceLock<Regex> = OnceLock::new();
    SEPARATOR_RUNS.get_or_init(|| {
        Regex::new(r"[-_.]+").unwrap_or_else(|e| {
            panic!("Failed to compile project name normalization regex: {}", e)
        })
    })
}

/// A project name in PEP 503 normalized form.
///
/// The only way to obtain one is through [`normalize`] (or the equivalent
/// `From<&str>` conversion), so a `NormalizedName` is always safe to compare
/// and to use as a storage key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedName(String);

impl NormalizedName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if `raw` is already spelled in normalized form.
    pub fn is_normalized(raw: &str) -> bool {
        normalize(raw).as_str() == raw
    }
}

impl fmt::Display for NormalizedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NormalizedName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NormalizedName {
    fn from(raw: &str) -> Self {
        normalize(raw)
    }
}

/// Normalize a project name according to PEP 503.
///
/// Lowercases the name and replaces every run of `-`, `_` and `.` with a
/// single `-`. Total and idempotent; characters outside that set pass through
/// lowercased.
///
/// ```
/// # use pyindex_core::normalize;
/// assert_eq!(normalize("Django-REST-framework").as_str(), "django-rest-framework");
/// assert_eq!(normalize("zope.interface").as_str(), "zope-interface");
/// assert_eq!(normalize("Foo__Bar").as_str(), "foo-bar");
/// ```
pub fn normalize(raw: &str) -> NormalizedName {
    NormalizedName(separator_runs().replace_all(&raw.to_lowercase(), "-").into_owned())
}
