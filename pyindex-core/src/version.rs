//! # Release Version Ordering
//!
//! Parses release identifiers following PEP 440, including the permissive
//! spellings installers accept (`v1.0`, `1.0-alpha.2`, `1.0-r3`, `1.0-1`),
//! into a [`VersionKey`] with a total ordering.
//!
//! Ordering, most significant first:
//!
//! 1. epoch
//! 2. release segments, component-wise, zero-padded (`1.0 == 1.0.0`)
//! 3. a dev-only release sorts below every pre-release of that release
//! 4. pre-releases (`a < b < rc`) sort below the final release
//! 5. post-releases sort above the final release
//! 6. dev segments sort below the release they qualify
//! 7. local segments break ties between otherwise equal public versions

use crate::error::ParseError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::OnceLock;

const VERSION_PATTERN: &str = r"(?ix)
    ^\s*
    v?
    (?:
        (?:(?P<epoch>[0-9]+)!)?
        (?P<release>[0-9]+(?:\.[0-9]+)*)
        (?P<pre>
            [-_.]?
            (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
            [-_.]?
            (?P<pre_n>[0-9]+)?
        )?
        (?P<post>
            (?:-(?P<post_n1>[0-9]+))
            |
            (?:
                [-_.]?
                (?P<post_l>post|rev|r)
                [-_.]?
                (?P<post_n2>[0-9]+)?
            )
        )?
        (?P<dev>
            [-_.]?
            (?P<dev_l>dev)
            [-_.]?
            (?P<dev_n>[0-9]+)?
        )?
    )
    (?:\+(?P<local>[a-z0-9]+(?:[-_.][a-z0-9]+)*))?
    \s*$
";

fn version_regex() -> &'static Regex {
    static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    VERSION_REGEX.get_or_init(|| {
        Regex::new(VERSION_PATTERN)
            .unwrap_or_else(|e| panic!("Failed to compile version regex: {}", e))
    })
}

/// Pre-release phase. Declaration order is sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreKind {
    Alpha,
    Beta,
    ReleaseCandidate,
}

impl PreKind {
    fn from_label(label: &str) -> Self {
        match label {
            "a" | "alpha" => PreKind::Alpha,
            "b" | "beta" => PreKind::Beta,
            _ => PreKind::ReleaseCandidate,
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            PreKind::Alpha => "a",
            PreKind::Beta => "b",
            PreKind::ReleaseCandidate => "rc",
        }
    }
}

/// One dot-separated piece of a local version label.
///
/// Alphanumeric segments sort below numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocalSegment {
    Text(String),
    Number(u64),
}

impl fmt::Display for LocalSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocalSegment::Text(text) => f.write_str(text),
            LocalSegment::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A parsed release identifier, used only to order distribution files.
#[derive(Debug, Clone)]
pub struct VersionKey {
    epoch: u64,
    release: Vec<u64>,
    pre: Option<(PreKind, u64)>,
    post: Option<u64>,
    dev: Option<u64>,
    local: Option<Vec<LocalSegment>>,
}

/// Sentinel-extended value used to build the comparison key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Bound<T> {
    Below,
    Value(T),
    Above,
}

impl VersionKey {
    /// Parse a version string.
    ///
    /// ```
    /// # use pyindex_core::VersionKey;
    /// let v = VersionKey::parse("1.0-Alpha.2").unwrap();
    /// assert_eq!(v.to_string(), "1.0a2");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidVersion(input.to_string());
        let caps = version_regex().captures(input).ok_or_else(invalid)?;

        let number = |name: &str| -> Result<Option<u64>, ParseError> {
            caps.name(name)
                .map(|m| m.as_str().parse::<u64>().map_err(|_| invalid()))
                .transpose()
        };

        let epoch = number("epoch")?.unwrap_or(0);

        let release = caps
            .name("release")
            .ok_or_else(invalid)?
            .as_str()
            .split('.')
            .map(|part| part.parse::<u64>().map_err(|_| invalid()))
            .collect::<Result<Vec<_>, _>>()?;

        let pre = match caps.name("pre_l") {
            Some(label) => {
                let kind = PreKind::from_label(&label.as_str().to_ascii_lowercase());
                Some((kind, number("pre_n")?.unwrap_or(0)))
            }
            None => None,
        };

        let post = if caps.name("post").is_some() {
            Some(number("post_n1")?.or(number("post_n2")?).unwrap_or(0))
        } else {
            None
        };

        let dev = if caps.name("dev").is_some() {
            Some(number("dev_n")?.unwrap_or(0))
        } else {
            None
        };

        let local = caps.name("local").map(|m| {
            m.as_str()
                .split(['-', '_', '.'])
                .map(|segment| match segment.parse::<u64>() {
                    Ok(n) if segment.bytes().all(|b| b.is_ascii_digit()) => {
                        LocalSegment::Number(n)
                    }
                    _ => LocalSegment::Text(segment.to_ascii_lowercase()),
                })
                .collect()
        });

        Ok(VersionKey {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn release(&self) -> &[u64] {
        &self.release
    }

    pub fn pre(&self) -> Option<(PreKind, u64)> {
        self.pre
    }

    pub fn post(&self) -> Option<u64> {
        self.post
    }

    pub fn dev(&self) -> Option<u64> {
        self.dev
    }

    pub fn local(&self) -> Option<&[LocalSegment]> {
        self.local.as_deref()
    }

    /// `true` for alpha, beta, release-candidate and dev releases.
    pub fn is_prerelease(&self) -> bool {
        self.pre.is_some() || self.dev.is_some()
    }

    fn trimmed_release(&self) -> &[u64] {
        let len = self
            .release
            .iter()
            .rposition(|&n| n != 0)
            .map_or(0, |idx| idx + 1);
        &self.release[..len]
    }

    fn pre_key(&self) -> Bound<(PreKind, u64)> {
        match (self.pre, self.post, self.dev) {
            (None, None, Some(_)) => Bound::Below,
            (None, _, _) => Bound::Above,
            (Some(pre), _, _) => Bound::Value(pre),
        }
    }

    fn post_key(&self) -> Bound<u64> {
        self.post.map_or(Bound::Below, Bound::Value)
    }

    fn dev_key(&self) -> Bound<u64> {
        self.dev.map_or(Bound::Above, Bound::Value)
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| self.trimmed_release().cmp(other.trimmed_release()))
            .then_with(|| self.pre_key().cmp(&other.pre_key()))
            .then_with(|| self.post_key().cmp(&other.post_key()))
            .then_with(|| self.dev_key().cmp(&other.dev_key()))
            .then_with(|| self.local.cmp(&other.local))
    }
}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl std::str::FromStr for VersionKey {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionKey::parse(s)
    }
}

/// Writes the PEP 440 normalized spelling.
impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}!", self.epoch)?;
        }
        let release: Vec<String> = self.release.iter().map(u64::to_string).collect();
        f.write_str(&release.join("."))?;
        if let Some((kind, n)) = self.pre {
            write!(f, "{}{}", kind.as_str(), n)?;
        }
        if let Some(n) = self.post {
            write!(f, ".post{n}")?;
        }
        if let Some(n) = self.dev {
            write!(f, ".dev{n}")?;
        }
        if let Some(local) = &self.local {
            let segments: Vec<String> = local.iter().map(LocalSegment::to_string).collect();
            write!(f, "+{}", segments.join("."))?;
        }
        Ok(())
    }
}

/// Compare two versions; shorthand for [`Ord::cmp`].
pub fn compare(a: &VersionKey, b: &VersionKey) -> Ordering {
    a.cmp(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> VersionKey {
        VersionKey::parse(s).unwrap_or_else(|e| panic!("{s}: {e}"))
    }

    #[test]
    fn test_reference_comparisons() {
        assert_eq!(compare(&v("1.0"), &v("1.0a1")), Ordering::Greater);
        assert_eq!(compare(&v("1.0.post1"), &v("1.0")), Ordering::Greater);
        assert_eq!(compare(&v("1.0.dev1"), &v("1.0a1")), Ordering::Less);
    }

    #[test]
    fn test_release_segments_are_zero_padded() {
        assert_eq!(v("1.0"), v("1.0.0"));
        assert_eq!(v("1"), v("1.0.0.0"));
        assert!(v("1.0.1") > v("1.0"));
        assert!(v("1.10") > v("1.9"));
        assert!(v("2") > v("1.999.999"));
    }

    #[test]
    fn test_full_ordering_chain() {
        let ordered = [
            "1.0.dev456",
            "1.0a1",
            "1.0a2.dev456",
            "1.0a12.dev456",
            "1.0a12",
            "1.0b1.dev456",
            "1.0b2",
            "1.0b2.post345.dev456",
            "1.0b2.post345",
            "1.0rc1.dev456",
            "1.0rc1",
            "1.0",
            "1.0+abc.5",
            "1.0+abc.7",
            "1.0+5",
            "1.0.post456.dev34",
            "1.0.post456",
            "1.0.15",
            "1.1.dev1",
            "1!0.1",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
        for (i, a) in ordered.iter().enumerate() {
            for (j, b) in ordered.iter().enumerate() {
                assert_eq!(v(a).cmp(&v(b)), i.cmp(&j), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_local_never_outranks_next_public_release() {
        assert!(v("1.0+zzz") < v("1.0.post1"));
        assert!(v("1.0+999") < v("1.0.1"));
        assert!(v("1.0+local") > v("1.0"));
    }

    #[test]
    fn test_alternate_spellings_normalize() {
        let cases = [
            ("v1.0", "1.0"),
            ("1.0-Alpha.2", "1.0a2"),
            ("1.0beta", "1.0b0"),
            ("1.0c1", "1.0rc1"),
            ("1.0.preview3", "1.0rc3"),
            ("1.0-1", "1.0.post1"),
            ("1.0-r3", "1.0.post3"),
            ("1.0.rev", "1.0.post0"),
            ("1.0_dev", "1.0.dev0"),
            ("2!1.0", "2!1.0"),
            ("1.0+Ubuntu-1", "1.0+ubuntu.1"),
            ("  1.2.3  ", "1.2.3"),
        ];
        for (input, expected) in cases {
            assert_eq!(v(input).to_string(), expected, "{input}");
        }
        assert_eq!(v("1.0c1"), v("1.0rc1"));
        assert_eq!(v("1.0-1"), v("1.0.post1"));
    }

    #[test]
    fn test_invalid_versions_are_rejected() {
        for input in ["", "abc", "1.0.x", "1..0", "1.0+", "1.0+a..b", "one.two", "1.0 beta 2"] {
            assert_eq!(
                VersionKey::parse(input),
                Err(ParseError::InvalidVersion(input.to_string())),
                "{input:?}"
            );
        }
    }

    #[test]
    fn test_oversized_numbers_are_parse_errors() {
        assert!(VersionKey::parse("1.99999999999999999999999").is_err());
    }

    #[test]
    fn test_prerelease_detection() {
        assert!(v("1.0a1").is_prerelease());
        assert!(v("1.0.dev0").is_prerelease());
        assert!(!v("1.0.post1").is_prerelease());
        assert!(!v("1.0").is_prerelease());
    }

    #[test]
    fn test_ordering_is_antisymmetric_and_transitive() {
        let samples: Vec<VersionKey> = [
            "0.9", "1.0", "1.0.0", "1.0a1", "1.0.post1", "1.0.dev1", "1.0+x", "1.1rc1", "2!0.1",
        ]
        .iter()
        .map(|s| v(s))
        .collect();
        for a in &samples {
            for b in &samples {
                assert_eq!(a.cmp(b), b.cmp(a).reverse());
                for c in &samples {
                    if a <= b && b <= c {
                        assert!(a <= c);
                    }
                }
            }
        }
    }
}
