//! Distribution filename parsing.
//!
//! Two layouts are recognised:
//!
//! - wheels: `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
//! - source distributions: `{name}-{version}.tar.gz` or `{name}-{version}.zip`
//!
//! Parsing is split in two stages. [`DistributionFilename::parse`] checks the
//! structure and the embedded project name; the version string is kept raw
//! and only parsed on demand, so a structurally valid filename with an odd
//! version can still be stored and listed.

use crate::error::ParseError;
use crate::normalize::{normalize, NormalizedName};
use crate::version::VersionKey;
use regex::Regex;
use std::sync::OnceLock;

const WHEEL_EXTENSION: &str = ".whl";
const SDIST_EXTENSIONS: &[&str] = &[".tar.gz", ".zip"];

fn project_name_regex() -> &'static Regex {
    static PROJECT_NAME: OnceLock<Regex> = OnceLock::new();
    PROJECT_NAME.get_or_init(|| {
        Regex::new(r"(?i)^([A-Z0-9]|[A-Z0-9][A-Z0-9._-]*[A-Z0-9])$")
            .unwrap_or_else(|e| panic!("Failed to compile project name regex: {}", e))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionKind {
    Wheel,
    Sdist,
}

/// Compatibility tags carried by a wheel filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WheelTags {
    pub build: Option<String>,
    pub python: String,
    pub abi: String,
    pub platform: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionFilename {
    name: String,
    project: NormalizedName,
    version: String,
    kind: DistributionKind,
    wheel_tags: Option<WheelTags>,
}

fn starts_with_digit(field: &str) -> bool {
    field.starts_with(|c: char| c.is_ascii_digit())
}

fn looks_like_version(field: &str) -> bool {
    starts_with_digit(field.strip_prefix(['v', 'V']).unwrap_or(field))
}

impl DistributionFilename {
    pub fn parse(filename: &str) -> Result<Self, ParseError> {
        if let Some(stem) = filename.strip_suffix(WHEEL_EXTENSION) {
            return Self::parse_wheel(filename, stem);
        }
        for ext in SDIST_EXTENSIONS {
            if let Some(stem) = filename.strip_suffix(ext) {
                return Self::parse_sdist(filename, stem);
            }
        }
        Err(ParseError::UnsupportedExtension(filename.to_string()))
    }

    fn parse_wheel(filename: &str, stem: &str) -> Result<Self, ParseError> {
        let malformed = || ParseError::MalformedFilename(filename.to_string());
        let parts: Vec<&str> = stem.split('-').collect();
        if parts.iter().any(|part| part.is_empty()) {
            return Err(malformed());
        }

        let (name, version, build, tags) = match parts.as_slice() {
            [name, version, python, abi, platform] => {
                (*name, *version, None, [*python, *abi, *platform])
            }
            [name, version, build, python, abi, platform] => {
                // A dashed name shifts the version into the build slot.
                if !starts_with_digit(build) || !looks_like_version(version) {
                    return Err(malformed());
                }
                (*name, *version, Some(build.to_string()), [*python, *abi, *platform])
            }
            _ => return Err(malformed()),
        };

        let [python, abi, platform] = tags;
        Self::checked(
            filename,
            name,
            version,
            DistributionKind::Wheel,
            Some(WheelTags {
                build,
                python: python.to_string(),
                abi: abi.to_string(),
                platform: platform.to_string(),
            }),
        )
    }

    fn parse_sdist(filename: &str, stem: &str) -> Result<Self, ParseError> {
        let (name, version) = stem
            .rsplit_once('-')
            .ok_or_else(|| ParseError::MalformedFilename(filename.to_string()))?;
        Self::checked(filename, name, version, DistributionKind::Sdist, None)
    }

    fn checked(
        filename: &str,
        name: &str,
        version: &str,
        kind: DistributionKind,
        wheel_tags: Option<WheelTags>,
    ) -> Result<Self, ParseError> {
        if version.is_empty() || !project_name_regex().is_match(name) {
            return Err(ParseError::MalformedFilename(filename.to_string()));
        }
        Ok(DistributionFilename {
            name: name.to_string(),
            project: normalize(name),
            version: version.to_string(),
            kind,
            wheel_tags,
        })
    }

    /// Project name as spelled in the filename.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn project(&self) -> &NormalizedName {
        &self.project
    }

    /// Version as spelled in the filename.
    pub fn raw_version(&self) -> &str {
        &self.version
    }

    pub fn version(&self) -> Result<VersionKey, ParseError> {
        VersionKey::parse(&self.version)
    }

    pub fn kind(&self) -> DistributionKind {
        self.kind
    }

    pub fn wheel_tags(&self) -> Option<&WheelTags> {
        self.wheel_tags.as_ref()
    }
}

/// Extract and parse the version embedded in a distribution filename.
pub fn parse_version(filename: &str) -> Result<VersionKey, ParseError> {
    DistributionFilename::parse(filename)?.version()
}
