//! Package artifact filename parsing.
//!
//! Two naming conventions are understood:
//!
//! - wheels: `{name}-{version}(-{build})?-{python}-{abi}-{platform}.whl`
//! - source distributions: `{name}-{version}.tar.gz` or `{name}-{version}.zip`
//!
//! Parsing never touches the filesystem. Names are canonicalized per PEP 503
//! and versions are validated against PEP 440.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::version::Version;

pub const WHEEL_EXTENSION: &str = ".whl";
pub const SDIST_EXTENSIONS: &[&str] = &[".tar.gz", ".zip"];

/// Every extension the index picks up when scanning a directory.
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".whl", ".tar.gz", ".zip"];

static PYPI_NAME_SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-_.]+").expect("PyPI name normalization regex should compile")
});

static WHEEL_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.]*$").expect("wheel name regex should compile"));

static BUILD_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)(.*)$").expect("build tag regex should compile"));

/// Normalize PyPI package name according to PEP 503.
///
/// Lowercases the name and replaces runs of `[-_.]+` with a single `-`, so
/// `Django-REST-framework`, `django_rest_framework` and
/// `django.rest.framework` all resolve to the same project.
///
/// ```
/// # use simple_pypi_server::filename::normalize_pypi_name;
/// assert_eq!(normalize_pypi_name("Django-REST-framework"), "django-rest-framework");
/// assert_eq!(normalize_pypi_name("some_package"), "some-package");
/// assert_eq!(normalize_pypi_name("package.name"), "package-name");
/// ```
pub fn normalize_pypi_name(name: &str) -> String {
    PYPI_NAME_SEPARATORS
        .replace_all(&name.to_lowercase(), "-")
        .into_owned()
}

/// Whether a directory entry should be considered part of the index.
pub fn is_artifact_filename(filename: &str) -> bool {
    ARTIFACT_EXTENSIONS
        .iter()
        .any(|ext| filename.ends_with(ext))
}

/// Why a filename was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilenameError {
    #[error("unrecognized filename '{filename}': not a wheel or source distribution extension")]
    UnknownExtension { filename: String },

    #[error("unrecognized filename '{filename}': {reason}")]
    InvalidWheel { filename: String, reason: String },

    #[error("unrecognized filename '{filename}': {reason}")]
    InvalidSdist { filename: String, reason: String },
}

impl FilenameError {
    pub fn filename(&self) -> &str {
        match self {
            FilenameError::UnknownExtension { filename }
            | FilenameError::InvalidWheel { filename, .. }
            | FilenameError::InvalidSdist { filename, .. } => filename,
        }
    }
}

/// Distribution flavour of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistributionKind {
    Wheel,
    Sdist,
}

impl DistributionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistributionKind::Wheel => "wheel",
            DistributionKind::Sdist => "sdist",
        }
    }

    /// Content type the artifact bytes are served with.
    ///
    /// Wheels go out as `application/x-tar`, which is what existing
    /// installations of this tool have always sent.
    pub fn content_type(&self) -> &'static str {
        match self {
            DistributionKind::Wheel => "application/x-tar",
            DistributionKind::Sdist => "application/octet-stream",
        }
    }
}

impl fmt::Display for DistributionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional wheel build number, e.g. `1` or `2b`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTag {
    pub number: u64,
    pub suffix: String,
}

/// A single `python-abi-platform` compatibility triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WheelTag {
    pub python: String,
    pub abi: String,
    pub platform: String,
}

impl fmt::Display for WheelTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.python, self.abi, self.platform)
    }
}

/// Metadata recovered from an artifact filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFilename {
    /// Canonical project name.
    pub name: String,
    pub version: Version,
    pub kind: DistributionKind,
    pub build_tag: Option<BuildTag>,
    /// Expanded compatibility tags; empty for source distributions.
    pub tags: Vec<WheelTag>,
}

/// Parse any supported artifact filename.
pub fn parse_filename(filename: &str) -> Result<ParsedFilename, FilenameError> {
    if filename.ends_with(WHEEL_EXTENSION) {
        parse_wheel_filename(filename)
    } else if SDIST_EXTENSIONS.iter().any(|ext| filename.ends_with(ext)) {
        parse_sdist_filename(filename)
    } else {
        Err(FilenameError::UnknownExtension {
            filename: filename.to_string(),
        })
    }
}

/// Parse a built distribution filename.
pub fn parse_wheel_filename(filename: &str) -> Result<ParsedFilename, FilenameError> {
    let invalid = |reason: &str| FilenameError::InvalidWheel {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    let stem = filename
        .strip_suffix(WHEEL_EXTENSION)
        .ok_or_else(|| invalid("missing .whl extension"))?;

    let dashes = stem.matches('-').count();
    if dashes != 4 && dashes != 5 {
        return Err(invalid("wrong number of dash-separated parts"));
    }

    // The last three parts are always the tag triple; split off the rest.
    let parts: Vec<&str> = stem.splitn(dashes - 1, '-').collect();
    let name_part = parts[0];
    if name_part.is_empty() || name_part.contains("__") || !WHEEL_NAME_REGEX.is_match(name_part)
    {
        return Err(invalid("invalid project name"));
    }

    let version = Version::parse(parts[1]).map_err(|e| invalid(&e.to_string()))?;

    let build_tag = if dashes == 5 {
        let caps = BUILD_TAG_REGEX
            .captures(parts[2])
            .ok_or_else(|| invalid("build number must start with a digit"))?;
        let number = caps[1]
            .parse::<u64>()
            .map_err(|_| invalid("build number out of range"))?;
        Some(BuildTag {
            number,
            suffix: caps[2].to_string(),
        })
    } else {
        None
    };

    let tags = parse_tag_triple(parts[parts.len() - 1]).ok_or_else(|| invalid("invalid tags"))?;

    Ok(ParsedFilename {
        name: normalize_pypi_name(name_part),
        version,
        kind: DistributionKind::Wheel,
        build_tag,
        tags,
    })
}

/// Parse a source distribution filename.
pub fn parse_sdist_filename(filename: &str) -> Result<ParsedFilename, FilenameError> {
    let invalid = |reason: &str| FilenameError::InvalidSdist {
        filename: filename.to_string(),
        reason: reason.to_string(),
    };

    let stem = SDIST_EXTENSIONS
        .iter()
        .find_map(|ext| filename.strip_suffix(ext))
        .ok_or_else(|| invalid("extension must be .tar.gz or .zip"))?;

    let (name_part, version_part) = stem
        .rsplit_once('-')
        .ok_or_else(|| invalid("missing dash between name and version"))?;
    if name_part.is_empty() {
        return Err(invalid("invalid project name"));
    }

    let version = Version::parse(version_part).map_err(|e| invalid(&e.to_string()))?;

    Ok(ParsedFilename {
        name: normalize_pypi_name(name_part),
        version,
        kind: DistributionKind::Sdist,
        build_tag: None,
        tags: Vec::new(),
    })
}

/// Expand a compressed tag triple such as `py2.py3-none-any`.
fn parse_tag_triple(triple: &str) -> Option<Vec<WheelTag>> {
    let mut fields = triple.split('-');
    let (python, abi, platform) = (fields.next()?, fields.next()?, fields.next()?);
    if fields.next().is_some() {
        return None;
    }

    let split = |field: &str| -> Option<Vec<String>> {
        let values: Vec<String> = field.split('.').map(str::to_lowercase).collect();
        if values.iter().any(String::is_empty) {
            None
        } else {
            Some(values)
        }
    };
    let (pythons, abis, platforms) = (split(python)?, split(abi)?, split(platform)?);

    let mut tags = Vec::with_capacity(pythons.len() * abis.len() * platforms.len());
    for python in &pythons {
        for abi in &abis {
            for platform in &platforms {
                tags.push(WheelTag {
                    python: python.clone(),
                    abi: abi.clone(),
                    platform: platform.clone(),
                });
            }
        }
    }
    Some(tags)
}
