//! PEP 440 version parsing.
//!
//! Only what the index needs: accept every valid public/local version string,
//! render its normalized form, and reduce it to the base release form
//! (`[N!]N(.N)*`) that the package pages report.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

/// PEP 440 version grammar, including the permitted alternative spellings.
static VERSION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*
        v?
        (?:
            (?:(?P<epoch>[0-9]+)!)?
            (?P<release>[0-9]+(?:\.[0-9]+)*)
            (?P<pre>
                [-_\.]?
                (?P<pre_l>alpha|a|beta|b|preview|pre|c|rc)
                [-_\.]?
                (?P<pre_n>[0-9]+)?
            )?
            (?P<post>
                (?:-(?P<post_n1>[0-9]+))
                |
                (?:
                    [-_\.]?
                    (?P<post_l>post|rev|r)
                    [-_\.]?
                    (?P<post_n2>[0-9]+)?
                )
            )?
            (?P<dev>
                [-_\.]?
                (?P<dev_l>dev)
                [-_\.]?
                (?P<dev_n>[0-9]+)?
            )?
        )
        (?:\+(?P<local>[a-z0-9]+(?:[-_\.][a-z0-9]+)*))?
        \s*$",
    )
    .expect("PEP 440 version regex should compile - this is a static pattern")
});

/// A version string that does not follow PEP 440.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version: '{0}'")]
pub struct InvalidVersion(pub String);

/// Pre-release phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PreRelease {
    Alpha,
    Beta,
    Rc,
}

impl PreRelease {
    fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "alpha" | "a" => PreRelease::Alpha,
            "beta" | "b" => PreRelease::Beta,
            _ => PreRelease::Rc,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PreRelease::Alpha => "a",
            PreRelease::Beta => "b",
            PreRelease::Rc => "rc",
        }
    }
}

/// A parsed PEP 440 version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub epoch: u64,
    pub release: Vec<u64>,
    pub pre: Option<(PreRelease, u64)>,
    pub post: Option<u64>,
    pub dev: Option<u64>,
    pub local: Option<String>,
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, InvalidVersion> {
        let invalid = || InvalidVersion(input.to_string());
        let caps = VERSION_REGEX.captures(input).ok_or_else(invalid)?;

        let number = |name: &str| -> Result<Option<u64>, InvalidVersion> {
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
            Some(label) => Some((
                PreRelease::from_label(label.as_str()),
                number("pre_n")?.unwrap_or(0),
            )),
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
                .to_ascii_lowercase()
                .replace(['-', '_'], ".")
        });

        Ok(Self {
            epoch,
            release,
            pre,
            post,
            dev,
            local,
        })
    }

    /// Epoch and release segments only, e.g. `1!2.0` for `1!2.0rc1.post2+abc`.
    pub fn base_version(&self) -> String {
        let release = self.release_string();
        if self.epoch != 0 {
            format!("{}!{}", self.epoch, release)
        } else {
            release
        }
    }

    fn release_string(&self) -> String {
        self.release
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_version())?;
        if let Some((phase, n)) = &self.pre {
            write!(f, "{}{}", phase.as_str(), n)?;
        }
        if let Some(post) = self.post {
            write!(f, ".post{post}")?;
        }
        if let Some(dev) = self.dev {
            write!(f, ".dev{dev}")?;
        }
        if let Some(local) = &self.local {
            write!(f, "+{local}")?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = InvalidVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap_or_else(|e| panic!("{s} should parse: {e}"))
    }

    #[test]
    fn test_base_version_strips_suffixes() {
        assert_eq!(v("1.0.0a1").base_version(), "1.0.0");
        assert_eq!(v("2.3").base_version(), "2.3");
        assert_eq!(v("1.0+ubuntu.1").base_version(), "1.0");
        assert_eq!(v("1!2.0.post3").base_version(), "1!2.0");
        assert_eq!(v("3.1.dev7").base_version(), "3.1");
    }

    #[test]
    fn test_release_numbers_are_normalized() {
        assert_eq!(v("1.01.002").base_version(), "1.1.2");
        assert_eq!(v("0!1.0").base_version(), "1.0");
        assert_eq!(v("v4.2").base_version(), "4.2");
    }

    #[test]
    fn test_normalized_display() {
        assert_eq!(v("1.0_RC_1").to_string(), "1.0rc1");
        assert_eq!(v("1.0-1").to_string(), "1.0.post1");
        assert_eq!(v("1.0.DEV").to_string(), "1.0.dev0");
        assert_eq!(v("2.0alpha").to_string(), "2.0a0");
        assert_eq!(v("1.0preview2").to_string(), "1.0rc2");
        assert_eq!(v("1.0.rev3").to_string(), "1.0.post3");
        assert_eq!(v("1.0+Local_Build-7").to_string(), "1.0+local.build.7");
    }

    #[test]
    fn test_rejects_invalid_versions() {
        for bad in ["", "latest", "1.0-beta-gamma", "1..0", "1.0+", "1.0+local+again"] {
            assert!(Version::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn test_rejects_overflowing_segments() {
        assert!(Version::parse("99999999999999999999999.0").is_err());
    }
}
