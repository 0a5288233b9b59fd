//! Version string parsing and mismatch classification.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::Error;
use crate::flag::MismatchFlag;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("valid regex"));

/// A parsed `major.minor.patch` application version.
///
/// Only the exact three-component numeric form is accepted; anything else
/// (prerelease tags, build metadata, missing components) is rejected at parse
/// time. The reconciler cannot operate without a valid baseline, so parse
/// failures are surfaced as errors rather than guessed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SemVer {
    /// Major component; a strictly newer major forces a hard reload.
    pub major: u64,
    /// Minor component; a strictly newer minor is a soft signal only.
    pub minor: u64,
    /// Patch component; never affects reconciliation.
    pub patch: u64,
}

impl SemVer {
    /// Classifies how `self` (a freshly observed version) relates to `local`.
    ///
    /// Most significant component first: a strictly newer major wins over any
    /// minor difference. Equal, older, and patch-only differences all yield
    /// `None`.
    #[must_use]
    pub const fn severity_against(&self, local: &Self) -> Option<MismatchFlag> {
        if self.major > local.major {
            Some(MismatchFlag::Major)
        } else if self.major == local.major && self.minor > local.minor {
            Some(MismatchFlag::Minor)
        } else {
            None
        }
    }
}

impl FromStr for SemVer {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = VERSION_RE
            .captures(s)
            .ok_or_else(|| Error::Version(s.to_string()))?;

        let component = |i: usize| -> Result<u64, Error> {
            caps[i]
                .parse::<u64>()
                .map_err(|_| Error::Version(s.to_string()))
        };

        Ok(Self {
            major: component(1)?,
            minor: component(2)?,
            patch: component(3)?,
        })
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
