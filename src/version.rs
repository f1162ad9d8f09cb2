use std::fmt;
use std::str::FromStr;

use crate::appliance::diagnostic::DiagnosticReport;
use crate::errors::Error;

/// Numeric `major.minor.patch[.build]` release
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Release {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub build: u64,
}

/// Version of an appliance, or `Empty` when none is deployed.
///
/// `Empty` is declared first so the derived ordering sorts it below every release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionSpec {
    Empty,
    Release(Release),
}

impl VersionSpec {
    /// Parse an optional version string, absent or blank input yields `Empty`
    pub fn parse(version: Option<&str>) -> Result<Self, Error> {
        match version.map(str::trim) {
            None | Some("") => Ok(VersionSpec::Empty),
            Some(version) => version.parse(),
        }
    }

    /// Version reported by a live appliance; no report means nothing is deployed.
    pub fn from_report(report: Option<&DiagnosticReport>) -> Result<Self, Error> {
        Self::parse(report.map(|report| report.versions.release_version.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, VersionSpec::Empty)
    }
}

impl Default for VersionSpec {
    fn default() -> Self {
        VersionSpec::Empty
    }
}

impl FromStr for VersionSpec {
    type Err = Error;

    fn from_str(version: &str) -> Result<Self, Self::Err> {
        if version.is_empty() {
            return Ok(VersionSpec::Empty);
        }
        let invalid = |reason: String| Error::InvalidVersion {
            version: version.to_owned(),
            reason,
        };

        let segments = version
            .split('.')
            .map(|segment| {
                segment
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("segment '{}' is not numeric", segment)))
            })
            .collect::<Result<Vec<u64>, Error>>()?;
        if segments.len() > 4 {
            return Err(invalid(format!("expected at most 4 segments, found {}", segments.len())));
        }

        let segment = |n: usize| segments.get(n).copied().unwrap_or(0);
        Ok(VersionSpec::Release(Release {
            major: segment(0),
            minor: segment(1),
            patch: segment(2),
            build: segment(3),
        }))
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSpec::Empty => Ok(()),
            VersionSpec::Release(release) => {
                write!(f, "{}.{}.{}", release.major, release.minor, release.patch)?;
                // A zero build segment is noise added by the appliance, e.g. `1.8.2.0`
                if release.build != 0 {
                    write!(f, ".{}", release.build)?;
                }
                Ok(())
            }
        }
    }
}
