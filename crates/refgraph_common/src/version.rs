//! Four-part assembly versions with parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A four-part `major.minor.build.revision` version.
///
/// Ordering is lexicographic over the four components, which is the order
/// used when choosing between multiple supplied versions of one assembly.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Version {
    /// Major component.
    pub major: u16,
    /// Minor component.
    pub minor: u16,
    /// Build component.
    pub build: u16,
    /// Revision component.
    pub revision: u16,
}

impl Version {
    /// The all-zero version `0.0.0.0`.
    pub const ZERO: Version = Version::new(0, 0, 0, 0);

    /// Creates a version from its four components.
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({self})")
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

/// Error type for parsing version strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version: '{input}'")]
pub struct ParseVersionError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for Version {
    type Err = ParseVersionError;

    /// Parses one to four dot-separated components; missing trailing
    /// components are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseVersionError {
            input: s.to_string(),
        };
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(err());
        }
        let mut parts = [0u16; 4];
        let mut count = 0;
        for piece in trimmed.split('.') {
            if count == 4 {
                return Err(err());
            }
            parts[count] = piece.parse::<u16>().map_err(|_| err())?;
            count += 1;
        }
        Ok(Version::new(parts[0], parts[1], parts[2], parts[3]))
    }
}
