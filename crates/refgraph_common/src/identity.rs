//! Assembly identities: the `(name, version, culture, key)` tuple naming a compiled unit.

use crate::version::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// An 8-byte public-key token identifying the publisher of a strong-named unit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PublicKeyToken([u8; 8]);

impl PublicKeyToken {
    /// Creates a token from raw bytes.
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Returns the raw token bytes.
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PublicKeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKeyToken({self})")
    }
}

/// Error type for parsing public-key token strings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid public key token: '{input}' (expected 16 hex digits)")]
pub struct ParseKeyTokenError {
    /// The input string that failed to parse.
    pub input: String,
}

impl FromStr for PublicKeyToken {
    type Err = ParseKeyTokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseKeyTokenError {
            input: s.to_string(),
        };
        let s = s.trim();
        if s.len() != 16 || !s.is_ascii() {
            return Err(err());
        }
        let mut bytes = [0u8; 8];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| err())?;
        }
        Ok(Self(bytes))
    }
}

/// The identity of a compiled unit, independent of its file location.
///
/// Names and cultures compare case-insensitively; all other fields compare
/// exactly. An empty culture means "neutral".
#[derive(Clone, Serialize, Deserialize)]
pub struct AssemblyIdentity {
    name: String,
    version: Version,
    #[serde(default)]
    culture: String,
    #[serde(default)]
    public_key_token: Option<PublicKeyToken>,
    #[serde(default)]
    retargetable: bool,
}

/// The result of testing whether a definition satisfies a reference.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IdentityMatch {
    /// Every field matches.
    Equivalent,
    /// Matches apart from version; the definition is newer than requested.
    UnifiedToHigher,
    /// Matches apart from version; the definition is older than requested.
    UnifiedToLower,
    /// Different name, culture or publisher.
    NotEquivalent,
}

impl IdentityMatch {
    /// Returns `true` unless the identities are unrelated.
    pub fn is_match(self) -> bool {
        self != IdentityMatch::NotEquivalent
    }
}

impl AssemblyIdentity {
    /// Creates a neutral-culture, unsigned identity.
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            culture: String::new(),
            public_key_token: None,
            retargetable: false,
        }
    }

    /// Sets the culture; `""` or `"neutral"` both mean neutral.
    pub fn with_culture(mut self, culture: impl Into<String>) -> Self {
        let culture = culture.into();
        self.culture = if culture.eq_ignore_ascii_case("neutral") {
            String::new()
        } else {
            culture
        };
        self
    }

    /// Sets the publisher's public-key token.
    pub fn with_public_key_token(mut self, token: PublicKeyToken) -> Self {
        self.public_key_token = Some(token);
        self
    }

    /// Marks the identity as retargetable.
    pub fn with_retargetable(mut self, retargetable: bool) -> Self {
        self.retargetable = retargetable;
        self
    }

    /// Returns a copy of this identity with a different version.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self
    }

    /// The simple name as written.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The four-part version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// The culture, or `""` for neutral.
    pub fn culture(&self) -> &str {
        &self.culture
    }

    /// The publisher's key token, if strong-named.
    pub fn public_key_token(&self) -> Option<PublicKeyToken> {
        self.public_key_token
    }

    /// Whether references to this identity may bind to another publisher.
    pub fn is_retargetable(&self) -> bool {
        self.retargetable
    }

    /// Whether the identity carries a publisher token.
    pub fn is_strong_name(&self) -> bool {
        self.public_key_token.is_some()
    }

    /// The grouping key used to collect identities of "the same" unit.
    pub fn simple_name_key(&self) -> String {
        self.name.to_ascii_lowercase()
    }

    /// Whether both identities have the same simple name.
    pub fn name_eq(&self, other: &AssemblyIdentity) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
    }

    /// Tests whether `definition` can satisfy a reference to `self`.
    pub fn match_definition(&self, definition: &AssemblyIdentity) -> IdentityMatch {
        if !self.name_eq(definition) || !self.culture.eq_ignore_ascii_case(&definition.culture) {
            return IdentityMatch::NotEquivalent;
        }
        if !self.retargetable && self.public_key_token != definition.public_key_token {
            return IdentityMatch::NotEquivalent;
        }
        match definition.version.cmp(&self.version) {
            Ordering::Equal => IdentityMatch::Equivalent,
            Ordering::Greater => IdentityMatch::UnifiedToHigher,
            Ordering::Less => IdentityMatch::UnifiedToLower,
        }
    }

    /// Whether any of `identities` can satisfy a reference to `self`.
    pub fn is_reachable_from<'a>(
        &self,
        identities: impl IntoIterator<Item = &'a AssemblyIdentity>,
    ) -> bool {
        identities
            .into_iter()
            .any(|candidate| self.match_definition(candidate).is_match())
    }

    fn order_key(&self) -> (String, Version, String, Option<PublicKeyToken>, bool) {
        (
            self.name.to_ascii_lowercase(),
            self.version,
            self.culture.to_ascii_lowercase(),
            self.public_key_token,
            self.retargetable,
        )
    }
}

impl PartialEq for AssemblyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name_eq(other)
            && self.version == other.version
            && self.culture.eq_ignore_ascii_case(&other.culture)
            && self.public_key_token == other.public_key_token
            && self.retargetable == other.retargetable
    }
}

impl Eq for AssemblyIdentity {}

impl Hash for AssemblyIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.name.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        self.version.hash(state);
        for byte in self.culture.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
        self.public_key_token.hash(state);
        self.retargetable.hash(state);
    }
}

impl PartialOrd for AssemblyIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for AssemblyIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let culture = if self.culture.is_empty() {
            "neutral"
        } else {
            &self.culture
        };
        write!(
            f,
            "{}, Version={}, Culture={culture}, PublicKeyToken=",
            self.name, self.version
        )?;
        match self.public_key_token {
            Some(token) => write!(f, "{token}")?,
            None => write!(f, "null")?,
        }
        if self.retargetable {
            write!(f, ", Retargetable=Yes")?;
        }
        Ok(())
    }
}

impl fmt::Debug for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssemblyIdentity({self})")
    }
}
