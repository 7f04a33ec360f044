//! Classification of a parsed inbound URI.

use std::fmt;

/// Outcome of parsing and validating a managed URI.
///
/// ```text
/// parse --malformed--> BadUri
///   |
///   +--no versioner / no version--> ValidUnversioned
///   |
///   +--Versioner::validate--> ValidVersioned | InvalidVersion
/// ```
///
/// Rendering URIs can additionally end in `InvalidDomain` when the host is
/// not the gadget's locked domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum UriStatus {
    /// Structurally unparseable or missing a required parameter.
    BadUri,
    /// Well formed, with no fingerprint or no versioner to check it.
    ValidUnversioned,
    /// Fingerprint present and matching current content.
    ValidVersioned,
    /// Fingerprint present but stale; must not be cached long term.
    InvalidVersion,
    /// Host is not the locked domain expected for the gadget.
    InvalidDomain,
}

impl UriStatus {
    /// Returns true for either of the valid states.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::ValidUnversioned | Self::ValidVersioned)
    }

    /// Returns the wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BadUri => "BAD_URI",
            Self::ValidUnversioned => "VALID_UNVERSIONED",
            Self::ValidVersioned => "VALID_VERSIONED",
            Self::InvalidVersion => "INVALID_VERSION",
            Self::InvalidDomain => "INVALID_DOMAIN",
        }
    }
}

impl fmt::Display for UriStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
