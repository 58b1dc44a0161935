//! Named verification profiles.
//!
//! A [`SecurityPolicy`] is a level plus the table of checks that level
//! requires. Verification code asks the policy whether a check is required
//! instead of matching on the level, so the table below is the only place
//! the levels differ.
//!
//! | Level  | Verify present signatures | Signed metadata | All entries signed | Trusted signer |
//! |--------|---------------------------|-----------------|--------------------|----------------|
//! | none   |                           |                 |                    |                |
//! | low    | yes                       |                 |                    |                |
//! | medium | yes                       | yes             |                    | yes            |
//! | high   | yes                       | yes             | yes                | yes            |

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// A single verification requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Check {
    /// Signatures that are present must match their digests and the chain
    /// must be well formed.
    VerifySignatures,
    /// The package must carry a certificate chain and `metadata.gz` must be
    /// signed.
    RequireSignedMetadata,
    /// Every digested entry must be signed.
    RequireAllSigned,
    /// The chain root must be in the trust store.
    RequireTrustedSigner,
}

/// Ordered trust levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum SecurityPolicy {
    /// No verification at all.
    #[default]
    None,
    /// Verify signatures when present; unsigned packages are accepted.
    Low,
    /// Signed metadata from a trusted signer is required.
    Medium,
    /// Every entry must be signed by a trusted signer.
    High,
}

impl SecurityPolicy {
    /// All levels, weakest first.
    pub const ALL: [Self; 4] = [Self::None, Self::Low, Self::Medium, Self::High];

    /// Display name used in user-facing messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "No Security",
            Self::Low => "Low Security",
            Self::Medium => "Medium Security",
            Self::High => "High Security",
        }
    }

    /// Short identifier accepted by [`FromStr`].
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// The checks this level requires.
    #[must_use]
    pub fn required_checks(self) -> BTreeSet<Check> {
        let checks: &[Check] = match self {
            Self::None => &[],
            Self::Low => &[Check::VerifySignatures],
            Self::Medium => &[
                Check::VerifySignatures,
                Check::RequireSignedMetadata,
                Check::RequireTrustedSigner,
            ],
            Self::High => &[
                Check::VerifySignatures,
                Check::RequireSignedMetadata,
                Check::RequireAllSigned,
                Check::RequireTrustedSigner,
            ],
        };
        checks.iter().copied().collect()
    }

    /// Returns `true` if this level requires `check`.
    #[must_use]
    pub fn requires(self, check: Check) -> bool {
        self.required_checks().contains(&check)
    }

    /// Returns `true` if any verification is performed at this level.
    #[must_use]
    pub fn is_active(self) -> bool {
        !self.required_checks().is_empty()
    }
}

impl fmt::Display for SecurityPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when parsing an unknown policy identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown security policy: {0} (expected none, low, medium, or high)")]
pub struct ParsePolicyError(String);

impl FromStr for SecurityPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParsePolicyError(s.to_string()))
    }
}
