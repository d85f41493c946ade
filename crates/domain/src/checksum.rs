use std::fmt::{Display, Formatter};

use sha2::{Digest, Sha256};

use crate::policy::Privilege;

/// Order-independent fingerprint over a group's declared privileges.
///
/// Each privilege hashes to a 32-bit value (truncated SHA-256 of its
/// canonical form); the fingerprint is the XOR of all per-privilege hashes,
/// so it is invariant under reordering and sensitive to any single change.
/// Embedded as a `#xxxxxxxx` suffix in the directory group description to
/// detect drift without re-reading every binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Checksum(u32);

/// Separator between free text and the checksum tag in a description.
const TAG_MARKER: &str = " #";

impl Checksum {
    /// Sentinel for a missing or unparseable provisioned-state marker.
    /// Forces reconciliation on the next membership event.
    pub const ZERO: Checksum = Checksum(0);

    /// Computes the fingerprint of a privilege set.
    #[must_use]
    pub fn of(privileges: &[Privilege]) -> Self {
        let combined = privileges
            .iter()
            .map(hash_privilege)
            .fold(0u32, |acc, hash| acc ^ hash);
        Self(combined)
    }

    /// Parses the tagged suffix of a directory group description.
    ///
    /// Returns [`Checksum::ZERO`] when the tag is absent or unparseable.
    #[must_use]
    pub fn from_description(description: &str) -> Self {
        let Some(index) = description.rfind(TAG_MARKER) else {
            return Self::ZERO;
        };

        let tag = &description[index + TAG_MARKER.len()..];
        if tag.len() != 8 {
            return Self::ZERO;
        }

        u32::from_str_radix(tag, 16).map(Self).unwrap_or(Self::ZERO)
    }

    /// Rewrites a description with this checksum as its tagged suffix,
    /// replacing any existing tag.
    #[must_use]
    pub fn tag_description(&self, description: &str) -> String {
        let free_text = match description.rfind(TAG_MARKER) {
            Some(index) if Self::from_description(description) != Self::ZERO => {
                &description[..index]
            }
            _ => description,
        };

        format!("{}{}{}", free_text.trim_end(), TAG_MARKER, self)
    }
}

impl Display for Checksum {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:08x}", self.0)
    }
}

fn hash_privilege(privilege: &Privilege) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(privilege.canonical().as_bytes());
    let digest = hasher.finalize();

    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]])
}
