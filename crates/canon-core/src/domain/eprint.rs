//! E-prints: identifier plus ordered versions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identifier::{Identifier, VersionedIdentifier};
use super::version::Version;

/// A scholarly submission: one or more sequential versions under a single
/// arXiv identifier.
///
/// An e-print is never deleted; withdrawals produce a new [`Version`]
/// marked `is_withdrawn`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EPrint {
    pub identifier: Identifier,
    /// Versions by version number, in order.
    pub versions: BTreeMap<u32, Version>,
}

impl EPrint {
    pub fn new(identifier: Identifier) -> Self {
        EPrint {
            identifier,
            versions: BTreeMap::new(),
        }
    }

    /// The highest version number present.
    pub fn latest_version_number(&self) -> Option<u32> {
        self.versions.keys().next_back().copied()
    }

    /// The most recent version.
    pub fn latest(&self) -> Option<&Version> {
        self.versions.values().next_back()
    }

    pub fn get(&self, identifier: &VersionedIdentifier) -> Option<&Version> {
        if identifier.arxiv_id != self.identifier {
            return None;
        }
        self.versions.get(&identifier.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_is_highest_version() {
        let eprint = EPrint::new("2901.00345".parse().unwrap());
        assert!(eprint.latest().is_none());
        assert!(eprint.latest_version_number().is_none());
    }
}
