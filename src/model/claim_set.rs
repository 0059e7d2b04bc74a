//! The sibling claims sharing one conflict domain.

use std::collections::BTreeMap;

use super::{ClaimId, GcClaim};

/// Errors that can occur when building a claim set.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClaimSetError {
    #[error("duplicate claim name: {0}")]
    DuplicateClaim(ClaimId),
}

/// A read-only snapshot of the claims in one conflict domain.
///
/// Membership is decided by whoever builds the set (parent resource, cluster).
/// Keyed by name, so two claims with the same identity cannot coexist.
/// Iteration is in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimSet {
    claims: BTreeMap<ClaimId, GcClaim>,
}

impl ClaimSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a set from claims, rejecting duplicate names.
    pub fn from_claims(claims: impl IntoIterator<Item = GcClaim>) -> Result<Self, ClaimSetError> {
        let mut set = Self::new();
        for claim in claims {
            set.insert(claim)?;
        }
        Ok(set)
    }

    /// Adds a claim that is not yet a member.
    pub fn insert(&mut self, claim: GcClaim) -> Result<(), ClaimSetError> {
        if self.claims.contains_key(&claim.name) {
            return Err(ClaimSetError::DuplicateClaim(claim.name));
        }
        self.claims.insert(claim.name.clone(), claim);
        Ok(())
    }

    pub fn get(&self, name: &ClaimId) -> Option<&GcClaim> {
        self.claims.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &GcClaim> {
        self.claims.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &ClaimId> {
        self.claims.keys()
    }

    /// Every member except the one named, i.e. the candidate's siblings.
    pub fn others<'a>(&'a self, name: &'a ClaimId) -> impl Iterator<Item = &'a GcClaim> {
        self.claims.values().filter(move |c| &c.name != name)
    }

    pub fn len(&self) -> usize {
        self.claims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.claims.is_empty()
    }
}

impl<'a> IntoIterator for &'a ClaimSet {
    type Item = &'a GcClaim;
    type IntoIter = std::collections::btree_map::Values<'a, ClaimId, GcClaim>;

    fn into_iter(self) -> Self::IntoIter {
        self.claims.values()
    }
}
