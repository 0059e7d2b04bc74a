//! Conflict reports: the outcome of arbitration.

use std::collections::BTreeSet;

use super::{ClaimId, RepositoryId};

/// Whether a candidate's scope is contested by its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictReport {
    NoConflict,

    /// `overlapping_repositories` is empty for wildcard-against-wildcard conflicts,
    /// which are reported by claim identity only.
    Conflict {
        overlapping_repositories: BTreeSet<RepositoryId>,
        conflicting_claims: BTreeSet<ClaimId>,
    },
}

impl ConflictReport {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// The sibling claims involved; empty when there is no conflict.
    pub fn conflicting_claims(&self) -> impl Iterator<Item = &ClaimId> {
        let claims = match self {
            Self::NoConflict => None,
            Self::Conflict {
                conflicting_claims, ..
            } => Some(conflicting_claims),
        };
        claims.into_iter().flatten()
    }
}
