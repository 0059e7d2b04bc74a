//! Admission-time arbitration: any conflict refuses the create or update.
//!
//! Used where the whole conflict domain is known up front, e.g. the
//! garbage-collection tasks declared inside one parent resource.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::arbiter::{detect_conflict, join};
use crate::git_options::ConfigurationError;
use crate::job::parse_git_options;
use crate::model::{ClaimId, ClaimSet, ClaimSetError, ConflictReport, GcClaim, RepositoryId};

/// Ownership overlap found at admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("Only a single wildcard claim is allowed")]
    MultipleWildcards { claims: BTreeSet<ClaimId> },

    #[error(
        "Conflict for repositories: {{{}}}",
        join(.repositories.iter().map(RepositoryId::as_str))
    )]
    OverlappingRepositories {
        repositories: BTreeSet<RepositoryId>,
        claims: BTreeSet<ClaimId>,
    },

    #[error("Duplicate claim name: {0}")]
    DuplicateClaim(ClaimId),
}

/// Why a claim was refused at admission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RejectionError {
    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl From<ClaimSetError> for RejectionError {
    fn from(err: ClaimSetError) -> Self {
        match err {
            ClaimSetError::DuplicateClaim(name) => ConflictError::DuplicateClaim(name).into(),
        }
    }
}

/// Checks `candidate` against its siblings, refusing any conflict.
///
/// Conflicts are checked before the git options, so a claim that is both
/// conflicting and malformed is reported as conflicting.
pub fn validate<'a>(
    candidate: &GcClaim,
    siblings: impl IntoIterator<Item = &'a GcClaim>,
) -> Result<(), RejectionError> {
    match detect_conflict(candidate, siblings) {
        ConflictReport::NoConflict => {}
        ConflictReport::Conflict {
            overlapping_repositories,
            conflicting_claims,
        } => {
            debug!(claim = %candidate.name, "rejecting conflicting claim");
            let err = if candidate.is_wildcard() {
                ConflictError::MultipleWildcards {
                    claims: conflicting_claims,
                }
            } else {
                ConflictError::OverlappingRepositories {
                    repositories: overlapping_repositories,
                    claims: conflicting_claims,
                }
            };
            return Err(err.into());
        }
    }

    check_git_options(candidate)?;
    Ok(())
}

/// Checks a closed list of claims, e.g. all tasks of one parent resource.
///
/// Reports every repository claimed more than once across the list, not just
/// the first pair found.
pub fn validate_all(claims: impl IntoIterator<Item = GcClaim>) -> Result<ClaimSet, RejectionError> {
    let set = ClaimSet::from_claims(claims)?;

    let wildcards: BTreeSet<ClaimId> = set
        .iter()
        .filter(|c| c.is_wildcard())
        .map(|c| c.name.clone())
        .collect();
    if wildcards.len() > 1 {
        return Err(ConflictError::MultipleWildcards { claims: wildcards }.into());
    }

    let mut owners: BTreeMap<&RepositoryId, BTreeSet<ClaimId>> = BTreeMap::new();
    for claim in &set {
        for repository in claim.scope.repositories() {
            owners.entry(repository).or_default().insert(claim.name.clone());
        }
    }
    let mut repositories = BTreeSet::new();
    let mut claims = BTreeSet::new();
    for (repository, owned_by) in owners {
        if owned_by.len() > 1 {
            repositories.insert(repository.clone());
            claims.extend(owned_by);
        }
    }
    if !repositories.is_empty() {
        return Err(ConflictError::OverlappingRepositories {
            repositories,
            claims,
        }
        .into());
    }

    for claim in &set {
        check_git_options(claim)?;
    }
    Ok(set)
}

fn check_git_options(claim: &GcClaim) -> Result<(), ConfigurationError> {
    parse_git_options(claim).map(drop)
}
