//! Exclusion sets for wildcard claims.
//!
//! The wildcard job walks every repository on disk. Anything another claim
//! explicitly owns is passed to it as `--skip`, so two jobs never collect the
//! same repository at the same time.

use std::collections::BTreeSet;

use crate::model::{GcClaim, RepositoryId};

/// Repositories the wildcard `candidate` must skip.
///
/// The candidate's own `exclude` plus every repository explicitly claimed by a
/// sibling, whatever that sibling's state. Wildcard siblings contribute nothing.
/// Empty for explicit candidates.
pub fn compute_exclusions<'a>(
    candidate: &GcClaim,
    siblings: impl IntoIterator<Item = &'a GcClaim>,
) -> BTreeSet<RepositoryId> {
    if !candidate.is_wildcard() {
        return BTreeSet::new();
    }

    let mut excluded = candidate.exclude.clone();
    for sibling in siblings.into_iter().filter(|s| s.name != candidate.name) {
        excluded.extend(sibling.scope.repositories().cloned());
    }
    excluded
}
