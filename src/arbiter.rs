//! Conflict detection and the self-healing tie-break.
//!
//! Both entry points, the strict admission validator and the reconciler,
//! share [`detect_conflict`]. They differ only in what they do with a conflict.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{ClaimId, ClaimState, ConflictReport, GcClaim, RepositoryId};

/// Decides whether `candidate`'s scope is contested by any of `siblings`.
///
/// The candidate itself is skipped if it appears among the siblings.
///
/// - Two wildcard claims always conflict. The overlap is unbounded, so the
///   report names the claims and leaves `overlapping_repositories` empty.
/// - Two explicit claims conflict on the intersection of their scopes.
/// - A wildcard never conflicts with an explicit claim; the wildcard excludes
///   what the explicit claim owns instead (see [`crate::exclusion`]).
pub fn detect_conflict<'a>(
    candidate: &GcClaim,
    siblings: impl IntoIterator<Item = &'a GcClaim>,
) -> ConflictReport {
    let siblings = siblings.into_iter().filter(|s| s.name != candidate.name);

    let mut overlapping_repositories = BTreeSet::new();
    let mut conflicting_claims = BTreeSet::new();

    match candidate.scope.explicit() {
        None => {
            conflicting_claims.extend(
                siblings
                    .filter(|s| s.scope.is_wildcard())
                    .map(|s| s.name.clone()),
            );
        }
        Some(owned) => {
            for sibling in siblings {
                let Some(theirs) = sibling.scope.explicit() else {
                    continue;
                };
                let overlap: Vec<&RepositoryId> = owned.intersection(theirs).collect();
                if overlap.is_empty() {
                    continue;
                }
                debug!(
                    candidate = %candidate.name,
                    sibling = %sibling.name,
                    overlap = overlap.len(),
                    "explicit scopes overlap"
                );
                overlapping_repositories.extend(overlap.into_iter().cloned());
                conflicting_claims.insert(sibling.name.clone());
            }
        }
    }

    if conflicting_claims.is_empty() {
        ConflictReport::NoConflict
    } else {
        ConflictReport::Conflict {
            overlapping_repositories,
            conflicting_claims,
        }
    }
}

/// Resolves the state a candidate takes given its conflict report.
///
/// A conflicted candidate still becomes active when none of the claims it
/// conflicts with is currently active. This is how ownership moves on after
/// the active owner is deleted: the first remaining sibling to reconcile
/// promotes itself, and the later ones see an active neighbour and stay put.
///
/// Only `Active` blocks. `Conflicted`, `Pending` and `Errored` siblings are
/// not owners: a `Pending` sibling that was never arbitrated does not own its
/// scope yet, so a candidate whose conflicting siblings are all `Conflicted`,
/// `Pending` or `Errored` becomes active. Conflicting claims missing from
/// `siblings` are treated as gone.
///
/// Two siblings reconciling against stale snapshots can both promote
/// themselves; the next pass, seeing the other as active, demotes one of them.
pub fn resolve_state<'a>(
    report: &ConflictReport,
    siblings: impl IntoIterator<Item = &'a GcClaim>,
) -> ClaimState {
    let ConflictReport::Conflict {
        conflicting_claims, ..
    } = report
    else {
        return ClaimState::Active;
    };

    let blocked = siblings
        .into_iter()
        .filter(|s| conflicting_claims.contains(&s.name))
        .any(|s| s.state() == ClaimState::Active);

    if blocked {
        ClaimState::Conflicted
    } else {
        ClaimState::Active
    }
}

/// Human-readable description of a conflict, used for status messages.
pub fn describe_conflict(
    candidate: &GcClaim,
    overlapping_repositories: &BTreeSet<RepositoryId>,
    conflicting_claims: &BTreeSet<ClaimId>,
) -> String {
    let claims = join(conflicting_claims.iter().map(ClaimId::as_str));
    if candidate.is_wildcard() {
        format!("Only a single wildcard claim is allowed; also claiming all repositories: {claims}")
    } else {
        format!(
            "Conflict for repositories: {{{}}} (claimed by {claims})",
            join(overlapping_repositories.iter().map(RepositoryId::as_str))
        )
    }
}

pub(crate) fn join<'a>(items: impl Iterator<Item = &'a str>) -> String {
    items.collect::<Vec<_>>().join(", ")
}
