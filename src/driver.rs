//! Domain reconciliation: drives the engine over every claim of a domain.
//!
//! Claims are reconciled one at a time in name order. Each reconciliation
//! reads a fresh snapshot, so it sees the statuses its predecessors just
//! wrote. After a full pass no two overlapping claims are both `Active`.
//!
//! Two drivers running against the same domain concurrently can still both
//! activate overlapping claims. The next pass over the domain resolves it.

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::model::{ClaimId, ClaimState};
use crate::reconciler::{ClaimReconciler, JobAction, Reconciliation};
use crate::storage::{self, Storage};

/// Reconciles every claim of `domain` and persists each derived status.
///
/// Returns the reconciliations in the order they were made.
pub fn reconcile_domain(
    storage: &Storage,
    reconciler: &ClaimReconciler,
    domain: &str,
) -> storage::Result<Vec<Reconciliation>> {
    let names: Vec<ClaimId> = storage.load_claim_set(domain)?.names().cloned().collect();
    debug!(domain, claims = names.len(), "reconciling domain");

    let mut outcomes = Vec::with_capacity(names.len());
    for name in names {
        let snapshot = storage.load_claim_set(domain)?;
        let Some(candidate) = snapshot.get(&name) else {
            debug!(domain, claim = %name, "claim disappeared during reconciliation");
            continue;
        };

        let previous = candidate.state();
        let outcome = reconciler.reconcile(candidate, &snapshot);
        storage.update_status(domain, &name, &outcome.claim.status, Timestamp::now())?;

        let state = outcome.claim.state();
        if state != previous {
            info!(domain, claim = %name, from = %previous, to = %state, "claim state changed");
        }
        match &outcome.job {
            JobAction::Apply(job) => {
                debug!(domain, claim = %name, args = ?job.args, "job desired");
            }
            JobAction::LeaveUntouched => match (state, &outcome.report) {
                (ClaimState::Conflicted, Some(report)) => {
                    let blocked_by: Vec<&str> =
                        report.conflicting_claims().map(ClaimId::as_str).collect();
                    warn!(
                        domain,
                        claim = %name,
                        ?blocked_by,
                        "claim conflicted, job left untouched"
                    );
                }
                (ClaimState::Errored, _) => {
                    warn!(
                        domain,
                        claim = %name,
                        error = outcome.claim.status.message.as_deref().unwrap_or_default(),
                        "claim errored, job left untouched"
                    );
                }
                _ => {}
            },
        }

        outcomes.push(outcome);
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use tempfile::TempDir;

    use crate::model::{ClaimScope, ClaimStatus, ExecutionFlags, GcClaim, RepositoryId};

    const DOMAIN: &str = "cluster";

    fn test_storage() -> (TempDir, Storage) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(dir.path().join("domains")).unwrap();
        (dir, storage)
    }

    fn explicit(name: &str, repos: &[&str]) -> GcClaim {
        GcClaim::new(name, ClaimScope::from_include(repos.iter().copied()), "0 1 * * *")
    }

    fn wildcard(name: &str) -> GcClaim {
        GcClaim::new(name, ClaimScope::AllRepositories, "0 2 * * *")
    }

    fn states(storage: &Storage) -> Vec<(String, ClaimState)> {
        storage
            .load_claims(DOMAIN)
            .unwrap()
            .into_iter()
            .map(|s| (s.claim.name.to_string(), s.claim.state()))
            .collect()
    }

    fn repos(items: &[&str]) -> BTreeSet<RepositoryId> {
        items.iter().copied().map(RepositoryId::from).collect()
    }

    #[test]
    fn empty_domain() {
        let (_dir, storage) = test_storage();
        let outcomes = reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();
        assert!(outcomes.is_empty());
    }

    #[test]
    fn first_claim_by_name_wins_overlap() {
        let (_dir, storage) = test_storage();
        storage.create_claim(DOMAIN, &explicit("e2", &["p2", "p3"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("e1", &["p1", "p2"])).unwrap();

        reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();

        assert_eq!(
            states(&storage),
            [
                ("e1".to_string(), ClaimState::Active),
                ("e2".to_string(), ClaimState::Conflicted),
            ]
        );
        let e2 = storage.load_claim(DOMAIN, &ClaimId::from("e2")).unwrap();
        assert_eq!(
            e2.claim.status.message.as_deref(),
            Some("Conflict for repositories: {p2} (claimed by e1)")
        );
        assert!(e2.reconciled_at.is_some());
    }

    #[test]
    fn wildcard_skips_every_explicit_repository() {
        let (_dir, storage) = test_storage();
        storage.create_claim(DOMAIN, &explicit("e1", &["p1", "p2"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("e2", &["p2", "p3"])).unwrap();
        let mut all = wildcard("w");
        all.exclude = repos(&["archive"]);
        storage.create_claim(DOMAIN, &all).unwrap();

        let outcomes = reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();

        let w = outcomes.iter().find(|o| o.claim.name.as_str() == "w").unwrap();
        assert_eq!(w.claim.state(), ClaimState::Active);
        assert_eq!(
            w.claim.status.effective_exclusions,
            repos(&["archive", "p1", "p2", "p3"])
        );
        let JobAction::Apply(job) = &w.job else {
            panic!("expected a job for the wildcard claim");
        };
        assert!(job.args.windows(2).any(|a| a == ["--skip", "p3"]));
    }

    #[test]
    fn second_wildcard_is_conflicted() {
        let (_dir, storage) = test_storage();
        storage.create_claim(DOMAIN, &wildcard("all-a")).unwrap();
        storage.create_claim(DOMAIN, &wildcard("all-b")).unwrap();

        reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();

        assert_eq!(
            states(&storage),
            [
                ("all-a".to_string(), ClaimState::Active),
                ("all-b".to_string(), ClaimState::Conflicted),
            ]
        );
    }

    #[test]
    fn ownership_moves_after_delete() {
        let (_dir, storage) = test_storage();
        let reconciler = ClaimReconciler::default();
        storage.create_claim(DOMAIN, &explicit("e1", &["p1"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("e2", &["p1"])).unwrap();
        reconcile_domain(&storage, &reconciler, DOMAIN).unwrap();

        storage.delete_claim(DOMAIN, &ClaimId::from("e1")).unwrap();
        reconcile_domain(&storage, &reconciler, DOMAIN).unwrap();

        assert_eq!(states(&storage), [("e2".to_string(), ClaimState::Active)]);
        let e2 = storage.load_claim(DOMAIN, &ClaimId::from("e2")).unwrap();
        assert_eq!(e2.claim.status.message, None);
    }

    #[test]
    fn double_active_is_resolved_by_a_pass() {
        let (_dir, storage) = test_storage();
        storage.create_claim(DOMAIN, &explicit("e1", &["p1"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("e2", &["p1"])).unwrap();
        for name in ["e1", "e2"] {
            let status = ClaimStatus {
                state: ClaimState::Active,
                ..Default::default()
            };
            storage
                .update_status(DOMAIN, &ClaimId::from(name), &status, Timestamp::now())
                .unwrap();
        }

        reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();

        let active = states(&storage)
            .into_iter()
            .filter(|(_, s)| *s == ClaimState::Active)
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn errored_claim_does_not_block_siblings() {
        let (_dir, storage) = test_storage();
        let mut broken = explicit("a-broken", &["p1"]);
        broken.flags = ExecutionFlags {
            git_options: Some("[gc\n".into()),
            args: Vec::new(),
        };
        storage.create_claim(DOMAIN, &broken).unwrap();
        storage.create_claim(DOMAIN, &explicit("b-ok", &["p1"])).unwrap();

        let outcomes = reconcile_domain(&storage, &ClaimReconciler::default(), DOMAIN).unwrap();

        assert_eq!(
            states(&storage),
            [
                ("a-broken".to_string(), ClaimState::Errored),
                ("b-ok".to_string(), ClaimState::Active),
            ]
        );
        assert_eq!(outcomes[0].job, JobAction::LeaveUntouched);
        assert!(outcomes[0].report.is_none());
    }

    #[test]
    fn repeated_passes_are_stable() {
        let (_dir, storage) = test_storage();
        let reconciler = ClaimReconciler::default();
        storage.create_claim(DOMAIN, &explicit("a", &["p1", "p2"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("b", &["p2", "p3"])).unwrap();
        storage.create_claim(DOMAIN, &explicit("c", &["p3"])).unwrap();
        storage.create_claim(DOMAIN, &wildcard("w")).unwrap();

        reconcile_domain(&storage, &reconciler, DOMAIN).unwrap();
        let first = storage.load_claim_set(DOMAIN).unwrap();
        reconcile_domain(&storage, &reconciler, DOMAIN).unwrap();
        let second = storage.load_claim_set(DOMAIN).unwrap();

        let first: Vec<_> = first.iter().map(|c| c.status.clone()).collect();
        let second: Vec<_> = second.iter().map(|c| c.status.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(
            states(&storage),
            [
                ("a".to_string(), ClaimState::Active),
                ("b".to_string(), ClaimState::Conflicted),
                ("c".to_string(), ClaimState::Active),
                ("w".to_string(), ClaimState::Active),
            ]
        );
    }
}
