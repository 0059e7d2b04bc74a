//! Reconcile-time arbitration.
//!
//! Claims here are independent resources created in any order by different
//! people, and the snapshot a reconciliation sees may be stale. Refusing at
//! admission is not an option, so a conflict becomes a recoverable
//! `Conflicted` status instead of an error, and the tie-break in
//! [`resolve_state`] lets ownership move on when the active owner goes away.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::arbiter::{describe_conflict, detect_conflict, resolve_state};
use crate::exclusion::compute_exclusions;
use crate::job::{self, DEFAULT_GIT_DIR, GcJobRequest};
use crate::model::{ClaimState, ClaimStatus, ConflictReport, GcClaim};

/// What the job-generation side should do after a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobAction {
    /// Create or update the scheduled job.
    Apply(GcJobRequest),

    /// Do not create or update the job. An existing job is left as it is,
    /// not deleted.
    LeaveUntouched,
}

/// The complete outcome of reconciling one claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// The candidate with its recomputed status.
    pub claim: GcClaim,

    /// `None` when arbitration was skipped because the claim is malformed.
    pub report: Option<ConflictReport>,

    pub job: JobAction,
}

/// Reconciles claims against snapshots of their siblings.
#[derive(Debug, Clone)]
pub struct ClaimReconciler {
    git_dir: String,
}

impl Default for ClaimReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_GIT_DIR)
    }
}

impl ClaimReconciler {
    pub fn new(git_dir: impl Into<String>) -> Self {
        Self {
            git_dir: git_dir.into(),
        }
    }

    /// Recomputes `candidate`'s status from scratch against `siblings`.
    ///
    /// Pure: neither the candidate nor the siblings are modified, and the
    /// same snapshot always yields the same result. The candidate's own
    /// previous state plays no part.
    pub fn reconcile<'a>(
        &self,
        candidate: &GcClaim,
        siblings: impl IntoIterator<Item = &'a GcClaim>,
    ) -> Reconciliation {
        let siblings: Vec<&GcClaim> = siblings
            .into_iter()
            .filter(|s| s.name != candidate.name)
            .collect();
        let mut claim = candidate.clone();

        let options = match job::parse_git_options(candidate) {
            Ok(options) => options,
            Err(e) => {
                debug!(claim = %candidate.name, error = %e, "claim has malformed git options");
                claim.status = ClaimStatus {
                    state: ClaimState::Errored,
                    effective_exclusions: BTreeSet::new(),
                    message: Some(e.to_string()),
                };
                return Reconciliation {
                    claim,
                    report: None,
                    job: JobAction::LeaveUntouched,
                };
            }
        };

        let report = detect_conflict(candidate, siblings.iter().copied());
        let state = resolve_state(&report, siblings.iter().copied());

        let message = match &report {
            ConflictReport::Conflict {
                overlapping_repositories,
                conflicting_claims,
            } if state == ClaimState::Conflicted => Some(describe_conflict(
                candidate,
                overlapping_repositories,
                conflicting_claims,
            )),
            _ => None,
        };
        if report.is_conflict() && state == ClaimState::Active {
            info!(claim = %candidate.name, "no conflicting claim is active, taking ownership");
        }

        let effective_exclusions = if state == ClaimState::Active {
            compute_exclusions(candidate, siblings.iter().copied())
        } else {
            BTreeSet::new()
        };

        claim.status = ClaimStatus {
            state,
            effective_exclusions,
            message,
        };

        let job = match state {
            ClaimState::Active => {
                JobAction::Apply(GcJobRequest::new(&claim, &options, &self.git_dir))
            }
            ClaimState::Pending | ClaimState::Conflicted | ClaimState::Errored => {
                JobAction::LeaveUntouched
            }
        };

        debug!(claim = %claim.name, state = %state, "reconciled claim");
        Reconciliation {
            claim,
            report: Some(report),
            job,
        }
    }
}
