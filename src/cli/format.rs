//! Output formatting for CLI display.

use crate::job::GcJobRequest;
use crate::model::{ClaimState, GcClaim, RepositoryId};
use crate::reconciler::{JobAction, Reconciliation};
use crate::storage::StoredClaim;

/// One line per claim: name, state, scope, and what the state implies.
pub(super) fn format_claim(stored: &StoredClaim) -> String {
    let claim = &stored.claim;
    let mut line = format!(
        "{}  [{}]  {}  ({})",
        claim.name,
        claim.state(),
        claim.scope,
        claim.schedule
    );
    if let Some(detail) = status_detail(claim) {
        line.push_str("  ");
        line.push_str(&detail);
    }
    line
}

pub(super) fn format_reconciliation(outcome: &Reconciliation) -> String {
    let claim = &outcome.claim;
    let job = match outcome.job {
        JobAction::Apply(_) => "job applied",
        JobAction::LeaveUntouched => "job untouched",
    };
    let mut line = format!("{}  [{}]  {job}", claim.name, claim.state());
    if let Some(detail) = status_detail(claim) {
        line.push_str("  ");
        line.push_str(&detail);
    }
    line
}

/// Name, schedule, and the argument vector as a shell would read it.
pub(super) fn format_job(job: &GcJobRequest) -> String {
    let args: Vec<String> = job.args.iter().map(|a| shell_quote(a)).collect();
    format!("{}  ({})  {}", job.name, job.schedule, args.join(" "))
}

fn status_detail(claim: &GcClaim) -> Option<String> {
    match claim.state() {
        ClaimState::Active if !claim.status.effective_exclusions.is_empty() => {
            let skipped: Vec<&str> = claim
                .status
                .effective_exclusions
                .iter()
                .map(RepositoryId::as_str)
                .collect();
            Some(format!("skips: {}", skipped.join(", ")))
        }
        ClaimState::Conflicted | ClaimState::Errored => claim.status.message.clone(),
        ClaimState::Pending | ClaimState::Active => None,
    }
}

fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@+".contains(c));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use jiff::Timestamp;
    use uuid::Uuid;

    use crate::model::{ClaimScope, ClaimStatus};

    fn stored(claim: GcClaim) -> StoredClaim {
        StoredClaim {
            uid: Uuid::nil(),
            claim,
            created_at: Timestamp::UNIX_EPOCH,
            reconciled_at: None,
        }
    }

    #[test]
    fn pending_claim() {
        let claim = GcClaim::new("sel", ClaimScope::from_include(["a", "b"]), "0 6 * * *");
        assert_eq!(format_claim(&stored(claim)), "sel  [pending]  a, b  (0 6 * * *)");
    }

    #[test]
    fn active_wildcard_shows_skips() {
        let mut claim = GcClaim::new("all", ClaimScope::AllRepositories, "0 1 * * *");
        claim.status = ClaimStatus {
            state: ClaimState::Active,
            effective_exclusions: ["b", "a"].into_iter().map(RepositoryId::from).collect(),
            message: None,
        };
        assert_eq!(
            format_claim(&stored(claim)),
            "all  [active]  *  (0 1 * * *)  skips: a, b"
        );
    }

    #[test]
    fn conflicted_claim_shows_message() {
        let mut claim = GcClaim::new("e2", ClaimScope::from_include(["p2"]), "0 1 * * *");
        claim.status = ClaimStatus {
            state: ClaimState::Conflicted,
            effective_exclusions: Default::default(),
            message: Some("Conflict for repositories: {p2} (claimed by e1)".into()),
        };
        let outcome = Reconciliation {
            claim,
            report: None,
            job: JobAction::LeaveUntouched,
        };
        assert_eq!(
            format_reconciliation(&outcome),
            "e2  [conflicted]  job untouched  Conflict for repositories: {p2} (claimed by e1)"
        );
    }

    #[test]
    fn job_args_are_quoted() {
        let job = GcJobRequest {
            name: "sel".into(),
            schedule: "0 6 * * *".into(),
            include: Default::default(),
            exclude: Default::default(),
            args: vec![
                "-d".into(),
                "/var/gerrit/git".into(),
                "gc".into(),
                "-c".into(),
                "core.editor=vim -n".into(),
                "it's".into(),
            ],
        };
        assert_eq!(
            format_job(&job),
            r"sel  (0 6 * * *)  -d /var/gerrit/git gc -c 'core.editor=vim -n' 'it'\''s'"
        );
    }
}
