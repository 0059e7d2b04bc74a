//! Claim types: one schedulable garbage-collection unit and its derived status.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ClaimId, ClaimScope, RepositoryId};

/// A request by one scheduled job to own garbage collection over a scope.
///
/// `scope`, `exclude`, `schedule` and `flags` are authored.
/// `status` is derived and recomputed on every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcClaim {
    pub name: ClaimId,
    pub scope: ClaimScope,

    /// Author-supplied repositories to skip, merged into the computed exclusions.
    #[serde(default)]
    pub exclude: BTreeSet<RepositoryId>,

    /// Cron expression, passed through to the scheduled job untouched.
    pub schedule: String,

    #[serde(default)]
    pub flags: ExecutionFlags,

    #[serde(default)]
    pub status: ClaimStatus,
}

impl GcClaim {
    /// A freshly created claim: `Pending`, no derived exclusions.
    pub fn new(name: impl Into<String>, scope: ClaimScope, schedule: impl Into<String>) -> Self {
        Self {
            name: ClaimId::new(name),
            scope,
            exclude: BTreeSet::new(),
            schedule: schedule.into(),
            flags: ExecutionFlags::default(),
            status: ClaimStatus::default(),
        }
    }

    pub fn state(&self) -> ClaimState {
        self.status.state
    }

    pub fn is_wildcard(&self) -> bool {
        self.scope.is_wildcard()
    }
}

/// Execution flags handed to the job. Opaque to arbitration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionFlags {
    /// Git configuration text applied to the `git gc` run via `-c` options.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_options: Option<String>,

    /// Extra arguments appended after the `gc` subcommand.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
}

/// Derived status, written back onto the owning resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimStatus {
    pub state: ClaimState,

    /// Only ever non-empty for an active wildcard claim.
    #[serde(default)]
    pub effective_exclusions: BTreeSet<RepositoryId>,

    /// Conflict or configuration error, for observability.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Where a claim stands after its latest arbitration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClaimState {
    /// Created, not yet arbitrated.
    #[default]
    Pending,

    /// Recognized owner of its scope; job generation proceeds.
    Active,

    /// Overlaps an active sibling; job generation is suppressed.
    Conflicted,

    /// Failed for a reason unrelated to ownership, e.g. malformed git options.
    Errored,
}

impl ClaimState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Active => "active",
            Self::Conflicted => "conflicted",
            Self::Errored => "errored",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            "conflicted" => Some(Self::Conflicted),
            "errored" => Some(Self::Errored),
            _ => None,
        }
    }
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
