//! Job requests: what the job-generation side needs to (re)create the
//! scheduled garbage-collection job of an active claim.
//!
//! The container runs the maintenance tool as
//!
//! ```text
//! -d <git-dir> projects [--project <id>]... [--skip <id>]... gc [-c <option>]... [<arg>]...
//! ```

use std::collections::BTreeSet;

use serde::Serialize;

use crate::git_options::{self, ConfigurationError, GitOption};
use crate::model::{ClaimId, GcClaim, RepositoryId};

/// Where the repositories are mounted inside the job container.
pub const DEFAULT_GIT_DIR: &str = "/var/gerrit/git";

/// Everything needed to render one scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GcJobRequest {
    pub name: ClaimId,
    pub schedule: String,
    /// Empty for a wildcard claim.
    pub include: BTreeSet<RepositoryId>,
    pub exclude: BTreeSet<RepositoryId>,
    pub args: Vec<String>,
}

impl GcJobRequest {
    /// Builds the request for `claim`, whose status must already carry its
    /// effective exclusions.
    ///
    /// Fails only if the claim's git options do not parse.
    pub fn for_claim(claim: &GcClaim, git_dir: &str) -> Result<Self, ConfigurationError> {
        let options = parse_git_options(claim)?;
        Ok(Self::new(claim, &options, git_dir))
    }

    /// Builds the request from already parsed git options.
    pub fn new(claim: &GcClaim, options: &[GitOption], git_dir: &str) -> Self {
        let include = claim.scope.explicit().cloned().unwrap_or_default();
        let exclude = claim.status.effective_exclusions.clone();
        let args = render_args(git_dir, &include, &exclude, options, &claim.flags.args);

        Self {
            name: claim.name.clone(),
            schedule: claim.schedule.clone(),
            include,
            exclude,
            args,
        }
    }
}

/// Parses the claim's git options; none or blank text yields no options.
pub fn parse_git_options(claim: &GcClaim) -> Result<Vec<GitOption>, ConfigurationError> {
    match &claim.flags.git_options {
        Some(text) if !text.trim().is_empty() => git_options::parse(text),
        _ => Ok(Vec::new()),
    }
}

fn render_args(
    git_dir: &str,
    include: &BTreeSet<RepositoryId>,
    exclude: &BTreeSet<RepositoryId>,
    options: &[GitOption],
    extra: &[String],
) -> Vec<String> {
    let mut args = vec!["-d".to_string(), git_dir.to_string(), "projects".to_string()];
    for project in include {
        args.push("--project".to_string());
        args.push(project.to_string());
    }
    for project in exclude {
        args.push("--skip".to_string());
        args.push(project.to_string());
    }
    args.push("gc".to_string());
    for option in options {
        args.push("-c".to_string());
        args.push(option.to_string());
    }
    args.extend(extra.iter().cloned());
    args
}
