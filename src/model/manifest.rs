//! Claim manifests: the authored TOML form of a claim.
//!
//! A single claim:
//!
//! ```toml
//! name = "gc-selected"
//! schedule = "0 6 * * *"
//! include = ["All-Projects", "test"]
//! git-options = """
//! [pack]
//!   threads = 4
//! """
//! ```
//!
//! A bulk manifest lists the closed set of tasks of one parent resource
//! under `[[gc]]`.

use std::collections::BTreeSet;

use serde::Deserialize;

use super::{ClaimScope, ClaimStatus, ExecutionFlags, GcClaim, RepositoryId};

/// Errors that can occur while reading a manifest.
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid manifest: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("claim name is empty")]
    EmptyName,

    #[error("claim {0} has an empty schedule")]
    EmptySchedule(String),
}

/// One authored claim. Missing or empty `include` means all repositories.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct ClaimManifest {
    pub name: String,
    pub schedule: String,
    #[serde(default)]
    pub include: BTreeSet<RepositoryId>,
    #[serde(default)]
    pub exclude: BTreeSet<RepositoryId>,
    pub git_options: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

impl ClaimManifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(text)?;
        manifest.check()?;
        Ok(manifest)
    }

    fn check(&self) -> Result<(), ManifestError> {
        if self.name.trim().is_empty() {
            return Err(ManifestError::EmptyName);
        }
        if self.schedule.trim().is_empty() {
            return Err(ManifestError::EmptySchedule(self.name.clone()));
        }
        Ok(())
    }

    /// Converts into a claim with a fresh `Pending` status.
    pub fn into_claim(self) -> GcClaim {
        let scope = ClaimScope::from_include(self.include);
        let mut claim = GcClaim::new(self.name, scope, self.schedule);
        claim.exclude = self.exclude;
        claim.flags = ExecutionFlags {
            git_options: self.git_options,
            args: self.args,
        };
        claim.status = ClaimStatus::default();
        claim
    }
}

/// The closed list of garbage-collection tasks declared by one parent resource.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkManifest {
    #[serde(default)]
    pub gc: Vec<ClaimManifest>,
}

impl BulkManifest {
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let manifest: Self = toml::from_str(text)?;
        for task in &manifest.gc {
            task.check()?;
        }
        Ok(manifest)
    }

    pub fn into_claims(self) -> Vec<GcClaim> {
        self.gc.into_iter().map(ClaimManifest::into_claim).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_selective_claim() {
        let manifest = ClaimManifest::parse(
            r#"
            name = "gc-selected"
            schedule = "0 6 * * *"
            include = ["All-Projects", "test"]
            exclude = ["test/archive"]
            args = ["--skip-bitmap-index"]
            git-options = """
            [pack]
              threads = 4
            """
            "#,
        )
        .unwrap();

        let claim = manifest.into_claim();
        assert_eq!(claim.name.as_str(), "gc-selected");
        assert_eq!(claim.scope, ClaimScope::from_include(["All-Projects", "test"]));
        assert!(claim.exclude.contains(&RepositoryId::from("test/archive")));
        assert_eq!(claim.flags.args, ["--skip-bitmap-index"]);
        assert!(claim.flags.git_options.unwrap().contains("threads = 4"));
    }

    #[test]
    fn missing_include_is_wildcard() {
        let manifest = ClaimManifest::parse("name = \"gc-all\"\nschedule = \"0 1 * * *\"").unwrap();
        assert!(manifest.into_claim().is_wildcard());
    }

    #[test]
    fn empty_include_is_wildcard() {
        let manifest =
            ClaimManifest::parse("name = \"gc-all\"\nschedule = \"0 1 * * *\"\ninclude = []")
                .unwrap();
        assert!(manifest.into_claim().is_wildcard());
    }

    #[test]
    fn rejects_empty_name() {
        let err = ClaimManifest::parse("name = \" \"\nschedule = \"0 1 * * *\"").unwrap_err();
        assert!(matches!(err, ManifestError::EmptyName));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = ClaimManifest::parse("name = \"a\"\nschedule = \"x\"\nprojects = [\"p\"]")
            .unwrap_err();
        assert!(matches!(err, ManifestError::Toml(_)));
    }

    #[test]
    fn parses_bulk_manifest() {
        let manifest = BulkManifest::parse(
            r#"
            [[gc]]
            name = "all"
            schedule = "0 1 * * *"

            [[gc]]
            name = "selected"
            schedule = "0 2 * * *"
            include = ["p1"]
            "#,
        )
        .unwrap();

        let claims = manifest.into_claims();
        assert_eq!(claims.len(), 2);
        assert!(claims[0].is_wildcard());
        assert!(!claims[1].is_wildcard());
    }

    #[test]
    fn bulk_manifest_checks_each_task() {
        let err = BulkManifest::parse("[[gc]]\nname = \"a\"\nschedule = \"\"").unwrap_err();
        assert!(matches!(err, ManifestError::EmptySchedule(name) if name == "a"));
    }
}
