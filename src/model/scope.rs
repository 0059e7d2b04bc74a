//! Repository identities and claim scopes.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One Git repository ("project") within a cluster.
///
/// Opaque and case-sensitive: `All-Projects` and `all-projects` are different repositories.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(String);

impl RepositoryId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RepositoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RepositoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The name of a claim, unique within its claim set.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClaimId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which repositories a claim asks to own.
///
/// Serialized as the plain include list: an empty list is the wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeSet<RepositoryId>", into = "BTreeSet<RepositoryId>")]
pub enum ClaimScope {
    /// Everything not explicitly claimed by someone else.
    AllRepositories,

    /// Explicitly owned repositories. An empty set is the wildcard.
    Explicit(BTreeSet<RepositoryId>),
}

impl ClaimScope {
    /// Builds a scope from an include set. No include set means the wildcard.
    pub fn from_include<I, R>(include: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RepositoryId>,
    {
        let repositories: BTreeSet<RepositoryId> = include.into_iter().map(Into::into).collect();
        if repositories.is_empty() {
            Self::AllRepositories
        } else {
            Self::Explicit(repositories)
        }
    }

    /// The explicitly owned set, or `None` for the wildcard.
    ///
    /// `Explicit` with an empty set is the wildcard too.
    pub fn explicit(&self) -> Option<&BTreeSet<RepositoryId>> {
        match self {
            Self::Explicit(repositories) if !repositories.is_empty() => Some(repositories),
            Self::Explicit(_) | Self::AllRepositories => None,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.explicit().is_none()
    }

    /// The explicitly owned repositories; empty for the wildcard.
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryId> {
        self.explicit().into_iter().flatten()
    }
}

impl From<BTreeSet<RepositoryId>> for ClaimScope {
    fn from(include: BTreeSet<RepositoryId>) -> Self {
        Self::from_include(include)
    }
}

impl From<ClaimScope> for BTreeSet<RepositoryId> {
    fn from(scope: ClaimScope) -> Self {
        match scope {
            ClaimScope::AllRepositories => BTreeSet::new(),
            ClaimScope::Explicit(repositories) => repositories,
        }
    }
}

impl fmt::Display for ClaimScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.explicit() {
            None => f.write_str("*"),
            Some(repositories) => {
                let names: Vec<&str> = repositories.iter().map(RepositoryId::as_str).collect();
                f.write_str(&names.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_include_is_wildcard() {
        let scope = ClaimScope::from_include(Vec::<&str>::new());
        assert_eq!(scope, ClaimScope::AllRepositories);
    }

    #[test]
    fn empty_explicit_set_is_wildcard() {
        let scope = ClaimScope::Explicit(BTreeSet::new());
        assert!(scope.is_wildcard());
        assert_eq!(scope.explicit(), None);
        assert_eq!(scope.repositories().count(), 0);
        assert_eq!(scope.to_string(), "*");
    }

    #[test]
    fn include_builds_explicit_scope() {
        let scope = ClaimScope::from_include(["b", "a", "a"]);
        let repositories: Vec<&str> = scope.repositories().map(RepositoryId::as_str).collect();
        assert_eq!(repositories, ["a", "b"]);
        assert!(!scope.is_wildcard());
    }

    #[test]
    fn repository_ids_are_case_sensitive() {
        let scope = ClaimScope::from_include(["All-Projects", "all-projects"]);
        assert_eq!(scope.repositories().count(), 2);
    }

    #[test]
    fn serializes_as_include_list() {
        let scope = ClaimScope::from_include(["x"]);
        assert_eq!(serde_json::to_string(&scope).unwrap(), r#"["x"]"#);

        let wildcard: ClaimScope = serde_json::from_str("[]").unwrap();
        assert!(wildcard.is_wildcard());
    }
}
