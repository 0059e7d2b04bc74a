//! Core data model for garbage-collection claims.
//!
//! These types describe who owns garbage collection for which repositories:
//! claims, their scopes and derived status, the claim sets they are
//! arbitrated within, and the reports arbitration produces.

mod claim;
mod claim_set;
mod manifest;
mod report;
mod scope;

pub use claim::{ClaimState, ClaimStatus, ExecutionFlags, GcClaim};
pub use claim_set::{ClaimSet, ClaimSetError};
pub use manifest::{BulkManifest, ClaimManifest, ManifestError};
pub use report::ConflictReport;
pub use scope::{ClaimId, ClaimScope, RepositoryId};
