//! Claim storage: create, update, load, delete claims and write back status.

use std::collections::BTreeSet;

use jiff::Timestamp;
use rusqlite::{Connection, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::model::{
    ClaimId, ClaimScope, ClaimSet, ClaimState, ClaimStatus, ExecutionFlags, GcClaim, RepositoryId,
};

use super::{Result, Storage, StorageError};

/// A claim as persisted, with its resource metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredClaim {
    pub uid: Uuid,
    pub claim: GcClaim,
    pub created_at: Timestamp,
    pub reconciled_at: Option<Timestamp>,
}

/// Whether [`Storage::apply_claim`] created a new claim or updated one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
}

const COLUMNS: &str = "name, uid, include, exclude, schedule, git_options, args, \
     state, effective_exclusions, message, created_at, reconciled_at";

impl Storage {
    /// Creates a new claim in `domain`. The claim keeps its given status.
    pub fn create_claim(&self, domain: &str, claim: &GcClaim) -> Result<StoredClaim> {
        let conn = self.open_db(domain)?;
        let stored = StoredClaim {
            uid: Uuid::new_v4(),
            claim: claim.clone(),
            created_at: Timestamp::now(),
            reconciled_at: None,
        };
        insert_claim(&conn, domain, &stored)?;
        debug!(domain, claim = %claim.name, uid = %stored.uid, "created claim");
        Ok(stored)
    }

    /// Replaces the authored fields of an existing claim. Status is kept.
    pub fn update_claim_spec(&self, domain: &str, claim: &GcClaim) -> Result<()> {
        let Some(conn) = self.open_existing_db(domain)? else {
            return Err(not_found(domain, &claim.name));
        };
        let rows = conn.execute(
            "UPDATE claim
             SET include = ?1, exclude = ?2, schedule = ?3, git_options = ?4, args = ?5
             WHERE name = ?6",
            rusqlite::params![
                scope_to_json(&claim.scope)?,
                serde_json::to_string(&claim.exclude)?,
                &claim.schedule,
                &claim.flags.git_options,
                serde_json::to_string(&claim.flags.args)?,
                claim.name.as_str(),
            ],
        )?;
        if rows == 0 {
            return Err(not_found(domain, &claim.name));
        }
        debug!(domain, claim = %claim.name, "updated claim spec");
        Ok(())
    }

    /// Creates the claim, or updates its authored fields if it already exists.
    pub fn apply_claim(&self, domain: &str, claim: &GcClaim) -> Result<Applied> {
        match self.update_claim_spec(domain, claim) {
            Ok(()) => Ok(Applied::Updated),
            Err(StorageError::ClaimNotFound { .. }) => {
                self.create_claim(domain, claim)?;
                Ok(Applied::Created)
            }
            Err(e) => Err(e),
        }
    }

    /// Writes a derived status back onto a claim.
    pub fn update_status(
        &self,
        domain: &str,
        name: &ClaimId,
        status: &ClaimStatus,
        reconciled_at: Timestamp,
    ) -> Result<()> {
        let Some(conn) = self.open_existing_db(domain)? else {
            return Err(not_found(domain, name));
        };
        let rows = conn.execute(
            "UPDATE claim
             SET state = ?1, effective_exclusions = ?2, message = ?3, reconciled_at = ?4
             WHERE name = ?5",
            rusqlite::params![
                status.state.as_str(),
                serde_json::to_string(&status.effective_exclusions)?,
                &status.message,
                reconciled_at.to_string(),
                name.as_str(),
            ],
        )?;
        if rows == 0 {
            return Err(not_found(domain, name));
        }
        Ok(())
    }

    /// Loads a single claim.
    pub fn load_claim(&self, domain: &str, name: &ClaimId) -> Result<StoredClaim> {
        let Some(conn) = self.open_existing_db(domain)? else {
            return Err(not_found(domain, name));
        };
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM claim WHERE name = ?1"),
                [name.as_str()],
                RawClaim::from_row,
            )
            .optional()?;
        row.ok_or_else(|| not_found(domain, name))?.decode()
    }

    /// Loads every claim of the domain, sorted by name.
    ///
    /// A domain without a database is empty.
    pub fn load_claims(&self, domain: &str) -> Result<Vec<StoredClaim>> {
        let Some(conn) = self.open_existing_db(domain)? else {
            return Ok(Vec::new());
        };
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM claim ORDER BY name"))?;
        let rows = stmt.query_map([], RawClaim::from_row)?;
        let mut claims = Vec::new();
        for row in rows {
            claims.push(row?.decode()?);
        }
        Ok(claims)
    }

    /// Loads a read-only snapshot of the domain for arbitration.
    pub fn load_claim_set(&self, domain: &str) -> Result<ClaimSet> {
        let claims = self.load_claims(domain)?;
        ClaimSet::from_claims(claims.into_iter().map(|s| s.claim))
            .map_err(|e| StorageError::Corrupt(e.to_string()))
    }

    /// Deletes a claim from its domain.
    pub fn delete_claim(&self, domain: &str, name: &ClaimId) -> Result<()> {
        let Some(conn) = self.open_existing_db(domain)? else {
            return Err(not_found(domain, name));
        };
        let rows = conn.execute("DELETE FROM claim WHERE name = ?1", [name.as_str()])?;
        if rows == 0 {
            return Err(not_found(domain, name));
        }
        debug!(domain, claim = %name, "deleted claim");
        Ok(())
    }
}

fn not_found(domain: &str, name: &ClaimId) -> StorageError {
    StorageError::ClaimNotFound {
        domain: domain.to_string(),
        name: name.to_string(),
    }
}

fn insert_claim(conn: &Connection, domain: &str, stored: &StoredClaim) -> Result<()> {
    let claim = &stored.claim;
    let result = conn.execute(
        &format!(
            "INSERT INTO claim ({COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        rusqlite::params![
            claim.name.as_str(),
            stored.uid.to_string(),
            scope_to_json(&claim.scope)?,
            serde_json::to_string(&claim.exclude)?,
            &claim.schedule,
            &claim.flags.git_options,
            serde_json::to_string(&claim.flags.args)?,
            claim.status.state.as_str(),
            serde_json::to_string(&claim.status.effective_exclusions)?,
            &claim.status.message,
            stored.created_at.to_string(),
            stored.reconciled_at.map(|t| t.to_string()),
        ],
    );
    match result {
        Ok(_) => Ok(()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(StorageError::ClaimAlreadyExists {
                domain: domain.to_string(),
                name: claim.name.to_string(),
            })
        }
        Err(e) => Err(e.into()),
    }
}

fn scope_to_json(scope: &ClaimScope) -> Result<String> {
    Ok(serde_json::to_string(scope)?)
}

/// Column values as read, before decoding.
struct RawClaim {
    name: String,
    uid: String,
    include: String,
    exclude: String,
    schedule: String,
    git_options: Option<String>,
    args: String,
    state: String,
    effective_exclusions: String,
    message: Option<String>,
    created_at: String,
    reconciled_at: Option<String>,
}

impl RawClaim {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            name: row.get(0)?,
            uid: row.get(1)?,
            include: row.get(2)?,
            exclude: row.get(3)?,
            schedule: row.get(4)?,
            git_options: row.get(5)?,
            args: row.get(6)?,
            state: row.get(7)?,
            effective_exclusions: row.get(8)?,
            message: row.get(9)?,
            created_at: row.get(10)?,
            reconciled_at: row.get(11)?,
        })
    }

    fn decode(self) -> Result<StoredClaim> {
        let uid = self
            .uid
            .parse::<Uuid>()
            .map_err(|e| StorageError::Corrupt(format!("invalid uid for {}: {e}", self.name)))?;
        let state = ClaimState::parse(&self.state).ok_or_else(|| {
            StorageError::Corrupt(format!("unknown state for {}: {}", self.name, self.state))
        })?;
        let created_at = parse_timestamp(&self.created_at, "created_at")?;
        let reconciled_at = self
            .reconciled_at
            .as_deref()
            .map(|t| parse_timestamp(t, "reconciled_at"))
            .transpose()?;

        let include: BTreeSet<RepositoryId> = serde_json::from_str(&self.include)?;
        let claim = GcClaim {
            name: ClaimId::new(self.name),
            scope: ClaimScope::from_include(include),
            exclude: serde_json::from_str(&self.exclude)?,
            schedule: self.schedule,
            flags: ExecutionFlags {
                git_options: self.git_options,
                args: serde_json::from_str(&self.args)?,
            },
            status: ClaimStatus {
                state,
                effective_exclusions: serde_json::from_str(&self.effective_exclusions)?,
                message: self.message,
            },
        };

        Ok(StoredClaim {
            uid,
            claim,
            created_at,
            reconciled_at,
        })
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<Timestamp> {
    value
        .parse::<Timestamp>()
        .map_err(|e| StorageError::Corrupt(format!("invalid {column}: {e}")))
}
