//! Local claim store: the snapshot source for arbitration.
//!
//! Each conflict domain lives in its own `SQLite` file under the storage root:
//!
//! ```text
//! <root>/<domain>.sqlite   # one row per claim: authored spec + derived status
//! ```
//!
//! Arbitration never reads through this store directly. Callers load a
//! [`ClaimSet`](crate::model::ClaimSet) snapshot, hand it to the engine, and
//! write the derived status back.

mod claims;

use std::{fs, io, path::PathBuf};

use rusqlite::{Connection, ErrorCode, OpenFlags};

pub use claims::{Applied, StoredClaim};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS claim (
    name                 TEXT PRIMARY KEY,
    uid                  TEXT NOT NULL,
    include              TEXT NOT NULL,
    exclude              TEXT NOT NULL,
    schedule             TEXT NOT NULL,
    git_options          TEXT,
    args                 TEXT NOT NULL,
    state                TEXT NOT NULL,
    effective_exclusions TEXT NOT NULL,
    message              TEXT,
    created_at           TEXT NOT NULL,
    reconciled_at        TEXT
);
";

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("claim not found: {domain}/{name}")]
    ClaimNotFound { domain: String, name: String },

    #[error("claim already exists: {domain}/{name}")]
    ClaimAlreadyExists { domain: String, name: String },

    #[error("invalid domain name: {0:?}")]
    InvalidDomain(String),

    #[error("corrupt claim store: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// `SQLite`-backed storage for claims, one database per conflict domain.
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    /// Creates a new storage instance rooted at the given directory.
    ///
    /// The directory is created if it doesn't exist.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Returns the default storage root: `~/.gitgc-arbiter/domains/`.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".gitgc-arbiter").join("domains"))
    }

    /// Lists the domains that have a database, sorted by name.
    pub fn list_domains(&self) -> Result<Vec<String>> {
        let mut domains = Vec::new();
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(domains),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("sqlite") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                domains.push(stem.to_string());
            }
        }
        domains.sort();
        Ok(domains)
    }

    /// Opens the domain's database, creating it and its schema if missing.
    fn open_db(&self, domain: &str) -> Result<Connection> {
        let conn = Connection::open(self.db_path(domain)?)?;
        conn.execute_batch(SCHEMA)?;
        Ok(conn)
    }

    /// Opens the domain's database only if it already exists.
    ///
    /// Read paths use this so that a mistyped domain is never created.
    fn open_existing_db(&self, domain: &str) -> Result<Option<Connection>> {
        let path = self.db_path(domain)?;
        match Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_WRITE) {
            Ok(conn) => Ok(Some(conn)),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::CannotOpen => {
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn db_path(&self, domain: &str) -> Result<PathBuf> {
        let valid = !domain.is_empty()
            && !domain.starts_with('.')
            && domain
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !valid {
            return Err(StorageError::InvalidDomain(domain.to_string()));
        }
        Ok(self.root.join(format!("{domain}.sqlite")))
    }
}
