//! CLI interface for the arbiter.
//!
//! Each subcommand is non-interactive: arguments in, plain text out.
//! Every command works within one conflict domain, chosen with `--domain`
//! or taken from the configured default.

mod format;

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;

use crate::config::Config;
use crate::driver::reconcile_domain;
use crate::job::GcJobRequest;
use crate::model::{BulkManifest, ClaimId, ClaimManifest, ClaimState};
use crate::reconciler::ClaimReconciler;
use crate::storage::{Applied, Storage};
use crate::validator;

use format::{format_claim, format_job, format_reconciliation};

/// Arbitrate ownership of Git garbage collection between scheduled jobs.
#[derive(Debug, Parser)]
#[command(name = "gitgc-arbiter", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Conflict domain to operate on. Defaults to `default-domain` from the config.
    #[arg(long, global = true)]
    domain: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: adding a selective GC job next to a cluster-wide one
  1. gitgc-arbiter --domain prod apply all.toml
  2. gitgc-arbiter --domain prod validate selected.toml
     → prints "allowed" or the conflict
  3. gitgc-arbiter --domain prod apply selected.toml
  4. gitgc-arbiter --domain prod jobs
     → the cluster-wide job now skips the selected repositories

Manifest:
  name = "gc-selected"
  schedule = "0 6 * * *"
  include = ["All-Projects"]
  git-options = "[pack]\n  threads = 2""#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check a claim manifest against the stored claims of the domain.
    ///
    /// Prints `allowed`, or fails with the reason the claim would be refused.
    /// Nothing is stored.
    Validate {
        /// Path to the claim manifest (TOML).
        manifest: PathBuf,
    },

    /// Create or update a claim, then reconcile the domain.
    Apply {
        /// Path to the claim manifest (TOML).
        manifest: PathBuf,

        /// Refuse the claim if it conflicts or is malformed, instead of
        /// storing it and letting reconciliation mark it.
        #[arg(long)]
        strict: bool,
    },

    /// Delete a claim, then reconcile the remaining claims.
    Delete {
        /// Claim name.
        name: String,
    },

    /// Reconcile every claim of the domain and print the resulting states.
    Reconcile,

    /// List the claims of the domain with their scope and state.
    List {
        /// Print the stored claims, metadata included, as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print one stored claim, metadata included, as JSON.
    Show {
        /// Claim name.
        name: String,
    },

    /// Print the job of every active claim.
    Jobs {
        /// Print the jobs as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List known conflict domains.
    Domains,

    /// Validate a bulk manifest declaring a closed list of `[[gc]]` tasks.
    ///
    /// Any overlap between the tasks, or any malformed task, is refused.
    Check {
        /// Path to the bulk manifest (TOML).
        manifest: PathBuf,
    },
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();
    let domain = cli.domain.as_deref().unwrap_or(&config.default_domain);
    let reconciler = ClaimReconciler::new(config.git_dir.as_str());

    match cli.command {
        Command::Validate { manifest } => cmd_validate(storage, domain, &manifest),
        Command::Apply { manifest, strict } => {
            cmd_apply(storage, &reconciler, domain, &manifest, strict)
        }
        Command::Delete { name } => cmd_delete(storage, &reconciler, domain, &name),
        Command::Reconcile => cmd_reconcile(storage, &reconciler, domain),
        Command::List { json } => cmd_list(storage, domain, json),
        Command::Show { name } => cmd_show(storage, domain, &name),
        Command::Jobs { json } => cmd_jobs(storage, config, domain, json),
        Command::Domains => cmd_domains(storage),
        Command::Check { manifest } => cmd_check(&manifest),
    }
}

fn read_manifest(path: &Path) -> Result<String, String> {
    fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn cmd_validate(storage: &Storage, domain: &str, path: &Path) -> Result<(), String> {
    let claim = ClaimManifest::parse(&read_manifest(path)?)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?
        .into_claim();
    let set = storage
        .load_claim_set(domain)
        .map_err(|e| format!("failed to load claims: {e}"))?;

    validator::validate(&claim, set.others(&claim.name))
        .map_err(|e| format!("rejected {}: {e}", claim.name))?;

    println!("allowed");
    Ok(())
}

fn cmd_apply(
    storage: &Storage,
    reconciler: &ClaimReconciler,
    domain: &str,
    path: &Path,
    strict: bool,
) -> Result<(), String> {
    let claim = ClaimManifest::parse(&read_manifest(path)?)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?
        .into_claim();

    if strict {
        let set = storage
            .load_claim_set(domain)
            .map_err(|e| format!("failed to load claims: {e}"))?;
        validator::validate(&claim, set.others(&claim.name))
            .map_err(|e| format!("rejected {}: {e}", claim.name))?;
    }

    let applied = storage
        .apply_claim(domain, &claim)
        .map_err(|e| format!("failed to store claim: {e}"))?;
    info!(domain, claim = %claim.name, ?applied, "claim stored");

    let outcomes = reconcile_domain(storage, reconciler, domain)
        .map_err(|e| format!("failed to reconcile {domain}: {e}"))?;

    let verb = match applied {
        Applied::Created => "created",
        Applied::Updated => "updated",
    };
    match outcomes.iter().find(|o| o.claim.name == claim.name) {
        Some(outcome) => println!("{verb} {}", format_reconciliation(outcome)),
        None => println!("{verb} {}", claim.name),
    }
    Ok(())
}

fn cmd_delete(
    storage: &Storage,
    reconciler: &ClaimReconciler,
    domain: &str,
    name: &str,
) -> Result<(), String> {
    let name = ClaimId::from(name);
    storage
        .delete_claim(domain, &name)
        .map_err(|e| format!("failed to delete claim: {e}"))?;
    println!("deleted {name}");

    let outcomes = reconcile_domain(storage, reconciler, domain)
        .map_err(|e| format!("failed to reconcile {domain}: {e}"))?;
    for outcome in &outcomes {
        println!("{}", format_reconciliation(outcome));
    }
    Ok(())
}

fn cmd_reconcile(
    storage: &Storage,
    reconciler: &ClaimReconciler,
    domain: &str,
) -> Result<(), String> {
    let outcomes = reconcile_domain(storage, reconciler, domain)
        .map_err(|e| format!("failed to reconcile {domain}: {e}"))?;

    if outcomes.is_empty() {
        println!("No claims");
        return Ok(());
    }
    for outcome in &outcomes {
        println!("{}", format_reconciliation(outcome));
    }
    Ok(())
}

fn cmd_list(storage: &Storage, domain: &str, json: bool) -> Result<(), String> {
    let claims = storage
        .load_claims(domain)
        .map_err(|e| format!("failed to list claims: {e}"))?;

    if json {
        let out = serde_json::to_string_pretty(&claims)
            .map_err(|e| format!("failed to serialize claims: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    if claims.is_empty() {
        println!("No claims");
        return Ok(());
    }
    for stored in &claims {
        println!("{}", format_claim(stored));
    }
    Ok(())
}

fn cmd_show(storage: &Storage, domain: &str, name: &str) -> Result<(), String> {
    let stored = storage
        .load_claim(domain, &ClaimId::from(name))
        .map_err(|e| format!("failed to load claim: {e}"))?;
    let out = serde_json::to_string_pretty(&stored)
        .map_err(|e| format!("failed to serialize claim: {e}"))?;
    println!("{out}");
    Ok(())
}

fn cmd_jobs(storage: &Storage, config: &Config, domain: &str, json: bool) -> Result<(), String> {
    let set = storage
        .load_claim_set(domain)
        .map_err(|e| format!("failed to load claims: {e}"))?;

    let mut jobs = Vec::new();
    for claim in set.iter().filter(|c| c.state() == ClaimState::Active) {
        let job = GcJobRequest::for_claim(claim, &config.git_dir)
            .map_err(|e| format!("failed to build job for {}: {e}", claim.name))?;
        jobs.push(job);
    }

    if json {
        let out = serde_json::to_string_pretty(&jobs)
            .map_err(|e| format!("failed to serialize jobs: {e}"))?;
        println!("{out}");
        return Ok(());
    }

    if jobs.is_empty() {
        println!("No active jobs");
        return Ok(());
    }
    for job in &jobs {
        println!("{}", format_job(job));
    }
    Ok(())
}

fn cmd_domains(storage: &Storage) -> Result<(), String> {
    let domains = storage
        .list_domains()
        .map_err(|e| format!("failed to list domains: {e}"))?;

    if domains.is_empty() {
        println!("No domains");
        return Ok(());
    }
    for domain in &domains {
        println!("{domain}");
    }
    Ok(())
}

fn cmd_check(path: &Path) -> Result<(), String> {
    let manifest = BulkManifest::parse(&read_manifest(path)?)
        .map_err(|e| format!("failed to parse {}: {e}", path.display()))?;

    let set = validator::validate_all(manifest.into_claims())
        .map_err(|e| format!("rejected {}: {e}", path.display()))?;

    if set.is_empty() {
        println!("No tasks");
        return Ok(());
    }
    println!("ok: {} task(s)", set.len());
    Ok(())
}
