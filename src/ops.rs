//! The operation set exposed to front ends: init, integrity check,
//! database/policy update, printing, and the keyfile admin operations.

use std::fs::File;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::info;

use crate::archive::envelope::{read_artifact, write_artifact, BodyMode};
use crate::archive::keyfile::{KeyRole, Keyfile};
use crate::archive::{ids, POLICY_MAGIC};
use crate::config::Config;
use crate::db::{Database, DbLock};
use crate::engine::check::integrity_check;
use crate::engine::policy::{policy_update, PolicyUpdateOptions};
use crate::engine::update::update_database;
use crate::error::{Error, Result};
use crate::fco::prop::HashDisplay;
use crate::policy::parse::parse_policy;
use crate::policy::rule_list::RuleList;
use crate::print::accept::interactive_accept;
use crate::print::db::render_db;
use crate::print::report::{render_report, ReportLevel};
use crate::report::model::Report;
use crate::scanner::walk::ScanOptions;

/// Exit code summarizing violations: bit 0 added, bit 1 removed, bit 2
/// changed. Zero means a clean check.
pub fn exit_status(report: &Report) -> u8 {
    let mut status = 0u8;
    if report.added_count() > 0 {
        status |= 1;
    }
    if report.removed_count() > 0 {
        status |= 2;
    }
    if report.changed_count() > 0 {
        status |= 4;
    }
    status
}

/// Exit code for any failed operation.
pub const EXIT_FAILURE: u8 = 8;

pub fn now() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

// ---- artifact I/O ----

fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::Builder::new()
        .prefix(".verity-tmp-")
        .tempfile_in(dir)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    std::io::Write::write_all(&mut tmp, bytes)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    tmp.persist(path)
        .map_err(|e| Error::IoPath { path: path.to_path_buf(), source: e.error })?;
    Ok(())
}

/// Signs and atomically replaces the database artifact.
pub fn save_database(path: &Path, db: &mut Database, local: &SigningKey) -> Result<()> {
    let mut payload = Vec::new();
    db.write(&mut payload).map_err(Error::Io)?;
    let mut out = Vec::new();
    write_artifact(&mut out, ids::DATABASE, &[], BodyMode::Signed(local), &payload)?;
    atomic_write(path, &out)
}

/// Loads and verifies the database artifact.
pub fn load_database(path: &Path, local: &VerifyingKey) -> Result<Database> {
    let mut file = File::open(path)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    let (_, payload) = read_artifact(&mut file, ids::DATABASE, "database", path, Some(local))?;
    Database::read(&mut Cursor::new(payload))
}

pub fn save_report(path: &Path, report: &Report, local: &SigningKey) -> Result<()> {
    let mut payload = Vec::new();
    report.write(&mut payload).map_err(Error::Io)?;
    let mut out = Vec::new();
    write_artifact(&mut out, ids::REPORT, &[], BodyMode::Signed(local), &payload)?;
    atomic_write(path, &out)
}

pub fn load_report(path: &Path, local: &VerifyingKey) -> Result<Report> {
    let mut file = File::open(path)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    let (_, payload) = read_artifact(&mut file, ids::REPORT, "report", path, Some(local))?;
    Report::read(&mut Cursor::new(payload))
}

/// Wraps policy source text in its signed container.
pub fn save_policy_text(path: &Path, text: &str, site: &SigningKey) -> Result<()> {
    // compile first so a broken policy never gets signed
    parse_policy(text)?;
    let mut payload = POLICY_MAGIC.to_vec();
    payload.extend_from_slice(text.as_bytes());
    let mut out = Vec::new();
    write_artifact(&mut out, ids::POLICY, &[], BodyMode::Signed(site), &payload)?;
    atomic_write(path, &out)
}

/// Loads, verifies and compiles the signed policy artifact.
pub fn load_policy(path: &Path, site: &VerifyingKey) -> Result<RuleList> {
    let mut file = File::open(path)
        .map_err(|source| Error::IoPath { path: path.to_path_buf(), source })?;
    let (_, payload) = read_artifact(&mut file, ids::POLICY, "policy", path, Some(site))?;
    let text = payload
        .strip_prefix(POLICY_MAGIC.as_slice())
        .ok_or(Error::BadMagic { expected: "policy", path: path.to_path_buf() })?;
    let text = std::str::from_utf8(text)
        .map_err(|_| Error::PolicyParse { line: 0, msg: "policy text is not UTF-8".into() })?;
    parse_policy(text)
}

// ---- keyfile plumbing ----

/// Loads a keyfile and unwraps its signing half.
fn unlock_keyfile(path: &Path, passphrase: &str) -> Result<(Keyfile, SigningKey)> {
    let keyfile = Keyfile::load(path)?;
    let signing = keyfile.unlock(passphrase)?;
    Ok((keyfile, signing))
}

// ---- operations ----

/// Creates the site and local keyfiles.
pub fn generate_keys(
    site_path: &Path,
    site_passphrase: &str,
    local_path: &Path,
    local_passphrase: &str,
) -> Result<()> {
    Keyfile::generate(KeyRole::Site, site_passphrase)?.save(site_path)?;
    Keyfile::generate(KeyRole::Local, local_passphrase)?.save(local_path)?;
    info!(site = %site_path.display(), local = %local_path.display(), "generated keyfiles");
    Ok(())
}

/// Builds the baseline database: scans every rule and stores what it
/// finds.
pub fn init(config: &Config, local_passphrase: &str) -> Result<()> {
    let site = Keyfile::load(&config.site_keyfile)?;
    let (_, local_signing) = unlock_keyfile(&config.local_keyfile, local_passphrase)?;
    let rules = load_policy(&config.policy_file, site.public())?;

    let _lock = DbLock::acquire(&config.database_file)?;
    let mut db = Database::new(rules.clone(), now());

    // against an empty tree every scanned object lands in the added set
    let report = integrity_check(&rules, &db, ScanOptions::default(), db.created_at());
    for (_, specs) in report.genres() {
        for spec in specs {
            for fco in spec.added().iter() {
                let mut cursor = db.tree.cursor();
                cursor.seek_to(fco.name(), true);
                cursor.write_fco(fco.clone());
            }
        }
    }

    save_database(&config.database_file, &mut db, &local_signing)?;
    info!(
        objects = db.tree.record_count(),
        db = %config.database_file.display(),
        "baseline database written"
    );
    Ok(())
}

/// Where a check writes its report.
pub fn report_path(config: &Config, created_at: i64) -> PathBuf {
    config.report_dir.join(format!("verity-{created_at}.twr"))
}

/// Runs an integrity check, writes the signed report, prints it and
/// returns the rendered text with the exit status.
pub fn check(
    config: &Config,
    local_passphrase: &str,
    level: ReportLevel,
    hashes: HashDisplay,
) -> Result<(String, u8)> {
    let (keyfile, local_signing) = unlock_keyfile(&config.local_keyfile, local_passphrase)?;
    let db = load_database(&config.database_file, keyfile.public())?;

    let report = integrity_check(db.policy(), &db, ScanOptions::default(), now());
    save_report(&report_path(config, report.created_at()), &report, &local_signing)?;

    let text = render_report(&report, level, hashes);
    Ok((text, exit_status(&report)))
}

/// Folds a report into the database, optionally after the interactive
/// checkbox round trip.
pub fn update_db(
    config: &Config,
    local_passphrase: &str,
    report_file: &Path,
    interactive: bool,
) -> Result<()> {
    let (keyfile, local_signing) = unlock_keyfile(&config.local_keyfile, local_passphrase)?;
    let report = load_report(report_file, keyfile.public())?;

    let accepted = if interactive {
        let editor = std::env::var("VISUAL")
            .or_else(|_| std::env::var("EDITOR"))
            .unwrap_or_else(|_| config.editor.clone());
        interactive_accept(&report, &editor)?
    } else {
        report
    };

    let _lock = DbLock::acquire(&config.database_file)?;
    let mut db = load_database(&config.database_file, keyfile.public())?;
    update_database(&mut db, &accepted)?;
    db.set_created_at(now());
    save_database(&config.database_file, &mut db, &local_signing)
}

/// Reconciles a new signed policy against the database.
pub fn update_policy(
    config: &Config,
    local_passphrase: &str,
    new_policy_file: &Path,
    opts: PolicyUpdateOptions,
) -> Result<Report> {
    let site = Keyfile::load(&config.site_keyfile)?;
    let (keyfile, local_signing) = unlock_keyfile(&config.local_keyfile, local_passphrase)?;
    let new_rules = load_policy(new_policy_file, site.public())?;

    let _lock = DbLock::acquire(&config.database_file)?;
    let mut db = load_database(&config.database_file, keyfile.public())?;
    let report = policy_update(&new_rules, &mut db, opts, now())?;
    save_database(&config.database_file, &mut db, &local_signing)?;
    Ok(report)
}

/// Verifies and renders the database as text.
pub fn print_db(config: &Config, hashes: HashDisplay) -> Result<String> {
    let keyfile = Keyfile::load(&config.local_keyfile)?;
    let db = load_database(&config.database_file, keyfile.public())?;
    Ok(render_db(&db, hashes))
}

/// Verifies and renders a report as text.
pub fn print_report(
    config: &Config,
    report_file: &Path,
    level: ReportLevel,
    hashes: HashDisplay,
) -> Result<String> {
    let keyfile = Keyfile::load(&config.local_keyfile)?;
    let report = load_report(report_file, keyfile.public())?;
    Ok(render_report(&report, level, hashes))
}

/// Rewraps a keyfile's private half under a new passphrase.
pub fn change_passphrase(keyfile_path: &Path, old: &str, new: &str) -> Result<()> {
    let mut keyfile = Keyfile::load(keyfile_path)?;
    keyfile.change_passphrase(old, new)?;
    keyfile.save(keyfile_path)
}

/// Which artifact `re_encrypt` operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Database,
    Report,
}

/// Re-signs an artifact with the current local key: verify under the old
/// key, then sign again under the new one. Used after key rotation.
pub fn re_encrypt(
    artifact: &Path,
    kind: ArtifactKind,
    old_local: &VerifyingKey,
    new_local: &SigningKey,
) -> Result<()> {
    match kind {
        ArtifactKind::Database => {
            let mut db = load_database(artifact, old_local)?;
            save_database(artifact, &mut db, new_local)
        }
        ArtifactKind::Report => {
            let report = load_report(artifact, old_local)?;
            save_report(artifact, &report, new_local)
        }
    }
}
