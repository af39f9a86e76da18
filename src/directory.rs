//! User records and the store they live in.
//!
//! The dashboard keeps one record per user: a name, the Base32 secret their codes are
//! derived from, and an `is_admin` display flag. [`UserDirectory`] is the surface the
//! admin and user views need; [`MemoryDirectory`] implements it in memory, with the two
//! store policies the dashboard relies on:
//!
//! - listing an empty store seeds it with [`DirectoryConfig::default_admin`] and
//!   [`DirectoryConfig::default_user`]
//! - looking up the default admin by name when it's missing puts it back
//!
//! ```rust
//! use totp_dash::{MemoryDirectory, UserDirectory};
//!
//! let mut directory = MemoryDirectory::default();
//! let alice = directory.create("alice", "JBSW Y3DP EHPK 3PXP").unwrap();
//! let result = alice.token_at(59);
//! assert!(result.valid);
//! ```

use std::collections::HashSet;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{compute_current_token, OtpResult, Secret};

/// One user of the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    /// Base32, as entered by the admin. Not validated on write
    pub secret: String,
    /// Display flag only
    pub is_admin: bool,
    /// Milliseconds since the unix epoch
    pub created_at: i64,
}

impl UserRecord {
    /// Token of this user's secret at `now` (seconds since the unix epoch).
    pub fn token_at(&self, now: u64) -> OtpResult {
        compute_current_token(&self.secret, now)
    }
}

/// Records a [`MemoryDirectory`] seeds itself with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryConfig {
    /// Always present: restored on lookup if it went missing
    pub default_admin: UserRecord,
    pub default_user: UserRecord,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig {
            default_admin: UserRecord {
                id: "admin".to_string(),
                username: "admin".to_string(),
                secret: "JBSWY3DPEHPK3PXP".to_string(),
                is_admin: true,
                created_at: 0,
            },
            default_user: UserRecord {
                id: "user".to_string(),
                username: "user".to_string(),
                secret: "KRSXG5CTMVRXEZLUKN2XAZLSKNSWG4TFOQ".to_string(),
                is_admin: false,
                created_at: 0,
            },
        }
    }
}

/// Different ways a directory operation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// A user with this name (ignoring case) already exists.
    DuplicateUser(String),
    /// No record has this id.
    NotFound(String),
    EmptyUsername,
    EmptySecret,
    /// A backup could not be written or read back.
    Backup(String),
    /// The system clock could not date a new record.
    Clock(String),
}

impl std::error::Error for DirectoryError {}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirectoryError::DuplicateUser(name) => {
                write!(f, "User \"{}\" already exists", name)
            }
            DirectoryError::NotFound(id) => write!(f, "No user with id \"{}\"", id),
            DirectoryError::EmptyUsername => write!(f, "Username can't be empty"),
            DirectoryError::EmptySecret => write!(f, "Secret can't be empty"),
            DirectoryError::Backup(reason) => write!(f, "Invalid backup: {}", reason),
            DirectoryError::Clock(reason) => write!(f, "Could not read the clock: {}", reason),
        }
    }
}

impl From<serde_json::Error> for DirectoryError {
    fn from(err: serde_json::Error) -> Self {
        DirectoryError::Backup(err.to_string())
    }
}

/// The store behind the admin and user views.
pub trait UserDirectory {
    /// Every record, newest first.
    fn list(&mut self) -> Result<Vec<UserRecord>, DirectoryError>;

    /// Case-insensitive lookup by name.
    fn find_by_username(&mut self, username: &str) -> Result<Option<UserRecord>, DirectoryError>;

    /// Add a non-admin user.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::DuplicateUser`] if the name is taken, ignoring case.
    fn create(&mut self, username: &str, secret: &str) -> Result<UserRecord, DirectoryError>;

    fn update_secret(&mut self, id: &str, secret: &str) -> Result<(), DirectoryError>;

    /// # Errors
    ///
    /// [`DirectoryError::NotFound`] if nothing was removed.
    fn delete(&mut self, id: &str) -> Result<(), DirectoryError>;

    /// Replace records by id, insert the rest. Returns how many records were written.
    ///
    /// # Errors
    ///
    /// [`DirectoryError::DuplicateUser`] if the result would hold two records with the same
    /// name, ignoring case. Nothing is written then.
    fn bulk_upsert(&mut self, records: Vec<UserRecord>) -> Result<usize, DirectoryError>;
}

/// In-memory [`UserDirectory`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    config: DirectoryConfig,
    records: Vec<UserRecord>,
}

impl MemoryDirectory {
    pub fn new(config: DirectoryConfig) -> MemoryDirectory {
        MemoryDirectory {
            config,
            records: Vec::new(),
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.records.iter().position(|r| r.id == id)
    }

    fn upsert(&mut self, record: UserRecord) {
        upsert_into(&mut self.records, record);
    }
}

fn upsert_into(records: &mut Vec<UserRecord>, record: UserRecord) {
    match records.iter().position(|r| r.id == record.id) {
        Some(i) => records[i] = record,
        None => records.push(record),
    }
}

/// First name (ignoring case) held by more than one record.
fn duplicate_username(records: &[UserRecord]) -> Option<&str> {
    let mut seen = HashSet::new();
    records
        .iter()
        .find(|r| !seen.insert(r.username.to_lowercase()))
        .map(|r| r.username.as_str())
}

fn now_millis() -> Result<i64, DirectoryError> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| DirectoryError::Clock(err.to_string()))?;
    Ok(elapsed.as_millis() as i64)
}

fn warn_if_undecodable(username: &str, secret: &str) {
    if let Err(err) = Secret::Encoded(secret.to_string()).to_bytes() {
        warn!("secret of user {} won't produce tokens: {}", username, err);
    }
}

impl UserDirectory for MemoryDirectory {
    fn list(&mut self) -> Result<Vec<UserRecord>, DirectoryError> {
        if self.records.is_empty() {
            info!("directory empty, seeding default users");
            self.records = vec![
                self.config.default_admin.clone(),
                self.config.default_user.clone(),
            ];
        }
        let mut records = self.records.clone();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    fn find_by_username(&mut self, username: &str) -> Result<Option<UserRecord>, DirectoryError> {
        let wanted = username.to_lowercase();
        if let Some(found) = self
            .records
            .iter()
            .find(|r| r.username.to_lowercase() == wanted)
        {
            return Ok(Some(found.clone()));
        }

        if wanted == self.config.default_admin.username.to_lowercase() {
            info!("default admin {} missing, restoring", self.config.default_admin.username);
            let admin = self.config.default_admin.clone();
            self.upsert(admin.clone());
            return Ok(Some(admin));
        }
        Ok(None)
    }

    fn create(&mut self, username: &str, secret: &str) -> Result<UserRecord, DirectoryError> {
        if username.trim().is_empty() {
            return Err(DirectoryError::EmptyUsername);
        }
        if secret.trim().is_empty() {
            return Err(DirectoryError::EmptySecret);
        }
        if self.find_by_username(username)?.is_some() {
            return Err(DirectoryError::DuplicateUser(username.to_string()));
        }
        warn_if_undecodable(username, secret);

        let record = UserRecord {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.to_string(),
            secret: secret.to_string(),
            is_admin: false,
            created_at: now_millis()?,
        };
        self.records.push(record.clone());
        info!("created user {}", record.username);
        Ok(record)
    }

    fn update_secret(&mut self, id: &str, secret: &str) -> Result<(), DirectoryError> {
        if secret.trim().is_empty() {
            return Err(DirectoryError::EmptySecret);
        }
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        warn_if_undecodable(&record.username, secret);
        record.secret = secret.to_string();
        Ok(())
    }

    fn delete(&mut self, id: &str) -> Result<(), DirectoryError> {
        let i = self
            .position(id)
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        let removed = self.records.remove(i);
        info!("deleted user {}", removed.username);
        Ok(())
    }

    fn bulk_upsert(&mut self, records: Vec<UserRecord>) -> Result<usize, DirectoryError> {
        let written = records.len();
        // the whole batch lands or none of it does
        let mut merged = self.records.clone();
        for record in records {
            upsert_into(&mut merged, record);
        }
        if let Some(name) = duplicate_username(&merged) {
            return Err(DirectoryError::DuplicateUser(name.to_string()));
        }
        self.records = merged;
        Ok(written)
    }
}

/// Records whose name contains `term`, ignoring case, ordered by secret as the admin view
/// lists them. The term is used as typed, so an empty term matches everyone and surrounding
/// spaces are part of the match.
pub fn search<'a>(records: &'a [UserRecord], term: &str) -> Vec<&'a UserRecord> {
    let term = term.to_lowercase();
    let mut found: Vec<&UserRecord> = records
        .iter()
        .filter(|r| r.username.to_lowercase().contains(&term))
        .collect();
    found.sort_by(|a, b| a.secret.cmp(&b.secret));
    found
}

/// Pretty-printed JSON array of `records`, the backup format.
pub fn export_json(records: &[UserRecord]) -> Result<String, DirectoryError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Restore a backup written by [`export_json`] into `directory`. Returns how many records
/// were written.
///
/// # Errors
///
/// [`DirectoryError::Backup`] if `json` isn't an array of records, or an empty one.
pub fn import_json<D>(directory: &mut D, json: &str) -> Result<usize, DirectoryError>
where
    D: UserDirectory + ?Sized,
{
    let records: Vec<UserRecord> = serde_json::from_str(json)?;
    if records.is_empty() {
        return Err(DirectoryError::Backup("no users in backup".to_string()));
    }
    let written = directory.bulk_upsert(records)?;
    info!("restored {} users from backup", written);
    Ok(written)
}

/// `backup_users_<YYYY-MM-DD>.json`, dated from `epoch_seconds` in UTC.
pub fn backup_file_name(epoch_seconds: i64) -> String {
    match chrono::DateTime::from_timestamp(epoch_seconds, 0) {
        Some(date) => format!("backup_users_{}.json", date.format("%Y-%m-%d")),
        None => "backup_users.json".to_string(),
    }
}
