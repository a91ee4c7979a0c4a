#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subsidy_kernel_contracts::address::BeneficiaryAddress;
use subsidy_kernel_contracts::profile::ProfileRecord;
use subsidy_kernel_contracts::SchemaVersion;
use subsidy_storage::profile_store::{ProfileStore, StorageError};
use tracing::info;

pub const JOURNAL_SCHEMA_VERSION: SchemaVersion = SchemaVersion(1);

#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("profile journal '{path}': {detail}")]
    Io { path: PathBuf, detail: String },
    #[error("profile journal '{path}' line {line}: {detail}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        detail: String,
    },
    #[error("profile journal replay failed at line {line}: {source}")]
    Replay { line: usize, source: StorageError },
}

/// One durable change to the profile table. Upserts carry the full row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JournalOp {
    Put { profile: ProfileRecord },
    Delete { address: BeneficiaryAddress },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    schema_version: u32,
    sha256: String,
    change: JournalOp,
}

impl JournalEntry {
    fn v1(change: JournalOp) -> Result<Self, serde_json::Error> {
        Ok(Self {
            schema_version: JOURNAL_SCHEMA_VERSION.0,
            sha256: op_digest(&change)?,
            change,
        })
    }
}

fn op_digest(change: &JournalOp) -> Result<String, serde_json::Error> {
    let bytes = serde_json::to_vec(change)?;
    let digest = Sha256::digest(&bytes);
    Ok(digest.iter().map(|b| format!("{b:02x}")).collect())
}

/// Append-only JSON-lines log of profile changes, replayed into a fresh store on start.
#[derive(Debug, Clone)]
pub struct ProfileJournal {
    path: PathBuf,
}

impl ProfileJournal {
    /// Creates the parent directory and an empty file when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| io_error(parent, "create directory", err))?;
        }
        if !path.exists() {
            File::create(&path).map_err(|err| io_error(&path, "create", err))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn replay_into(&self, store: &mut ProfileStore) -> Result<usize, JournalError> {
        let file = File::open(&self.path).map_err(|err| io_error(&self.path, "open", err))?;
        let mut applied = 0usize;
        for (line_no, line_result) in BufReader::new(file).lines().enumerate() {
            let line_no = line_no + 1;
            let line = line_result.map_err(|err| JournalError::Corrupt {
                path: self.path.clone(),
                line: line_no,
                detail: err.to_string(),
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let entry: JournalEntry =
                serde_json::from_str(&line).map_err(|err| self.corrupt(line_no, err.to_string()))?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION.0 {
                return Err(self.corrupt(
                    line_no,
                    format!("unsupported schema_version={}", entry.schema_version),
                ));
            }
            let expected =
                op_digest(&entry.change).map_err(|err| self.corrupt(line_no, err.to_string()))?;
            if expected != entry.sha256 {
                return Err(self.corrupt(line_no, "checksum mismatch".to_string()));
            }
            apply(store, entry.change).map_err(|source| JournalError::Replay {
                line: line_no,
                source,
            })?;
            applied += 1;
        }
        info!(path = %self.path.display(), entries = applied, "profile journal replayed");
        Ok(applied)
    }

    pub fn append(&self, change: JournalOp) -> Result<(), JournalError> {
        let entry = JournalEntry::v1(change)
            .map_err(|err| io_error(&self.path, "encode entry", err))?;
        let json =
            serde_json::to_string(&entry).map_err(|err| io_error(&self.path, "encode entry", err))?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| io_error(&self.path, "open for append", err))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| io_error(&self.path, "write", err))?;
        Ok(())
    }

    fn corrupt(&self, line: usize, detail: String) -> JournalError {
        JournalError::Corrupt {
            path: self.path.clone(),
            line,
            detail,
        }
    }
}

fn apply(store: &mut ProfileStore, change: JournalOp) -> Result<(), StorageError> {
    match change {
        JournalOp::Put { profile } => store.restore_profile(profile),
        JournalOp::Delete { address } => store.delete_profile(&address).map(|_| ()),
    }
}

fn io_error(path: &Path, action: &str, err: impl std::fmt::Display) -> JournalError {
    JournalError::Io {
        path: path.to_path_buf(),
        detail: format!("{action} failed: {err}"),
    }
}
