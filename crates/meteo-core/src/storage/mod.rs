//! Persistent batch files and the storage collaborator.

pub mod batch;
pub mod csv;
pub mod short_name;

pub use batch::{FlushError, flush_batch};
pub use short_name::ShortPath;

use core::fmt::{self, Write};

use log::{debug, info};
use thiserror_no_std::Error;

pub const SYNCED_PREFIX: &str = "sync_";
pub const UNSYNCED_PREFIX: &str = "nosync_";
pub const EXTENSION: &str = ".csv";

/// Logical batch file name, e.g. `nosync_3_1700000000.csv`.
pub type FileName = heapless::String<40>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage not mounted")]
    NotMounted,
    #[error("mount failed: {0}")]
    Mount(&'static str),
    #[error("{operation} failed: {details}")]
    Io {
        operation: &'static str,
        details: &'static str,
    },
    #[error("file name cannot be stored")]
    InvalidName,
}

/// A flat namespace of named files, such as a FAT formatted SD card.
pub trait Storage {
    /// Make the medium usable. Called once per measurement cycle.
    fn mount(&mut self) -> Result<(), StorageError>;

    /// Call `visit` with every file name starting with `prefix`.
    fn list_files<F>(&mut self, prefix: &str, visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&str);

    /// Create or replace the file `name` with `contents`.
    fn write_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError>;
}

/// Id grouping the files written during one run without wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SessionId(pub u32);

impl SessionId {
    pub const FIRST: SessionId = SessionId(1);

    pub fn next(self) -> Self {
        SessionId(self.0.saturating_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a batch file is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePrefix {
    Synced,
    Unsynced(SessionId),
}

/// `sync_<epoch>.csv` or `nosync_<session>_<epoch>.csv`.
pub fn batch_file_name(prefix: FilePrefix, epoch_secs: u64) -> Result<FileName, StorageError> {
    let mut name = FileName::new();
    match prefix {
        FilePrefix::Synced => write!(name, "{SYNCED_PREFIX}{epoch_secs}{EXTENSION}"),
        FilePrefix::Unsynced(session) => {
            write!(name, "{UNSYNCED_PREFIX}{session}_{epoch_secs}{EXTENSION}")
        }
    }
    .map_err(|_| StorageError::InvalidName)?;
    Ok(name)
}

/// Session id of an unsynced batch file name, if it is one.
pub fn parse_session_id(name: &str) -> Option<SessionId> {
    let rest = name.strip_prefix(UNSYNCED_PREFIX)?;
    let (digits, _) = rest.split_once('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok().map(SessionId)
}

/// One past the highest session id found on `storage`, or
/// [`SessionId::FIRST`] when there is none.
pub fn allocate_session<S: Storage>(storage: &mut S) -> Result<SessionId, StorageError> {
    let mut highest: Option<SessionId> = None;
    storage.list_files(UNSYNCED_PREFIX, |name| {
        if let Some(id) = parse_session_id(name) {
            debug!("Found unsynced session {} in {}", id, name);
            highest = highest.max(Some(id));
        }
    })?;

    let id = highest.map_or(SessionId::FIRST, SessionId::next);
    info!("Allocated unsynced session {}", id);
    Ok(id)
}
