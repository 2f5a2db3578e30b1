//! Mapping between logical batch names and FAT 8.3 paths.
//!
//! `sync_<epoch>.csv` is stored as `SYNC/<EPOCH>.CSV` and
//! `nosync_<id>_<epoch>.csv` as `NS<id>/<EPOCH>.CSV`, with the epoch written
//! as eight upper-case hex digits.

use core::fmt::Write;

use super::{
    EXTENSION, FileName, FilePrefix, SYNCED_PREFIX, SessionId, StorageError, UNSYNCED_PREFIX,
    batch_file_name,
};

pub const SYNCED_DIR: &str = "SYNC";
const SESSION_DIR_PREFIX: &str = "NS";
const SHORT_EXTENSION: &str = "CSV";

/// Largest session id that still fits an 8 character directory name.
pub const MAX_SHORT_SESSION: u32 = 999_999;

/// Directory and file name of a batch on a FAT volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortPath {
    pub dir: heapless::String<8>,
    /// Base name without the extension.
    pub stem: heapless::String<8>,
}

impl ShortPath {
    pub const EXTENSION: &'static str = SHORT_EXTENSION;

    pub fn from_logical(name: &str) -> Result<Self, StorageError> {
        let base = name
            .strip_suffix(EXTENSION)
            .ok_or(StorageError::InvalidName)?;

        let (prefix, epoch) = if let Some(epoch) = base.strip_prefix(SYNCED_PREFIX) {
            (FilePrefix::Synced, epoch)
        } else {
            let rest = base
                .strip_prefix(UNSYNCED_PREFIX)
                .ok_or(StorageError::InvalidName)?;
            let (session, epoch) = rest.split_once('_').ok_or(StorageError::InvalidName)?;
            let session = parse_decimal(session).ok_or(StorageError::InvalidName)?;
            (FilePrefix::Unsynced(SessionId(session)), epoch)
        };
        let epoch = parse_decimal(epoch).ok_or(StorageError::InvalidName)?;

        let mut dir = heapless::String::new();
        match prefix {
            FilePrefix::Synced => dir.push_str(SYNCED_DIR).map_err(|_| StorageError::InvalidName)?,
            FilePrefix::Unsynced(SessionId(id)) if id <= MAX_SHORT_SESSION => {
                write!(dir, "{SESSION_DIR_PREFIX}{id}").map_err(|_| StorageError::InvalidName)?
            }
            FilePrefix::Unsynced(_) => return Err(StorageError::InvalidName),
        }

        let mut stem = heapless::String::new();
        write!(stem, "{epoch:08X}").map_err(|_| StorageError::InvalidName)?;
        Ok(Self { dir, stem })
    }

    /// Naming scheme of the files inside `dir`, if it holds batches.
    pub fn dir_prefix(dir: &str) -> Option<FilePrefix> {
        if dir.eq_ignore_ascii_case(SYNCED_DIR) {
            return Some(FilePrefix::Synced);
        }
        let digits = dir.get(..SESSION_DIR_PREFIX.len()).and_then(|head| {
            head.eq_ignore_ascii_case(SESSION_DIR_PREFIX)
                .then(|| &dir[SESSION_DIR_PREFIX.len()..])
        })?;
        parse_decimal(digits).map(|id| FilePrefix::Unsynced(SessionId(id)))
    }

    /// Logical name of the file `stem`.`extension` in `dir`.
    pub fn to_logical(dir: &str, stem: &str, extension: &str) -> Option<FileName> {
        if !extension.eq_ignore_ascii_case(SHORT_EXTENSION) || stem.is_empty() || stem.len() > 8 {
            return None;
        }
        let prefix = Self::dir_prefix(dir)?;
        let epoch = u32::from_str_radix(stem, 16).ok()?;
        batch_file_name(prefix, u64::from(epoch)).ok()
    }
}

fn parse_decimal(digits: &str) -> Option<u32> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synced_name() {
        let path = ShortPath::from_logical("sync_1700000000.csv").unwrap();
        assert_eq!(path.dir, "SYNC");
        assert_eq!(path.stem, "6553F100");
        assert_eq!(
            ShortPath::to_logical("SYNC", "6553F100", "CSV").unwrap(),
            "sync_1700000000.csv"
        );
    }

    #[test]
    fn test_unsynced_name() {
        let path = ShortPath::from_logical("nosync_42_3600.csv").unwrap();
        assert_eq!(path.dir, "NS42");
        assert_eq!(path.stem, "00000E10");
        assert_eq!(
            ShortPath::to_logical("NS42", "00000E10", "CSV").unwrap(),
            "nosync_42_3600.csv"
        );
    }

    #[test]
    fn test_rejects_unrepresentable_names() {
        assert!(ShortPath::from_logical("notes.txt").is_err());
        assert!(ShortPath::from_logical("sync_.csv").is_err());
        assert!(ShortPath::from_logical("nosync_1000000_5.csv").is_err());
        assert!(ShortPath::from_logical("sync_4294967296.csv").is_err());
    }

    #[test]
    fn test_foreign_directories_are_skipped() {
        assert_eq!(ShortPath::dir_prefix("SYSTEM~1"), None);
        assert_eq!(ShortPath::dir_prefix("NS"), None);
        assert_eq!(
            ShortPath::dir_prefix("ns7"),
            Some(FilePrefix::Unsynced(SessionId(7)))
        );
        assert_eq!(ShortPath::to_logical("SYNC", "README", "TXT"), None);
    }
}
