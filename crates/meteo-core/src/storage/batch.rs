use log::info;
use thiserror_no_std::Error;

use super::{
    FileName, FilePrefix, SessionId, Storage, StorageError, allocate_session, batch_file_name, csv,
};
use crate::retained::{RingBuffer, SyncState};

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushError {
    #[error("no unsynced session id: {0}")]
    Session(StorageError),
    #[error("write failed: {0}")]
    Storage(#[from] StorageError),
}

/// The session id of the current unsynced run, allocating one from
/// `storage` the first time it is needed.
pub fn ensure_session<S: Storage>(
    storage: &mut S,
    sync: &mut SyncState,
) -> Result<SessionId, StorageError> {
    if let Some(id) = sync.session {
        return Ok(id);
    }
    let id = allocate_session(storage)?;
    sync.session = Some(id);
    Ok(id)
}

/// Write every slot of `readings` to a new batch file named after the sync
/// state and `epoch_secs`.
pub fn flush_batch<S: Storage, const N: usize>(
    storage: &mut S,
    readings: &RingBuffer<N>,
    sync: &mut SyncState,
    epoch_secs: u64,
) -> Result<FileName, FlushError> {
    let prefix = if sync.synced {
        FilePrefix::Synced
    } else {
        FilePrefix::Unsynced(ensure_session(storage, sync).map_err(FlushError::Session)?)
    };

    let name = batch_file_name(prefix, epoch_secs)?;
    let contents = csv::encode_batch(readings.samples());
    storage.write_file(&name, contents.as_bytes())?;

    info!("Flushed {} readings ({} bytes) to {}", N, contents.len(), name);
    Ok(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryStorage;
    use crate::sample::Sample;
    use core::time::Duration;

    fn full_ring() -> RingBuffer<3> {
        let mut ring = RingBuffer::new();
        for eco2 in [400, 410, 420] {
            let mut sample = Sample::EMPTY;
            sample.air.eco2_ppm = eco2;
            ring.push(sample);
        }
        ring
    }

    #[test]
    fn test_synced_flush_writes_all_rows() {
        let mut storage = MemoryStorage::default();
        let mut sync = SyncState::unsynced();
        sync.mark_synced(Duration::from_secs(1_000));

        let name = flush_batch(&mut storage, &full_ring(), &mut sync, 1_045).unwrap();
        assert_eq!(name, "sync_1045.csv");

        let rows = csv::decode_batch(storage.file("sync_1045.csv").unwrap()).unwrap();
        let eco2: alloc::vec::Vec<u16> = rows.iter().map(|s| s.air.eco2_ppm).collect();
        assert_eq!(eco2, [400, 410, 420]);
    }

    #[test]
    fn test_unsynced_flushes_share_a_session() {
        let mut storage = MemoryStorage::with_files(&["nosync_2_10.csv"]);
        let mut sync = SyncState::unsynced();
        let ring = full_ring();

        assert_eq!(
            flush_batch(&mut storage, &ring, &mut sync, 100).unwrap(),
            "nosync_3_100.csv"
        );
        assert_eq!(
            flush_batch(&mut storage, &ring, &mut sync, 145).unwrap(),
            "nosync_3_145.csv"
        );
        assert_eq!(sync.session, Some(SessionId(3)));
    }

    #[test]
    fn test_write_failure_is_reported() {
        let mut storage = MemoryStorage::default();
        storage.fail_writes = true;
        let mut sync = SyncState::unsynced();
        sync.session = Some(SessionId(1));
        assert!(matches!(
            flush_batch(&mut storage, &full_ring(), &mut sync, 1),
            Err(FlushError::Storage(_))
        ));
    }
}
