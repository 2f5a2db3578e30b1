//! Batch files on a FAT formatted SD card.
//!
//! FAT without long file name support only stores 8.3 names, so each logical
//! batch name is mapped onto a [`ShortPath`]: one directory per naming scheme
//! and the epoch in hex as the file name.

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;
use embedded_sdmmc::{
    Error as SdError, Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx, VolumeManager,
};
use log::{debug, info, warn};
use meteo_core::storage::{ShortPath, Storage, StorageError};

/// Batch directories looked at when listing. Further ones are ignored.
const MAX_BATCH_DIRS: usize = 32;

type DirName = heapless::String<8>;

/// The card has no battery backed calendar; batch names carry the time.
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

pub struct SdStorage<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    volume_mgr: VolumeManager<SdCard<S, D>, FixedTimeSource, 4, 4, 1>,
    mounted: bool,
}

fn io_error(operation: &'static str) -> impl FnOnce(SdError<SdCardError>) -> StorageError {
    move |e| {
        warn!("SD {} failed: {:?}", operation, e);
        StorageError::Io {
            operation,
            details: "SD card error",
        }
    }
}

fn utf8(bytes: &[u8]) -> Option<&str> {
    core::str::from_utf8(bytes).ok().map(str::trim)
}

impl<S, D> SdStorage<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    pub fn new(spi: S, delay: D) -> Self {
        Self {
            volume_mgr: VolumeManager::new(SdCard::new(spi, delay), FixedTimeSource),
            mounted: false,
        }
    }

    fn require_mounted(&self) -> Result<(), StorageError> {
        if self.mounted {
            Ok(())
        } else {
            Err(StorageError::NotMounted)
        }
    }
}

impl<S, D> Storage for SdStorage<S, D>
where
    S: SpiDevice<u8>,
    D: DelayNs,
{
    fn mount(&mut self) -> Result<(), StorageError> {
        self.mounted = false;

        let volume = self.volume_mgr.open_volume(VolumeIdx(0)).map_err(|e| {
            warn!("SD mount failed: {:?}", e);
            StorageError::Mount("no FAT volume on card")
        })?;
        volume.close().map_err(io_error("close volume"))?;

        self.mounted = true;
        info!("SD card mounted");
        Ok(())
    }

    fn list_files<F>(&mut self, prefix: &str, mut visit: F) -> Result<(), StorageError>
    where
        F: FnMut(&str),
    {
        self.require_mounted()?;

        let volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(io_error("open volume"))?;
        let root = volume.open_root_dir().map_err(io_error("open root"))?;

        // A directory cannot be opened while its parent is being iterated.
        let mut dirs: heapless::Vec<DirName, MAX_BATCH_DIRS> = heapless::Vec::new();
        root.iterate_dir(|entry| {
            if !entry.attributes.is_directory() {
                return;
            }
            let Some(name) = utf8(entry.name.base_name()) else {
                return;
            };
            if ShortPath::dir_prefix(name).is_some() {
                let mut dir = DirName::new();
                if dir.push_str(name).is_err() || dirs.push(dir).is_err() {
                    warn!("Skipping batch directory {}", name);
                }
            }
        })
        .map_err(io_error("list root"))?;

        for dir_name in &dirs {
            let dir = root
                .open_dir(dir_name.as_str())
                .map_err(io_error("open directory"))?;
            dir.iterate_dir(|entry| {
                if entry.attributes.is_directory() {
                    return;
                }
                let (Some(stem), Some(extension)) =
                    (utf8(entry.name.base_name()), utf8(entry.name.extension()))
                else {
                    return;
                };
                if let Some(logical) = ShortPath::to_logical(dir_name, stem, extension) {
                    if logical.starts_with(prefix) {
                        visit(&logical);
                    }
                }
            })
            .map_err(io_error("list directory"))?;
            dir.close().map_err(io_error("close directory"))?;
        }

        root.close().map_err(io_error("close root"))?;
        volume.close().map_err(io_error("close volume"))?;
        Ok(())
    }

    fn write_file(&mut self, name: &str, contents: &[u8]) -> Result<(), StorageError> {
        self.require_mounted()?;
        let path = ShortPath::from_logical(name)?;

        let mut file_name: heapless::String<12> = heapless::String::new();
        write!(file_name, "{}.{}", path.stem, ShortPath::EXTENSION)
            .map_err(|_| StorageError::InvalidName)?;

        let volume = self
            .volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(io_error("open volume"))?;
        let root = volume.open_root_dir().map_err(io_error("open root"))?;

        let dir = match root.open_dir(path.dir.as_str()) {
            Ok(dir) => dir,
            Err(SdError::NotFound) => {
                debug!("Creating directory {}", path.dir);
                root.make_dir_in_dir(path.dir.as_str())
                    .map_err(io_error("create directory"))?;
                root.open_dir(path.dir.as_str())
                    .map_err(io_error("open directory"))?
            }
            Err(e) => return Err(io_error("open directory")(e)),
        };

        let file = dir
            .open_file_in_dir(file_name.as_str(), Mode::ReadWriteCreateOrTruncate)
            .map_err(io_error("open file"))?;
        file.write(contents).map_err(io_error("write file"))?;
        file.close().map_err(io_error("close file"))?;

        dir.close().map_err(io_error("close directory"))?;
        root.close().map_err(io_error("close root"))?;
        volume.close().map_err(io_error("close volume"))?;

        info!("Wrote {} as {}/{}", name, path.dir, file_name);
        Ok(())
    }
}
