//! Host-side tooling for tomofs images: a file-backed block device, a wall
//! clock, and copying host files into a fresh image.

mod block_file;

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use enumflags2::BitFlags;
use tomofs::{
    BLOCK_SIZE, CancelToken, Clock, FileType, InodeNumber, Permission, Timestamp, TomoFileSystem,
};

pub use self::block_file::BlockFile;

/// Seconds since the Unix epoch.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs())
    }
}

/// Copies the regular files of `source` into the root directory, in name
/// order, and returns what was created.
///
/// Files larger than one block and names that are not UTF-8 are skipped.
pub fn populate(
    fs: &TomoFileSystem,
    source: &Path,
    mode: BitFlags<Permission>,
) -> io::Result<Vec<(String, InodeNumber)>> {
    let cx = CancelToken::new();

    let mut entries = fs::read_dir(source)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut copied = Vec::new();
    for entry in entries {
        if !entry.file_type()?.is_file() {
            log::debug!("skipping {:?}: not a regular file", entry.path());
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            log::warn!("skipping {:?}: name is not UTF-8", entry.path());
            continue;
        };
        let data = fs::read(entry.path())?;
        if data.len() > BLOCK_SIZE {
            log::warn!("skipping {name:?}: {} bytes do not fit one block", data.len());
            continue;
        }

        let ino = fs
            .create_entry_with_mode(&cx, fs.root(), &name, FileType::File, mode)
            .map_err(io::Error::other)?;
        fs.write_at(&cx, ino, 0, &data).map_err(io::Error::other)?;

        log::info!("{name:?} -> inode {ino}, {} bytes", data.len());
        copied.push((name, ino));
    }

    Ok(copied)
}
