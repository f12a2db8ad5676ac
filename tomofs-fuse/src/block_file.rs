use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Mutex;

use block_dev::{BlockDevice, DeviceError};
use tomofs::BLOCK_SIZE;

/// A disk image or device node addressed in tomofs blocks.
#[derive(Debug)]
pub struct BlockFile {
    file: Mutex<File>,
    num_blocks: usize,
}

impl BlockFile {
    /// Opens an existing image; a trailing partial block is ignored.
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let num_blocks = (file.metadata()?.len() / BLOCK_SIZE as u64) as usize;
        Ok(Self {
            file: Mutex::new(file),
            num_blocks,
        })
    }

    /// Creates an image of `num_blocks` blocks, or resizes the one at `path`.
    pub fn create(path: &Path, num_blocks: u64) -> io::Result<Self> {
        let too_large = || {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("{num_blocks} blocks do not fit in an image"),
            )
        };
        let len = num_blocks
            .checked_mul(BLOCK_SIZE as u64)
            .ok_or_else(too_large)?;
        let addressable = usize::try_from(num_blocks)
            .ok()
            .filter(|blocks| blocks.checked_mul(BLOCK_SIZE).is_some())
            .ok_or_else(too_large)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.set_len(len)?;
        Ok(Self {
            file: Mutex::new(file),
            num_blocks: addressable,
        })
    }

    fn seek_to(&self, file: &mut File, block_id: usize) -> Result<(), DeviceError> {
        if block_id >= self.num_blocks {
            return Err(DeviceError::OutOfRange);
        }
        file.seek(SeekFrom::Start((block_id * BLOCK_SIZE) as u64))
            .map_err(|err| io_error(block_id, err))?;
        Ok(())
    }
}

impl BlockDevice for BlockFile {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        let mut file = self.file.lock().map_err(|_| DeviceError::Io)?;
        self.seek_to(&mut file, block_id)?;
        file.read_exact(buf).map_err(|err| io_error(block_id, err))
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let mut file = self.file.lock().map_err(|_| DeviceError::Io)?;
        self.seek_to(&mut file, block_id)?;
        file.write_all(buf).map_err(|err| io_error(block_id, err))
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn flush(&self) -> Result<(), DeviceError> {
        let file = self.file.lock().map_err(|_| DeviceError::Io)?;
        file.sync_all().map_err(|err| {
            log::error!("sync failed: {err}");
            DeviceError::Io
        })
    }
}

fn io_error(block_id: usize, err: io::Error) -> DeviceError {
    log::error!("block {block_id}: {err}");
    match err.kind() {
        ErrorKind::UnexpectedEof | ErrorKind::WriteZero => DeviceError::ShortTransfer,
        _ => DeviceError::Io,
    }
}
