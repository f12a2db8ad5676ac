#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use tomofs::{BLOCK_SIZE, BlockDevice, Clock, DeviceError, TomoFileSystem, Timestamp};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A device kept entirely in memory.
pub struct RamDisk {
    data: Mutex<Vec<u8>>,
    num_blocks: usize,
    writes: AtomicUsize,
}

impl RamDisk {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            data: Mutex::new(vec![0; num_blocks * BLOCK_SIZE]),
            num_blocks,
            writes: AtomicUsize::new(0),
        }
    }

    /// Copy of the whole device.
    pub fn snapshot(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub fn block(&self, block_id: usize) -> Vec<u8> {
        let start = block_id * BLOCK_SIZE;
        self.data.lock().unwrap()[start..start + BLOCK_SIZE].to_vec()
    }

    /// Overwrites bytes at `offset` inside block `block_id`, bypassing the
    /// write counter.
    pub fn patch(&self, block_id: usize, offset: usize, bytes: &[u8]) {
        let start = block_id * BLOCK_SIZE + offset;
        self.data.lock().unwrap()[start..start + bytes.len()].copy_from_slice(bytes);
    }

    /// Block writes seen so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        if block_id >= self.num_blocks {
            return Err(DeviceError::OutOfRange);
        }
        if buf.len() != BLOCK_SIZE {
            return Err(DeviceError::ShortTransfer);
        }
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&self.data.lock().unwrap()[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if block_id >= self.num_blocks {
            return Err(DeviceError::OutOfRange);
        }
        if buf.len() != BLOCK_SIZE {
            return Err(DeviceError::ShortTransfer);
        }
        let start = block_id * BLOCK_SIZE;
        self.data.lock().unwrap()[start..start + BLOCK_SIZE].copy_from_slice(buf);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn num_blocks(&self) -> usize {
        self.num_blocks
    }
}

/// A [`RamDisk`] whose writes can be held back, to keep an operation parked
/// while it owns the filesystem locks.
pub struct GatedDisk {
    inner: RamDisk,
    closed: Mutex<bool>,
    opened: Condvar,
    parked: AtomicBool,
}

impl GatedDisk {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            inner: RamDisk::new(num_blocks),
            closed: Mutex::new(false),
            opened: Condvar::new(),
            parked: AtomicBool::new(false),
        }
    }

    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn open(&self) {
        *self.closed.lock().unwrap() = false;
        self.opened.notify_all();
    }

    /// Whether some writer has hit the closed gate.
    pub fn has_parked_writer(&self) -> bool {
        self.parked.load(Ordering::SeqCst)
    }
}

impl BlockDevice for GatedDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        let mut closed = self.closed.lock().unwrap();
        while *closed {
            self.parked.store(true, Ordering::SeqCst);
            closed = self.opened.wait(closed).unwrap();
        }
        drop(closed);
        self.inner.write_block(block_id, buf)
    }

    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }
}

/// A [`RamDisk`] that can be told to fail every write to one block.
pub struct FaultyDisk {
    inner: RamDisk,
    failing: AtomicUsize,
}

impl FaultyDisk {
    const HEALTHY: usize = usize::MAX;

    pub fn new(num_blocks: usize) -> Self {
        Self {
            inner: RamDisk::new(num_blocks),
            failing: AtomicUsize::new(Self::HEALTHY),
        }
    }

    pub fn fail_writes_to(&self, block_id: u64) {
        self.failing.store(block_id as usize, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.failing.store(Self::HEALTHY, Ordering::SeqCst);
    }

    pub fn block(&self, block_id: usize) -> Vec<u8> {
        self.inner.block(block_id)
    }
}

impl BlockDevice for FaultyDisk {
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.inner.read_block(block_id, buf)
    }

    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError> {
        if block_id == self.failing.load(Ordering::SeqCst) {
            return Err(DeviceError::Io);
        }
        self.inner.write_block(block_id, buf)
    }

    fn num_blocks(&self) -> usize {
        self.inner.num_blocks()
    }
}

/// Always reports the same instant.
pub struct FixedClock(pub Timestamp);

impl Clock for FixedClock {
    fn now(&self) -> Timestamp {
        self.0
    }
}

/// A freshly formatted RAM disk of `num_blocks` blocks.
pub fn formatted(num_blocks: usize) -> (Arc<RamDisk>, TomoFileSystem) {
    init_logger();
    let disk = Arc::new(RamDisk::new(num_blocks));
    let fs = TomoFileSystem::format(disk.clone(), Arc::new(FixedClock(0))).unwrap();
    (disk, fs)
}
