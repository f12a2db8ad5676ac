//! # 块设备接口层
//!
//! 块设备是以**块**为单位存储数据的设备，例如磁盘、SD 卡、镜像文件；
//! [`BlockDevice`] 就是对读写块设备的抽象，
//! 实现了此特质的类型称为**块设备驱动**。
//!
//! 建立在此 crate 之上的文件系统以自己的块大小寻址设备，
//! 传给驱动的每个缓冲区都恰好是一个块长。

#![no_std]

use core::any::Any;

/// Failure reported by a block device driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The block id lies beyond the end of the device.
    OutOfRange,
    /// The driver moved fewer bytes than one block.
    ShortTransfer,
    /// Any other failure of the underlying medium.
    Io,
}

/// Block device driver trait.
pub trait BlockDevice: Send + Sync + Any {
    /// Reads block `block_id` into `buf`.
    fn read_block(&self, block_id: usize, buf: &mut [u8]) -> Result<(), DeviceError>;

    /// Writes `buf` to block `block_id`.
    fn write_block(&self, block_id: usize, buf: &[u8]) -> Result<(), DeviceError>;

    /// Number of blocks the device holds.
    fn num_blocks(&self) -> usize;

    /// Pushes written blocks down to stable storage.
    fn flush(&self) -> Result<(), DeviceError> {
        Ok(())
    }
}
