//! # 块缓冲层
//!
//! [`Block`] 在单次操作期间把一个设备块保存在内存中：
//! 读入，就地解码或修改记录，再直接写回。
//! 操作结束后什么都不保留，所以每次修改都是直写的。

use alloc::boxed::Box;
use alloc::vec;

use block_dev::BlockDevice;

use crate::layout::Record;
use crate::{BLOCK_SIZE, Error, Result};

pub struct Block {
    /// Block number on the device
    id: u64,
    data: Box<[u8]>,
}

impl Block {
    pub fn read(block_device: &dyn BlockDevice, id: u64) -> Result<Self> {
        let mut block = Self::zeroed(id);
        block_device.read_block(block.index()?, &mut block.data)?;
        Ok(block)
    }

    #[inline]
    pub fn zeroed(id: u64) -> Self {
        Self {
            id,
            data: vec![0; BLOCK_SIZE].into(),
        }
    }

    pub fn write(&self, block_device: &dyn BlockDevice) -> Result<()> {
        block_device.write_block(self.index()?, &self.data)?;
        Ok(())
    }

    /// Decodes the record starting at byte `offset`.
    pub fn get<T: Record>(&self, offset: usize) -> Result<T> {
        let bytes = self.data.get(offset..offset + T::SIZE).ok_or(Error::InvalidArgument)?;
        T::decode(bytes).map_err(|err| {
            log::error!("block {}: undecodable record at {offset}: {err}", self.id);
            Error::corrupt(self.id, "undecodable record")
        })
    }

    /// Encodes `record` over the bytes starting at `offset`. Only the buffer
    /// changes; [`Block::write`] persists it.
    pub fn put<T: Record>(&mut self, offset: usize, record: &T) -> Result<()> {
        let id = self.id;
        let bytes = self
            .data
            .get_mut(offset..offset + T::SIZE)
            .ok_or(Error::InvalidArgument)?;
        record.encode(bytes).map_err(|err| {
            log::error!("block {id}: failed to encode record at {offset}: {err}");
            Error::InvalidArgument
        })
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn index(&self) -> Result<usize> {
        usize::try_from(self.id).map_err(|_| Error::Device(block_dev::DeviceError::OutOfRange))
    }
}
