//! # 块分配器
//!
//! 整个空闲池就是一个 [`Extent`]。分配时把区段头部向后推、长度相应缩短；
//! 已分配的块**永不归还**。

use block_dev::BlockDevice;

use crate::block::Block;
use crate::layout::Extent;
use crate::{Error, RESERVED_BLOCKS, Result};

#[derive(Debug)]
pub struct BlockAllocator {
    /// Block holding the free extent record
    extent_block: u64,
    free: Extent,
}

impl BlockAllocator {
    /// Loads the free extent from `extent_block`; it must lie within the
    /// first `total_blocks` blocks.
    pub fn load(
        block_device: &dyn BlockDevice,
        extent_block: u64,
        total_blocks: u64,
    ) -> Result<Self> {
        let free: Extent = Block::read(block_device, extent_block)?.get(0)?;
        let in_range = free.head >= RESERVED_BLOCKS
            && free
                .head
                .checked_add(free.count)
                .is_some_and(|end| end <= total_blocks);
        if !in_range {
            log::error!("free extent {free:?} escapes a device of {total_blocks} blocks");
            return Err(Error::corrupt(extent_block, "free extent out of range"));
        }

        Ok(Self { extent_block, free })
    }

    /// Writes the initial free extent; used by format.
    pub fn init(block_device: &dyn BlockDevice, extent_block: u64, free: Extent) -> Result<Self> {
        let allocator = Self { extent_block, free };
        allocator.sync(block_device, &free)?;
        Ok(allocator)
    }

    /// Reserves `count` contiguous blocks.
    ///
    /// The shrunken free extent is on disk before the reservation is returned.
    pub fn allocate(&mut self, block_device: &dyn BlockDevice, count: u64) -> Result<Extent> {
        if count == 0 {
            return Err(Error::InvalidArgument);
        }
        if self.free.count < count {
            log::warn!("cannot allocate {count} blocks, {} left", self.free.count);
            return Err(Error::OutOfSpace);
        }

        let found = Extent::new(self.free.head, count);
        let rest = Extent::new(self.free.head + count, self.free.count - count);
        self.sync(block_device, &rest)?;
        self.free = rest;
        if rest.is_empty() {
            log::info!("free pool exhausted at block {}", rest.head);
        }

        Ok(found)
    }

    /// Fills every block of `extent` with zeros.
    pub fn zero(&self, block_device: &dyn BlockDevice, extent: Extent) -> Result<()> {
        for id in extent.blocks() {
            Block::zeroed(id).write(block_device)?;
        }
        Ok(())
    }

    /// Blocks still free.
    #[inline]
    pub fn remaining(&self) -> u64 {
        self.free.count
    }

    #[inline]
    pub fn free_extent(&self) -> Extent {
        self.free
    }

    fn sync(&self, block_device: &dyn BlockDevice, free: &Extent) -> Result<()> {
        let mut block = Block::zeroed(self.extent_block);
        block.put(0, free)?;
        block.write(block_device)
    }
}
