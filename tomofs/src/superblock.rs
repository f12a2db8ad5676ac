//! # 超级块管理
//!
//! 在块 0 与内存之间搬运 [`SuperBlock`]。`load` 是挂载时的类型检查；
//! `sync` 在每次变更后重写整条记录。

use block_dev::BlockDevice;

use crate::block::Block;
use crate::layout::SuperBlock;
use crate::{
    BLOCK_SIZE, EXTENT_BLOCK_ID, Error, INODE_TABLE_BLOCK_ID, MAX_INODES, RESERVED_BLOCKS, Result,
    SUPER_BLOCK_ID,
};

/// Reads and validates block 0. Never writes to the device.
pub fn load(block_device: &dyn BlockDevice) -> Result<SuperBlock> {
    let block = Block::read(block_device, SUPER_BLOCK_ID)?;
    let super_block: SuperBlock = block.get(0)?;

    if !super_block.is_valid() {
        log::warn!("bad magic {:#x} in block 0", super_block.magic());
        return Err(Error::NotThisFilesystem);
    }
    if super_block.block_size as usize != BLOCK_SIZE {
        return Err(Error::corrupt(SUPER_BLOCK_ID, "unsupported block size"));
    }
    if super_block.extent_block != EXTENT_BLOCK_ID
        || super_block.inode_table_block != INODE_TABLE_BLOCK_ID
    {
        return Err(Error::corrupt(SUPER_BLOCK_ID, "unexpected metadata layout"));
    }
    if super_block.total_blocks < RESERVED_BLOCKS
        || super_block.total_blocks > block_device.num_blocks() as u64
    {
        return Err(Error::corrupt(SUPER_BLOCK_ID, "block count does not fit the device"));
    }
    if super_block.inode_count == 0 || super_block.inode_count >= MAX_INODES as u64 {
        return Err(Error::corrupt(SUPER_BLOCK_ID, "inode count out of range"));
    }

    Ok(super_block)
}

/// Rewrites block 0 with `super_block`.
pub fn sync(block_device: &dyn BlockDevice, super_block: &SuperBlock) -> Result<()> {
    let mut block = Block::zeroed(SUPER_BLOCK_ID);
    block.put(0, super_block)?;
    block.write(block_device)
}
