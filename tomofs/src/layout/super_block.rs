use binrw::binrw;

use crate::{BLOCK_SIZE, EXTENT_BLOCK_ID, INODE_TABLE_BLOCK_ID, MAGIC};

/// Superblock:
/// - identifies a tomofs image;
/// - locates the free extent and the inode table;
/// - counts allocated inodes.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperBlock {
    /// Magic number: checked on every mount
    magic: u32,
    pub block_size: u32,
    /// Blocks on the device at format time
    pub total_blocks: u64,
    /// Block holding the free extent record
    pub extent_block: u64,
    pub inode_table_block: u64,
    /// Allocated inodes, root included, sentinel excluded
    pub inode_count: u64,
    _reserved: u64,
}

impl SuperBlock {
    pub const SIZE: usize = 48;

    /// The superblock of a freshly formatted device: only the root is allocated.
    pub fn new(total_blocks: u64) -> Self {
        Self {
            magic: MAGIC,
            block_size: BLOCK_SIZE as u32,
            total_blocks,
            extent_block: EXTENT_BLOCK_ID,
            inode_table_block: INODE_TABLE_BLOCK_ID,
            inode_count: 1,
            _reserved: 0,
        }
    }

    #[inline]
    pub fn magic(&self) -> u32 {
        self.magic
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.magic == MAGIC
    }
}
