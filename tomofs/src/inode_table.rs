//! # 索引节点表
//!
//! 由 [`DiskInode`] 槽组成的一个块，按索引节点号直接寻址。
//! 槽 0 存放哨兵，每次载入该块时都会检查；槽 1 是根目录。
//!
//! 对表的每次写入都同时持有索引节点表锁与目录索引锁，
//! 因此持有其中任意一把即可读表，[`read_inode`] 就是为此准备的。

use block_dev::BlockDevice;
use crate::block::Block;
use crate::layout::{DiskInode, Inode, InodeNumber, SuperBlock};
use crate::{Error, MAX_INODES, Result, superblock};

#[derive(Debug)]
pub struct InodeTable {
    block_id: u64,
}

impl InodeTable {
    /// Slots in the table, sentinel included
    pub const CAPACITY: usize = MAX_INODES;

    /// Opens the table at `block_id`, verifying the sentinel.
    pub fn open(block_device: &dyn BlockDevice, block_id: u64) -> Result<Self> {
        load(block_device, block_id)?;
        Ok(Self { block_id })
    }

    /// Writes a fresh table holding only the sentinel and `root`.
    pub fn init(block_device: &dyn BlockDevice, block_id: u64, root: &Inode) -> Result<Self> {
        let mut block = Block::zeroed(block_id);
        block.put(0, &DiskInode::sentinel())?;
        block.put(Self::offset(root.ino), &DiskInode::from(root))?;
        block.write(block_device)?;

        Ok(Self { block_id })
    }

    /// Whether `super_block` still counts a free slot.
    #[inline]
    pub fn has_free_slot(super_block: &SuperBlock) -> bool {
        super_block.inode_count < (Self::CAPACITY - 1) as u64
    }

    /// Claims the first unused slot for `template` and counts it in
    /// `super_block`.
    ///
    /// The slot is written as `template` renumbered to the claimed slot, so a
    /// claimed slot never points at a block the caller has not yet reserved.
    /// Table block and superblock are both on disk when this returns.
    pub fn allocate_slot(
        &mut self,
        block_device: &dyn BlockDevice,
        super_block: &mut SuperBlock,
        template: &Inode,
    ) -> Result<InodeNumber> {
        if !Self::has_free_slot(super_block) {
            log::warn!("all {} inodes in use", super_block.inode_count);
            return Err(Error::OutOfInodes);
        }

        let mut block = load(block_device, self.block_id)?;
        for raw in 1..Self::CAPACITY as u32 {
            let ino = InodeNumber::new(raw);
            let slot: DiskInode = block.get(Self::offset(ino))?;
            if slot.is_used() {
                continue;
            }

            let inode = Inode { ino, ..*template };
            block.put(Self::offset(ino), &DiskInode::from(&inode))?;
            block.write(block_device)?;

            let mut updated = super_block.clone();
            updated.inode_count += 1;
            superblock::sync(block_device, &updated)?;
            *super_block = updated;

            log::debug!("allocated inode {ino}, data block {}", inode.data_block);
            return Ok(ino);
        }

        log::warn!(
            "inode table full while superblock counts {} inodes",
            super_block.inode_count
        );
        Err(Error::OutOfInodes)
    }

    /// Reads a copy of inode `ino`.
    ///
    /// The sentinel, numbers past the table and unused slots are all
    /// [`Error::NotFound`].
    pub fn read(&self, block_device: &dyn BlockDevice, ino: InodeNumber) -> Result<Inode> {
        read_inode(block_device, self.block_id, ino)
    }

    /// Overwrites the slot of `inode.ino`.
    ///
    /// Whether the slot was ever allocated is not checked: only save inodes
    /// numbered by [`InodeTable::allocate_slot`] or read back with
    /// [`InodeTable::read`].
    pub fn save(&mut self, block_device: &dyn BlockDevice, inode: &Inode) -> Result<()> {
        if !Self::addressable(inode.ino) {
            return Err(Error::InvalidArgument);
        }
        let mut block = load(block_device, self.block_id)?;
        block.put(Self::offset(inode.ino), &DiskInode::from(inode))?;
        block.write(block_device)
    }

    #[inline]
    pub fn block_id(&self) -> u64 {
        self.block_id
    }
}

impl InodeTable {
    #[inline]
    fn offset(ino: InodeNumber) -> usize {
        ino.slot() * DiskInode::SIZE
    }

    #[inline]
    fn addressable(ino: InodeNumber) -> bool {
        ino != InodeNumber::SENTINEL && ino.slot() < Self::CAPACITY
    }
}

/// Reads inode `ino` from the table at `block_id`, for callers that hold the
/// directory index lock instead of an [`InodeTable`].
pub fn read_inode(
    block_device: &dyn BlockDevice,
    block_id: u64,
    ino: InodeNumber,
) -> Result<Inode> {
    if !InodeTable::addressable(ino) {
        return Err(Error::NotFound);
    }
    let block = load(block_device, block_id)?;
    let slot: DiskInode = block.get(InodeTable::offset(ino))?;
    slot.to_inode(ino, block_id)?.ok_or(Error::NotFound)
}

/// Reads the table block and checks the sentinel slot.
fn load(block_device: &dyn BlockDevice, block_id: u64) -> Result<Block> {
    let block = Block::read(block_device, block_id)?;
    let sentinel: DiskInode = block.get(0)?;
    if !sentinel.is_sentinel() {
        log::error!("inode table sentinel damaged: {sentinel:?}");
        return Err(Error::corrupt(block_id, "sentinel slot overwritten"));
    }
    Ok(block)
}
