//! # 目录索引
//!
//! 每个目录恰好拥有一个数据块。子项以 [`DirEntry`] 记录的形式
//! 按插入顺序从第 0 字节起紧密排列，目录索引节点的 `child_count`
//! 表明其中有几条有效：超出部分即使看起来像记录，也是垃圾数据。
//!
//! 记录从不删除也不重排，因此块内的字节偏移在目录的整个生命周期中
//! 都是稳定的枚举游标。

use alloc::vec::Vec;

use block_dev::BlockDevice;

use crate::block::Block;
use crate::inode_table::InodeTable;
use crate::layout::{DirEntry, Inode, InodeKind, InodeNumber, validate_name};
use crate::{Error, MAX_DIR_ENTRIES, Result};

#[derive(Debug, Default)]
pub struct DirIndex;

impl DirIndex {
    /// Records one directory block holds
    pub const CAPACITY: usize = MAX_DIR_ENTRIES;

    /// Appends `(name, child)` to `parent` and saves `parent` with its new
    /// child count.
    ///
    /// Duplicate names are not rejected. A full directory fails with
    /// [`Error::DirectoryFull`] before anything is written.
    pub fn append(
        &mut self,
        block_device: &dyn BlockDevice,
        inode_table: &mut InodeTable,
        parent: &mut Inode,
        name: &str,
        child: InodeNumber,
    ) -> Result<()> {
        let child_count = Self::valid_records(parent)?;
        if child_count >= Self::CAPACITY {
            log::warn!("directory {} is full", parent.ino);
            return Err(Error::DirectoryFull);
        }
        let entry = DirEntry::new(name, child)?;

        let mut block = Block::read(block_device, parent.data_block)?;
        block.put(child_count * DirEntry::SIZE, &entry)?;
        block.write(block_device)?;

        let mut updated = *parent;
        updated.kind = InodeKind::Directory {
            child_count: child_count as u64 + 1,
        };
        inode_table.save(block_device, &updated)?;
        *parent = updated;

        Ok(())
    }

    /// Inode number of the first record in `parent` named `name`.
    pub fn find(
        &self,
        block_device: &dyn BlockDevice,
        parent: &Inode,
        name: &str,
    ) -> Result<InodeNumber> {
        validate_name(name)?;
        let child_count = Self::valid_records(parent)?;
        let block = Block::read(block_device, parent.data_block)?;

        for index in 0..child_count {
            let entry: DirEntry = block.get(index * DirEntry::SIZE)?;
            if entry.matches(name) {
                return Ok(entry.inode());
            }
        }

        Err(Error::NotFound)
    }

    /// The record at byte offset `cursor` and the cursor of the one after it,
    /// or `None` once `cursor` is past the last valid record.
    pub fn enumerate(
        &self,
        block_device: &dyn BlockDevice,
        parent: &Inode,
        cursor: u64,
    ) -> Result<Option<(DirEntry, u64)>> {
        let child_count = Self::valid_records(parent)? as u64;
        let record_size = DirEntry::SIZE as u64;
        if cursor % record_size != 0 {
            return Err(Error::InvalidArgument);
        }
        if cursor / record_size >= child_count {
            return Ok(None);
        }

        let block = Block::read(block_device, parent.data_block)?;
        let entry = block.get(cursor as usize)?;
        Ok(Some((entry, cursor + record_size)))
    }

    /// Every valid record of `parent`, in storage order.
    pub fn entries(&self, block_device: &dyn BlockDevice, parent: &Inode) -> Result<Vec<DirEntry>> {
        let child_count = Self::valid_records(parent)?;
        let block = Block::read(block_device, parent.data_block)?;

        (0..child_count)
            .map(|index| block.get(index * DirEntry::SIZE))
            .collect()
    }
}

impl DirIndex {
    fn valid_records(parent: &Inode) -> Result<usize> {
        let child_count = parent.child_count().ok_or(Error::NotADirectory)?;
        if child_count > Self::CAPACITY as u64 {
            log::error!("directory {} claims {child_count} children", parent.ino);
            return Err(Error::corrupt(
                parent.data_block,
                "child count exceeds one block of records",
            ));
        }
        Ok(child_count as usize)
    }
}
