//! # 并发协调层
//!
//! 三把自旋锁，每种元数据结构一把，获取顺序恒为
//! 超级块 → 索引节点表 → 目录索引。路径可以跳过某一级，但绝不回头。
//! 每个守卫组合按由内到外的顺序声明字段，
//! 因此析构时按获取的逆序释放。
//!
//! 等锁是操作唯一会阻塞的地方，每次自旋都会检查调用方的 [`CancelToken`]。

use spin::{Mutex, MutexGuard};

use crate::allocator::BlockAllocator;
use crate::dir_index::DirIndex;
use crate::inode_table::InodeTable;
use crate::layout::SuperBlock;
use crate::{CancelToken, Result};

/// What the superblock lock protects: the record itself and the free extent.
#[derive(Debug)]
pub struct SuperBlockState {
    pub super_block: SuperBlock,
    pub allocator: BlockAllocator,
}

pub struct Coordinator {
    superblock: Mutex<SuperBlockState>,
    inodes: Mutex<InodeTable>,
    dirs: Mutex<DirIndex>,
}

/// All three locks.
pub struct Exclusive<'a> {
    pub dirs: MutexGuard<'a, DirIndex>,
    pub inodes: MutexGuard<'a, InodeTable>,
    pub sb: MutexGuard<'a, SuperBlockState>,
}

/// Inode table and directory index. The directory index is only held, so
/// lookups never see the table mid-write.
pub struct TableAndDirs<'a> {
    _dirs: MutexGuard<'a, DirIndex>,
    pub inodes: MutexGuard<'a, InodeTable>,
}

impl Coordinator {
    pub fn new(superblock: SuperBlockState, inodes: InodeTable) -> Self {
        Self {
            superblock: Mutex::new(superblock),
            inodes: Mutex::new(inodes),
            dirs: Mutex::new(DirIndex),
        }
    }

    pub fn exclusive(&self, cx: &CancelToken) -> Result<Exclusive<'_>> {
        let sb = acquire(&self.superblock, cx)?;
        let inodes = acquire(&self.inodes, cx)?;
        let dirs = acquire(&self.dirs, cx)?;
        Ok(Exclusive { dirs, inodes, sb })
    }

    pub fn inodes_and_dirs(&self, cx: &CancelToken) -> Result<TableAndDirs<'_>> {
        let inodes = acquire(&self.inodes, cx)?;
        let dirs = acquire(&self.dirs, cx)?;
        Ok(TableAndDirs { _dirs: dirs, inodes })
    }

    pub fn superblock(&self, cx: &CancelToken) -> Result<MutexGuard<'_, SuperBlockState>> {
        acquire(&self.superblock, cx)
    }

    pub fn inodes(&self, cx: &CancelToken) -> Result<MutexGuard<'_, InodeTable>> {
        acquire(&self.inodes, cx)
    }

    pub fn dirs(&self, cx: &CancelToken) -> Result<MutexGuard<'_, DirIndex>> {
        acquire(&self.dirs, cx)
    }
}

/// Spins on `lock` until it is free or `cx` is cancelled.
fn acquire<'a, T>(lock: &'a Mutex<T>, cx: &CancelToken) -> Result<MutexGuard<'a, T>> {
    loop {
        cx.checkpoint()?;
        if let Some(guard) = lock.try_lock() {
            return Ok(guard);
        }
        core::hint::spin_loop();
    }
}
