//! # 文件系统层
//!
//! [`TomoFileSystem`] 是宿主所面对的已挂载文件系统。路径由宿主自行解析；
//! 这里的每个调用都只处理某个父目录中的一个名字，
//! 而父目录已由宿主解析为索引节点号。
//! 父目录总是在协调器的锁下重新读取，宿主手中的过期副本不会落盘。

use alloc::sync::Arc;
use alloc::vec::Vec;

use block_dev::BlockDevice;
use enumflags2::BitFlags;

use crate::allocator::BlockAllocator;
use crate::block::Block;
use crate::dir_index::DirIndex;
use crate::inode_table::{self, InodeTable};
use crate::layout::{
    DirEntry, Extent, FileType, Inode, InodeKind, InodeNumber, Permission, SuperBlock,
    validate_name,
};
use crate::sync::{Coordinator, Exclusive, SuperBlockState};
use crate::{
    BLOCK_SIZE, CancelToken, EXTENT_BLOCK_ID, Error, INODE_TABLE_BLOCK_ID, MAX_INODES,
    RESERVED_BLOCKS, ROOT_DIR_BLOCK_ID, Result, Timestamp, superblock,
};

/// Where timestamps come from. The core never reads a clock of its own.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Stamps everything with 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroClock;

impl Clock for ZeroClock {
    #[inline]
    fn now(&self) -> Timestamp {
        0
    }
}

/// Space and inode usage, as reported by [`TomoFileSystem::stat_fs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FsStat {
    pub total_blocks: u64,
    pub free_blocks: u64,
    /// Allocated inodes, root included
    pub inode_count: u64,
    /// Inodes the table can ever hold, root included
    pub max_inodes: u64,
}

pub struct TomoFileSystem {
    block_device: Arc<dyn BlockDevice>,
    clock: Arc<dyn Clock>,
    inode_table_block: u64,
    total_blocks: u64,
    coordinator: Coordinator,
}

impl TomoFileSystem {
    /// Lays a fresh tomofs over the whole of `block_device` and returns it
    /// mounted.
    ///
    /// The superblock is written last, so an interrupted format does not leave
    /// a device that mounts.
    pub fn format(block_device: Arc<dyn BlockDevice>, clock: Arc<dyn Clock>) -> Result<Self> {
        let total_blocks = block_device.num_blocks() as u64;
        if total_blocks < RESERVED_BLOCKS {
            log::warn!("cannot format a device of {total_blocks} blocks");
            return Err(Error::DeviceTooSmall);
        }
        let device = &*block_device;

        Block::zeroed(ROOT_DIR_BLOCK_ID).write(device)?;
        let root = Inode::new(
            InodeNumber::ROOT,
            FileType::Directory,
            Permission::DIR_DEFAULT,
            ROOT_DIR_BLOCK_ID,
            clock.now(),
        );
        let inode_table = InodeTable::init(device, INODE_TABLE_BLOCK_ID, &root)?;
        let free = Extent::new(RESERVED_BLOCKS, total_blocks - RESERVED_BLOCKS);
        let allocator = BlockAllocator::init(device, EXTENT_BLOCK_ID, free)?;
        let super_block = SuperBlock::new(total_blocks);
        superblock::sync(device, &super_block)?;

        log::info!(
            "formatted tomofs: {total_blocks} blocks, free pool {}..{}",
            free.head,
            free.end()
        );

        Ok(Self {
            inode_table_block: inode_table.block_id(),
            total_blocks,
            coordinator: Coordinator::new(
                SuperBlockState {
                    super_block,
                    allocator,
                },
                inode_table,
            ),
            block_device,
            clock,
        })
    }

    /// Mounts with every timestamp set to 0.
    pub fn mount(block_device: Arc<dyn BlockDevice>) -> Result<Self> {
        Self::mount_with_clock(block_device, Arc::new(ZeroClock))
    }

    /// Validates the metadata on `block_device` and mounts it. Nothing is
    /// written, whether the mount succeeds or not.
    pub fn mount_with_clock(
        block_device: Arc<dyn BlockDevice>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let (super_block, allocator, inode_table) = Self::validate(&*block_device)
            .inspect_err(|err| log::warn!("mount refused: {err}"))?;

        log::info!(
            "mounted tomofs: {} blocks, {} free, {} inodes",
            super_block.total_blocks,
            allocator.remaining(),
            super_block.inode_count
        );

        Ok(Self {
            inode_table_block: inode_table.block_id(),
            total_blocks: super_block.total_blocks,
            coordinator: Coordinator::new(
                SuperBlockState {
                    super_block,
                    allocator,
                },
                inode_table,
            ),
            block_device,
            clock,
        })
    }

    /// Flushes the device and releases the filesystem.
    pub fn unmount(self) -> Result<()> {
        self.block_device.flush()?;
        log::info!("unmounted tomofs");
        Ok(())
    }

    #[inline]
    pub fn root(&self) -> InodeNumber {
        InodeNumber::ROOT
    }

    /// Creates `name` in directory `parent` with the default permissions of
    /// its type.
    pub fn create_entry(
        &self,
        cx: &CancelToken,
        parent: InodeNumber,
        name: &str,
        file_type: FileType,
    ) -> Result<InodeNumber> {
        let mode = match file_type {
            FileType::File => Permission::FILE_DEFAULT,
            FileType::Directory => Permission::DIR_DEFAULT,
        };
        self.create_entry_with_mode(cx, parent, name, file_type, mode)
    }

    /// Creates `name` in directory `parent`: a fresh inode owning one zeroed
    /// data block, recorded at the end of the parent's records.
    ///
    /// An existing child of the same name does not stop the creation. Every
    /// capacity check runs before the first write, so a failure leaves the
    /// disk as it was. The data block is reserved and zeroed before the inode
    /// slot is claimed, so a device error part way through can leak a block
    /// but never leaves an inode pointing outside the free pool. Cancellation
    /// is only observed while waiting for locks.
    pub fn create_entry_with_mode(
        &self,
        cx: &CancelToken,
        parent: InodeNumber,
        name: &str,
        file_type: FileType,
        mode: BitFlags<Permission>,
    ) -> Result<InodeNumber> {
        validate_name(name)?;
        let device = &*self.block_device;

        let mut locked = self.coordinator.exclusive(cx)?;
        let Exclusive { dirs, inodes, sb } = &mut locked;
        let SuperBlockState {
            super_block,
            allocator,
        } = &mut **sb;

        let mut parent = inodes.read(device, parent)?;
        self.check_data_block(&parent)?;
        let child_count = parent.child_count().ok_or(Error::NotADirectory)?;
        if child_count >= DirIndex::CAPACITY as u64 {
            log::warn!("directory {} is full", parent.ino);
            return Err(Error::DirectoryFull);
        }
        if allocator.remaining() == 0 {
            log::warn!("no block left for {name:?}");
            return Err(Error::OutOfSpace);
        }
        if !InodeTable::has_free_slot(super_block) {
            log::warn!("no inode left for {name:?}");
            return Err(Error::OutOfInodes);
        }

        let data = allocator.allocate(device, 1)?;
        allocator.zero(device, data)?;

        let now = self.clock.now();
        let template = Inode::new(InodeNumber::SENTINEL, file_type, mode, data.head, now);
        let ino = inodes.allocate_slot(device, super_block, &template)?;

        parent.mtime = now;
        parent.ctime = now;
        dirs.append(device, inodes, &mut parent, name, ino)?;

        log::debug!(
            "created {file_type:?} {name:?} as inode {ino} in {}, data block {}",
            parent.ino,
            data.head
        );
        Ok(ino)
    }

    /// Inode number of the first child of `parent` named `name`.
    pub fn find_entry(
        &self,
        cx: &CancelToken,
        parent: InodeNumber,
        name: &str,
    ) -> Result<InodeNumber> {
        validate_name(name)?;
        let device = &*self.block_device;

        let dirs = self.coordinator.dirs(cx)?;
        let parent = self.read_parent(parent)?;
        dirs.find(device, &parent, name)
    }

    /// The child record of `parent` at byte offset `cursor`, and the cursor
    /// of the next one. Start from 0; `None` marks the end.
    pub fn enumerate_entries(
        &self,
        cx: &CancelToken,
        parent: InodeNumber,
        cursor: u64,
    ) -> Result<Option<(DirEntry, u64)>> {
        let device = &*self.block_device;

        let dirs = self.coordinator.dirs(cx)?;
        let parent = self.read_parent(parent)?;
        dirs.enumerate(device, &parent, cursor)
    }

    /// All child records of `parent`, in creation order.
    pub fn read_dir(&self, cx: &CancelToken, parent: InodeNumber) -> Result<Vec<DirEntry>> {
        let device = &*self.block_device;

        let dirs = self.coordinator.dirs(cx)?;
        let parent = self.read_parent(parent)?;
        dirs.entries(device, &parent)
    }

    /// A copy of inode `ino`.
    pub fn read_inode(&self, cx: &CancelToken, ino: InodeNumber) -> Result<Inode> {
        let inodes = self.coordinator.inodes(cx)?;
        inodes.read(&*self.block_device, ino)
    }

    /// Reads file bytes starting at `offset` into `buf`. Returns how many were
    /// read, 0 at or past the end of the file.
    pub fn read_at(
        &self,
        cx: &CancelToken,
        ino: InodeNumber,
        offset: u64,
        buf: &mut [u8],
    ) -> Result<usize> {
        let device = &*self.block_device;

        let inodes = self.coordinator.inodes(cx)?;
        let inode = inodes.read(device, ino)?;
        let size = inode.byte_size().ok_or(Error::NotAFile)?;
        if size > BLOCK_SIZE as u64 {
            return Err(Error::corrupt(
                self.inode_table_block,
                "file larger than its data block",
            ));
        }
        self.check_data_block(&inode)?;
        if offset >= size {
            return Ok(0);
        }

        let start = offset as usize;
        let len = buf.len().min((size - offset) as usize);
        let block = Block::read(device, inode.data_block)?;
        buf[..len].copy_from_slice(&block.as_slice()[start..start + len]);

        Ok(len)
    }

    /// Writes `buf` into the file at `offset`, growing it if needed. A file
    /// never outgrows its one data block.
    pub fn write_at(
        &self,
        cx: &CancelToken,
        ino: InodeNumber,
        offset: u64,
        buf: &[u8],
    ) -> Result<usize> {
        let device = &*self.block_device;
        let end = offset
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= BLOCK_SIZE as u64)
            .ok_or(Error::FileTooLarge)?;

        // The directory lock is held too: lookups read the table under it alone.
        let mut locked = self.coordinator.inodes_and_dirs(cx)?;
        let mut inode = locked.inodes.read(device, ino)?;
        let size = inode.byte_size().ok_or(Error::NotAFile)?;
        if buf.is_empty() {
            return Ok(0);
        }
        self.check_data_block(&inode)?;

        let start = offset as usize;
        let mut block = Block::read(device, inode.data_block)?;
        block.as_mut_slice()[start..start + buf.len()].copy_from_slice(buf);
        block.write(device)?;

        let now = self.clock.now();
        inode.kind = InodeKind::File {
            byte_size: size.max(end),
        };
        inode.mtime = now;
        inode.ctime = now;
        locked.inodes.save(device, &inode)?;

        Ok(buf.len())
    }

    pub fn stat_fs(&self, cx: &CancelToken) -> Result<FsStat> {
        let sb = self.coordinator.superblock(cx)?;
        Ok(FsStat {
            total_blocks: sb.super_block.total_blocks,
            free_blocks: sb.allocator.remaining(),
            inode_count: sb.super_block.inode_count,
            max_inodes: (MAX_INODES - 1) as u64,
        })
    }
}

impl TomoFileSystem {
    /// Every mount-time check, in the order the structures are reached.
    fn validate(device: &dyn BlockDevice) -> Result<(SuperBlock, BlockAllocator, InodeTable)> {
        let super_block = superblock::load(device)?;
        let allocator =
            BlockAllocator::load(device, super_block.extent_block, super_block.total_blocks)?;
        let inode_table = InodeTable::open(device, super_block.inode_table_block)?;

        let table_block = inode_table.block_id();
        let root = inode_table.read(device, InodeNumber::ROOT).map_err(|err| match err {
            Error::NotFound => Error::corrupt(table_block, "root inode missing"),
            err => err,
        })?;
        if !root.is_dir() {
            return Err(Error::corrupt(table_block, "root inode is not a directory"));
        }
        if root.data_block >= super_block.total_blocks {
            return Err(Error::corrupt(table_block, "root directory block out of range"));
        }

        Ok((super_block, allocator, inode_table))
    }

    /// Reads `parent` for the lookups that hold only the directory index lock.
    fn read_parent(&self, parent: InodeNumber) -> Result<Inode> {
        let parent = inode_table::read_inode(&*self.block_device, self.inode_table_block, parent)?;
        self.check_data_block(&parent)?;
        Ok(parent)
    }

    /// Rejects an inode whose data block lies in the reserved region or past
    /// the device. The root directory's block is the one reserved exception.
    fn check_data_block(&self, inode: &Inode) -> Result<()> {
        let block = inode.data_block;
        let in_pool = (RESERVED_BLOCKS..self.total_blocks).contains(&block);
        if in_pool || (inode.ino == InodeNumber::ROOT && block == ROOT_DIR_BLOCK_ID) {
            return Ok(());
        }
        log::error!("inode {} points at block {block}, outside the free pool", inode.ino);
        Err(Error::corrupt(
            self.inode_table_block,
            "data block outside the free pool",
        ))
    }
}
