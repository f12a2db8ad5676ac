//! # tomofs
//!
//! 一个小型块设备文件系统的元数据与空间管理核心。
//!
//! 磁盘布局，以 [`BLOCK_SIZE`] 字节的块为单位：
//!
//! 超级块 | 空闲区段 | 索引节点表 | 根目录记录 | 空闲池
//!
//! ## 分层（自上而下）
//!
//! 1. 文件系统层：挂载、格式化、创建、查找、枚举
//! 2. 并发协调层：按固定顺序获取三把元数据锁
//! 3. 元数据管理层：超级块、块分配器、索引节点表、目录索引
//! 4. 磁盘数据结构层：逐字节确定的记录及其编解码
//! 5. 块缓冲层：一次读与其直写之间、位于内存的一个块

#![no_std]

extern crate alloc;
#[cfg(test)]
extern crate std;

// Filesystem layer
mod tfs;
pub use tfs::{Clock, FsStat, TomoFileSystem, ZeroClock};

// Concurrency coordinator
mod sync;
mod cancel;
pub use cancel::CancelToken;

// Metadata managers
pub mod allocator;
pub mod dir_index;
pub mod inode_table;
pub mod superblock;

// Disk layout layer
pub mod layout;
pub use layout::{DirEntry, Extent, FileType, Inode, InodeKind, InodeNumber, Permission, SuperBlock};

// Block buffer layer
mod block;

mod error;
pub use error::{Error, Result};

pub use block_dev::{BlockDevice, DeviceError};

pub const MAGIC: u32 = 0xdeadbeef;
pub const BLOCK_SIZE: usize = 4096;

pub const SUPER_BLOCK_ID: u64 = 0;
pub const EXTENT_BLOCK_ID: u64 = 1;
pub const INODE_TABLE_BLOCK_ID: u64 = 2;
pub const ROOT_DIR_BLOCK_ID: u64 = 3;
/// Blocks in front of the free pool on a freshly formatted device.
pub const RESERVED_BLOCKS: u64 = 4;

/// Inode slots in the single inode table block, sentinel included.
pub const MAX_INODES: usize = BLOCK_SIZE / layout::DiskInode::SIZE;
/// Longest filename in bytes; the last byte of a record's name is kept for NUL.
pub const MAX_NAME_LEN: usize = layout::NAME_CAP - 1;
/// Directory records one directory can hold.
pub const MAX_DIR_ENTRIES: usize = BLOCK_SIZE / DirEntry::SIZE;

/// Seconds, as handed out by the host's [`Clock`].
pub type Timestamp = u64;
