//! 索引节点记录。
//!
//! [`DiskInode`] 是索引节点表中原样存放的 64 字节槽；
//! [`Inode`] 是 crate 其余部分使用的类型化值。
//! 两者互相转换时检查类型字节与槽号。

use binrw::binrw;
use derive_more::{Display, From, Into};
use enumflags2::{BitFlags, bitflags, make_bitflags};

use crate::{Error, Result, Timestamp};

/// Index of an inode in the inode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From, Into)]
#[repr(transparent)]
pub struct InodeNumber(u32);

impl InodeNumber {
    /// Reserved slot, never allocated
    pub const SENTINEL: Self = Self(0);
    pub const ROOT: Self = Self(1);

    #[inline]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn get(self) -> u32 {
        self.0
    }

    /// Slot index inside the inode table.
    #[inline]
    pub const fn slot(self) -> usize {
        self.0 as usize
    }
}

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeFlag {
    Used = 0b0000_0001,
}

/// Permission bits, with the usual octal values.
#[bitflags]
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    OtherExec = 0o0001,
    OtherWrite = 0o0002,
    OtherRead = 0o0004,
    GroupExec = 0o0010,
    GroupWrite = 0o0020,
    GroupRead = 0o0040,
    OwnerExec = 0o0100,
    OwnerWrite = 0o0200,
    OwnerRead = 0o0400,
    Sticky = 0o1000,
    SetGid = 0o2000,
    SetUid = 0o4000,
}

impl Permission {
    /// `0o644`
    pub const FILE_DEFAULT: BitFlags<Self> =
        make_bitflags!(Permission::{OwnerRead | OwnerWrite | GroupRead | OtherRead});
    /// `0o755`
    pub const DIR_DEFAULT: BitFlags<Self> = make_bitflags!(Permission::{
        OwnerRead | OwnerWrite | OwnerExec | GroupRead | GroupExec | OtherRead | OtherExec
    });
}

/// What the host asks to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// The kind of an inode together with its kind-specific field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InodeKind {
    File { byte_size: u64 },
    Directory { child_count: u64 },
}

impl InodeKind {
    const FILE_TAG: u8 = 1;
    const DIR_TAG: u8 = 2;

    /// A kind with nothing in it yet.
    #[inline]
    pub const fn empty(file_type: FileType) -> Self {
        match file_type {
            FileType::File => Self::File { byte_size: 0 },
            FileType::Directory => Self::Directory { child_count: 0 },
        }
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::File { .. } => Self::FILE_TAG,
            Self::Directory { .. } => Self::DIR_TAG,
        }
    }

    const fn payload(&self) -> u64 {
        match *self {
            Self::File { byte_size } => byte_size,
            Self::Directory { child_count } => child_count,
        }
    }

    const fn from_raw(tag: u8, payload: u64) -> Option<Self> {
        match tag {
            Self::FILE_TAG => Some(Self::File { byte_size: payload }),
            Self::DIR_TAG => Some(Self::Directory {
                child_count: payload,
            }),
            _ => None,
        }
    }
}

/// An allocated inode.
///
/// Values are copies: changing one has no effect on disk until it is saved
/// through the inode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inode {
    pub ino: InodeNumber,
    pub kind: InodeKind,
    pub mode: BitFlags<Permission>,
    /// The one block holding file bytes or directory records
    pub data_block: u64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
    pub ctime: Timestamp,
}

impl Inode {
    pub fn new(
        ino: InodeNumber,
        file_type: FileType,
        mode: BitFlags<Permission>,
        data_block: u64,
        now: Timestamp,
    ) -> Self {
        Self {
            ino,
            kind: InodeKind::empty(file_type),
            mode,
            data_block,
            atime: now,
            mtime: now,
            ctime: now,
        }
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, InodeKind::Directory { .. })
    }

    /// Valid records in the directory's data block; `None` for files.
    #[inline]
    pub fn child_count(&self) -> Option<u64> {
        match self.kind {
            InodeKind::Directory { child_count } => Some(child_count),
            InodeKind::File { .. } => None,
        }
    }

    /// `None` for directories.
    #[inline]
    pub fn byte_size(&self) -> Option<u64> {
        match self.kind {
            InodeKind::File { byte_size } => Some(byte_size),
            InodeKind::Directory { .. } => None,
        }
    }
}

/// An inode table slot as stored on disk.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInode {
    flags: u8,
    /// 0 on unused slots
    kind: u8,
    mode: u16,
    ino: u32,
    data_block: u64,
    atime: u64,
    mtime: u64,
    ctime: u64,
    /// `byte_size` or `child_count`, depending on `kind`
    payload: u64,
    _reserved: [u8; 16],
}

impl DiskInode {
    pub const SIZE: usize = 64;

    /// Written into slot 0 at format time and expected there forever.
    const SENTINEL_INO: u32 = 0xdeadbeef;

    #[inline]
    pub fn sentinel() -> Self {
        Self {
            ino: Self::SENTINEL_INO,
            ..Default::default()
        }
    }

    #[inline]
    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }

    #[inline]
    pub fn flags(&self) -> BitFlags<InodeFlag> {
        BitFlags::from_bits_truncate(self.flags)
    }

    #[inline]
    pub fn is_used(&self) -> bool {
        self.flags().contains(InodeFlag::Used)
    }

    /// Interprets the record found in `slot` of the table at `block`.
    ///
    /// `Ok(None)` for an unused slot; a used slot must carry a known kind and
    /// its own slot number.
    pub fn to_inode(&self, slot: InodeNumber, block: u64) -> Result<Option<Inode>> {
        if !self.is_used() {
            return Ok(None);
        }
        if self.ino != slot.get() {
            log::error!("inode slot {slot} claims to be inode {}", self.ino);
            return Err(Error::corrupt(block, "inode number differs from its slot"));
        }
        let kind = InodeKind::from_raw(self.kind, self.payload)
            .ok_or(Error::corrupt(block, "unknown inode kind"))?;

        Ok(Some(Inode {
            ino: slot,
            kind,
            mode: BitFlags::from_bits_truncate(self.mode),
            data_block: self.data_block,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
        }))
    }
}

impl From<&Inode> for DiskInode {
    fn from(inode: &Inode) -> Self {
        Self {
            flags: BitFlags::from_flag(InodeFlag::Used).bits(),
            kind: inode.kind.tag(),
            mode: inode.mode.bits(),
            ino: inode.ino.get(),
            data_block: inode.data_block,
            atime: inode.atime,
            mtime: inode.mtime,
            ctime: inode.ctime,
            payload: inode.kind.payload(),
            _reserved: [0; 16],
        }
    }
}
