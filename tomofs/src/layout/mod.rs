//! # 磁盘数据结构层
//!
//! tomofs 的磁盘布局（以块为单位）：
//! 超级块 | 空闲区段 | 索引节点表 | 根目录记录 | 空闲池
//!
//! 每条记录都是定长的小端序数据，经由 `binrw` 编解码，
//! 而不是把块内存直接重新解释为结构体。

mod super_block;
pub use super_block::SuperBlock;

mod extent;
pub use extent::Extent;

mod inode;
pub use inode::{DiskInode, FileType, Inode, InodeFlag, InodeKind, InodeNumber, Permission};

/// Directory records, stored packed in a directory's data block
mod dir_entry;
pub use dir_entry::{DirEntry, NAME_CAP, validate_name};

use binrw::BinResult;

/// A fixed-size on-disk record.
pub trait Record: Sized {
    /// Encoded size in bytes
    const SIZE: usize;

    fn decode(bytes: &[u8]) -> BinResult<Self>;

    /// Encodes into the first [`Record::SIZE`] bytes of `bytes`.
    fn encode(&self, bytes: &mut [u8]) -> BinResult<()>;
}

macro_rules! record {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl Record for $ty {
                const SIZE: usize = <$ty>::SIZE;

                #[inline]
                fn decode(bytes: &[u8]) -> BinResult<Self> {
                    <Self as binrw::BinRead>::read(&mut binrw::io::Cursor::new(bytes))
                }

                #[inline]
                fn encode(&self, bytes: &mut [u8]) -> BinResult<()> {
                    binrw::BinWrite::write(self, &mut binrw::io::Cursor::new(bytes))
                }
            }
        )+
    };
}

record!(SuperBlock, Extent, DiskInode, DirEntry);

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::*;

    /// The encoding fills exactly `T::SIZE` bytes.
    fn assert_exact_size<T: Record>(record: &T) {
        let mut buf = vec![0xAAu8; T::SIZE + 8];
        record.encode(&mut buf).unwrap();
        assert!(buf[T::SIZE..].iter().all(|&b| b == 0xAA));
        assert!(record.encode(&mut buf[..T::SIZE - 1]).is_err());
    }

    #[test]
    fn record_sizes() {
        assert_exact_size(&SuperBlock::new(16));
        assert_exact_size(&Extent::new(4, 12));
        assert_exact_size(&DiskInode::sentinel());
        assert_exact_size(&DirEntry::new("a.txt", InodeNumber::new(2)).unwrap());

        assert_eq!(48, SuperBlock::SIZE);
        assert_eq!(16, Extent::SIZE);
        assert_eq!(64, DiskInode::SIZE);
        assert_eq!(64, DirEntry::SIZE);
        assert_eq!(0, crate::BLOCK_SIZE % DiskInode::SIZE);
        assert_eq!(0, crate::BLOCK_SIZE % DirEntry::SIZE);
    }

    #[test]
    fn short_buffer_is_an_error() {
        assert!(SuperBlock::decode(&[0u8; 10]).is_err());
        assert!(DirEntry::decode(&[0u8; 63]).is_err());
    }
}
