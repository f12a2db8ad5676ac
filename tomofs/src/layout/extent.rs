use core::ops::Range;

use binrw::binrw;

/// A contiguous run of blocks.
///
/// On disk it is the free extent record; in memory it is also what the
/// allocator hands out.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Extent {
    /// First block of the run
    pub head: u64,
    /// Blocks in the run
    pub count: u64,
}

impl Extent {
    pub const SIZE: usize = 16;

    #[inline]
    pub const fn new(head: u64, count: u64) -> Self {
        Self { head, count }
    }

    /// One past the last block.
    #[inline]
    pub const fn end(&self) -> u64 {
        self.head + self.count
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn blocks(&self) -> Range<u64> {
        self.head..self.end()
    }
}
