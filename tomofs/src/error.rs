use block_dev::DeviceError;
use derive_more::Display;

/// Every way a tomofs operation can fail.
///
/// Nothing here aborts the process: a corrupt image refuses to mount or fails
/// the one operation that touched it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Error {
    #[display(fmt = "block device error: {:?}", _0)]
    Device(DeviceError),

    /// Block 0 does not carry the tomofs magic.
    #[display(fmt = "not a tomofs filesystem")]
    NotThisFilesystem,

    /// A metadata invariant does not hold on disk.
    #[display(fmt = "corrupt metadata at block {}: {}", block, reason)]
    CorruptMetadata { block: u64, reason: &'static str },

    #[display(fmt = "no free blocks left")]
    OutOfSpace,

    #[display(fmt = "inode table is full")]
    OutOfInodes,

    /// The directory's single record block is at capacity.
    #[display(fmt = "directory is full")]
    DirectoryFull,

    #[display(fmt = "not found")]
    NotFound,

    /// A lock wait was interrupted before anything was mutated.
    #[display(fmt = "operation cancelled")]
    Cancelled,

    #[display(fmt = "not a directory")]
    NotADirectory,

    #[display(fmt = "not a regular file")]
    NotAFile,

    #[display(fmt = "invalid file name")]
    InvalidName,

    #[display(fmt = "file name too long")]
    NameTooLong,

    /// Files live in a single data block.
    #[display(fmt = "file too large")]
    FileTooLarge,

    #[display(fmt = "device too small for tomofs")]
    DeviceTooSmall,

    #[display(fmt = "invalid argument")]
    InvalidArgument,
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    #[inline]
    pub(crate) const fn corrupt(block: u64, reason: &'static str) -> Self {
        Self::CorruptMetadata { block, reason }
    }
}

impl From<DeviceError> for Error {
    #[inline]
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl core::error::Error for Error {}
