use alloc::borrow::Cow;
use alloc::string::String;

use binrw::binrw;

use super::InodeNumber;
use crate::{Error, MAX_NAME_LEN, Result};

/// Bytes reserved for the name inside a record
pub const NAME_CAP: usize = 60;

/// Metadata of one directory child.
#[binrw]
#[brw(little)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    // NUL-padded; the last byte stays NUL
    name: [u8; NAME_CAP],
    ino: u32,
}

impl DirEntry {
    /// A record is always 64 bytes
    pub const SIZE: usize = 64;

    pub fn new(name: &str, ino: InodeNumber) -> Result<Self> {
        validate_name(name)?;
        let bytes = name.as_bytes();
        let mut buf = [0; NAME_CAP];
        buf[..bytes.len()].copy_from_slice(bytes);

        Ok(Self {
            name: buf,
            ino: ino.get(),
        })
    }

    /// Name bytes up to the first NUL, or the whole field if there is none.
    pub fn name_bytes(&self) -> &[u8] {
        let len = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(NAME_CAP);
        &self.name[..len]
    }

    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.name_bytes())
    }

    #[inline]
    pub fn inode(&self) -> InodeNumber {
        InodeNumber::new(self.ino)
    }

    /// C-string comparison against a validated name.
    #[inline]
    pub fn matches(&self, name: &str) -> bool {
        self.name_bytes() == name.as_bytes()
    }
}

/// A name must be non-empty, at most [`MAX_NAME_LEN`] bytes, and free of NUL
/// and `/`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.bytes().any(|c| c == 0 || c == b'/') {
        return Err(Error::InvalidName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::NameTooLong);
    }
    Ok(())
}
