//! Read-only views of stored block bytes.

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use memmap2::Mmap;

/// Bytes returned by a store: either shared heap memory or a read-only
/// memory map of a block file. Cloning is cheap in both cases.
#[derive(Clone)]
pub enum BlockBytes {
    /// Heap bytes shared with the store that produced them.
    Shared(Arc<[u8]>),
    /// A read-only mapping of a write-once block file.
    Mapped(Arc<Mmap>),
}

impl BlockBytes {
    /// Whether these bytes are served from a memory map.
    pub fn is_mapped(&self) -> bool {
        matches!(self, Self::Mapped(_))
    }
}

impl Deref for BlockBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            Self::Shared(bytes) => &bytes[..],
            Self::Mapped(map) => &map[..],
        }
    }
}

impl AsRef<[u8]> for BlockBytes {
    fn as_ref(&self) -> &[u8] {
        &self[..]
    }
}

impl From<Vec<u8>> for BlockBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Shared(bytes.into())
    }
}

impl From<Arc<[u8]>> for BlockBytes {
    fn from(bytes: Arc<[u8]>) -> Self {
        Self::Shared(bytes)
    }
}

impl From<Mmap> for BlockBytes {
    fn from(map: Mmap) -> Self {
        Self::Mapped(Arc::new(map))
    }
}

impl PartialEq<[u8]> for BlockBytes {
    fn eq(&self, other: &[u8]) -> bool {
        **self == *other
    }
}

impl fmt::Debug for BlockBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_mapped() { "mapped" } else { "shared" };
        write!(f, "BlockBytes({kind}, {} bytes)", self.len())
    }
}
