//! Package directory entries

use lumen_core::AssetHandle;

/// Size in bytes of one serialized directory entry
pub const ENTRY_SIZE: usize = 24;

/// Size in bytes of the trailing entry count
pub const COUNT_SIZE: usize = 8;

/// One directory record: where an asset's bytes live inside the package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PakEntry {
    pub id: AssetHandle,
    pub offset: u64,
    pub size: u64,
}

impl PakEntry {
    /// Byte offset one past the end of this entry's payload
    pub fn end(&self) -> Option<u64> {
        self.offset.checked_add(self.size)
    }

    pub fn to_bytes(&self) -> [u8; ENTRY_SIZE] {
        let mut out = [0u8; ENTRY_SIZE];
        out[0..8].copy_from_slice(&self.id.raw().to_ne_bytes());
        out[8..16].copy_from_slice(&self.offset.to_ne_bytes());
        out[16..24].copy_from_slice(&self.size.to_ne_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8; ENTRY_SIZE]) -> Self {
        Self {
            id: AssetHandle::from_raw(read_u64(&bytes[0..8])),
            offset: read_u64(&bytes[8..16]),
            size: read_u64(&bytes[16..24]),
        }
    }
}

pub(crate) fn read_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_ne_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_layout() {
        let entry = PakEntry {
            id: AssetHandle::from_raw(1001),
            offset: 10,
            size: 4096,
        };
        let bytes = entry.to_bytes();
        assert_eq!(&bytes[0..8], &1001u64.to_ne_bytes());
        assert_eq!(&bytes[8..16], &10u64.to_ne_bytes());
        assert_eq!(&bytes[16..24], &4096u64.to_ne_bytes());
        assert_eq!(PakEntry::from_bytes(&bytes), entry);
    }

    #[test]
    fn test_end_overflow() {
        let entry = PakEntry {
            id: AssetHandle::from_raw(1),
            offset: u64::MAX,
            size: 1,
        };
        assert_eq!(entry.end(), None);
    }
}
