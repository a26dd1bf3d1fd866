//! Random-access package reader

use crate::entry::{read_u64, PakEntry, COUNT_SIZE, ENTRY_SIZE};
use lumen_core::{AssetHandle, LumenError, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// An open package.
///
/// Only the directory is read at open time; payload bytes are fetched on
/// demand. The file handle carries a seek position, so extraction serializes
/// on an internal mutex and one reader can be shared between threads.
pub struct PakReader {
    path: PathBuf,
    file: Mutex<File>,
    /// Directory in on-disk order
    entries: Vec<PakEntry>,
    /// id -> index into `entries`
    index: HashMap<AssetHandle, usize>,
    payload_len: u64,
}

impl PakReader {
    /// Open a package and load its directory.
    ///
    /// Fails with [`LumenError::CorruptPackage`] when the file is too small for
    /// the directory it declares, or when an entry lies outside the payload
    /// region, overlaps another entry, or repeats an id.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path)?;
        let file_len = file.seek(SeekFrom::End(0))?;

        if file_len < COUNT_SIZE as u64 {
            return Err(LumenError::CorruptPackage(format!(
                "{} is {} bytes, too small for an entry count",
                path.display(),
                file_len
            )));
        }

        file.seek(SeekFrom::End(-(COUNT_SIZE as i64)))?;
        let mut count_bytes = [0u8; COUNT_SIZE];
        file.read_exact(&mut count_bytes)?;
        let count = read_u64(&count_bytes);

        let directory_len = count
            .checked_mul(ENTRY_SIZE as u64)
            .filter(|len| *len <= file_len - COUNT_SIZE as u64)
            .ok_or_else(|| {
                LumenError::CorruptPackage(format!(
                    "{} declares {} entries but is only {} bytes",
                    path.display(),
                    count,
                    file_len
                ))
            })?;
        let payload_len = file_len - COUNT_SIZE as u64 - directory_len;

        file.seek(SeekFrom::Start(payload_len))?;
        let mut raw = vec![0u8; directory_len as usize];
        file.read_exact(&mut raw)?;

        let mut entries = Vec::with_capacity(count as usize);
        for chunk in raw.chunks_exact(ENTRY_SIZE) {
            let mut bytes = [0u8; ENTRY_SIZE];
            bytes.copy_from_slice(chunk);
            entries.push(PakEntry::from_bytes(&bytes));
        }

        let index = validate_directory(path, &entries, payload_len)?;

        log::debug!("Opened package {} ({} entries)", path.display(), entries.len());
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            entries,
            index,
            payload_len,
        })
    }

    /// Read one asset's bytes into a freshly allocated buffer.
    ///
    /// Returns [`LumenError::NotInPackage`] when the id is not in the directory.
    pub fn extract(&self, id: AssetHandle) -> Result<Vec<u8>> {
        let entry = self.entry(id).ok_or(LumenError::NotInPackage(id))?;

        let mut buffer = vec![0u8; entry.size as usize];
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(entry.offset))?;
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    /// Look up a directory entry
    pub fn entry(&self, id: AssetHandle) -> Option<&PakEntry> {
        self.index.get(&id).map(|&i| &self.entries[i])
    }

    pub fn contains(&self, id: AssetHandle) -> bool {
        self.index.contains_key(&id)
    }

    /// Directory entries in on-disk order
    pub fn entries(&self) -> &[PakEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Size of the payload region in bytes
    pub fn payload_len(&self) -> u64 {
        self.payload_len
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for PakReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PakReader")
            .field("path", &self.path)
            .field("entries", &self.entries.len())
            .field("payload_len", &self.payload_len)
            .finish()
    }
}

fn validate_directory(
    path: &Path,
    entries: &[PakEntry],
    payload_len: u64,
) -> Result<HashMap<AssetHandle, usize>> {
    let corrupt = |reason: String| LumenError::CorruptPackage(format!("{}: {}", path.display(), reason));

    let mut index = HashMap::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        match entry.end() {
            Some(end) if end <= payload_len => {}
            _ => {
                return Err(corrupt(format!(
                    "entry {} ({}+{}) exceeds payload of {} bytes",
                    entry.id, entry.offset, entry.size, payload_len
                )))
            }
        }
        if index.insert(entry.id, i).is_some() {
            return Err(corrupt(format!("duplicate id {}", entry.id)));
        }
    }

    let mut spans: Vec<(u64, u64)> = entries
        .iter()
        .filter(|e| e.size > 0)
        .map(|e| (e.offset, e.offset + e.size))
        .collect();
    spans.sort_unstable();
    for pair in spans.windows(2) {
        if pair[1].0 < pair[0].1 {
            return Err(corrupt(format!(
                "entries at offsets {} and {} overlap",
                pair[0].0, pair[1].0
            )));
        }
    }

    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_package;
    use std::fs;
    use std::sync::Arc;

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!("lumen_pak_read_{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_raw_package(path: &Path, payload: &[u8], entries: &[PakEntry]) {
        let mut bytes = payload.to_vec();
        for entry in entries {
            bytes.extend_from_slice(&entry.to_bytes());
        }
        bytes.extend_from_slice(&(entries.len() as u64).to_ne_bytes());
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_two_file_scenario() {
        let dir = temp_dir();
        let cache = dir.join("cache");
        fs::create_dir_all(&cache).unwrap();
        let small: Vec<u8> = (0..10u8).collect();
        let large: Vec<u8> = (0..4096u32).map(|i| (i * 7 % 256) as u8).collect();
        fs::write(cache.join("1001"), &small).unwrap();
        fs::write(cache.join("1002"), &large).unwrap();

        let pak_path = dir.join("game.pak");
        build_package(&cache, &pak_path).unwrap();

        let pak = PakReader::open(&pak_path).unwrap();
        assert_eq!(pak.len(), 2);
        assert_eq!(pak.extract(AssetHandle::from_raw(1001)).unwrap(), small);
        assert_eq!(pak.extract(AssetHandle::from_raw(1002)).unwrap(), large);

        let missing = pak.extract(AssetHandle::from_raw(9999));
        assert!(matches!(missing, Err(LumenError::NotInPackage(h)) if h.raw() == 9999));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_integrity_many_files() {
        let dir = temp_dir();
        let cache = dir.join("cache");
        fs::create_dir_all(&cache).unwrap();

        let mut originals = Vec::new();
        for i in 0..20u64 {
            let bytes: Vec<u8> = (0..(i * 37 + 1)).map(|b| (b ^ i) as u8).collect();
            fs::write(cache.join((5000 + i).to_string()), &bytes).unwrap();
            originals.push((AssetHandle::from_raw(5000 + i), bytes));
        }
        // Zero-length assets are legal
        fs::write(cache.join("6000"), b"").unwrap();

        let pak_path = dir.join("many.pak");
        build_package(&cache, &pak_path).unwrap();
        let pak = PakReader::open(&pak_path).unwrap();

        for (id, bytes) in &originals {
            assert_eq!(&pak.extract(*id).unwrap(), bytes);
        }
        assert!(pak.extract(AssetHandle::from_raw(6000)).unwrap().is_empty());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_too_small_for_count() {
        let dir = temp_dir();
        let path = dir.join("tiny.pak");
        fs::write(&path, [0u8; 3]).unwrap();
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_count_exceeds_file() {
        let dir = temp_dir();
        let path = dir.join("liar.pak");
        let mut bytes = vec![0u8; 30];
        bytes.extend_from_slice(&5u64.to_ne_bytes());
        fs::write(&path, bytes).unwrap();
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_huge_count_does_not_overflow() {
        let dir = temp_dir();
        let path = dir.join("huge.pak");
        fs::write(&path, u64::MAX.to_ne_bytes()).unwrap();
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let dir = temp_dir();
        let path = dir.join("oob.pak");
        write_raw_package(
            &path,
            &[0u8; 16],
            &[PakEntry {
                id: AssetHandle::from_raw(1),
                offset: 8,
                size: 9,
            }],
        );
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_overlapping_entries() {
        let dir = temp_dir();
        let path = dir.join("overlap.pak");
        write_raw_package(
            &path,
            &[0u8; 16],
            &[
                PakEntry { id: AssetHandle::from_raw(1), offset: 0, size: 10 },
                PakEntry { id: AssetHandle::from_raw(2), offset: 8, size: 8 },
            ],
        );
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_duplicate_ids() {
        let dir = temp_dir();
        let path = dir.join("dup.pak");
        write_raw_package(
            &path,
            &[0u8; 16],
            &[
                PakEntry { id: AssetHandle::from_raw(3), offset: 0, size: 8 },
                PakEntry { id: AssetHandle::from_raw(3), offset: 8, size: 8 },
            ],
        );
        assert!(matches!(PakReader::open(&path), Err(LumenError::CorruptPackage(_))));
        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_concurrent_extract() {
        let dir = temp_dir();
        let cache = dir.join("cache");
        fs::create_dir_all(&cache).unwrap();
        for i in 1..=8u64 {
            fs::write(cache.join(i.to_string()), vec![i as u8; (i * 100) as usize]).unwrap();
        }
        let pak_path = dir.join("shared.pak");
        build_package(&cache, &pak_path).unwrap();

        let pak = Arc::new(PakReader::open(&pak_path).unwrap());
        let workers: Vec<_> = (1..=8u64)
            .map(|i| {
                let pak = Arc::clone(&pak);
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        let bytes = pak.extract(AssetHandle::from_raw(i)).unwrap();
                        assert_eq!(bytes, vec![i as u8; (i * 100) as usize]);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        fs::remove_dir_all(&dir).ok();
    }
}
