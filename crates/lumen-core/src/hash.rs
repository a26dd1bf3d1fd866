//! Content-based hashing for staleness detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// Read size used when streaming a file through the hasher
const CHUNK_SIZE: usize = 4096;

const OPEN_RETRIES: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_millis(50);

/// A 32-bit fingerprint of a source file's bytes.
///
/// Only compared for equality to decide whether a cooked asset is stale. The
/// value is the leading four bytes (big-endian) of the SHA-256 digest, so it is
/// identical on every platform for identical input.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub u32);

impl ContentHash {
    /// Sentinel value used for directories and never-hashed entries
    pub const ZERO: ContentHash = ContentHash(0);

    /// Compute a hash from bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Self::from_digest(hasher)
    }

    /// Compute a hash by streaming a reader in fixed-size chunks
    pub fn from_reader<R: Read>(mut reader: R) -> io::Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; CHUNK_SIZE];
        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            hasher.update(&buffer[..read]);
        }
        Ok(Self::from_digest(hasher))
    }

    /// Compute a hash from a file's contents.
    ///
    /// Directories hash to [`ContentHash::ZERO`]. Opening is retried a few times
    /// because editors briefly lock files while saving them.
    pub fn from_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            return Ok(Self::ZERO);
        }

        let mut attempt = 0;
        let file = loop {
            match File::open(path) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(e),
                Err(e) => {
                    attempt += 1;
                    if attempt >= OPEN_RETRIES {
                        return Err(e);
                    }
                    thread::sleep(RETRY_DELAY);
                }
            }
        };
        Self::from_reader(file)
    }

    /// Get the raw 32-bit value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Get the hash as an 8-digit hex string
    pub fn to_hex(&self) -> String {
        format!("{:08x}", self.0)
    }

    fn from_digest(hasher: Sha256) -> Self {
        let digest = hasher.finalize();
        Self(u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]))
    }
}

impl From<u32> for ContentHash {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
