//! # Content Hashing
//!
//! Supported content hash algorithms and the streaming file hasher used when
//! filling a database's hash table. The algorithm chosen at creation time is
//! recorded in the hash-block header, so two databases can only be compared
//! hash-wise when their algorithms match.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use sha1::{Digest, Sha1};
use sha2::{Sha256, Sha512};

use crate::common::{AjfsError, AjfsResult};

const HASH_BUFFER_SIZE: usize = 64 * 1024;

/// Enumeration of supported content hash algorithms.
///
/// The numeric values are the on-disk tags stored in the hash-block header.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// SHA-1, the default algorithm (tag 1).
    Sha1 = 1,
    /// SHA-256 (tag 2).
    Sha256 = 2,
    /// SHA-512 (tag 3).
    Sha512 = 3,
}

impl HashAlgorithm {
    /// Length in bytes of a digest produced by this algorithm.
    pub fn digest_len(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha512 => 64,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Decodes the on-disk algorithm tag.
    pub fn from_tag(tag: u8) -> AjfsResult<Self> {
        match tag {
            1 => Ok(HashAlgorithm::Sha1),
            2 => Ok(HashAlgorithm::Sha256),
            3 => Ok(HashAlgorithm::Sha512),
            _ => Err(AjfsError::InvalidFormat(format!(
                "unknown hash algorithm tag {tag}"
            ))),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = AjfsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "sha1" => Ok(HashAlgorithm::Sha1),
            "sha256" => Ok(HashAlgorithm::Sha256),
            "sha512" => Ok(HashAlgorithm::Sha512),
            _ => Err(AjfsError::InvalidExpression(format!(
                "unknown hash algorithm: {value}"
            ))),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Hashes a file's content with the given algorithm, streaming in 64 KiB
/// blocks so arbitrarily large files never load fully into memory.
pub fn hash_file(path: &Path, algorithm: HashAlgorithm) -> AjfsResult<Vec<u8>> {
    let file = File::open(path)?;
    let mut reader = BufReader::with_capacity(HASH_BUFFER_SIZE, file);
    match algorithm {
        HashAlgorithm::Sha1 => digest_reader::<Sha1, _>(&mut reader),
        HashAlgorithm::Sha256 => digest_reader::<Sha256, _>(&mut reader),
        HashAlgorithm::Sha512 => digest_reader::<Sha512, _>(&mut reader),
    }
}

fn digest_reader<D: Digest, R: Read>(reader: &mut R) -> AjfsResult<Vec<u8>> {
    let mut hasher = D::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }
    Ok(hasher.finalize().to_vec())
}
