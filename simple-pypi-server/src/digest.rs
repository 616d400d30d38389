//! Cryptographic hashing for artifact integrity fragments.
//!
//! Package pages append `#<algorithm>=<hex>` to every artifact link so
//! installers can verify what they download. SHA-1 is the default, matching
//! what existing clients of this index expect; SHA-256 is available for
//! stricter setups.

use std::fmt;
use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Hash algorithm used for content digests.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl DigestAlgorithm {
    /// Name used in link fragments (`hashlib` spelling).
    pub fn as_str(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "sha1",
            DigestAlgorithm::Sha256 => "sha256",
        }
    }

    /// Hash an in-memory buffer.
    pub fn digest(&self, data: &[u8]) -> ContentDigest {
        let hex = match self {
            DigestAlgorithm::Sha1 => sha1_hash(data),
            DigestAlgorithm::Sha256 => sha256_hash(data),
        };
        ContentDigest::new(*self, hex)
    }

    /// Hash everything a reader yields, returning the digest and the byte count.
    pub fn digest_reader<R: Read>(&self, reader: &mut R) -> io::Result<(ContentDigest, u64)> {
        match self {
            DigestAlgorithm::Sha1 => {
                let mut hasher = Sha1::new();
                let size = io::copy(reader, &mut hasher)?;
                Ok((ContentDigest::new(*self, format!("{:x}", hasher.finalize())), size))
            }
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                let size = io::copy(reader, &mut hasher)?;
                Ok((ContentDigest::new(*self, format!("{:x}", hasher.finalize())), size))
            }
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hex-encoded digest of an artifact's full content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContentDigest {
    pub algorithm: DigestAlgorithm,
    pub hex: String,
}

impl ContentDigest {
    pub fn new(algorithm: DigestAlgorithm, hex: String) -> Self {
        Self { algorithm, hex }
    }

    /// Link fragment without the leading `#`, e.g. `sha1=2aae6c35...`.
    pub fn fragment(&self) -> String {
        format!("{}={}", self.algorithm, self.hex)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.algorithm, self.hex)
    }
}

/// Calculate SHA1 hash of data as lowercase hex.
///
/// ```
/// # use simple_pypi_server::digest::sha1_hash;
/// assert_eq!(sha1_hash(b"hello world").len(), 40);
/// ```
pub fn sha1_hash(data: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Calculate SHA256 hash of data as lowercase hex.
pub fn sha256_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha1_hash() {
        assert_eq!(
            sha1_hash(b"hello world"),
            "2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
    }

    #[test]
    fn test_sha256_hash() {
        assert_eq!(
            sha256_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_reader_matches_buffer() {
        for (algorithm, hex_len) in [(DigestAlgorithm::Sha1, 40), (DigestAlgorithm::Sha256, 64)] {
            let data = b"hello world";
            let (from_reader, size) = algorithm.digest_reader(&mut &data[..]).unwrap();
            assert_eq!(size, data.len() as u64);
            assert_eq!(from_reader, algorithm.digest(data));
            assert_eq!(from_reader.hex.len(), hex_len);
            assert!(from_reader.hex.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_fragment_format() {
        let digest = DigestAlgorithm::Sha1.digest(b"hello world");
        assert_eq!(
            digest.fragment(),
            "sha1=2aae6c35c94fcfb415dbe95f408b9ce91ee846ed"
        );
        assert_eq!(digest.to_string(), digest.fragment());
    }

    #[test]
    fn test_algorithm_serde_names() {
        let json = serde_json::to_string(&DigestAlgorithm::Sha256).unwrap();
        assert_eq!(json, "\"sha256\"");
        let parsed: DigestAlgorithm = serde_json::from_str("\"sha1\"").unwrap();
        assert_eq!(parsed, DigestAlgorithm::Sha1);
    }
}
