//! Content hash types and incremental hashers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Digest length in bytes. Every supported algorithm produces 32 bytes.
pub const HASH_LENGTH: usize = 32;

/// Hash algorithms understood by the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashType {
    /// SHA-256, the algorithm build manifests are published with.
    #[default]
    Sha256,
    /// BLAKE3, the orchestrator's content-addressing algorithm.
    Blake3,
}

impl HashType {
    /// Stable lowercase name used in the text form of a hash.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
            Self::Blake3 => "blake3",
        }
    }

    /// Create an incremental hasher for this algorithm.
    pub fn hasher(self) -> ContentHasher {
        match self {
            Self::Sha256 => ContentHasher::Sha256(Sha256::new()),
            Self::Blake3 => ContentHasher::Blake3(Box::new(blake3::Hasher::new())),
        }
    }
}

impl fmt::Display for HashType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HashType {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "sha256" => Ok(Self::Sha256),
            "blake3" => Ok(Self::Blake3),
            other => Err(crate::Error::UnsupportedHashType(other.to_string())),
        }
    }
}

/// A content hash tagged with the algorithm that produced it.
///
/// Two sentinels exist besides real digests: [`ContentHash::Unknown`] marks a
/// hash that was never computed or whose computation failed, and
/// [`ContentHash::AbsentFile`] marks a file that is declared not to exist
/// (a legal member of a sparse directory seal).
///
/// The text form is `unknown`, `absent`, or `<algorithm>:<hex>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentHash {
    Unknown,
    AbsentFile,
    Digest {
        hash_type: HashType,
        bytes: [u8; HASH_LENGTH],
    },
}

impl ContentHash {
    /// Create a digest from raw bytes.
    pub fn from_bytes(hash_type: HashType, bytes: [u8; HASH_LENGTH]) -> Self {
        Self::Digest { hash_type, bytes }
    }

    /// Hash `data` with the given algorithm.
    pub fn compute(hash_type: HashType, data: &[u8]) -> Self {
        let mut hasher = hash_type.hasher();
        hasher.update(data);
        hasher.finalize()
    }

    /// Whether this is a real digest rather than a sentinel.
    pub fn is_digest(&self) -> bool {
        matches!(self, Self::Digest { .. })
    }

    /// Whether this is the `Unknown` sentinel.
    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    /// Whether this is the `AbsentFile` sentinel.
    pub fn is_absent_file(&self) -> bool {
        matches!(self, Self::AbsentFile)
    }

    /// The algorithm of a digest; `None` for sentinels.
    pub fn hash_type(&self) -> Option<HashType> {
        match self {
            Self::Digest { hash_type, .. } => Some(*hash_type),
            Self::Unknown | Self::AbsentFile => None,
        }
    }

    /// The raw digest bytes; `None` for sentinels.
    pub fn as_bytes(&self) -> Option<&[u8; HASH_LENGTH]> {
        match self {
            Self::Digest { bytes, .. } => Some(bytes),
            Self::Unknown | Self::AbsentFile => None,
        }
    }

    /// Lowercase hex of the digest bytes; `None` for sentinels.
    pub fn to_hex(&self) -> Option<String> {
        self.as_bytes().map(|bytes| encode_hex(bytes))
    }

    /// Parse a digest from an algorithm and a hex string.
    pub fn from_hex(hash_type: HashType, s: &str) -> crate::Result<Self> {
        if s.len() != HASH_LENGTH * 2 {
            return Err(crate::Error::InvalidHash(format!(
                "expected {} hex chars, got {}",
                HASH_LENGTH * 2,
                s.len()
            )));
        }
        if let Some(c) = s.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(crate::Error::InvalidHash(format!("invalid hex character '{c}' in: {s}")));
        }
        let mut bytes = [0u8; HASH_LENGTH];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hex_str =
                std::str::from_utf8(chunk).map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
            bytes[i] = u8::from_str_radix(hex_str, 16)
                .map_err(|e| crate::Error::InvalidHash(e.to_string()))?;
        }
        Ok(Self::from_bytes(hash_type, bytes))
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { hash_type, bytes } => {
                write!(f, "ContentHash({hash_type}:{})", &encode_hex(bytes)[..16])
            }
            Self::Unknown => f.write_str("ContentHash(unknown)"),
            Self::AbsentFile => f.write_str("ContentHash(absent)"),
        }
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Digest { hash_type, bytes } => write!(f, "{hash_type}:{}", encode_hex(bytes)),
            Self::Unknown => f.write_str("unknown"),
            Self::AbsentFile => f.write_str("absent"),
        }
    }
}

impl FromStr for ContentHash {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "absent" => Ok(Self::AbsentFile),
            _ => {
                let (algorithm, hex) = s.split_once(':').ok_or_else(|| {
                    crate::Error::InvalidHash(format!("expected <algorithm>:<hex>, got: {s}"))
                })?;
                Self::from_hex(algorithm.parse()?, hex)
            }
        }
    }
}

impl TryFrom<String> for ContentHash {
    type Error = crate::Error;

    fn try_from(s: String) -> crate::Result<Self> {
        s.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.to_string()
    }
}

/// Incremental hasher for any supported algorithm.
pub enum ContentHasher {
    Sha256(Sha256),
    Blake3(Box<blake3::Hasher>),
}

impl ContentHasher {
    /// Algorithm this hasher produces.
    pub fn hash_type(&self) -> HashType {
        match self {
            Self::Sha256(_) => HashType::Sha256,
            Self::Blake3(_) => HashType::Blake3,
        }
    }

    /// Update the hasher with data.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Sha256(hasher) => hasher.update(data),
            Self::Blake3(hasher) => {
                hasher.update(data);
            }
        }
    }

    /// Finalize and return the hash.
    pub fn finalize(self) -> ContentHash {
        match self {
            Self::Sha256(hasher) => {
                ContentHash::from_bytes(HashType::Sha256, hasher.finalize().into())
            }
            Self::Blake3(hasher) => {
                ContentHash::from_bytes(HashType::Blake3, *hasher.finalize().as_bytes())
            }
        }
    }
}
