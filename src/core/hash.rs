//! Hash capabilities
//!
//! A [`HashAlgorithm`] is a factory for one-shot digests: every call to
//! `apply` starts from a fresh hasher state, so one instance can be shared
//! across threads without locking.

use super::constants::{BLAKE2B_512, BLAKE2S_256, HASH_NAMES, SHA_256, SHA_512};
use crate::error::{Error, Result, ValidationIssue};
use blake2::{Blake2b512, Blake2s256};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256, Sha512};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

/// A cryptographic hash function with a fixed output size
pub trait HashAlgorithm: fmt::Debug + Send + Sync {
    /// Human-readable algorithm name, e.g. `SHA-256`
    fn name(&self) -> &str;

    /// Digest size in bytes
    fn size_in_bytes(&self) -> usize;

    /// Digest size in bits, saturating at `u32::MAX`
    fn size_in_bits(&self) -> u32 {
        u32::try_from(self.size_in_bytes().saturating_mul(8)).unwrap_or(u32::MAX)
    }

    /// Hash `data` with a fresh hasher
    fn apply(&self, data: &[u8]) -> HashSum;
}

/// [`HashAlgorithm`] for any RustCrypto [`Digest`]
pub struct DigestAlgorithm<D> {
    name: &'static str,
    _digest: PhantomData<fn() -> D>,
}

impl<D> DigestAlgorithm<D> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _digest: PhantomData,
        }
    }
}

impl<D> fmt::Debug for DigestAlgorithm<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DigestAlgorithm").field(&self.name).finish()
    }
}

impl<D: Digest + 'static> HashAlgorithm for DigestAlgorithm<D> {
    fn name(&self) -> &str {
        self.name
    }

    fn size_in_bytes(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn apply(&self, data: &[u8]) -> HashSum {
        HashSum(D::digest(data).to_vec())
    }
}

/// Shared handle to a hash algorithm, optionally under an explicit name
#[derive(Clone)]
pub struct Hash {
    algorithm: Arc<dyn HashAlgorithm>,
    name: Option<String>,
}

impl Hash {
    pub fn new(algorithm: impl HashAlgorithm + 'static) -> Self {
        Self {
            algorithm: Arc::new(algorithm),
            name: None,
        }
    }

    /// Wrap `algorithm` under an explicit, non-empty name
    pub fn with_name(algorithm: impl HashAlgorithm + 'static, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ValidationIssue::EmptyHashName.into());
        }
        Ok(Self {
            algorithm: Arc::new(algorithm),
            name: Some(name),
        })
    }

    pub fn sha256() -> Self {
        Self::new(DigestAlgorithm::<Sha256>::new(SHA_256))
    }

    pub fn sha512() -> Self {
        Self::new(DigestAlgorithm::<Sha512>::new(SHA_512))
    }

    pub fn blake2s256() -> Self {
        Self::new(DigestAlgorithm::<Blake2s256>::new(BLAKE2S_256))
    }

    pub fn blake2b512() -> Self {
        Self::new(DigestAlgorithm::<Blake2b512>::new(BLAKE2B_512))
    }

    /// Resolve a built-in algorithm by name, ignoring ASCII case
    pub fn from_name(name: &str) -> Result<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationIssue::EmptyHashName.into());
        }
        let hash = if name.eq_ignore_ascii_case(SHA_256) {
            Self::sha256()
        } else if name.eq_ignore_ascii_case(SHA_512) {
            Self::sha512()
        } else if name.eq_ignore_ascii_case(BLAKE2S_256) {
            Self::blake2s256()
        } else if name.eq_ignore_ascii_case(BLAKE2B_512) {
            Self::blake2b512()
        } else {
            return Err(ValidationIssue::UnknownHash(name.to_string()).into());
        };
        Ok(hash)
    }

    pub fn supported_names() -> &'static [&'static str] {
        &HASH_NAMES
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.algorithm.name())
    }

    pub fn size_in_bytes(&self) -> usize {
        self.algorithm.size_in_bytes()
    }

    pub fn size_in_bits(&self) -> u32 {
        self.algorithm.size_in_bits()
    }

    pub fn apply(&self, data: &[u8]) -> HashSum {
        self.algorithm.apply(data)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hash")
            .field("name", &self.name())
            .field("size_in_bits", &self.size_in_bits())
            .finish()
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PartialEq for Hash {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name() && self.size_in_bytes() == other.size_in_bytes()
    }
}

impl Eq for Hash {}

/// Digest bytes produced by a [`HashAlgorithm`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HashSum(Vec<u8>);

impl HashSum {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for HashSum {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for HashSum {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl AsRef<[u8]> for HashSum {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for HashSum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl FromStr for HashSum {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let s = s.strip_prefix("0x").unwrap_or(s);
        hex::decode(s)
            .map(Self)
            .map_err(|e| Error::parse("hash sum", e))
    }
}

impl Serialize for HashSum {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HashSum {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
