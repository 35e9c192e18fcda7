//! Core value types for hashcash puzzles
//!
//! Difficulty algebra, nonces, hash capabilities, and the small value types a
//! challenge is assembled from.

mod difficulty;
mod hash;
mod nonce;
mod values;

pub use difficulty::{leading_zero_bits, LeadingZeroBitCount, Target, TargetBitIndex};
pub use hash::{DigestAlgorithm, Hash, HashAlgorithm, HashSum};
pub use nonce::{Nonce, RandomNonceParams, SystemEntropy};
pub use values::{CreatedAt, Payload, Resource, Ttl};

/// Canonical names of the built-in hash algorithms
pub mod constants {
    pub const SHA_256: &str = "SHA-256";
    pub const SHA_512: &str = "SHA-512";
    pub const BLAKE2S_256: &str = "BLAKE2s-256";
    pub const BLAKE2B_512: &str = "BLAKE2b-512";

    /// Every name accepted by `Hash::from_name`
    pub const HASH_NAMES: [&str; 4] = [SHA_256, SHA_512, BLAKE2S_256, BLAKE2B_512];
}

#[cfg(test)]
mod tests_property;
