//! Difficulty algebra
//!
//! A difficulty is expressed either as the number of leading zero bits a
//! digest must have, or as the bit index of the exclusive upper bound
//! `2^index` on the digest's big-endian value. For a digest of `S` bits the
//! two are related by `index = S - zeros`.

use crate::error::ValidationIssue;
use num_bigint::BigUint;
use num_traits::One;
use std::fmt;

type IssueResult<T> = std::result::Result<T, ValidationIssue>;

/// Required number of leading zero bits in a digest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LeadingZeroBitCount(u32);

impl LeadingZeroBitCount {
    /// Create from a raw value, rejecting negatives
    pub fn new(value: i64) -> IssueResult<Self> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| ValidationIssue::InvalidLeadingZeroBitCount(value))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Convert against a digest of `size_in_bits` bits
    pub fn to_target_bit_index(self, size_in_bits: u32) -> IssueResult<TargetBitIndex> {
        size_in_bits
            .checked_sub(self.0)
            .map(TargetBitIndex)
            .ok_or(ValidationIssue::LeadingZeroBitCountTooLarge {
                leading_zero_bit_count: self.0,
                size_in_bits,
            })
    }
}

impl From<u32> for LeadingZeroBitCount {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for LeadingZeroBitCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bit index of the exclusive upper bound on a fitting digest's value
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetBitIndex(u32);

impl TargetBitIndex {
    /// Create from a raw value, rejecting negatives
    pub fn new(value: i64) -> IssueResult<Self> {
        u32::try_from(value)
            .map(Self)
            .map_err(|_| ValidationIssue::InvalidTargetBitIndex(value))
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    /// Convert against a digest of `size_in_bits` bits
    pub fn to_leading_zero_bit_count(self, size_in_bits: u32) -> IssueResult<LeadingZeroBitCount> {
        size_in_bits
            .checked_sub(self.0)
            .map(LeadingZeroBitCount)
            .ok_or(ValidationIssue::TargetBitIndexTooLarge {
                target_bit_index: self.0,
                size_in_bits,
            })
    }

    pub fn target(self) -> Target {
        Target::from_bit_index(self)
    }
}

impl From<u32> for TargetBitIndex {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl fmt::Display for TargetBitIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Exclusive upper bound `2^index` on a digest's big-endian value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target(BigUint);

impl Target {
    pub fn from_bit_index(index: TargetBitIndex) -> Self {
        Self(BigUint::one() << index.get())
    }

    /// Whether `digest`, read as a big-endian unsigned integer, is strictly below the target
    pub fn fits(&self, digest: &[u8]) -> bool {
        BigUint::from_bytes_be(digest) < self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Count the leading zero bits of a big-endian byte string
pub fn leading_zero_bits(digest: &[u8]) -> u32 {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 8;
        } else {
            count += byte.leading_zeros();
            break;
        }
    }
    count
}
