//! Arbitrary precision nonce

use crate::error::{Error, Result, ValidationIssue};
use num_bigint::{BigInt, BigUint};
use num_traits::Zero;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

/// Non-negative counter searched by the miner
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Nonce(BigUint);

impl Nonce {
    /// Create from a signed value, rejecting negatives
    pub fn new(raw: BigInt) -> Result<Self> {
        raw.to_biguint()
            .map(Self)
            .ok_or_else(|| ValidationIssue::NegativeNonce(raw.to_string()).into())
    }

    pub fn zero() -> Self {
        Self(BigUint::zero())
    }

    /// Draw a nonce uniformly from `[min, max)`
    ///
    /// Reads `ceil(bits(max - min - 1) / 8)` bytes per draw, masks the excess
    /// high bits of the first byte and rejects draws outside the range, so the
    /// same entropy bytes always produce the same nonce.
    pub fn random(params: &mut RandomNonceParams) -> Result<Self> {
        if params.max <= params.min {
            return Err(ValidationIssue::EmptyNonceRange {
                min: params.min.to_string(),
                max: params.max.to_string(),
            }
            .into());
        }

        let range = &params.max - &params.min;
        let bit_len = (&range - 1u32).bits();
        if bit_len == 0 {
            return Ok(Self(params.min.clone()));
        }

        let mut buf = vec![0u8; bit_len.div_ceil(8) as usize];
        let top_bits = match bit_len % 8 {
            0 => 8,
            bits => bits,
        };
        let mask = (0xffu16 >> (8 - top_bits)) as u8;

        loop {
            params.entropy.read_exact(&mut buf)?;
            buf[0] &= mask;
            let draw = BigUint::from_bytes_be(&buf);
            if draw < range {
                return Ok(Self(&params.min + draw));
            }
        }
    }

    pub fn incremented(&self) -> Self {
        self.advanced_by(1)
    }

    pub fn advanced_by(&self, step: u64) -> Self {
        Self(&self.0 + step)
    }

    pub fn value(&self) -> &BigUint {
        &self.0
    }
}

impl From<u64> for Nonce {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl From<BigUint> for Nonce {
    fn from(value: BigUint) -> Self {
        Self(value)
    }
}

impl fmt::Display for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Nonce {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let raw = BigInt::from_str(s.trim()).map_err(|e| Error::parse("nonce", e))?;
        Self::new(raw)
    }
}

impl Serialize for Nonce {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Nonce {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of randomness for the initial nonce, plus the range to draw from
pub struct RandomNonceParams {
    entropy: Box<dyn Read + Send>,
    min: BigUint,
    max: BigUint,
}

impl RandomNonceParams {
    pub fn new(
        entropy: impl Read + Send + 'static,
        min: impl Into<BigUint>,
        max: impl Into<BigUint>,
    ) -> Self {
        Self {
            entropy: Box::new(entropy),
            min: min.into(),
            max: max.into(),
        }
    }

    /// Draw from the thread-local CSPRNG
    pub fn system(min: impl Into<BigUint>, max: impl Into<BigUint>) -> Self {
        Self::new(SystemEntropy, min, max)
    }

    pub fn min(&self) -> &BigUint {
        &self.min
    }

    pub fn max(&self) -> &BigUint {
        &self.max
    }
}

impl fmt::Debug for RandomNonceParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomNonceParams")
            .field("min", &self.min)
            .field("max", &self.max)
            .finish_non_exhaustive()
    }
}

/// Entropy reader backed by `rand::rng()`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEntropy;

impl Read for SystemEntropy {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        rand::rng().fill_bytes(buf);
        Ok(buf.len())
    }
}
