//! Solutions and verification

use crate::challenge::Challenge;
use crate::core::{HashSum, Nonce};
use crate::error::{Result, ValidationErrors, ValidationIssue, VerificationFailure};
use tracing::{debug, warn};

/// A nonce claimed to solve a challenge, with the digest it produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    challenge: Challenge,
    nonce: Nonce,
    hash_sum: HashSum,
}

impl Solution {
    pub fn builder() -> SolutionBuilder {
        SolutionBuilder::default()
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    pub fn hash_sum(&self) -> &HashSum {
        &self.hash_sum
    }

    /// Independently re-check the solution
    ///
    /// Re-renders the pre-image, hashes it once and requires the result to
    /// equal the recorded hash sum before checking it against the target, so
    /// a tampered hash sum is always reported as a mismatch.
    pub fn verify(&self) -> Result<()> {
        let preimage = self.challenge.hash_data(&self.nonce)?;
        let computed = self.challenge.hash().apply(&preimage);

        if computed != self.hash_sum {
            warn!(nonce = %self.nonce, recorded = %self.hash_sum, %computed, "hash sum mismatch");
            return Err(VerificationFailure::HashSumMismatch {
                recorded: self.hash_sum.clone(),
                computed,
            }
            .into());
        }

        let target = self.challenge.target()?;
        if !target.fits(computed.as_bytes()) {
            let leading_zero_bit_count = self.challenge.leading_zero_bit_count().get();
            warn!(nonce = %self.nonce, leading_zero_bit_count, "target not met");
            return Err(VerificationFailure::TargetNotMet {
                leading_zero_bit_count,
                hash_sum: computed,
            }
            .into());
        }

        debug!(nonce = %self.nonce, "solution verified");
        Ok(())
    }
}

/// Collects solution fields and validates them together
#[derive(Debug, Clone, Default)]
pub struct SolutionBuilder {
    challenge: Option<Challenge>,
    nonce: Option<Nonce>,
    hash_sum: Option<HashSum>,
}

impl SolutionBuilder {
    pub fn challenge(mut self, challenge: Challenge) -> Self {
        self.challenge = Some(challenge);
        self
    }

    pub fn nonce(mut self, nonce: Nonce) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn hash_sum(mut self, hash_sum: impl Into<HashSum>) -> Self {
        self.hash_sum = Some(hash_sum.into());
        self
    }

    /// Check that every field is present and the hash sum has the digest size
    ///
    /// Does not verify the solution; see [`Solution::verify`].
    pub fn build(self) -> Result<Solution> {
        let mut issues = Vec::new();
        if self.challenge.is_none() {
            issues.push(ValidationIssue::MissingField("challenge"));
        }
        if self.nonce.is_none() {
            issues.push(ValidationIssue::MissingField("nonce"));
        }
        match (&self.challenge, &self.hash_sum) {
            (_, None) => issues.push(ValidationIssue::MissingField("hash sum")),
            (Some(challenge), Some(hash_sum)) if hash_sum.len() != challenge.hash().size_in_bytes() => {
                issues.push(ValidationIssue::HashSumLength {
                    expected: challenge.hash().size_in_bytes(),
                    actual: hash_sum.len(),
                })
            }
            _ => {}
        }

        match (self.challenge, self.nonce, self.hash_sum) {
            (Some(challenge), Some(nonce), Some(hash_sum)) if issues.is_empty() => Ok(Solution {
                challenge,
                nonce,
                hash_sum,
            }),
            _ => Err(ValidationErrors::new(issues).into()),
        }
    }
}
