//! Challenges and the mining loop
//!
//! A [`Challenge`] is an immutable puzzle: a difficulty, some context
//! (payload, resource, issuance time and lifetime) and the hash and layout
//! that turn a nonce into a digest. It is only obtainable through
//! [`ChallengeBuilder::build`], which checks every invariant up front so that
//! solving and verifying never hit a construction-time problem.

use crate::cancel::{CancelCause, CancelToken};
use crate::core::{
    CreatedAt, Hash, LeadingZeroBitCount, Nonce, Payload, RandomNonceParams, Resource, Target,
    TargetBitIndex, Ttl,
};
use crate::error::{Interruption, Result, ValidationErrors, ValidationIssue};
use crate::layout::{ChallengeHashData, Layout};
use crate::solution::Solution;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Options for a single call to [`Challenge::solve`]
#[derive(Debug, Default)]
pub struct SolveParams {
    /// Give up after this many hash applications
    pub max_attempt_count: Option<u64>,
    /// Start from a random nonce instead of zero
    pub random_initial_nonce: Option<RandomNonceParams>,
}

impl SolveParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempt_count(mut self, max_attempt_count: u64) -> Self {
        self.max_attempt_count = Some(max_attempt_count);
        self
    }

    pub fn with_random_initial_nonce(mut self, params: RandomNonceParams) -> Self {
        self.random_initial_nonce = Some(params);
        self
    }

    /// Resolve the nonce the search starts from
    pub fn initial_nonce(&mut self) -> Result<Nonce> {
        match self.random_initial_nonce.as_mut() {
            Some(params) => Nonce::random(params),
            None => Ok(Nonce::zero()),
        }
    }
}

/// A hashcash puzzle
#[derive(Clone)]
pub struct Challenge {
    leading_zero_bit_count: LeadingZeroBitCount,
    created_at: Option<CreatedAt>,
    ttl: Option<Ttl>,
    resource: Option<Resource>,
    payload: Payload,
    hash: Hash,
    layout: Arc<dyn Layout>,
}

impl Challenge {
    pub fn builder() -> ChallengeBuilder {
        ChallengeBuilder::default()
    }

    pub fn leading_zero_bit_count(&self) -> LeadingZeroBitCount {
        self.leading_zero_bit_count
    }

    pub fn created_at(&self) -> Option<&CreatedAt> {
        self.created_at.as_ref()
    }

    pub fn ttl(&self) -> Option<&Ttl> {
        self.ttl.as_ref()
    }

    pub fn resource(&self) -> Option<&Resource> {
        self.resource.as_ref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn hash(&self) -> &Hash {
        &self.hash
    }

    pub fn layout(&self) -> &dyn Layout {
        self.layout.as_ref()
    }

    pub fn target_bit_index(&self) -> Result<TargetBitIndex> {
        Ok(self
            .leading_zero_bit_count
            .to_target_bit_index(self.hash.size_in_bits())?)
    }

    pub fn target(&self) -> Result<Target> {
        self.target_bit_index().map(Target::from_bit_index)
    }

    /// Whether the challenge is still within its lifetime
    ///
    /// Challenges without a lifetime never expire. Liveness is advisory:
    /// neither solving nor verifying consults it.
    pub fn is_alive(&self) -> bool {
        self.is_alive_at(Utc::now())
    }

    pub fn is_alive_at(&self, now: DateTime<Utc>) -> bool {
        let (Some(created_at), Some(ttl)) = (self.created_at, self.ttl) else {
            return true;
        };
        match chrono::Duration::from_std(ttl.duration()) {
            Ok(ttl) => now.signed_duration_since(created_at.time()) <= ttl,
            Err(_) => true,
        }
    }

    /// Render the pre-image for `nonce`
    pub fn hash_data(&self, nonce: &Nonce) -> Result<Vec<u8>> {
        let data = ChallengeHashData {
            challenge: self,
            nonce,
        };
        Ok(self.layout.render(&data)?)
    }

    /// Search for a nonce whose digest fits the target
    ///
    /// Counts up by one from zero, or from a random nonce when
    /// `params.random_initial_nonce` is set. `cancellation` is checked before
    /// every attempt.
    pub fn solve(&self, cancellation: &CancelToken, mut params: SolveParams) -> Result<Solution> {
        let start = params.initial_nonce()?;
        self.search(start, 1, params.max_attempt_count, cancellation)
    }

    /// Try `start`, `start + stride`, `start + 2 * stride`, ...
    pub(crate) fn search(
        &self,
        start: Nonce,
        stride: u64,
        max_attempt_count: Option<u64>,
        cancellation: &CancelToken,
    ) -> Result<Solution> {
        let target = self.target()?;
        let span = debug_span!(
            "search",
            hash = %self.hash,
            leading_zero_bit_count = self.leading_zero_bit_count.get(),
            start = %start,
            stride
        );
        let _enter = span.enter();

        let mut nonce = start;
        let mut attempt_index: u64 = 0;
        loop {
            if cancellation.is_cancelled() {
                let cause = cancellation.cause().unwrap_or(CancelCause::Requested);
                debug!(attempts = attempt_index, %cause, "search cancelled");
                return Err(Interruption::Cancelled { cause }.into());
            }
            if let Some(max_attempt_count) = max_attempt_count {
                if attempt_index >= max_attempt_count {
                    debug!(attempts = attempt_index, "attempt budget exhausted");
                    return Err(Interruption::AttemptLimitExceeded { max_attempt_count }.into());
                }
            }

            let preimage = self.hash_data(&nonce)?;
            let hash_sum = self.hash.apply(&preimage);
            if target.fits(hash_sum.as_bytes()) {
                debug!(attempts = attempt_index + 1, %nonce, %hash_sum, "solution found");
                return Solution::builder()
                    .challenge(self.clone())
                    .nonce(nonce)
                    .hash_sum(hash_sum)
                    .build();
            }

            trace!(%nonce, "miss");
            nonce = nonce.advanced_by(stride);
            attempt_index += 1;
        }
    }

    #[cfg(test)]
    pub(crate) fn with_unchecked_layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Arc::new(layout);
        self
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Challenge")
            .field("leading_zero_bit_count", &self.leading_zero_bit_count)
            .field("created_at", &self.created_at)
            .field("ttl", &self.ttl)
            .field("resource", &self.resource)
            .field("payload", &self.payload)
            .field("hash", &self.hash)
            .field("layout", &self.layout.source())
            .finish()
    }
}

/// Layouts compare by their canonical source
impl PartialEq for Challenge {
    fn eq(&self, other: &Self) -> bool {
        self.leading_zero_bit_count == other.leading_zero_bit_count
            && self.created_at == other.created_at
            && self.ttl == other.ttl
            && self.resource == other.resource
            && self.payload == other.payload
            && self.hash == other.hash
            && self.layout.source() == other.layout.source()
    }
}

impl Eq for Challenge {}

/// Collects challenge fields and validates them together
#[derive(Debug, Clone, Default)]
pub struct ChallengeBuilder {
    leading_zero_bit_count: Option<i64>,
    target_bit_index: Option<i64>,
    created_at: Option<CreatedAt>,
    ttl: Option<Ttl>,
    resource: Option<Resource>,
    payload: Option<Payload>,
    hash: Option<Hash>,
    layout: Option<Arc<dyn Layout>>,
}

impl ChallengeBuilder {
    pub fn leading_zero_bit_count(mut self, count: i64) -> Self {
        self.leading_zero_bit_count = Some(count);
        self
    }

    pub fn target_bit_index(mut self, index: i64) -> Self {
        self.target_bit_index = Some(index);
        self
    }

    pub fn created_at(mut self, created_at: impl Into<CreatedAt>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    pub fn ttl(mut self, ttl: impl Into<Ttl>) -> Self {
        self.ttl = Some(ttl.into());
        self
    }

    pub fn resource(mut self, resource: impl Into<Resource>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn payload(mut self, payload: impl Into<Payload>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    pub fn hash(mut self, hash: Hash) -> Self {
        self.hash = Some(hash);
        self
    }

    pub fn layout(mut self, layout: impl Layout + 'static) -> Self {
        self.layout = Some(Arc::new(layout));
        self
    }

    pub fn shared_layout(mut self, layout: Arc<dyn Layout>) -> Self {
        self.layout = Some(layout);
        self
    }

    /// Validate all fields and assemble the challenge
    ///
    /// Every violated invariant is reported in one error. The layout is then
    /// rendered once with nonce zero; a failure there is reported as
    /// [`ValidationIssue::LayoutSelfCheck`].
    pub fn build(self) -> Result<Challenge> {
        let mut issues = Vec::new();

        match (&self.created_at, &self.ttl) {
            (Some(_), None) => issues.push(ValidationIssue::IncompleteLifetime { missing: "ttl" }),
            (None, Some(_)) => {
                issues.push(ValidationIssue::IncompleteLifetime { missing: "createdAt" })
            }
            _ => {}
        }
        if self.payload.is_none() {
            issues.push(ValidationIssue::MissingField("payload"));
        }
        match &self.hash {
            None => issues.push(ValidationIssue::MissingField("hash")),
            Some(hash) if !digest_size_fits(hash.size_in_bytes()) => {
                issues.push(ValidationIssue::DigestTooLarge {
                    size_in_bytes: hash.size_in_bytes(),
                })
            }
            Some(_) => {}
        }
        if self.layout.is_none() {
            issues.push(ValidationIssue::MissingField("layout"));
        }

        let size_in_bits = self.hash.as_ref().map(Hash::size_in_bits);
        let leading_zero_bit_count = match (self.leading_zero_bit_count, self.target_bit_index) {
            (Some(_), Some(_)) => Err(ValidationIssue::DifficultyAmbiguous),
            (None, None) => Err(ValidationIssue::DifficultyMissing),
            (Some(count), None) => LeadingZeroBitCount::new(count).and_then(|count| match size_in_bits {
                Some(size) => count.to_target_bit_index(size).map(|_| count),
                None => Ok(count),
            }),
            (None, Some(index)) => TargetBitIndex::new(index).and_then(|index| match size_in_bits {
                Some(size) => index.to_leading_zero_bit_count(size),
                None => Ok(LeadingZeroBitCount::from(0)),
            }),
        };
        let leading_zero_bit_count = match leading_zero_bit_count {
            Ok(count) => Some(count),
            Err(issue) => {
                issues.push(issue);
                None
            }
        };

        let (Some(payload), Some(hash), Some(layout), Some(leading_zero_bit_count), true) = (
            self.payload,
            self.hash,
            self.layout,
            leading_zero_bit_count,
            issues.is_empty(),
        ) else {
            debug!(issues = issues.len(), "challenge rejected");
            return Err(ValidationErrors::new(issues).into());
        };

        let challenge = Challenge {
            leading_zero_bit_count,
            created_at: self.created_at,
            ttl: self.ttl,
            resource: self.resource,
            payload,
            hash,
            layout,
        };

        let zero = Nonce::zero();
        let probe = ChallengeHashData {
            challenge: &challenge,
            nonce: &zero,
        };
        if let Err(e) = challenge.layout.render(&probe) {
            debug!(error = %e, "challenge layout failed self-check");
            return Err(ValidationIssue::LayoutSelfCheck(e).into());
        }

        Ok(challenge)
    }
}

/// Whether a digest of `size_in_bytes` has a bit length representable as `u32`
fn digest_size_fits(size_in_bytes: usize) -> bool {
    size_in_bytes
        .checked_mul(8)
        .is_some_and(|bits| u32::try_from(bits).is_ok())
}
