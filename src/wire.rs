//! Serializable records for challenges and solutions
//!
//! Records carry every field in its canonical textual form: nonces in base
//! 10, timestamps as RFC 3339 with nanoseconds, lifetimes in humantime
//! notation, payloads and hash sums in hex, the hash by name and the layout by
//! its source. Converting a record back re-runs the builders, so a record
//! from an untrusted peer yields either a fully validated value or an error.
//!
//! Only [`TemplateLayout`] sources can be restored from a record.

use crate::challenge::Challenge;
use crate::core::{CreatedAt, Hash, HashSum, Nonce, Payload, Resource, Ttl};
use crate::layout::TemplateLayout;
use crate::solution::Solution;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Wire form of a [`Challenge`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeRecord {
    pub leading_zero_bit_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    /// Hex-encoded payload bytes
    pub payload: String,
    pub hash: String,
    pub layout: String,
}

impl From<&Challenge> for ChallengeRecord {
    fn from(challenge: &Challenge) -> Self {
        Self {
            leading_zero_bit_count: challenge.leading_zero_bit_count().get(),
            created_at: challenge.created_at().map(ToString::to_string),
            ttl: challenge.ttl().map(ToString::to_string),
            resource: challenge.resource().map(ToString::to_string),
            payload: challenge.payload().to_hex(),
            hash: challenge.hash().name().to_string(),
            layout: challenge.layout().source().to_string(),
        }
    }
}

impl ChallengeRecord {
    pub fn into_challenge(self) -> Result<Challenge> {
        let mut builder = Challenge::builder()
            .leading_zero_bit_count(i64::from(self.leading_zero_bit_count))
            .payload(Payload::from_hex(&self.payload)?)
            .hash(Hash::from_name(&self.hash)?)
            .layout(TemplateLayout::new(self.layout)?);

        if let Some(created_at) = self.created_at {
            builder = builder.created_at(created_at.parse::<CreatedAt>()?);
        }
        if let Some(ttl) = self.ttl {
            builder = builder.ttl(ttl.parse::<Ttl>()?);
        }
        if let Some(resource) = self.resource {
            builder = builder.resource(resource.parse::<Resource>()?);
        }
        builder.build()
    }
}

/// Wire form of a [`Solution`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolutionRecord {
    pub challenge: ChallengeRecord,
    pub nonce: Nonce,
    pub hash_sum: HashSum,
}

impl From<&Solution> for SolutionRecord {
    fn from(solution: &Solution) -> Self {
        Self {
            challenge: ChallengeRecord::from(solution.challenge()),
            nonce: solution.nonce().clone(),
            hash_sum: solution.hash_sum().clone(),
        }
    }
}

impl SolutionRecord {
    /// Rebuild the solution; does not verify it
    pub fn into_solution(self) -> Result<Solution> {
        Solution::builder()
            .challenge(self.challenge.into_challenge()?)
            .nonce(self.nonce)
            .hash_sum(self.hash_sum)
            .build()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::challenge::SolveParams;
    use crate::error::{Error, VerificationFailure};
    use crate::layout::LayoutError;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn full_challenge() -> Challenge {
        Challenge::builder()
            .leading_zero_bit_count(4)
            .created_at(Utc.with_ymd_and_hms(2000, 1, 2, 3, 4, 5).unwrap())
            .ttl(Duration::from_secs(100 * 3600))
            .resource("https://example.com/test".parse::<Resource>().unwrap())
            .payload("dummy")
            .hash(Hash::sha256())
            .layout(
                TemplateLayout::new(
                    "{leadingZeroBitCount}:{createdAt}:{ttl}:{resource}:{payload}:{hash}:{nonce}",
                )
                .unwrap(),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_challenge_record_fields() {
        let record = ChallengeRecord::from(&full_challenge());
        assert_eq!(record.leading_zero_bit_count, 4);
        assert_eq!(record.created_at.as_deref(), Some("2000-01-02T03:04:05.000000000Z"));
        assert_eq!(record.ttl.as_deref(), Some("4days 4h"));
        assert_eq!(record.resource.as_deref(), Some("https://example.com/test"));
        assert_eq!(record.payload, "64756d6d79");
        assert_eq!(record.hash, "SHA-256");
    }

    #[test]
    fn test_solution_record_restores_verifiable_solution() {
        let solution = full_challenge()
            .solve(&CancelToken::new(), SolveParams::new())
            .unwrap();
        let json = SolutionRecord::from(&solution).to_json().unwrap();
        let restored = SolutionRecord::from_json(&json).unwrap().into_solution().unwrap();
        assert_eq!(restored, solution);
        restored.verify().unwrap();
    }

    #[test]
    fn test_optional_fields_omitted() {
        let challenge = Challenge::builder()
            .leading_zero_bit_count(1)
            .payload("p")
            .hash(Hash::blake2s256())
            .layout(TemplateLayout::new("{payload}{nonce}").unwrap())
            .build()
            .unwrap();
        let json = serde_json::to_value(ChallengeRecord::from(&challenge)).unwrap();
        assert!(json.get("createdAt").is_none());
        assert!(json.get("ttl").is_none());
        assert_eq!(json["leadingZeroBitCount"], 1);
        assert_eq!(json["hash"], "BLAKE2s-256");
    }

    #[test]
    fn test_tampered_record_fails_verification() {
        let solution = full_challenge()
            .solve(&CancelToken::new(), SolveParams::new())
            .unwrap();
        let mut record = SolutionRecord::from(&solution);
        record.nonce = solution.nonce().incremented();
        let tampered = record.into_solution().unwrap();
        assert_matches!(
            tampered.verify(),
            Err(Error::Verification(VerificationFailure::HashSumMismatch { .. }))
        );
    }

    #[test]
    fn test_invalid_record_fields() {
        let mut record = ChallengeRecord::from(&full_challenge());
        record.layout = "{unknown}".to_string();
        assert_matches!(
            record.clone().into_challenge(),
            Err(Error::Layout(LayoutError::UnknownPlaceholder(_)))
        );

        record.layout = "{nonce}".to_string();
        record.hash = "MD5".to_string();
        assert_matches!(record.into_challenge(), Err(Error::Validation(_)));
    }
}
