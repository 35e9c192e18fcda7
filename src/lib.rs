//! Hashcash-style client puzzles
//!
//! A verifier issues a [`Challenge`]: a difficulty plus some opaque context.
//! A client spends CPU time finding a [`Nonce`] whose digest has enough
//! leading zero bits, and sends back the resulting [`Solution`], which anyone
//! can check cheaply with [`Solution::verify`].
//!
//! - Invariant-checked construction through [`ChallengeBuilder`] and [`SolutionBuilder`]
//! - Pluggable hashes ([`HashAlgorithm`]) and pre-image formats ([`Layout`])
//! - Cancellable, budgeted search, single- or multi-threaded ([`worker`])
//! - Serializable wire records ([`wire`])
//!
//! ```
//! use hashcash_pow::{CancelToken, Challenge, Hash, SolveParams, TemplateLayout};
//!
//! let challenge = Challenge::builder()
//!     .leading_zero_bit_count(5)
//!     .payload("dummy")
//!     .hash(Hash::sha256())
//!     .layout(TemplateLayout::new("{leadingZeroBitCount}:{payload}:{nonce}").unwrap())
//!     .build()
//!     .unwrap();
//!
//! let solution = challenge.solve(&CancelToken::new(), SolveParams::new()).unwrap();
//! assert_eq!(solution.nonce().to_string(), "37");
//! solution.verify().unwrap();
//! ```

pub mod cancel;
pub mod challenge;
pub mod config;
pub mod core;
pub mod error;
pub mod layout;
pub mod logging;
pub mod solution;
pub mod wire;
pub mod worker;

pub use cancel::{CancelCause, CancelToken};
pub use challenge::{Challenge, ChallengeBuilder, SolveParams};
pub use config::Config;
pub use crate::core::{
    CreatedAt, DigestAlgorithm, Hash, HashAlgorithm, HashSum, LeadingZeroBitCount, Nonce,
    Payload, RandomNonceParams, Resource, SystemEntropy, Target, TargetBitIndex, Ttl,
};
pub use error::{
    Error, Interruption, Result, ValidationErrors, ValidationIssue, VerificationFailure,
};
pub use layout::{ChallengeHashData, Layout, LayoutError, TemplateLayout};
pub use solution::{Solution, SolutionBuilder};
pub use wire::{ChallengeRecord, SolutionRecord};

/// Application information
pub const APP_NAME: &str = "hashcash-pow";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
