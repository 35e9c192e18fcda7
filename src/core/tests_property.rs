//! Property-based tests for the difficulty algebra and the nonce
//!
//! These tests verify basic invariants using proptest

use super::*;
use proptest::prelude::*;

proptest! {
    #[test]
    fn difficulty_conversion_is_its_own_inverse(
        (size_in_bits, zeros) in (1u32..=1024).prop_flat_map(|size| (Just(size), 0..=size)),
    ) {
        let lzbc = LeadingZeroBitCount::from(zeros);
        let index = lzbc.to_target_bit_index(size_in_bits).unwrap();
        prop_assert_eq!(index.get(), size_in_bits - zeros);
        prop_assert_eq!(index.to_leading_zero_bit_count(size_in_bits).unwrap(), lzbc);
    }

    #[test]
    fn difficulty_beyond_digest_size_rejected(size_in_bits in 0u32..=512, excess in 1u32..=512) {
        let lzbc = LeadingZeroBitCount::from(size_in_bits + excess);
        prop_assert!(lzbc.to_target_bit_index(size_in_bits).is_err());
    }

    #[test]
    fn fits_iff_enough_leading_zero_bits(
        digest in prop::collection::vec(any::<u8>(), 32),
        zeros in 0u32..=256,
    ) {
        let target = LeadingZeroBitCount::from(zeros).to_target_bit_index(256).unwrap().target();
        prop_assert_eq!(target.fits(&digest), leading_zero_bits(&digest) >= zeros);
    }

    #[test]
    fn sparse_digests_fit_iff_enough_leading_zero_bits(
        prefix_zero_bytes in 0usize..=31,
        tail in prop::collection::vec(any::<u8>(), 1..=32),
        zeros in 0u32..=256,
    ) {
        let mut digest = vec![0u8; prefix_zero_bytes];
        digest.extend(tail);
        digest.resize(32, 0);
        let target = TargetBitIndex::from(256 - zeros).target();
        prop_assert_eq!(target.fits(&digest), leading_zero_bits(&digest) >= zeros);
    }

    #[test]
    fn nonce_decimal_roundtrip(value in any::<u128>()) {
        let nonce: Nonce = value.to_string().parse().unwrap();
        prop_assert_eq!(nonce.to_string(), value.to_string());
    }

    #[test]
    fn nonce_increment_adds_one(value in any::<u64>()) {
        let nonce = Nonce::from(value).incremented();
        prop_assert_eq!(nonce.to_string(), (u128::from(value) + 1).to_string());
    }

    #[test]
    fn random_nonce_stays_in_range(
        entropy in prop::collection::vec(any::<u8>(), 64..=256),
        min in 0u64..1_000_000,
        width in 1u64..1_000,
    ) {
        let mut params = RandomNonceParams::new(std::io::Cursor::new(entropy), min, min + width);
        // the stream may run dry on repeated rejections
        if let Ok(nonce) = Nonce::random(&mut params) {
            prop_assert!(nonce >= Nonce::from(min));
            prop_assert!(nonce < Nonce::from(min + width));
        }
    }
}
