//! Property tests for the hashing encoder.

use proptest::prelude::*;

use quarry_core::traits::IEncoder;
use quarry_embeddings::HashingEncoder;

proptest! {
    #[test]
    fn prop_vectors_are_unit_or_zero(text in "[a-zA-Z ,.]{0,80}", dims in 1usize..64) {
        let encoder = HashingEncoder::new(dims);
        let vectors = encoder.encode_batch(&[text]).unwrap();
        prop_assert_eq!(vectors[0].len(), dims);
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        prop_assert!(norm == 0.0 || (norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn prop_batch_matches_single_encodes(texts in prop::collection::vec("[a-z ]{0,40}", 0..12)) {
        let encoder = HashingEncoder::new(32);
        let batch = encoder.encode_batch(&texts).unwrap();
        prop_assert_eq!(batch.len(), texts.len());
        for (text, vector) in texts.iter().zip(&batch) {
            let single = encoder.encode_batch(std::slice::from_ref(text)).unwrap();
            prop_assert_eq!(&single[0], vector);
        }
    }

    #[test]
    fn prop_case_does_not_change_the_vector(text in "[a-zA-Z ]{1,60}") {
        let encoder = HashingEncoder::new(16);
        let mixed = encoder.encode_batch(&[text.clone()]).unwrap();
        let lower = encoder.encode_batch(&[text.to_lowercase()]).unwrap();
        prop_assert_eq!(mixed, lower);
    }
}
