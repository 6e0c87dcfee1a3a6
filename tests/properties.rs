use proptest::prelude::*;
use solidgate::crypto::{decrypt_cbc, encrypt_cbc, pkcs7_pad, pkcs7_unpad, BLOCK_SIZE};
use solidgate::generate_signature;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn test_padding_roundtrip(data in proptest::collection::vec(any::<u8>(), 1..256)) {
        let padded = pkcs7_pad(&data, BLOCK_SIZE).unwrap();

        prop_assert_eq!(padded.len() % BLOCK_SIZE, 0);
        prop_assert!(padded.len() > data.len());
        prop_assert!(padded.len() - data.len() <= BLOCK_SIZE);
        prop_assert_eq!(pkcs7_unpad(&padded, BLOCK_SIZE).unwrap(), data.as_slice());
    }

    #[test]
    fn test_aligned_input_gets_full_block(blocks in 1usize..8, byte in any::<u8>()) {
        let data = vec![byte; blocks * BLOCK_SIZE];
        let padded = pkcs7_pad(&data, BLOCK_SIZE).unwrap();

        prop_assert_eq!(padded.len(), data.len() + BLOCK_SIZE);
        prop_assert!(padded[data.len()..].iter().all(|&b| b as usize == BLOCK_SIZE));
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip(
        key in any::<[u8; 32]>(),
        data in proptest::collection::vec(any::<u8>(), 1..512),
    ) {
        let blob = encrypt_cbc(&key, &data).unwrap();

        prop_assert_eq!(blob.len(), 16 + (data.len() / BLOCK_SIZE + 1) * BLOCK_SIZE);
        prop_assert_eq!(decrypt_cbc(&key, &blob).unwrap(), data);
    }

    #[test]
    fn test_signature_deterministic(
        merchant in "[a-zA-Z0-9_-]{1,32}",
        key in proptest::collection::vec(any::<u8>(), 32..96),
        data in any::<Vec<u8>>(),
    ) {
        let a = generate_signature(&merchant, &key, &data);
        let b = generate_signature(&merchant, &key, &data);

        prop_assert_eq!(a.as_str().len(), 172);
        prop_assert_eq!(a, b);
    }
}
