//! Property tests: put idempotence and scan completeness.

use std::collections::HashSet;

use proptest::prelude::*;

use quarry_core::config::StorageConfig;
use quarry_core::models::fields;
use quarry_store::ContentStore;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_put_is_idempotent(texts in prop::collection::vec("[a-z ]{0,24}", 1..20)) {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(dir.path(), &StorageConfig::default()).unwrap();

        let first: Vec<u64> = texts
            .iter()
            .map(|t| store.put(fields([("text", t.as_str())])).unwrap())
            .collect();
        let second: Vec<u64> = texts
            .iter()
            .map(|t| store.put(fields([("text", t.as_str())])).unwrap())
            .collect();

        prop_assert_eq!(&first, &second);
        let distinct: HashSet<&String> = texts.iter().collect();
        prop_assert_eq!(store.len().unwrap() as usize, distinct.len());
    }

    #[test]
    fn prop_scan_yields_every_record_once(
        texts in prop::collection::vec("[a-z]{1,12}", 0..40),
        page in 1usize..8,
    ) {
        let dir = tempfile::tempdir().unwrap();
        let config = StorageConfig { scan_page_size: page, ..StorageConfig::default() };
        let store = ContentStore::open(dir.path(), &config).unwrap();
        let ids = store
            .put_many(texts.iter().map(|t| fields([("text", t.as_str())])).collect())
            .unwrap();

        let scanned: Vec<u64> = store.scan().map(|r| r.unwrap().id).collect();
        let mut expected: Vec<u64> = ids.into_iter().collect::<HashSet<_>>().into_iter().collect();
        expected.sort_unstable();
        prop_assert_eq!(scanned, expected);
    }
}
