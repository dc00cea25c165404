//! Property tests for error keying.

use foreman_outcome::{error_path, ErrorCategory, ErrorCollection, ErrorRecord, PathSegment};
use proptest::prelude::*;

fn category_strategy() -> impl Strategy<Value = ErrorCategory> {
    prop_oneof![
        Just(ErrorCategory::Data),
        Just(ErrorCategory::Runtime),
        Just(ErrorCategory::System),
    ]
}

fn segment_strategy() -> impl Strategy<Value = PathSegment> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(PathSegment::Key),
        (0usize..20).prop_map(PathSegment::Index),
    ]
}

fn record_strategy() -> impl Strategy<Value = ErrorRecord> {
    (
        category_strategy(),
        "[a-z_]{1,8}",
        prop::collection::vec(segment_strategy(), 0..3),
        "[a-z ]{0,12}",
    )
        .prop_map(|(category, symbol, path, message)| {
            ErrorRecord::new(category, symbol, message).with_path(path)
        })
}

proptest! {
    /// The collection never holds two records with the same key.
    #[test]
    fn test_keys_are_unique(records in prop::collection::vec(record_strategy(), 0..40)) {
        let collection: ErrorCollection = records.iter().cloned().collect();

        let mut keys = collection.keys();
        let total = keys.len();
        keys.sort();
        keys.dedup();
        prop_assert_eq!(keys.len(), total);
    }

    /// The last record added for a key wins.
    #[test]
    fn test_last_write_wins(records in prop::collection::vec(record_strategy(), 1..40)) {
        let collection: ErrorCollection = records.iter().cloned().collect();

        for record in &records {
            let last = records.iter().rev().find(|r| r.key() == record.key()).unwrap();
            prop_assert_eq!(collection.get(&record.key()), Some(last));
        }
    }

    /// Messages never participate in identity.
    #[test]
    fn test_message_does_not_affect_key(first in "[a-z]{0,10}", second in "[a-z]{0,10}") {
        let mut collection = ErrorCollection::new();
        collection.add(ErrorRecord::data(error_path!["age"], "invalid_age", first));
        collection.add(ErrorRecord::data(error_path!["age"], "invalid_age", second.clone()));

        prop_assert_eq!(collection.len(), 1);
        prop_assert_eq!(collection.messages(), vec![second.as_str()]);
    }
}

#[test]
fn test_error_path_macro_mixes_keys_and_indices() {
    let path = error_path!["items", 2, "sku"];
    assert_eq!(
        path,
        vec![
            PathSegment::Key("items".into()),
            PathSegment::Index(2),
            PathSegment::Key("sku".into()),
        ]
    );
    assert!(error_path![].is_empty());
}
