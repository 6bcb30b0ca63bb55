//! Property-based test generators using proptest.
//!
//! Provides strategies for generating random test data
//! that maintains required invariants.

use proptest::prelude::*;
use serde_json::{Map, Value};
use verdb_core::EntryId;

/// Strategy for generating valid entry IDs.
pub fn entry_id_strategy() -> impl Strategy<Value = EntryId> {
    prop::array::uniform16(any::<u8>()).prop_map(EntryId::from_bytes)
}

/// Strategy for generating editor names.
pub fn editor_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,15}").expect("invalid regex")
}

/// Strategy for generating scalar JSON values.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 ]{0,20}".prop_map(Value::from),
    ]
}

/// Strategy for generating flat map bodies, the common case.
pub fn flat_body_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map("[a-z]{1,8}", scalar_strategy(), 0..6).prop_map(|fields| {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    })
}

/// Strategy for generating bodies with up to two levels of nesting.
pub fn nested_body_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        scalar_strategy(),
        prop::collection::vec(scalar_strategy(), 0..4).prop_map(Value::Array),
        flat_body_strategy(),
    ];
    prop::collection::btree_map("[a-z]{1,8}", leaf, 0..6).prop_map(|fields| {
        Value::Object(fields.into_iter().collect::<Map<String, Value>>())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn entry_ids_roundtrip_through_strings(id in entry_id_strategy()) {
            let parsed = EntryId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(parsed, id);
        }

        #[test]
        fn bodies_are_maps(body in nested_body_strategy()) {
            prop_assert!(body.is_object());
        }
    }
}
