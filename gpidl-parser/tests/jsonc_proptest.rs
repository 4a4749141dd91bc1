//! Property tests for the JSONC stripper.
//!
//! Stripping must be the identity on well-formed JSON: whatever serde_json
//! emits contains no comments and no trailing commas, so the preprocessor
//! has nothing to do, even when string values contain comment markers or
//! commas themselves.

use gpidl_parser::jsonc::{parse_document, strip};
use proptest::prelude::*;

proptest! {
    #[test]
    fn strip_is_identity_on_emitted_json(entries in proptest::collection::vec((".*", any::<i64>()), 0..8)) {
        let mut map = serde_json::Map::new();
        for (key, value) in entries {
            map.insert(key, serde_json::Value::from(value));
        }
        let text = serde_json::to_string_pretty(&serde_json::Value::Object(map)).unwrap();
        prop_assert_eq!(strip(&text), text);
    }

    #[test]
    fn string_values_survive_a_round_trip(value in ".*") {
        let text = serde_json::to_string(&serde_json::json!({ "v": value })).unwrap();
        let doc = parse_document(&text).unwrap();
        prop_assert_eq!(doc["v"].as_str().unwrap(), value.as_str());
    }
}
