use proptest::prelude::*;

/// Strategy for generating valid worker and channel names
pub fn name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Strategy for generating handler predicates as "accepts / rejects" flags
pub fn predicate_flags_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), 1..12)
}

/// Strategy for generating subscription batches `(worker, channels)`
pub fn subscription_strategy() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec!["w1", "w2", "w3", "w4"]).prop_map(str::to_string),
            prop::collection::vec(
                prop::sample::select(vec!["alpha", "beta", "gamma"]).prop_map(str::to_string),
                0..4,
            ),
        ),
        0..16,
    )
}

/// Strategy for generating small JSON payloads
pub fn payload_strategy() -> impl Strategy<Value = serde_json::Value> {
    prop_oneof![
        Just(serde_json::json!(null)),
        any::<i64>().prop_map(|n| serde_json::json!(n)),
        "[a-zA-Z0-9 ]{0,24}".prop_map(|s| serde_json::json!(s)),
        Just(serde_json::json!({"nested": {"data": [1, 2, 3]}})),
    ]
}
