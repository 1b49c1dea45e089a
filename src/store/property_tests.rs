//! Property-Based Tests for the Durable Store
//!
//! Uses proptest over random sequences of store operations.

use proptest::prelude::*;
use std::collections::HashMap;

use crate::store::{with_timestamp, CachedResponse, DurableStore};

// == Strategies ==
fn generation_strategy() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["gen-v1", "gen-v2", "gen-v3"]).prop_map(String::from)
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{1,8}".prop_map(|s| format!("http://origin.test/data/{}.json", s))
}

fn status_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![200u16..300, 300u16..600]
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put {
        generation: String,
        key: String,
        status: u16,
        body: String,
    },
    Delete {
        generation: String,
    },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        4 => (generation_strategy(), key_strategy(), status_strategy(), "[a-z]{0,16}")
            .prop_map(|(generation, key, status, body)| StoreOp::Put {
                generation,
                key,
                status,
                body,
            }),
        1 => generation_strategy().prop_map(|generation| StoreOp::Delete { generation }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // The store agrees with a plain map model that only ever admits 2xx
    // responses and lets the last write win.
    #[test]
    fn prop_store_matches_success_only_model(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let mut store = DurableStore::new();
        let mut model: HashMap<(String, String), CachedResponse> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Put { generation, key, status, body } => {
                    let resp = CachedResponse::text(status, &body);
                    let accepted = store.put(&generation, &key, resp.clone()).is_ok();
                    prop_assert_eq!(accepted, (200..300).contains(&status));
                    if accepted {
                        model.insert((generation, key), resp);
                    }
                }
                StoreOp::Delete { generation } => {
                    store.delete_generation(&generation);
                    model.retain(|(g, _), _| g != &generation);
                }
            }
        }

        prop_assert_eq!(store.total_entries(), model.len());
        for ((generation, key), resp) in &model {
            prop_assert_eq!(store.get(generation, key), Some(resp));
        }
    }

    // After retain_only, the current generation is the only one left and
    // its entries are untouched.
    #[test]
    fn prop_retain_only_keeps_current(
        puts in prop::collection::vec((generation_strategy(), key_strategy()), 1..40),
        current in generation_strategy(),
    ) {
        let mut store = DurableStore::new();
        for (generation, key) in &puts {
            store.put(generation, key, CachedResponse::text(200, "ok")).unwrap();
        }
        let before = store.len(&current);

        let purged = store.retain_only(&current);

        prop_assert!(!purged.contains(&current));
        prop_assert!(store
            .generation_names()
            .iter()
            .all(|name| name == &current));
        prop_assert_eq!(store.len(&current), before);
    }

    // A batch holding any non-2xx response leaves the store exactly as it was.
    #[test]
    fn prop_commit_is_all_or_nothing(
        batch in prop::collection::vec((key_strategy(), status_strategy()), 1..10),
    ) {
        let mut store = DurableStore::new();
        store.put("gen-v1", "http://origin.test/", CachedResponse::text(200, "shell")).unwrap();

        let staged: Vec<(String, CachedResponse)> = batch
            .iter()
            .map(|(key, status)| (key.clone(), CachedResponse::text(*status, "x")))
            .collect();
        let all_ok = batch.iter().all(|(_, status)| (200..300).contains(status));

        let result = store.commit("gen-v1", staged);

        prop_assert_eq!(result.is_ok(), all_ok);
        if !all_ok {
            prop_assert_eq!(store.total_entries(), 1);
        }
    }

    // Stamping keeps status and body, and leaves exactly one timestamp.
    #[test]
    fn prop_with_timestamp_single_stamp(first in 0u64..1_000_000, second in 0u64..1_000_000) {
        let original = CachedResponse::text(200, "payload");
        let restamped = with_timestamp(&with_timestamp(&original, first), second);

        prop_assert_eq!(restamped.status, original.status);
        prop_assert_eq!(&restamped.body, &original.body);
        prop_assert_eq!(restamped.cached_at(), Some(second));
        let stamps = restamped
            .headers
            .iter()
            .filter(|(name, _)| name == crate::store::CACHED_AT_HEADER)
            .count();
        prop_assert_eq!(stamps, 1);
    }
}
