// Property tests for the workflow stores

use proptest::prelude::*;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tempfile::TempDir;

use prior_auth_flow::store::keys::{self, process_keys};
use prior_auth_flow::{FileStore, MemoryStore, WorkflowStore};

// Keys that never collide with run artifacts
fn session_key_strategy() -> impl Strategy<Value = String> {
    "[a-z]{3,10}"
        .prop_map(|k| format!("session.{k}"))
        .prop_filter("must not be a run key", |k| !process_keys().contains(&k.as_str()))
}

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        any::<f64>()
            .prop_filter("JSON numbers are finite", |f| f.is_finite())
            .prop_map(Value::from),
        "[ -~]{0,20}".prop_map(Value::from),
    ];
    leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,5}", inner, 0..4)
                .prop_map(|fields| Value::Object(fields.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

fn seed(store: &dyn WorkflowStore, session: &BTreeMap<String, Value>) {
    for (key, value) in session {
        store.set(key, value);
    }
    for key in process_keys() {
        store.set_string(key, "run artifact");
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn set_then_get_returns_equal_value(value in value_strategy()) {
        let memory = MemoryStore::new();
        memory.set("value", &value);
        prop_assert_eq!(memory.get("value"), Some(value.clone()));

        let dir = TempDir::new().unwrap();
        let file = FileStore::open(dir.path().join("state.json")).unwrap();
        file.set("value", &value);
        prop_assert_eq!(file.get("value"), Some(value.clone()));
        prop_assert_eq!(FileStore::open(dir.path().join("state.json")).unwrap().get("value"), Some(value));
    }

    #[test]
    fn restart_clears_only_run_keys(
        session in prop::collection::btree_map(session_key_strategy(), value_strategy(), 0..8)
    ) {
        let store = MemoryStore::new();
        seed(&store, &session);

        store.clear_subset(&process_keys());

        for key in process_keys() {
            prop_assert_eq!(store.get(key), None);
        }
        for (key, value) in &session {
            prop_assert_eq!(store.get(key), Some(value.clone()));
        }
        prop_assert_eq!(store.len(), session.len());
    }

    #[test]
    fn file_store_survives_reopen(
        session in prop::collection::btree_map(session_key_strategy(), value_strategy(), 1..8)
    ) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        {
            let store = FileStore::open(&path).unwrap();
            seed(&store, &session);
            store.clear_subset(&process_keys());
        }

        let reopened = FileStore::open(&path).unwrap();
        let mut stored = reopened.keys();
        stored.sort();
        let expected: Vec<String> = session.keys().cloned().collect();
        prop_assert_eq!(stored, expected);
        for (key, value) in &session {
            prop_assert_eq!(reopened.get(key), Some(value.clone()));
        }
    }
}

#[test]
fn test_logout_empties_file_store() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("state.json");
    let store = FileStore::open(&path).unwrap();
    store.set_string(keys::LOGGED_USER, "dr-who");
    store.set_string(keys::TIMESTAMP, "2025-03-02T10:00:00.000Z");

    store.clear_all();

    assert!(FileStore::open(&path).unwrap().keys().is_empty());
}
