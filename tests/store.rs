use serde_json::json;

use pflow::errors::{ErrorCategory, WarningRecord};
use pflow::store::{SharedStore, is_framework_key, keys};

#[test]
fn proxies_isolate_namespaces_but_share_framework_keys() {
    let mut store = SharedStore::new();

    {
        let mut first = store.namespaced("first");
        first.set("token", json!("alpha"));
        first.set(keys::CACHE_HITS, json!(1));
    }
    {
        let mut second = store.namespaced("second");
        // Sibling outputs are not visible through the proxy...
        assert!(!second.contains("token"));
        assert_eq!(second.get("token"), None);
        // ...but framework keys are, regardless of proxy depth.
        assert_eq!(second.get(keys::CACHE_HITS), Some(&json!(1)));
        second.set(keys::CACHE_HITS, json!(2));
        second.set("token", json!("beta"));
    }

    assert_eq!(store.get("first").unwrap()["token"], json!("alpha"));
    assert_eq!(store.get("second").unwrap()["token"], json!("beta"));
    assert_eq!(store.get(keys::CACHE_HITS), Some(&json!(2)));
}

#[test]
fn arbitrary_proxy_sequences_never_nest_framework_keys() {
    let mut store = SharedStore::new();
    for node in ["a", "b", "c"] {
        let mut view = store.namespaced(node);
        view.set("out", json!(node));
        view.setdefault(keys::WARNINGS, json!([]));
        view.set(keys::MODIFIED_NODES, json!([node]));
        view.setdefault("extra", json!({"n": 1}));
        view.delete("missing-key");
        view.delete(keys::LLM_CALLS);
    }

    for (key, value) in store.root() {
        if is_framework_key(key) {
            continue;
        }
        let namespace = value.as_object().expect("namespaces are objects");
        assert!(
            namespace.keys().all(|k| !is_framework_key(k)),
            "framework key nested under `{key}`"
        );
    }
}

#[test]
fn earlier_namespaces_are_only_appended_to() {
    let mut store = SharedStore::new();
    store.namespaced("early").set("out", json!("v1"));
    let before = store.get("early").cloned();

    // A later node working through its own proxy cannot touch `early`.
    {
        let mut late = store.namespaced("late");
        late.set("out", json!("v2"));
        late.delete("out");
        late.set("early", json!("not a namespace write"));
    }
    assert_eq!(store.get("early"), before.as_ref());
    // The late node's `early` key landed inside its own namespace.
    assert_eq!(
        store.get("late").unwrap()["early"],
        json!("not a namespace write")
    );
}

#[test]
fn warning_insertion_order_is_preserved() {
    let mut store = SharedStore::new();
    for i in 0..4 {
        store.push_warning(
            WarningRecord::new(ErrorCategory::TemplateError, format!("warning {i}"))
                .with_node_id("n")
                .with_param(format!("p{i}")),
        );
    }
    let messages: Vec<String> = store.warnings().into_iter().map(|w| w.message).collect();
    assert_eq!(messages, vec!["warning 0", "warning 1", "warning 2", "warning 3"]);
}
