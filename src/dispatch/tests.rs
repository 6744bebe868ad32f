use super::HandlerRegistry;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&Value) + Send + Sync>) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let log_for_make = log.clone();
    let make = move |name: &str| -> Box<dyn Fn(&Value) + Send + Sync> {
        let log = log_for_make.clone();
        let name = name.to_string();
        Box::new(move |_: &Value| log.lock().unwrap().push(name.clone()))
    };
    (log, make)
}

#[test]
fn test_emit_in_registration_order() {
    let registry = HandlerRegistry::new();
    let (log, make) = recorder();
    registry.on("connected", make("a"));
    registry.on("connected", make("b"));
    registry.on("connected", make("c"));

    registry.emit("connected", &json!({}));
    assert_eq!(*log.lock().unwrap(), vec!["a", "b", "c"]);
}

#[test]
fn test_emit_passes_payload() {
    let registry = HandlerRegistry::new();
    let seen = Arc::new(Mutex::new(None));
    let seen_clone = seen.clone();
    registry.on("payment_status", move |v| {
        *seen_clone.lock().unwrap() = Some(v.clone());
    });

    registry.emit("payment_status", &json!({"status": "completed"}));
    assert_eq!(
        seen.lock().unwrap().clone(),
        Some(json!({"status": "completed"}))
    );
}

#[test]
fn test_off_removes_only_that_listener() {
    let registry = HandlerRegistry::new();
    let (log, make) = recorder();
    registry.on("message", make("a"));
    let b = registry.on("message", make("b"));
    registry.on("message", make("c"));

    assert!(registry.off("message", b));
    assert!(!registry.off("message", b));
    assert!(!registry.off("other", b));
    assert_eq!(registry.listener_count("message"), 2);

    registry.emit("message", &Value::Null);
    assert_eq!(*log.lock().unwrap(), vec!["a", "c"]);
}

#[test]
fn test_panicking_handler_does_not_stop_others() {
    let registry = HandlerRegistry::new();
    let (log, make) = recorder();
    registry.on("user_message", make("before"));
    registry.on("user_message", |_| panic!("handler failure"));
    registry.on("user_message", make("after"));

    registry.emit("user_message", &Value::Null);
    assert_eq!(*log.lock().unwrap(), vec!["before", "after"]);

    // registry still usable after a panic
    registry.emit("user_message", &Value::Null);
    assert_eq!(log.lock().unwrap().len(), 4);
}

#[test]
fn test_off_during_dispatch_does_not_affect_current_pass() {
    let registry = Arc::new(HandlerRegistry::new());
    let (log, make) = recorder();
    let victim = Arc::new(Mutex::new(None));

    {
        let registry_for_handler = registry.clone();
        let victim = victim.clone();
        registry.on("tick", move |_| {
            if let Some(id) = victim.lock().unwrap().take() {
                registry_for_handler.off("tick", id);
            }
        });
    }
    let id = registry.on("tick", make("victim"));
    *victim.lock().unwrap() = Some(id);

    registry.emit("tick", &Value::Null);
    assert_eq!(*log.lock().unwrap(), vec!["victim"]);

    registry.emit("tick", &Value::Null);
    assert_eq!(*log.lock().unwrap(), vec!["victim"]);
}

#[test]
fn test_emit_without_listeners_is_noop() {
    let registry = HandlerRegistry::new();
    registry.emit("nobody", &Value::Null);
    assert_eq!(registry.listener_count("nobody"), 0);
}
