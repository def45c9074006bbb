//! Store Tests
//!
//! Tests for the in-memory key-value backend.

use std::sync::Arc;
use std::thread;

use wirekv::{MemoryStore, Store};

#[test]
fn test_get_set() {
    let store = MemoryStore::new();

    assert_eq!(store.get("k"), None);
    store.set("k".to_string(), "v".to_string());
    assert_eq!(store.get("k"), Some("v".to_string()));
}

#[test]
fn test_set_overwrites() {
    let store = MemoryStore::new();

    store.set("k".to_string(), "v1".to_string());
    store.set("k".to_string(), "v2".to_string());
    assert_eq!(store.get("k"), Some("v2".to_string()));
    assert_eq!(store.len(), 1);
}

#[test]
fn test_delete() {
    let store = MemoryStore::new();

    store.set("k".to_string(), "v".to_string());
    assert!(store.delete("k"));
    assert_eq!(store.get("k"), None);
    assert!(!store.delete("k"));
}

#[test]
fn test_len_and_is_empty() {
    let store = MemoryStore::new();
    assert!(store.is_empty());

    store.set("a".to_string(), "1".to_string());
    store.set("b".to_string(), "2".to_string());
    assert_eq!(store.len(), 2);
    assert!(!store.is_empty());
}

#[test]
fn test_concurrent_writers_and_readers() {
    let store = Arc::new(MemoryStore::new());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for i in 0..100 {
                    store.set(format!("w{}-k{}", w, i), format!("v{}", i));
                }
            })
        })
        .collect();

    for writer in writers {
        writer.join().unwrap();
    }

    assert_eq!(store.len(), 400);
    assert_eq!(store.get("w2-k57"), Some("v57".to_string()));
}
