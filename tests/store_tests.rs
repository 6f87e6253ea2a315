//! Tests for the record store
//!
//! These tests verify:
//! - Open/create/reopen lifecycle and configuration validation
//! - Round trips with and without compression
//! - Upsert, absence, ordinal and count semantics
//! - Synchronous enumeration with early stop
//! - Text dump output
//! - Lock and handle release on every exit path
//! - Concurrent writers and readers

use std::fs;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use blobfs::lock::{LockFile, LockMode};
use blobfs::{BlobError, Record, Store, StoreConfig, Value};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_path(temp_dir.path().join("test.db")).unwrap();
    (temp_dir, store)
}

fn setup_compressed_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("test.db"))
        .compress(true)
        .build();
    let store = Store::open(config).unwrap();
    (temp_dir, store)
}

fn fill(store: &Store, count: usize) {
    for i in 0..count {
        let record = store.create(format!("test{}", i), b"aslkdfjaklsdf".to_vec()).unwrap();
        store.save(&record).unwrap();
    }
}

/// Lock the store's lock file from outside the store
fn outside_lock(store: &Store) -> LockFile {
    LockFile::new(store.lock_path(), Duration::from_millis(1))
}

// =============================================================================
// Lifecycle Tests
// =============================================================================

#[test]
fn test_store_open_creates_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fresh.db");

    let store = Store::open_path(&path).unwrap();

    assert!(path.exists());
    assert_eq!(store.path(), path);
    assert_eq!(store.lock_path(), temp_dir.path().join("fresh.db.lock"));
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_store_open_empty_path_fails() {
    let result = Store::open_path("");
    assert!(matches!(result, Err(BlobError::InvalidArgument(_))));
}

#[test]
fn test_store_open_rejects_bad_poll_interval() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("test.db"))
        .lock_poll_interval(Duration::ZERO)
        .build();

    assert!(matches!(Store::open(config), Err(BlobError::InvalidArgument(_))));
}

#[test]
fn test_store_read_only_requires_existing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("missing.db"))
        .read_only(true)
        .build();

    assert!(matches!(Store::open(config), Err(BlobError::InvalidArgument(_))));
    assert!(!temp_dir.path().join("missing.db").exists());
}

#[test]
fn test_store_reopen_keeps_records() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");

    {
        let store = Store::open_path(&path).unwrap();
        let record = store.create("persist", b"still here".to_vec()).unwrap();
        store.save(&record).unwrap();
        store.close().unwrap();
    }

    let store = Store::open_path(&path).unwrap();
    assert_eq!(store.get("persist").unwrap().data, b"still here".to_vec());
}

#[test]
fn test_store_closed_rejects_calls() {
    let (_temp, store) = setup_temp_store();
    let record = store.create("a", b"1".to_vec()).unwrap();

    store.close().unwrap();
    store.close().unwrap();

    assert!(store.is_closed());
    assert!(matches!(store.save(&record), Err(BlobError::Closed)));
    assert!(matches!(store.get("a"), Err(BlobError::Closed)));
    assert!(matches!(store.count(), Err(BlobError::Closed)));
}

// =============================================================================
// Record Tests
// =============================================================================

#[test]
fn test_record_new_defaults() {
    let record = Record::new("a.txt", b"hello".to_vec(), false).unwrap();

    assert_eq!(record.name, "a.txt");
    assert_eq!(record.permissions, 0o644);
    assert_eq!(record.size, 5);
    assert_eq!(record.created, record.modified);
    assert!(!record.is_compressed);
    assert!(!record.is_encrypted);
}

#[test]
fn test_record_new_compressed() {
    let payload = vec![b'a'; 10_000];
    let record = Record::new("big", payload.clone(), true).unwrap();

    assert!(record.is_compressed);
    assert_ne!(record.data, payload);
    assert_eq!(record.size, record.data.len());
    assert!(record.size < payload.len());
}

#[test]
fn test_record_empty_name_rejected() {
    let (_temp, store) = setup_temp_store();

    assert!(matches!(
        store.create("", b"x".to_vec()),
        Err(BlobError::InvalidArgument(_))
    ));
}

#[test]
fn test_store_save_rejects_empty_name() {
    let (_temp, store) = setup_temp_store();
    let mut record = store.create("x", b"x".to_vec()).unwrap();
    record.name.clear();

    assert!(matches!(store.save(&record), Err(BlobError::InvalidArgument(_))));
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_store_save_get() {
    let (_temp, store) = setup_temp_store();

    let record = store.create("test1", b"aslkdfjaklsdf".to_vec()).unwrap();
    store.save(&record).unwrap();

    let got = store.get("test1").unwrap();
    assert_eq!(got.name, "test1");
    assert_eq!(got.data, record.data);
    assert_eq!(got.size, 13);
    assert_eq!(got.permissions, 0o644);
    assert!(!got.is_compressed);
}

#[test]
fn test_store_compressed_round_trip() {
    let (_temp, store) = setup_compressed_store();
    let payload = b"the same words again and again and again and again".repeat(100);

    let record = store.create("words", payload.clone()).unwrap();
    assert!(record.is_compressed);
    store.save(&record).unwrap();

    let got = store.get("words").unwrap();
    assert_eq!(got.data, payload);
    assert_eq!(got.size, payload.len());
    assert!(!got.is_compressed);
}

#[test]
fn test_store_size_column_holds_stored_length() {
    let (_temp, store) = setup_compressed_store();
    let payload = vec![0u8; 50_000];

    let record = store.create("zeros", payload).unwrap();
    store.save(&record).unwrap();

    let stored = store
        .count_query("SELECT size FROM fs WHERE name = 'zeros'")
        .unwrap();
    assert_eq!(stored as usize, record.data.len());
    assert_eq!(store.get("zeros").unwrap().size, 50_000);
}

#[test]
fn test_store_empty_payload() {
    for compress in [false, true] {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::builder(temp_dir.path().join("test.db"))
            .compress(compress)
            .build();
        let store = Store::open(config).unwrap();

        let record = store.create("empty", Vec::new()).unwrap();
        store.save(&record).unwrap();

        let got = store.get("empty").unwrap();
        assert!(got.data.is_empty());
        assert_eq!(got.size, 0);
    }
}

#[test]
fn test_store_binary_payload() {
    let (_temp, store) = setup_compressed_store();
    let payload: Vec<u8> = (0..=255u8).cycle().take(100_000).collect();

    store.save(&store.create("bin", payload.clone()).unwrap()).unwrap();
    assert_eq!(store.get("bin").unwrap().data, payload);
}

#[test]
fn test_store_read_back_record_can_be_saved_again() {
    let (_temp, store) = setup_compressed_store();
    let payload = b"abcabcabcabcabcabcabc".to_vec();

    store.save(&store.create("again", payload.clone()).unwrap()).unwrap();
    let got = store.get("again").unwrap();
    store.save(&got).unwrap();

    assert_eq!(store.get("again").unwrap().data, payload);
}

#[test]
fn test_store_mixed_compression_in_one_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");

    let plain = Store::open_path(&path).unwrap();
    plain.save(&plain.create("plain", b"p".repeat(500)).unwrap()).unwrap();
    plain.close().unwrap();

    let packed = Store::open(StoreConfig::builder(&path).compress(true).build()).unwrap();
    packed.save(&packed.create("packed", b"q".repeat(500)).unwrap()).unwrap();

    assert_eq!(packed.get("plain").unwrap().data, b"p".repeat(500));
    assert_eq!(packed.get("packed").unwrap().data, b"q".repeat(500));
}

#[test]
fn test_store_encryption_flag_is_inert() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("test.db"))
        .encrypt_passphrase("hunter2")
        .build();
    let store = Store::open(config).unwrap();

    let record = store.create("secret", b"plain text".to_vec()).unwrap();
    assert!(!record.is_encrypted);
    store.save(&record).unwrap();

    let got = store.get("secret").unwrap();
    assert!(!got.is_encrypted);
    assert_eq!(got.data, b"plain text".to_vec());
}

// =============================================================================
// Upsert / Absence Tests
// =============================================================================

#[test]
fn test_store_upsert_replaces() {
    let (_temp, store) = setup_temp_store();

    store.save(&store.create("key", b"value1".to_vec()).unwrap()).unwrap();
    store.save(&store.create("key", b"value2".to_vec()).unwrap()).unwrap();

    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get("key").unwrap().data, b"value2".to_vec());
}

#[test]
fn test_store_exists() {
    let (_temp, store) = setup_temp_store();
    store.save(&store.create("test1", b"x".to_vec()).unwrap()).unwrap();

    assert!(store.exists("test1").unwrap());
    assert!(!store.exists("doesn't exist").unwrap());
}

#[test]
fn test_store_get_missing() {
    let (_temp, store) = setup_temp_store();

    let err = store.get("missing").unwrap_err();
    assert!(err.is_not_found());
}

// =============================================================================
// Ordinal / Count Tests
// =============================================================================

#[test]
fn test_store_get_by_ordinal_visits_every_record() {
    let (_temp, store) = setup_compressed_store();
    fill(&store, 5);

    let mut names: Vec<String> = (0..5)
        .map(|i| store.get_by_ordinal(i).unwrap().name)
        .collect();
    names.sort();

    assert_eq!(names, vec!["test0", "test1", "test2", "test3", "test4"]);
    assert_eq!(store.get_by_ordinal(0).unwrap().data, b"aslkdfjaklsdf".to_vec());
}

#[test]
fn test_store_get_by_ordinal_out_of_range() {
    let (_temp, store) = setup_temp_store();
    fill(&store, 3);

    assert!(matches!(store.get_by_ordinal(3), Err(BlobError::NotFound(_))));
    assert!(matches!(store.get_by_ordinal(1000), Err(BlobError::NotFound(_))));
}

#[test]
fn test_store_get_by_ordinal_beyond_i64() {
    let (_temp, store) = setup_temp_store();
    store.save(&store.create("only", b"x".to_vec()).unwrap()).unwrap();

    assert!(matches!(store.get_by_ordinal(usize::MAX), Err(BlobError::NotFound(_))));
    assert_eq!(store.get_by_ordinal(0).unwrap().name, "only");
}

#[test]
fn test_store_count() {
    let (_temp, store) = setup_temp_store();
    assert_eq!(store.count().unwrap(), 0);

    fill(&store, 42);
    assert_eq!(store.count().unwrap(), 42);
}

#[test]
fn test_store_count_query() {
    let (_temp, store) = setup_temp_store();
    fill(&store, 20);

    let ones = store
        .count_query("SELECT COUNT(name) FROM fs WHERE name LIKE 'test1%'")
        .unwrap();
    // test1, test10..test19
    assert_eq!(ones, 11);

    let none = store
        .count_query("SELECT size FROM fs WHERE name = 'nope'")
        .unwrap();
    assert_eq!(none, 0);
}

#[test]
fn test_store_count_query_bad_sql() {
    let (_temp, store) = setup_temp_store();

    let result = store.count_query("SELECT COUNT(*) FROM nowhere");
    assert!(matches!(
        result,
        Err(BlobError::StorageFault { op: "count", .. })
    ));
}

// =============================================================================
// Enumeration Tests
// =============================================================================

#[test]
fn test_store_get_all_stops_early() {
    let (_temp, store) = setup_temp_store();
    fill(&store, 100);

    let mut seen = Vec::new();
    store
        .get_all("SELECT * FROM fs ORDER BY name", &[], |record| {
            seen.push(record.name.clone());
            if record.name == "test3" {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();

    assert_eq!(seen.last().unwrap(), "test3");
    assert!(seen.len() < 100);
}

#[test]
fn test_store_get_all_with_args() {
    let (_temp, store) = setup_compressed_store();
    fill(&store, 30);

    let mut count = 0;
    store
        .get_all(
            "SELECT * FROM fs WHERE name LIKE ?1",
            &[Value::Text("test2%".to_string())],
            |record| {
                assert_eq!(record.data, b"aslkdfjaklsdf".to_vec());
                count += 1;
                ControlFlow::Continue(())
            },
        )
        .unwrap();

    // test2, test20..test29
    assert_eq!(count, 11);
}

#[test]
fn test_store_get_all_bad_sql() {
    let (_temp, store) = setup_temp_store();

    let result = store.get_all("bad sql", &[], |_| ControlFlow::Continue(()));
    assert!(matches!(
        result,
        Err(BlobError::StorageFault { op: "get_all", .. })
    ));
}

// =============================================================================
// Dump Tests
// =============================================================================

#[test]
fn test_store_dump_to_text() {
    let (temp, store) = setup_temp_store();
    store.save(&store.create("it's.txt", b"hi".to_vec()).unwrap()).unwrap();

    let dump_path = store.dump_to_text().unwrap();
    assert_eq!(dump_path, temp.path().join("test.db.sql"));

    let text = fs::read_to_string(&dump_path).unwrap();
    assert!(text.starts_with("PRAGMA foreign_keys=OFF;\nBEGIN TRANSACTION;\n"));
    assert!(text.contains("CREATE TABLE"));
    assert!(text.contains(" fs ("));
    assert!(text.contains(" users ("));
    assert!(text.contains(" groups ("));
    assert!(text.contains("INSERT INTO \"fs\" VALUES('it''s.txt',420,0,0,2,"));
    assert!(text.contains("X'6869'"));
    assert!(text.trim_end().ends_with("COMMIT;"));
}

// =============================================================================
// Read-only Tests
// =============================================================================

#[test]
fn test_store_read_only() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    {
        let store = Store::open_path(&path).unwrap();
        fill(&store, 3);
    }

    let store = Store::open(StoreConfig::builder(&path).read_only(true).build()).unwrap();
    assert_eq!(store.count().unwrap(), 3);
    assert!(store.exists("test1").unwrap());

    let record = store.create("new", b"x".to_vec()).unwrap();
    assert!(matches!(
        store.save(&record),
        Err(BlobError::StorageFault { op: "save", .. })
    ));
    assert_eq!(store.count().unwrap(), 3);
}

#[test]
fn test_store_read_only_still_writes_lock_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");
    let lock_path = {
        let store = Store::open_path(&path).unwrap();
        fill(&store, 2);
        store.lock_path().to_path_buf()
    };
    fs::remove_file(&lock_path).unwrap();

    let store = Store::open(StoreConfig::builder(&path).read_only(true).build()).unwrap();
    assert_eq!(store.count().unwrap(), 2);
    assert!(lock_path.exists());
}

#[test]
fn test_store_read_only_rejects_foreign_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("empty.db");
    fs::write(&path, b"").unwrap();

    let result = Store::open(StoreConfig::builder(&path).read_only(true).build());
    assert!(matches!(result, Err(BlobError::InvalidArgument(_))));
}

// =============================================================================
// Lock Tests
// =============================================================================

#[test]
fn test_store_lock_released_after_each_call() {
    let (_temp, store) = setup_temp_store();
    let lock = outside_lock(&store);

    store.save(&store.create("a", b"1".to_vec()).unwrap()).unwrap();
    assert!(lock.try_acquire(LockMode::Exclusive).unwrap().is_some());

    store.get("a").unwrap();
    assert!(lock.try_acquire(LockMode::Exclusive).unwrap().is_some());

    assert!(store.get("missing").is_err());
    assert!(lock.try_acquire(LockMode::Exclusive).unwrap().is_some());

    assert!(store.count_query("not sql").is_err());
    assert!(lock.try_acquire(LockMode::Exclusive).unwrap().is_some());
}

#[test]
fn test_store_save_times_out_without_side_effects() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("test.db"))
        .lock_timeout(Duration::from_millis(50))
        .build();
    let store = Store::open(config).unwrap();
    let record = store.create("blocked", b"x".to_vec()).unwrap();

    let held = outside_lock(&store)
        .acquire(LockMode::Exclusive, Duration::from_secs(1))
        .unwrap();
    assert!(matches!(store.save(&record), Err(BlobError::LockTimeout { .. })));
    assert!(matches!(store.get("blocked"), Err(BlobError::LockTimeout { .. })));
    drop(held);

    assert!(!store.exists("blocked").unwrap());
}

#[test]
fn test_store_readers_share_the_lock() {
    let temp_dir = TempDir::new().unwrap();
    let config = StoreConfig::builder(temp_dir.path().join("test.db"))
        .lock_timeout(Duration::from_millis(50))
        .build();
    let store = Store::open(config).unwrap();
    fill(&store, 2);

    let _reader = outside_lock(&store)
        .acquire(LockMode::Shared, Duration::from_secs(1))
        .unwrap();

    // Reads proceed next to another reader, writes wait for it
    assert_eq!(store.get("test1").unwrap().name, "test1");
    let record = store.create("w", b"x".to_vec()).unwrap();
    assert!(matches!(store.save(&record), Err(BlobError::LockTimeout { .. })));
}

// =============================================================================
// Concurrent Access Tests
// =============================================================================

#[test]
fn test_store_concurrent_writes_shared_handle() {
    let (_temp, store) = setup_temp_store();
    let store = Arc::new(store);

    let mut handles = vec![];
    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                let record = store
                    .create(format!("thread{}_file{}", t, i), format!("value{}", i).into_bytes())
                    .unwrap();
                store.save(&record).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count().unwrap(), 200);
    assert_eq!(store.get("thread7_file24").unwrap().data, b"value24".to_vec());
}

#[test]
fn test_store_concurrent_writes_separate_handles() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("test.db");

    let mut handles = vec![];
    for t in 0..6 {
        let path = path.clone();
        handles.push(thread::spawn(move || {
            let store = Store::open(StoreConfig::builder(&path).compress(t % 2 == 0).build())
                .unwrap();
            for i in 0..20 {
                let record = store
                    .create(format!("handle{}_file{}", t, i), vec![t as u8; 1000])
                    .unwrap();
                store.save(&record).unwrap();
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    let store = Store::open_path(&path).unwrap();
    assert_eq!(store.count().unwrap(), 120);
    assert_eq!(store.get("handle3_file19").unwrap().data, vec![3u8; 1000]);
}

#[test]
fn test_store_concurrent_readers_and_writers() {
    let (_temp, store) = setup_temp_store();
    store.save(&store.create("test1", b"aslkdfjaklsdf".to_vec()).unwrap()).unwrap();
    let store = Arc::new(store);

    let mut handles = vec![];
    for t in 0..8 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..20 {
                if t % 2 == 0 {
                    let record = store.create(format!("test{}", 100 + t * 20 + i), b"x".to_vec()).unwrap();
                    store.save(&record).unwrap();
                } else {
                    let record = store.get("test1").unwrap();
                    assert_eq!(record.name, "test1");
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.count().unwrap(), 1 + 4 * 20);
}
