//! End-to-end behavior of the sequence store: append/cursor round-trips,
//! ordering, lifecycle safety, and trim transactionality.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use cnlog_core::{ChangeId, DomainId};
use cnlog_store::{ChangelogEnv, ErrorSink, LogSink, SequenceStore, StoreError};

/// Sink that counts reports, for asserting which paths stay silent.
#[derive(Default)]
struct CountingSink {
    reports: AtomicUsize,
}

impl ErrorSink for CountingSink {
    fn unexpected_storage_failure(&self, _error: &StoreError) {
        self.reports.fetch_add(1, Ordering::SeqCst);
    }
}

fn open_store() -> (tempfile::TempDir, Arc<ChangelogEnv>, SequenceStore) {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(ChangelogEnv::open(dir.path().join("changelog.db")).unwrap());
    let store = SequenceStore::open(Arc::clone(&env), "draft_cn", Arc::new(LogSink)).unwrap();
    (dir, env, store)
}

fn append_n(store: &SequenceStore, seq: u64) {
    store.append(
        seq,
        &format!("value-{seq}"),
        &DomainId::from("dc=example,dc=com"),
        &ChangeId::from(format!("{seq:016x}")),
    );
}

/// Keys visited by a full forward scan from the beginning.
fn scan_keys(store: &SequenceStore) -> Vec<u64> {
    let mut cursor = store.open_read_cursor(-1).unwrap();
    let mut keys = Vec::new();
    while cursor.advance() {
        keys.push(cursor.current_key().unwrap());
    }
    cursor.close();
    keys
}

#[test]
fn round_trip_exact_start() {
    let (_dir, _env, store) = open_store();
    store.append(
        7,
        "cookie-state",
        &DomainId::from("o=test"),
        &ChangeId::from("0000012a000000010000"),
    );

    // An exact hit is the cursor's initial current record.
    let cursor = store.open_read_cursor(7).unwrap();
    assert_eq!(cursor.current_key(), Some(7));
    assert_eq!(cursor.current_value(), Some("cookie-state"));
    assert_eq!(cursor.current_domain_id(), Some(&DomainId::from("o=test")));
    assert_eq!(
        cursor.current_change_id(),
        Some(&ChangeId::from("0000012a000000010000"))
    );
    cursor.close();
}

#[test]
fn round_trip_via_advance() {
    let (_dir, _env, store) = open_store();
    store.append(
        7,
        "cookie-state",
        &DomainId::from("o=test"),
        &ChangeId::from("0000012a000000010000"),
    );

    let mut cursor = store.open_read_cursor(-1).unwrap();
    assert_eq!(cursor.current_key(), None);
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(7));
    assert_eq!(cursor.current_value(), Some("cookie-state"));
    assert!(!cursor.advance());
    assert_eq!(cursor.current_key(), None);
    cursor.close();
}

#[test]
fn iteration_is_numeric_order() {
    let (_dir, _env, store) = open_store();
    // Includes pairs that sort wrongly as decimal text.
    for seq in [100, 5, 99, 1, 1000, 10, 9, 256, 255] {
        append_n(&store, seq);
    }
    assert_eq!(scan_keys(&store), vec![1, 5, 9, 10, 99, 100, 255, 256, 1000]);
    assert_eq!(store.read_first_key(), 1);
    assert_eq!(store.read_last_key(), 1000);
}

#[test]
fn nearest_key_fallback() {
    let (_dir, _env, store) = open_store();
    for seq in [10, 20, 30] {
        append_n(&store, seq);
    }

    // 15 was trimmed away (never existed): the first advance must land on
    // 20, with no skip to 30 and no duplicate of 10.
    let mut cursor = store.open_read_cursor(15).unwrap();
    assert_eq!(cursor.current_key(), None);
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(20));
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(30));
    assert!(!cursor.advance());
    cursor.close();
}

#[test]
fn nearest_key_fallback_before_first() {
    let (_dir, _env, store) = open_store();
    for seq in [10, 20, 30] {
        append_n(&store, seq);
    }

    let mut cursor = store.open_read_cursor(5).unwrap();
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(10));
    cursor.close();
}

#[test]
fn start_past_the_end_is_not_available() {
    let (_dir, _env, store) = open_store();
    for seq in [10, 20, 30] {
        append_n(&store, seq);
    }

    match store.open_read_cursor(1000) {
        Err(StoreError::NotAvailable { seq }) => assert_eq!(seq, 1000),
        other => panic!("expected NotAvailable, got {:?}", other.map(|_| ())),
    }

    // An empty store has nothing at or after any non-negative start.
    store.clear();
    assert!(matches!(
        store.open_read_cursor(0),
        Err(StoreError::NotAvailable { seq: 0 })
    ));
}

#[test]
fn append_is_an_upsert() {
    let (_dir, _env, store) = open_store();
    store.append(5, "first", &DomainId::from("o=a"), &ChangeId::from("01"));
    store.append(5, "second", &DomainId::from("o=b"), &ChangeId::from("02"));

    assert_eq!(store.count(), 1);
    let cursor = store.open_read_cursor(5).unwrap();
    assert_eq!(cursor.current_value(), Some("second"));
    assert_eq!(cursor.current_domain_id(), Some(&DomainId::from("o=b")));
    cursor.close();
}

#[test]
fn closed_store_degrades_to_safe_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(ChangelogEnv::open(dir.path().join("changelog.db")).unwrap());
    let sink = Arc::new(CountingSink::default());
    let store =
        SequenceStore::open(env, "draft_cn", Arc::clone(&sink) as Arc<dyn ErrorSink>).unwrap();
    append_n(&store, 1);
    store.shutdown();
    store.shutdown(); // idempotent

    // An append racing a shutdown is a silent no-op, not a sink report.
    store.append(2, "late", &DomainId::from("o=test"), &ChangeId::from("02"));
    assert_eq!(store.count(), 0);
    assert_eq!(store.read_first_key(), 0);
    assert_eq!(store.read_last_key(), 0);
    assert_eq!(sink.reports.load(Ordering::SeqCst), 0);

    // Cursors on a closed store are harmless and immediately exhausted.
    let mut read = store.open_read_cursor(1).unwrap();
    assert!(!read.advance());
    assert_eq!(read.current_key(), None);
    read.close();

    let mut del = store.open_delete_cursor().unwrap();
    assert!(!del.advance().unwrap());
    assert!(matches!(del.delete(), Err(StoreError::CursorClosed)));
    del.close();

    // clear on a closed store is a no-op, not a resurrection.
    store.clear();
    assert_eq!(store.count(), 0);
}

#[test]
fn clear_empties_but_keeps_the_store_usable() {
    let (_dir, _env, store) = open_store();
    for seq in 1..=10 {
        append_n(&store, seq);
    }
    assert_eq!(store.count(), 10);

    store.clear();
    assert_eq!(store.count(), 0);
    assert_eq!(store.read_first_key(), 0);

    append_n(&store, 42);
    assert_eq!(scan_keys(&store), vec![42]);
}

#[test]
fn concurrent_appends_survive_clear_whole_or_not_at_all() {
    let (_dir, _env, store) = open_store();

    thread::scope(|s| {
        for t in 0..4u64 {
            let store = &store;
            s.spawn(move || {
                for i in 0..50u64 {
                    append_n(store, t * 1000 + i);
                }
            });
        }
        let store = &store;
        s.spawn(move || {
            store.clear();
        });
    });

    // Whatever survived the clear must be fully-formed records in order;
    // a decode failure would end the scan early and break count parity.
    let keys = scan_keys(&store);
    assert_eq!(keys.len() as u64, store.count());
    assert!(keys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn trim_commits_on_close() {
    let (_dir, _env, store) = open_store();
    for seq in [1, 2, 3] {
        append_n(&store, seq);
    }

    let mut trim = store.open_delete_cursor().unwrap();
    assert!(trim.advance().unwrap());
    assert_eq!(trim.current_key(), Some(1));
    trim.delete().unwrap();
    assert!(trim.advance().unwrap());
    assert_eq!(trim.current_key(), Some(2));
    trim.delete().unwrap();
    trim.close();

    assert_eq!(scan_keys(&store), vec![3]);
    assert_eq!(store.count(), 1);
}

#[test]
fn trim_rolls_back_on_abort() {
    let (_dir, _env, store) = open_store();
    for seq in [1, 2, 3] {
        append_n(&store, seq);
    }

    let mut trim = store.open_delete_cursor().unwrap();
    assert!(trim.advance().unwrap());
    trim.delete().unwrap();
    trim.abort();

    assert_eq!(scan_keys(&store), vec![1, 2, 3]);
}

#[test]
fn trim_rolls_back_on_drop() {
    let (_dir, _env, store) = open_store();
    for seq in [1, 2, 3] {
        append_n(&store, seq);
    }

    {
        let mut trim = store.open_delete_cursor().unwrap();
        assert!(trim.advance().unwrap());
        trim.delete().unwrap();
        // Dropped without close or abort.
    }

    assert_eq!(scan_keys(&store), vec![1, 2, 3]);
}

#[test]
fn delete_requires_a_position() {
    let (_dir, _env, store) = open_store();
    append_n(&store, 1);

    let mut trim = store.open_delete_cursor().unwrap();
    assert!(matches!(trim.delete(), Err(StoreError::NotPositioned)));

    assert!(trim.advance().unwrap());
    assert!(!trim.advance().unwrap());
    // Exhausted again means unpositioned.
    assert!(matches!(trim.delete(), Err(StoreError::NotPositioned)));
    trim.abort();
}

#[test]
fn count_matches_full_scan() {
    let (_dir, _env, store) = open_store();
    for seq in [4, 8, 15, 16, 23, 42] {
        append_n(&store, seq);
    }

    let mut trim = store.open_delete_cursor().unwrap();
    assert!(trim.advance().unwrap());
    trim.delete().unwrap();
    trim.close();

    assert_eq!(store.count(), scan_keys(&store).len() as u64);
}

#[test]
fn records_persist_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let env = Arc::new(ChangelogEnv::open(dir.path().join("changelog.db")).unwrap());

    {
        let store =
            SequenceStore::open(Arc::clone(&env), "draft_cn", Arc::new(LogSink)).unwrap();
        for seq in [10, 20] {
            append_n(&store, seq);
        }
        store.shutdown();
    }

    let store = SequenceStore::open(env, "draft_cn", Arc::new(LogSink)).unwrap();
    assert_eq!(scan_keys(&store), vec![10, 20]);
    assert_eq!(store.read_last_key(), 20);
}

#[test]
fn readers_see_appends_committed_before_they_advance() {
    let (_dir, _env, store) = open_store();
    append_n(&store, 1);

    let mut cursor = store.open_read_cursor(-1).unwrap();
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(1));

    // Committed while the cursor is open and past its position.
    append_n(&store, 2);
    assert!(cursor.advance());
    assert_eq!(cursor.current_key(), Some(2));
    cursor.close();
}
