use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use quarry_core::{EntryKey, Queue, QueueError, Store, StoreConfig};
use tempfile::TempDir;
use uuid::Uuid;

fn open_test_store() -> (Store, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open(StoreConfig::new(temp_dir.path())).unwrap();
    (store, temp_dir)
}

fn fake_job() -> Vec<u8> {
    format!(
        r#"{{"jid":"{}","queue":"default","args":[1,2,3],"class":"SomeWorker"}}"#,
        Uuid::new_v4()
    )
    .into_bytes()
}

#[test]
fn basic_queue_ops() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    assert_eq!(q.size().unwrap(), 0);
    assert_eq!(q.pop().unwrap(), None);

    q.push(5, b"hello").unwrap();
    assert_eq!(q.size().unwrap(), 1);

    q.push(5, b"world").unwrap();
    assert_eq!(q.size().unwrap(), 2);

    let values: [&[u8]; 2] = [b"hello", b"world"];
    q.each(|index, _key, value| {
        assert_eq!(values[index], value);
        Ok::<(), QueueError>(())
    })
    .unwrap();

    assert_eq!(q.pop().unwrap().as_deref(), Some(b"hello".as_slice()));
    assert_eq!(q.size().unwrap(), 1);

    assert_eq!(q.clear().unwrap(), 1);
    assert_eq!(q.size().unwrap(), 0);
}

#[test]
fn priority_ordering() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    assert_eq!(q.size().unwrap(), 0);

    let n = 100;
    // Push n jobs at low priority, checking size each time
    for i in 0..n {
        q.push(1, b"1").unwrap();
        assert_eq!(q.size().unwrap(), i + 1);
    }
    // Then n at high priority
    for i in 0..n {
        q.push(3, b"3").unwrap();
        assert_eq!(q.size().unwrap(), i + 1 + n);
    }
    // Then n at medium priority
    for i in 0..n {
        q.push(2, b"2").unwrap();
        assert_eq!(q.size().unwrap(), i + 1 + 2 * n);
    }
    assert_eq!(q.size().unwrap(), 3 * n);

    // All high-priority payloads come out first, then medium, then low
    for i in 0..n {
        assert_eq!(q.pop().unwrap().as_deref(), Some(b"3".as_slice()));
        assert_eq!(q.size().unwrap(), 3 * n - (i + 1));
    }
    for i in 0..n {
        assert_eq!(q.pop().unwrap().as_deref(), Some(b"2".as_slice()));
        assert_eq!(q.size().unwrap(), 2 * n - (i + 1));
    }
    for i in 0..n {
        assert_eq!(q.pop().unwrap().as_deref(), Some(b"1".as_slice()));
        assert_eq!(q.size().unwrap(), n - (i + 1));
    }
}

#[test]
fn paging_respects_priority() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    q.push(1, b"a").unwrap();
    q.push(2, b"b").unwrap();
    q.push(3, b"c").unwrap();

    let expectations: [(&[u8], usize, u64, u8); 3] = [
        (b"c", 0, 3, 3),
        (b"b", 1, 2, 2),
        (b"a", 2, 1, 1),
    ];

    let mut count = 0;
    q.page(0, 3, |index, key, value| {
        let (expected_value, expected_index, expected_sequence, expected_priority) =
            expectations[count];
        let entry = EntryKey::try_from(key)?;
        assert_eq!(expected_index, index);
        assert_eq!(expected_priority, entry.priority);
        assert_eq!(expected_sequence, entry.sequence);
        assert_eq!(expected_value, value);
        count += 1;
        Ok::<(), QueueError>(())
    })
    .unwrap();
    assert_eq!(count, 3);
}

#[test]
fn page_order_equals_pop_order() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    for (priority, payload) in [(2u8, "b1"), (1, "a1"), (3, "c1"), (2, "b2"), (3, "c2")] {
        q.push(priority, payload.as_bytes()).unwrap();
    }

    let size = q.size().unwrap() as usize;
    let mut paged = Vec::new();
    q.page(0, size, |_index, _key, value| {
        paged.push(value.to_vec());
        Ok::<(), QueueError>(())
    })
    .unwrap();

    let mut popped = Vec::new();
    while let Some(payload) = q.pop().unwrap() {
        popped.push(payload);
    }
    assert_eq!(paged, popped);
}

#[test]
fn heavy() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    assert_eq!(q.size().unwrap(), 0);
    q.push(5, b"first").unwrap();

    let n = 5000;
    for i in 0..n {
        q.push(5, &fake_job()).unwrap();
        assert_eq!(q.size().unwrap(), i + 2);
    }

    q.push(5, b"last").unwrap();
    assert_eq!(q.size().unwrap(), n + 2);

    // A re-fetched handle sees the same entries
    let q = store.get_queue("default").unwrap();
    assert_eq!(q.size().unwrap(), n + 2);

    assert_eq!(q.pop().unwrap().as_deref(), Some(b"first".as_slice()));
    for i in 0..n {
        assert!(q.pop().unwrap().is_some());
        assert_eq!(q.size().unwrap(), n - i);
    }
    assert_eq!(q.pop().unwrap().as_deref(), Some(b"last".as_slice()));
    assert_eq!(q.size().unwrap(), 0);

    assert_eq!(q.pop().unwrap(), None);
}

#[test]
fn threaded() {
    let (store, _temp_dir) = open_test_store();
    let q = store.get_queue("default").unwrap();

    let thread_count = 5;
    let n = 1000;
    let counter = AtomicI64::new(0);

    std::thread::scope(|scope| {
        for _ in 0..thread_count {
            scope.spawn(|| push_and_pop(n, &q, &counter));
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(q.size().unwrap(), 0);

    let mut leftover = 0;
    q.each(|_index, _key, _value| {
        leftover += 1;
        Ok::<(), QueueError>(())
    })
    .unwrap();
    assert_eq!(leftover, 0);
}

fn push_and_pop(n: usize, q: &Arc<Queue>, counter: &AtomicI64) {
    for _ in 0..n {
        q.push(5, &fake_job()).unwrap();
        counter.fetch_add(1, Ordering::SeqCst);
    }

    // Every pop must find an entry: each worker only starts popping after
    // its own pushes have committed, so the queue cannot drain early
    for _ in 0..n {
        let value = q.pop().unwrap();
        assert!(value.is_some());
        let seen = counter.fetch_sub(1, Ordering::SeqCst) - 1;
        assert!(seen >= 0, "counter went negative: {seen}");
    }
}
