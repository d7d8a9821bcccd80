//! Property 7: under N threads performing disjoint-key put/get/delete,
//! the final state matches a serial replay in some linearization
//! consistent with each thread's own program order. Disjoint key ranges
//! per thread make the "some linearization" requirement checkable
//! deterministically: each thread's final view of its own keys must
//! match what it itself wrote last.

use std::sync::Arc;
use std::thread;
use test_log::test;
use zipcache_index::{CompressedBTree, Config, ABSENT};

#[test]
fn disjoint_key_ranges_are_linearizable_per_thread() {
    const THREADS: i64 = 8;
    const KEYS_PER_THREAD: i64 = 200;

    let tree = Arc::new(CompressedBTree::init(16, 32, Config::default().sub_pages(16)).unwrap());

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let tree = Arc::clone(&tree);
            thread::spawn(move || {
                let base = t * KEYS_PER_THREAD;
                for offset in 0..KEYS_PER_THREAD {
                    let key = base + offset;
                    tree.put(key, key * 10).unwrap();
                }
                for offset in (0..KEYS_PER_THREAD).step_by(3) {
                    let key = base + offset;
                    tree.delete(key);
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    for t in 0..THREADS {
        let base = t * KEYS_PER_THREAD;
        for offset in 0..KEYS_PER_THREAD {
            let key = base + offset;
            let expected = if offset % 3 == 0 { ABSENT } else { key * 10 };
            assert_eq!(tree.get(key), expected, "mismatch at key {key}");
        }
    }
    assert_eq!(tree.size(), (THREADS * (KEYS_PER_THREAD - KEYS_PER_THREAD.div_ceil(3))) as usize);
}

/// A `get` issued after a `put` on the same key from another thread,
/// once that `put`'s `join`/channel handoff has occurred, must observe
/// it — the `RwLock` provides the happens-before edge.
#[test]
fn get_after_completed_put_from_another_thread_observes_it() {
    let tree = Arc::new(CompressedBTree::init(8, 16, Config::default()).unwrap());
    let writer = {
        let tree = Arc::clone(&tree);
        thread::spawn(move || {
            tree.put(42, 4242).unwrap();
        })
    };
    writer.join().unwrap();
    assert_eq!(tree.get(42), 4242);
}
