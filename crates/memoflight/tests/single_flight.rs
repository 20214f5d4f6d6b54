// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for request coalescing across threads.

use std::{
    sync::{Arc, Barrier},
    thread,
    time::Duration,
};

use memoflight::{Cache, Error, Settle};
use parking_lot::Mutex;
use tick::Clock;

const HOUR: Duration = Duration::from_secs(3600);

type Parked = Arc<Mutex<Vec<Settle<u32, String>>>>;

fn parking_cache(parked: &Parked) -> Cache<u32, String> {
    let parked = Arc::clone(parked);
    Cache::builder::<u32, String>(Clock::new_frozen())
        .ttl(HOUR)
        .producer(move |_key: u32, settle: Settle<u32, String>| parked.lock().push(settle))
        .build()
}

/// Polls until `condition` holds, failing the test after a generous timeout.
fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..2000 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    panic!("condition not reached in time");
}

#[test]
fn concurrent_lookups_share_one_invocation() {
    const THREADS: usize = 8;

    let parked = Parked::default();
    let cache = parking_cache(&parked);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let cache = cache.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                futures::executor::block_on(cache.get(1))
            })
        })
        .collect();

    wait_until(|| cache.stats().misses == THREADS as u64);
    assert_eq!(parked.lock().len(), 1);

    let settle = parked.lock().remove(0);
    settle.ok("one".to_string());

    for handle in handles {
        let result = handle.join().expect("thread panicked");
        assert_eq!(result.expect("value"), "one");
    }
    assert_eq!(cache.stats().producer_calls, 1);
}

#[test]
fn different_keys_do_not_coalesce() {
    let parked = Parked::default();
    let cache = parking_cache(&parked);

    let first = cache.get(1);
    let second = cache.get(2);
    assert_eq!(parked.lock().len(), 2);

    let settles: Vec<_> = parked.lock().drain(..).collect();
    for settle in settles {
        let key = *settle.key();
        settle.ok(format!("value-{key}"));
    }

    assert_eq!(futures::executor::block_on(first).expect("value"), "value-1");
    assert_eq!(futures::executor::block_on(second).expect("value"), "value-2");
}

#[test]
fn settle_from_another_thread() {
    let cache = Cache::builder::<u32, String>(Clock::new_frozen())
        .ttl(HOUR)
        .producer(|key: u32, settle: Settle<u32, String>| {
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(10));
                settle.ok(key.to_string());
            });
        })
        .build();

    let lookups: Vec<_> = (0..4).map(|_| cache.get(7)).collect();
    for lookup in lookups {
        assert_eq!(futures::executor::block_on(lookup).expect("value"), "7");
    }
    assert_eq!(cache.stats().producer_calls, 1);
}

#[test]
fn dropped_lookup_does_not_cancel_invocation() {
    let parked = Parked::default();
    let cache = parking_cache(&parked);

    drop(cache.get(1));
    let settle = parked.lock().remove(0);
    settle.ok("kept".to_string());

    assert_eq!(cache.peek(&1).as_deref(), Some("kept"));
}

#[test]
fn dropping_the_cache_releases_waiters() {
    let parked = Parked::default();
    let cache = parking_cache(&parked);

    let lookup = cache.get(1);
    drop(cache);

    assert!(matches!(futures::executor::block_on(lookup), Err(Error::Abandoned)));

    // Settling after the cache is gone is a no-op.
    let settle = parked.lock().remove(0);
    settle.ok("late".to_string());
}

#[test]
fn failure_fans_out_to_all_waiters() {
    let parked = Parked::default();
    let cache = parking_cache(&parked);

    let lookups: Vec<_> = (0..3).map(|_| cache.get(1)).collect();
    let settle = parked.lock().remove(0);
    settle.err("backend unavailable");

    let errors: Vec<_> = lookups
        .into_iter()
        .map(|lookup| futures::executor::block_on(lookup).expect_err("failure"))
        .collect();
    assert!(errors.iter().all(|error| error.is_same_failure(&errors[0])));
    assert_eq!(errors[0].to_string(), "producer failed: backend unavailable");
}
