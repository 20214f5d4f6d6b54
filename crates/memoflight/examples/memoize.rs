// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Puts a `memoflight` cache in front of a slow lookup.
//!
//! Concurrent requests for the same user share one backend call, repeated requests are served
//! from memory, and once the value goes stale it keeps being served while a single refresh runs.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memoflight::Cache;
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), memoflight::Error> {
    let backend_calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&backend_calls);

    let cache = Cache::builder::<u64, String>(Clock::new_tokio())
        .ttl(Duration::from_millis(300))
        .grace(Duration::from_secs(5))
        .async_producer(move |user_id: u64| {
            let call = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                println!("  backend call #{call} for user {user_id}");
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, std::io::Error>(format!("User(id: {user_id}, version: {call})"))
            }
        })
        .build();

    println!("Five concurrent requests for user 42:");
    let lookups: Vec<_> = (0..5).map(|_| cache.get(42)).collect();
    for (index, result) in futures::future::join_all(lookups).await.into_iter().enumerate() {
        println!("  request {index}: {}", result?);
    }

    println!("\nRepeated request while fresh:");
    println!("  {}", cache.get(42).await?);

    tokio::time::sleep(Duration::from_millis(400)).await;

    println!("\nRequest after expiry, within grace:");
    let stale = cache.get(42);
    println!("  served immediately: {:?}", stale.current());

    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("  after refresh: {:?}", cache.peek(&42));

    let stats = cache.stats();
    println!(
        "\nbackend calls: {}, hits: {}, stale hits: {}, misses: {}",
        backend_calls.load(Ordering::SeqCst),
        stats.hits,
        stats.stale_hits,
        stats.misses
    );

    Ok(())
}
