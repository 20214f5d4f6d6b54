// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Memoizing async cache with request coalescing, TTL and stale-while-refresh grace.
//!
//! [`Cache`] sits in front of a slow or expensive [`Producer`] and remembers its answers for a
//! while. It combines three behaviors that are usually built separately:
//!
//! - **Memoization with TTL**: a produced or written value is served for `ttl` without calling
//!   the producer again.
//! - **Single-flight coalescing**: while a value is being produced, further lookups for the
//!   same key join the running invocation instead of starting their own. Every joined lookup
//!   receives the same outcome.
//! - **Stale-while-refresh**: for `grace` after expiry, lookups keep getting the old value
//!   immediately while exactly one background refresh replaces it.
//!
//! Producer failures are never cached. All lookups waiting on a failed invocation receive the
//! error, the entry is dropped, and the next lookup tries again.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use memoflight::{Cache, Settle};
//! use tick::Clock;
//! # futures::executor::block_on(async {
//!
//! let cache = Cache::builder::<u64, String>(Clock::new_frozen())
//!     .ttl(Duration::from_secs(60))
//!     .grace(Duration::from_secs(30))
//!     .producer(|id: u64, settle: Settle<u64, String>| {
//!         // Hand `settle` to a task or thread; here the value is ready right away.
//!         settle.ok(format!("user-{id}"));
//!     })
//!     .build();
//!
//! assert_eq!(cache.get(7).await?, "user-7");
//!
//! // Served from memory until the TTL elapses.
//! assert_eq!(cache.get(7).current(), Some(&"user-7".to_string()));
//! assert_eq!(cache.stats().producer_calls, 1);
//! # Ok::<(), memoflight::Error>(())
//! # });
//! ```
//!
//! # Producers
//!
//! A producer receives the key and a [`Settle`] handle and reports the outcome through it,
//! synchronously or later from any thread or task. Any `Fn(K, Settle<K, V>)` closure is a
//! producer. With the `tokio` feature, [`SpawnProducer`] runs an `async fn(K) -> Result<V, E>`
//! on the current runtime instead. A producer may attach a per-value TTL with
//! [`Settle::ok_with_ttl`] or by returning a [`Produced`].
//!
//! # Expiry and Collection
//!
//! Entries whose value is past `expires_at + grace` are not served and are removed lazily:
//! after a successful write or settlement, the cache sweeps out such entries if at least
//! `collection_interval` has passed since the previous sweep. Entries with a producer
//! invocation in flight are never removed. [`Cache::collect`] forces a sweep, and with the
//! `tokio` feature `Cache::spawn_collector` runs sweeps periodically.
//!
//! # Time
//!
//! All expiry decisions read a [`tick::Clock`] handed to [`Cache::builder`]. Production code
//! typically uses `Clock::new_tokio`. Tests drive time by hand with `tick::ClockControl`,
//! available through `tick`'s `test-util` feature, which this crate's `test-util` feature
//! turns on.
//!
//! # Features
//!
//! - `serde` (default): `Serialize`/`Deserialize` for [`CacheOptions`], durations as seconds.
//! - `tokio` (default): [`SpawnProducer`], `CacheBuilder::async_producer` and
//!   `Cache::spawn_collector`.
//! - `metrics`: records every cache activity on an OpenTelemetry counter, see
//!   `CacheBuilder::metrics`.
//! - `test-util`: enables `tick/test-util` for frozen and manually advanced clocks.

mod builder;
mod cache;
mod collector;
mod entry;
mod error;
mod freshness;
mod lookup;
#[cfg(any(feature = "metrics", test))]
mod metrics;
mod options;
mod producer;
mod settle;
mod stats;
#[cfg(test)]
mod testing;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use error::{Error, ProducerError};
pub use lookup::Lookup;
pub use options::{CacheOptions, DEFAULT_COLLECTION_INTERVAL};
pub use producer::Producer;
#[cfg(feature = "tokio")]
#[cfg_attr(docsrs, doc(cfg(feature = "tokio")))]
pub use producer::SpawnProducer;
pub use settle::{Produced, Settle};
pub use stats::CacheStats;
