// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Producers compute values for keys the cache cannot serve.

use std::hash::Hash;

use crate::Settle;

/// Computes the value for a key on a cache miss or a stale lookup.
///
/// The cache calls [`produce`](Self::produce) at most once per key at a time and never while
/// holding its internal lock. The producer must eventually consume the [`Settle`] handle; it is
/// free to do so synchronously, from a spawned task, or from another thread.
///
/// Any `Fn(K, Settle<K, V>) + Send + Sync` closure is a producer:
///
/// ```
/// use std::time::Duration;
/// use memoflight::{Cache, Settle};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = Cache::builder::<u32, String>(Clock::new_frozen())
///     .ttl(Duration::from_secs(60))
///     .producer(|key: u32, settle: Settle<u32, String>| settle.ok(format!("value-{key}")))
///     .build();
///
/// assert_eq!(cache.get(7).await.unwrap(), "value-7");
/// # });
/// ```
pub trait Producer<K, V>: Send + Sync
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Starts computing the value for `key` and reports the outcome through `settle`.
    fn produce(&self, key: K, settle: Settle<K, V>);
}

impl<K, V, F> Producer<K, V> for F
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(K, Settle<K, V>) + Send + Sync,
{
    fn produce(&self, key: K, settle: Settle<K, V>) {
        self(key, settle);
    }
}

#[cfg(feature = "tokio")]
pub use spawn::SpawnProducer;

#[cfg(feature = "tokio")]
mod spawn {
    use std::{fmt::Debug, hash::Hash};

    use super::Producer;
    use crate::{Produced, Settle};

    /// Runs an async function as a producer by spawning it on the current Tokio runtime.
    ///
    /// The function returns `Result<P, E>` where `P` is either the value itself or a
    /// [`Produced`] carrying a TTL override. If no Tokio runtime is available when a miss
    /// occurs, the invocation settles with an error.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use memoflight::{Cache, SpawnProducer};
    /// use tick::Clock;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let cache = Cache::builder::<u32, u64>(Clock::new_frozen())
    ///     .ttl(Duration::from_secs(60))
    ///     .producer(SpawnProducer::new(|key: u32| async move {
    ///         Ok::<_, std::io::Error>(u64::from(key) * 2)
    ///     }))
    ///     .build();
    ///
    /// assert_eq!(cache.get(21).await.unwrap(), 42);
    /// # }
    /// ```
    #[derive(Clone)]
    pub struct SpawnProducer<F> {
        func: F,
    }

    impl<F> SpawnProducer<F> {
        /// Wraps `func`, which is called once per producer invocation.
        pub fn new(func: F) -> Self {
            Self { func }
        }
    }

    impl<F> Debug for SpawnProducer<F> {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("SpawnProducer").finish_non_exhaustive()
        }
    }

    impl<K, V, F, Fut, P, E> Producer<K, V> for SpawnProducer<F>
    where
        K: Clone + Eq + Hash + Send + Sync + 'static,
        V: Clone + Send + Sync + 'static,
        F: Fn(K) -> Fut + Send + Sync,
        Fut: Future<Output = Result<P, E>> + Send + 'static,
        P: Into<Produced<V>>,
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        fn produce(&self, key: K, settle: Settle<K, V>) {
            let handle = match tokio::runtime::Handle::try_current() {
                Ok(handle) => handle,
                Err(error) => {
                    settle.err(error);
                    return;
                }
            };

            let work = (self.func)(key);
            handle.spawn(async move {
                settle.settle(work.await);
            });
        }
    }
}
