// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error type delivered to lookups.

use std::sync::Arc;

/// Shared, type-erased error produced by a [`Producer`](crate::Producer).
pub type ProducerError = Arc<dyn std::error::Error + Send + Sync>;

/// An error delivered to a lookup instead of a value.
///
/// Errors are cheap to clone: every waiter coalesced onto one failed producer invocation
/// receives a clone of the same underlying producer error.
///
/// # Examples
///
/// ```
/// use memoflight::{Cache, Error};
/// use tick::Clock;
/// # futures::executor::block_on(async {
///
/// let cache = Cache::builder::<String, u32>(Clock::new_frozen()).build();
///
/// // Without a producer, a miss fails right away.
/// let result = cache.get("key".to_string()).await;
/// assert!(matches!(result, Err(Error::NoProducer)));
/// # });
/// ```
#[derive(Debug, Clone, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The key has no servable value and the cache has no producer to compute one.
    #[error("cache miss and no producer is configured")]
    NoProducer,

    /// The producer settled with an error. The error is not cached.
    #[error("producer failed: {0}")]
    Producer(ProducerError),

    /// The producer dropped its settlement handle without settling, or the cache was dropped
    /// while the lookup was still waiting.
    #[error("producer abandoned the lookup without settling it")]
    Abandoned,
}

impl Error {
    /// Creates a producer error from any error-like value.
    pub fn from_source(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Producer(Arc::from(source.into()))
    }

    /// Returns the producer's error downcast to `T`, if this is a producer failure of that type.
    ///
    /// # Examples
    ///
    /// ```
    /// use memoflight::Error;
    ///
    /// let error = Error::from_source(std::io::Error::other("disk on fire"));
    /// let io = error.source_as::<std::io::Error>().expect("io error");
    /// assert_eq!(io.to_string(), "disk on fire");
    /// ```
    #[must_use]
    pub fn source_as<T: std::error::Error + 'static>(&self) -> Option<&T> {
        match self {
            Self::Producer(source) => {
                let source: &(dyn std::error::Error + Send + Sync + 'static) = source.as_ref();
                source.downcast_ref::<T>()
            }
            Self::NoProducer | Self::Abandoned => None,
        }
    }

    /// Returns `true` if both errors are producer failures sharing the same underlying error.
    #[must_use]
    pub fn is_same_failure(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Producer(a), Self::Producer(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_producer_error() {
        let error = Error::from_source("boom");
        let clone = error.clone();

        assert!(error.is_same_failure(&clone));
        assert!(!error.is_same_failure(&Error::from_source("boom")));
        assert!(!Error::Abandoned.is_same_failure(&Error::Abandoned));
    }

    #[test]
    fn source_as_downcasts_producer_errors_only() {
        let error = Error::from_source(std::io::Error::other("offline"));

        assert!(error.source_as::<std::io::Error>().is_some());
        assert!(error.source_as::<std::fmt::Error>().is_none());
        assert!(Error::NoProducer.source_as::<std::io::Error>().is_none());
    }

    #[test]
    fn display_includes_producer_message() {
        assert_eq!(Error::from_source("offline").to_string(), "producer failed: offline");
        assert_eq!(Error::NoProducer.to_string(), "cache miss and no producer is configured");
    }

    #[test]
    fn error_is_send_and_sync() {
        static_assertions::assert_impl_all!(Error: Send, Sync, Clone, std::error::Error);
    }
}
