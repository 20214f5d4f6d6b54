// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Tests for the diagnostic events the cache emits.

use std::{io::Write, sync::Arc, time::Duration};

use memoflight::{Cache, Settle};
use parking_lot::Mutex;
use tick::Clock;
use tracing_subscriber::fmt::MakeWriter;

/// Captures formatted log output into a shared buffer.
#[derive(Debug, Clone, Default)]
struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock()).to_string()
    }

    fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(output.contains(expected), "log output does not contain '{expected}', got:\n{output}");
    }

    fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[test]
fn miss_and_failure_are_logged() {
    let capture = LogCapture::default();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let cache = Cache::builder::<String, u32>(Clock::new_frozen())
        .ttl(Duration::from_secs(3600))
        .producer(|_key: String, settle: Settle<String, u32>| settle.err("database offline"))
        .build();

    let _ = futures::executor::block_on(cache.get("key".to_string()));

    capture.assert_contains("cache miss, invoking producer");
    capture.assert_contains("producer failed, entry removed");
    capture.assert_contains("database offline");
}

#[test]
fn abandoned_settle_is_logged() {
    let capture = LogCapture::default();
    let _guard = tracing::subscriber::set_default(capture.subscriber());

    let cache = Cache::builder::<String, u32>(Clock::new_frozen())
        .ttl(Duration::from_secs(3600))
        .producer(|_key: String, settle: Settle<String, u32>| drop(settle))
        .build();

    let _ = futures::executor::block_on(cache.get("key".to_string()));

    capture.assert_contains("settle handle dropped without an outcome");
}
