// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use dd_trace::{
    Collector, Error, IdGenerator, Logger, SpanData, TraceChunk, TraceId, TracerConfig,
};

/// Collector that remembers everything it was sent.
#[derive(Default)]
pub struct MockCollector {
    pub chunks: Mutex<Vec<TraceChunk>>,
}

impl MockCollector {
    pub fn new() -> Arc<MockCollector> {
        Arc::new(MockCollector::default())
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.lock().unwrap().len()
    }

    pub fn span_count(&self) -> usize {
        self.chunks
            .lock()
            .unwrap()
            .iter()
            .map(|chunk| chunk.spans.len())
            .sum()
    }

    pub fn first_chunk(&self) -> TraceChunk {
        self.chunks.lock().unwrap()[0].clone()
    }

    /// The first span of the first chunk.
    pub fn first_span(&self) -> SpanData {
        self.chunks.lock().unwrap()[0].spans[0].clone()
    }

    /// The root span (parent within the chunk absent) of the first chunk.
    pub fn first_root_span(&self) -> SpanData {
        let chunks = self.chunks.lock().unwrap();
        let chunk = &chunks[0];
        let ids: Vec<u64> = chunk.spans.iter().map(|span| span.span_id).collect();
        chunk
            .spans
            .iter()
            .find(|span| !ids.contains(&span.parent_id))
            .expect("chunk has a local root")
            .clone()
    }
}

impl Collector for MockCollector {
    fn send(
        &self,
        chunk: TraceChunk,
        _response_handler: &Arc<dd_trace::sampling::TraceSampler>,
    ) -> Result<(), Error> {
        self.chunks.lock().unwrap().push(chunk);
        Ok(())
    }

    fn flush_and_stop(&self, _timeout: Duration) {}
}

/// Collector whose `send` always fails with a fixed error.
pub struct FailureCollector {
    pub failure: Error,
}

impl FailureCollector {
    pub fn new() -> Arc<FailureCollector> {
        Arc::new(FailureCollector {
            failure: Error::new(dd_trace::Code::HttpClientFailure, "the dog ate my trace"),
        })
    }
}

impl Collector for FailureCollector {
    fn send(
        &self,
        _chunk: TraceChunk,
        _response_handler: &Arc<dd_trace::sampling::TraceSampler>,
    ) -> Result<(), Error> {
        Err(self.failure.clone())
    }

    fn flush_and_stop(&self, _timeout: Duration) {}
}

/// Logger that captures everything.
#[derive(Default)]
pub struct MockLogger {
    pub errors: Mutex<Vec<Error>>,
    pub warnings: Mutex<Vec<String>>,
    pub startup: Mutex<Vec<String>>,
}

impl MockLogger {
    pub fn new() -> Arc<MockLogger> {
        Arc::new(MockLogger::default())
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().unwrap().len()
    }

    pub fn first_error(&self) -> Error {
        self.errors.lock().unwrap()[0].clone()
    }
}

impl Logger for MockLogger {
    fn log_error(&self, error: &Error) {
        self.errors.lock().unwrap().push(error.clone());
    }

    fn log_warning(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }

    fn log_startup(&self, message: &str) {
        self.startup.lock().unwrap().push(message.to_string());
    }
}

/// Deterministic ID source: a fixed trace ID and sequential span IDs.
pub struct FixedIdGenerator {
    pub trace_id: TraceId,
    next_span_id: AtomicU64,
}

impl FixedIdGenerator {
    pub fn new(trace_id_low: u64) -> Arc<FixedIdGenerator> {
        Arc::new(FixedIdGenerator {
            trace_id: TraceId::from_low(trace_id_low),
            next_span_id: AtomicU64::new(1_000),
        })
    }
}

impl IdGenerator for FixedIdGenerator {
    fn trace_id(&self, _start: SystemTime) -> TraceId {
        self.trace_id
    }

    fn span_id(&self) -> u64 {
        self.next_span_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// A `TracerConfig` wired with a mock collector and logger, suitable for
/// observing segment behavior without any I/O.
pub fn test_config(collector: &Arc<MockCollector>, logger: &Arc<MockLogger>) -> TracerConfig {
    TracerConfig {
        service: Some("testsvc".to_string()),
        collector: Some(Arc::clone(collector) as Arc<dyn Collector>),
        logger: Some(Arc::clone(logger) as Arc<dyn Logger>),
        log_on_startup: Some(false),
        ..Default::default()
    }
}

/// Header carriers for extraction tests.
pub fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}
