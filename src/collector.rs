// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The seam between trace segments and wherever finished traces go.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Error;
use crate::sampling::trace_sampler::TraceSampler;
use crate::span_data::SpanData;

/// One finalized trace segment, ready for transport. All of a segment's
/// spans travel together; a chunk is never split across payloads.
#[derive(Clone, Debug)]
pub struct TraceChunk {
    /// The segment's sampling priority, already imprinted on the root span's
    /// `_sampling_priority_v1` metric.
    pub priority: i32,
    pub spans: Vec<SpanData>,
}

/// Destination for finalized trace segments. The default implementation is
/// [`DatadogAgent`](crate::datadog_agent::DatadogAgent); tests substitute
/// in-memory fakes.
pub trait Collector: Send + Sync {
    /// Accept a finalized trace segment. Must not block beyond a short
    /// critical section; transport happens later, off the caller's thread.
    /// `response_handler` receives any sampling feedback produced by the
    /// destination.
    fn send(&self, chunk: TraceChunk, response_handler: &Arc<TraceSampler>) -> Result<(), Error>;

    /// Best-effort transmit anything pending, then stop accepting input.
    /// Called by the tracer during shutdown.
    fn flush_and_stop(&self, timeout: Duration);
}
