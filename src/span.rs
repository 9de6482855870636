// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The user-facing span handle.
//!
//! A [`Span`] represents an extent of time in which some operation of
//! interest occurs: an RPC request, a database query, a calculation. Spans
//! are created by [`Tracer`](crate::tracer::Tracer) or by
//! [`Span::create_child`], never directly. A span finishes when it is
//! dropped; finishing records its duration and reports it to the trace
//! segment shared by every span of the local trace.
//!
//! A span handle is single-owner and is the only way to mutate its own
//! fields, so those mutations need no lock. Anything shared across the
//! trace (trace tags, the sampling decision, finalization) lives in the
//! [`TraceSegment`] and is synchronized there.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::clock::TimePoint;
use crate::id_generator::TraceId;
use crate::propagation::Injector;
use crate::tags;
use crate::trace_segment::TraceSegment;

/// Optional per-span overrides, applied on top of the tracer's
/// [`SpanDefaults`](crate::span_data::SpanDefaults).
#[derive(Clone, Debug, Default)]
pub struct SpanConfig {
    pub service: Option<String>,
    pub service_type: Option<String>,
    pub name: Option<String>,
    pub resource: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    /// Override the start time; defaults to "now" at creation.
    pub start: Option<TimePoint>,
    pub tags: HashMap<String, String>,
}

pub struct Span {
    segment: Arc<TraceSegment>,
    /// Present from creation until the span finishes in `drop`.
    data: Option<crate::span_data::SpanData>,
    end_time: Option<Instant>,
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("data", &self.data)
            .field("end_time", &self.end_time)
            .finish_non_exhaustive()
    }
}

impl Span {
    pub(crate) fn new(data: crate::span_data::SpanData, segment: Arc<TraceSegment>) -> Span {
        Span {
            segment,
            data: Some(data),
            end_time: None,
        }
    }

    fn data(&self) -> &crate::span_data::SpanData {
        // Only `drop` takes the data.
        self.data.as_ref().expect("span data present until drop")
    }

    fn data_mut(&mut self) -> &mut crate::span_data::SpanData {
        self.data.as_mut().expect("span data present until drop")
    }

    /// This span's ID.
    pub fn id(&self) -> u64 {
        self.data().span_id
    }

    pub fn trace_id(&self) -> TraceId {
        self.data().trace_id
    }

    /// The ID of this span's parent, or `None` for a root span.
    pub fn parent_id(&self) -> Option<u64> {
        match self.data().parent_id {
            0 => None,
            id => Some(id),
        }
    }

    pub fn start_time(&self) -> TimePoint {
        self.data().start
    }

    /// Whether an error has been noted on this span.
    pub fn error(&self) -> bool {
        self.data().error
    }

    pub fn service_name(&self) -> &str {
        &self.data().service
    }

    pub fn name(&self) -> &str {
        &self.data().name
    }

    pub fn resource_name(&self) -> &str {
        &self.data().resource
    }

    /// The value of the tag `name`, if present.
    pub fn lookup_tag(&self, name: &str) -> Option<&str> {
        self.data().tags.get(name).map(String::as_str)
    }

    /// Set or overwrite a tag. Names beginning with `_dd.` are reserved for
    /// the library and are ignored here.
    pub fn set_tag(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        if tags::is_internal(&name) {
            return;
        }
        self.data_mut().tags.insert(name, value.into());
    }

    pub fn remove_tag(&mut self, name: &str) {
        self.data_mut().tags.remove(name);
    }

    /// e.g. "ingress-nginx-useast1".
    pub fn set_service_name(&mut self, service: impl Into<String>) {
        self.data_mut().service = service.into();
    }

    /// e.g. "web".
    pub fn set_service_type(&mut self, service_type: impl Into<String>) {
        self.data_mut().service_type = service_type.into();
    }

    /// e.g. "handle.request" or "execute.query".
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.data_mut().name = name.into();
    }

    /// e.g. "/api/v1/info" or "select count(*) from users".
    pub fn set_resource_name(&mut self, resource: impl Into<String>) {
        self.data_mut().resource = resource.into();
    }

    /// Mark whether an error occurred during this span. Clearing the flag
    /// also removes any error message, type, and stack tags.
    pub fn set_error(&mut self, error: bool) {
        let data = self.data_mut();
        data.error = error;
        if !error {
            data.tags.remove(tags::ERROR_MESSAGE);
            data.tags.remove(tags::ERROR_TYPE);
            data.tags.remove(tags::ERROR_STACK);
        }
    }

    /// Attach a message to this span's error, implying `set_error(true)`.
    pub fn set_error_message(&mut self, message: impl Into<String>) {
        let data = self.data_mut();
        data.error = true;
        data.tags
            .insert(tags::ERROR_MESSAGE.to_string(), message.into());
    }

    /// Attach an error type, implying `set_error(true)`.
    pub fn set_error_type(&mut self, error_type: impl Into<String>) {
        let data = self.data_mut();
        data.error = true;
        data.tags
            .insert(tags::ERROR_TYPE.to_string(), error_type.into());
    }

    /// Attach a call stack, implying `set_error(true)`.
    pub fn set_error_stack(&mut self, stack: impl Into<String>) {
        let data = self.data_mut();
        data.error = true;
        data.tags.insert(tags::ERROR_STACK.to_string(), stack.into());
    }

    /// Override the end time recorded when this span is dropped.
    pub fn set_end_time(&mut self, end: Instant) {
        self.end_time = Some(end);
    }

    /// A child span of this span, configured by the tracer's defaults.
    pub fn create_child(&self) -> Span {
        self.create_child_with_config(&SpanConfig::default())
    }

    pub fn create_child_with_config(&self, config: &SpanConfig) -> Span {
        let data = self.segment.new_child_data(self.data(), config);
        Span::new(data, Arc::clone(&self.segment))
    }

    /// Write this span's trace context into `writer` for propagation to a
    /// downstream service.
    pub fn inject(&self, writer: &mut dyn Injector) {
        self.segment.inject(self.data(), writer);
    }

    /// The segment shared by all spans of this local trace. Trace-wide
    /// operations, such as
    /// [`override_sampling_priority`](TraceSegment::override_sampling_priority),
    /// live there.
    pub fn trace_segment(&self) -> &TraceSegment {
        &self.segment
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let Some(mut data) = self.data.take() else {
            return;
        };
        let end = self.end_time.unwrap_or_else(|| self.segment.now().tick);
        data.duration = end.saturating_duration_since(data.start.tick);
        self.segment.finish_span(data);
    }
}
