// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The passive record of a single span, as consumed by a
//! [`Collector`](crate::collector::Collector).

use std::collections::HashMap;
use std::time::Duration;

use crate::clock::{Clock, TimePoint};
use crate::id_generator::TraceId;
use crate::span::SpanConfig;
use crate::tags;

/// Immutable seed applied to every span before any [`SpanConfig`] overrides.
/// These come from the tracer's configuration (`DD_SERVICE`, `DD_ENV`, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpanDefaults {
    pub service: String,
    pub service_type: String,
    pub name: String,
    pub environment: String,
    pub version: String,
    pub tags: HashMap<String, String>,
}

/// All data fields relevant to a span. `SpanData` is what trace segments
/// accumulate and what the collector serializes.
#[derive(Clone, Debug)]
pub struct SpanData {
    pub service: String,
    pub service_type: String,
    pub name: String,
    pub resource: String,
    pub trace_id: TraceId,
    pub span_id: u64,
    /// Zero means "no parent."
    pub parent_id: u64,
    pub start: TimePoint,
    pub duration: Duration,
    pub error: bool,
    pub tags: HashMap<String, String>,
    pub numeric_tags: HashMap<String, f64>,
}

impl SpanData {
    /// Build a span record honoring `config`, falling back to `defaults` for
    /// anything unset. The properties of `config`, if set, override the
    /// properties of `defaults`. `clock` provides the start time when
    /// `config` does not.
    pub(crate) fn with_config(
        defaults: &SpanDefaults,
        config: &SpanConfig,
        clock: &Clock,
    ) -> SpanData {
        let service = config
            .service
            .clone()
            .unwrap_or_else(|| defaults.service.clone());
        let mut name = config.name.clone().unwrap_or_else(|| defaults.name.clone());
        if name.is_empty() {
            // Spans always carry a nonempty operation name.
            name = service.clone();
        }

        let mut span_tags = defaults.tags.clone();
        let environment = config
            .environment
            .clone()
            .unwrap_or_else(|| defaults.environment.clone());
        if !environment.is_empty() {
            span_tags.insert(tags::ENVIRONMENT.to_string(), environment);
        }
        let version = config
            .version
            .clone()
            .unwrap_or_else(|| defaults.version.clone());
        if !version.is_empty() {
            span_tags.insert(tags::VERSION.to_string(), version);
        }
        for (key, value) in &config.tags {
            if !tags::is_internal(key) {
                span_tags.insert(key.clone(), value.clone());
            }
        }

        let resource = config.resource.clone().unwrap_or_else(|| name.clone());
        let service_type = config
            .service_type
            .clone()
            .unwrap_or_else(|| defaults.service_type.clone());
        let start = config.start.unwrap_or_else(|| crate::clock::now(clock));

        SpanData {
            service,
            service_type,
            name,
            resource,
            trace_id: TraceId::default(),
            span_id: 0,
            parent_id: 0,
            start,
            duration: Duration::ZERO,
            error: false,
            tags: span_tags,
            numeric_tags: HashMap::new(),
        }
    }

    /// The value of the `env` tag, if any.
    pub fn environment(&self) -> Option<&str> {
        self.tags.get(tags::ENVIRONMENT).map(String::as_str)
    }

    /// The value of the `version` tag, if any.
    pub fn version(&self) -> Option<&str> {
        self.tags.get(tags::VERSION).map(String::as_str)
    }
}
