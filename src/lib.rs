// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Datadog distributed tracing client.
//!
//! This library instruments application code with spans, groups them into
//! traces, decides which traces to keep, and ships them to the Datadog
//! Agent over HTTP. It is meant to be embedded in long-running host
//! processes such as web servers, proxies, and RPC services.
//!
//! ```no_run
//! use dd_trace::{finalize_config, Tracer, TracerConfig};
//!
//! let mut config = TracerConfig::default();
//! config.service = Some("my-service".to_string());
//! let config = finalize_config(config)?;
//! let tracer = Tracer::new(config)?;
//!
//! {
//!     let mut span = tracer.create_span();
//!     span.set_resource_name("GET /users");
//!     let _child = span.create_child();
//!     // Both spans finish as they go out of scope; the trace is then
//!     // finalized and queued for the agent.
//! }
//! # Ok::<(), dd_trace::Error>(())
//! ```
//!
//! Trace context crosses process boundaries through the
//! [`propagation`] module: [`Tracer::extract_span`] continues a trace
//! described by inbound headers, and [`Span::inject`] writes outbound
//! headers for downstream services.

pub mod clock;
pub mod collector;
pub mod config;
pub mod datadog_agent;
mod environment;
pub mod error;
pub mod http;
pub mod id_generator;
pub mod logger;
pub mod propagation;
pub mod sampling;
pub mod scheduler;
pub mod span;
pub mod span_data;
pub mod tags;
pub mod trace_segment;
pub mod tracer;

pub use clock::{default_clock, Clock, TimePoint};
pub use collector::{Collector, TraceChunk};
pub use config::{
    finalize_config, finalize_config_with_clock, FinalizedTracerConfig, SpanRuleConfig,
    SpanSamplerConfig, TraceRuleConfig, TraceSamplerConfig, TracerConfig,
};
pub use datadog_agent::{DatadogAgent, DatadogAgentConfig, TraceApiVersion};
pub use error::{Code, Error};
pub use id_generator::{IdGenerator, RandomIdGenerator, TraceId};
pub use logger::{DefaultLogger, Logger};
pub use propagation::{Extractor, Injector, PropagationStyle};
pub use sampling::{DecisionOrigin, SamplingDecision, SamplingMechanism};
pub use span::{Span, SpanConfig};
pub use span_data::{SpanData, SpanDefaults};
pub use trace_segment::TraceSegment;
pub use tracer::Tracer;

/// The version of this library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
