// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Shared state for the portion of a trace local to this process.
//!
//! Every span holds a handle to its segment. The segment accumulates spans
//! as they finish, tracks the trace-level tags and sampling decision, and
//! when the last live span finishes it finalizes the trace: it imprints the
//! decision and trace tags on the local root span, applies span sampling to
//! dropped traces, and hands the result to the collector. All mutation goes
//! through the segment's mutex; the mutex is never held across collector
//! I/O.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::collector::{Collector, TraceChunk};
use crate::id_generator::IdGenerator;
use crate::logger::Logger;
use crate::propagation::{b3, datadog, tracecontext, InjectContext, Injector, PropagationStyle};
use crate::sampling::span_sampler::SpanSampler;
use crate::sampling::trace_sampler::TraceSampler;
use crate::sampling::{DecisionOrigin, SamplingDecision, SamplingMechanism};
use crate::span::SpanConfig;
use crate::span_data::{SpanData, SpanDefaults};
use crate::tags;

/// Services and settings shared by the tracer and every segment it creates.
pub(crate) struct TracerShared {
    pub logger: Arc<dyn Logger>,
    pub collector: Option<Arc<dyn Collector>>,
    pub trace_sampler: Arc<TraceSampler>,
    pub span_sampler: Arc<SpanSampler>,
    pub id_generator: Arc<dyn IdGenerator>,
    pub clock: Clock,
    pub defaults: Arc<SpanDefaults>,
    pub injection_styles: Vec<PropagationStyle>,
    pub hostname: Option<String>,
    pub report_traces: bool,
    pub max_tags_header_size: usize,
    pub integration_name: Option<String>,
    pub integration_version: Option<String>,
}

struct SegmentInner {
    /// Finished spans, in finish order.
    spans: Vec<SpanData>,
    /// Live spans not yet finished.
    num_open: usize,
    /// The span ID of this segment's local root.
    root_span_id: u64,
    /// Trace-level tags, mirroring `x-datadog-tags` where applicable.
    trace_tags: HashMap<String, String>,
    decision: Option<SamplingDecision>,
    /// Last-write-wins note of a propagation problem, destined for the
    /// root's `_dd.propagation_error` tag.
    propagation_error: Option<String>,
    finalized: bool,
}

pub struct TraceSegment {
    shared: Arc<TracerShared>,
    origin: Option<String>,
    inner: Mutex<SegmentInner>,
}

impl TraceSegment {
    pub(crate) fn new(
        shared: Arc<TracerShared>,
        origin: Option<String>,
        trace_tags: HashMap<String, String>,
        decision: Option<SamplingDecision>,
        propagation_error: Option<String>,
        root_span_id: u64,
    ) -> Arc<TraceSegment> {
        Arc::new(TraceSegment {
            shared,
            origin,
            inner: Mutex::new(SegmentInner {
                spans: Vec::new(),
                num_open: 1,
                root_span_id,
                trace_tags,
                decision,
                propagation_error,
                finalized: false,
            }),
        })
    }

    /// The hostname reported with traces, if hostname reporting is enabled.
    pub fn hostname(&self) -> Option<&str> {
        self.shared.hostname.as_deref()
    }

    /// The `x-datadog-origin` extracted from inbound context, if any.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// The defaults applied to spans created within this segment.
    pub fn defaults(&self) -> &SpanDefaults {
        &self.shared.defaults
    }

    pub fn logger(&self) -> &dyn Logger {
        &*self.shared.logger
    }

    pub(crate) fn now(&self) -> crate::clock::TimePoint {
        crate::clock::now(&self.shared.clock)
    }

    /// This trace's sampling decision, if one has been made yet.
    pub fn sampling_decision(&self) -> Option<SamplingDecision> {
        self.inner.lock().unwrap().decision.clone()
    }

    /// Force this trace's sampling priority. Always wins over any prior
    /// decision, is reflected on the root span at finalization, and is
    /// visible to subsequent injections.
    pub fn override_sampling_priority(&self, priority: i32) {
        let mut inner = self.inner.lock().unwrap();
        inner.decision = Some(SamplingDecision {
            priority,
            mechanism: Some(SamplingMechanism::Manual),
            origin: DecisionOrigin::Local,
            configured_rate: None,
            limiter_effective_rate: None,
        });
    }

    /// Create the data for a child of `parent`, registering one more live
    /// span with this segment.
    pub(crate) fn new_child_data(&self, parent: &SpanData, config: &SpanConfig) -> SpanData {
        let mut data = SpanData::with_config(&self.shared.defaults, config, &self.shared.clock);
        data.trace_id = parent.trace_id;
        data.parent_id = parent.span_id;
        data.span_id = self.shared.id_generator.span_id();
        self.inner.lock().unwrap().num_open += 1;
        data
    }

    /// Record a finished span. When this was the last live span, the
    /// segment finalizes and ships.
    pub(crate) fn finish_span(&self, data: SpanData) {
        let chunk = {
            let mut inner = self.inner.lock().unwrap();
            inner.spans.push(data);
            inner.num_open -= 1;
            if inner.num_open > 0 || inner.finalized {
                return;
            }
            inner.finalized = true;
            self.finalize(&mut inner)
        };
        // The collector is called outside the segment mutex.
        let Some(chunk) = chunk else { return };
        let Some(collector) = &self.shared.collector else {
            return;
        };
        if let Err(send_error) = collector.send(chunk, &self.shared.trace_sampler) {
            self.shared.logger.log_error(&send_error);
        }
    }

    fn finalize(&self, inner: &mut SegmentInner) -> Option<TraceChunk> {
        let root_index = match inner
            .spans
            .iter()
            .position(|span| span.span_id == inner.root_span_id)
        {
            Some(index) => index,
            None => {
                // Cannot happen: the root is registered at construction and
                // the segment only finalizes after every span finished.
                self.shared.logger.log_warning(
                    "trace segment finalized without its root span; dropping the trace",
                );
                return None;
            }
        };

        if inner.decision.is_none() {
            inner.decision = Some(self.shared.trace_sampler.decide(&inner.spans[root_index]));
        }
        let Some(decision) = inner.decision.clone() else {
            return None;
        };

        ensure_decision_maker_tag(&mut inner.trace_tags, &decision);

        {
            let SegmentInner {
                spans,
                trace_tags,
                propagation_error,
                ..
            } = &mut *inner;
            let root = &mut spans[root_index];

            root.numeric_tags.insert(
                tags::internal::SAMPLING_PRIORITY.to_string(),
                decision.priority as f64,
            );
            for (key, value) in trace_tags.iter() {
                root.tags.insert(key.clone(), value.clone());
            }
            if let Some(origin) = &self.origin {
                root.tags
                    .insert(tags::internal::ORIGIN.to_string(), origin.clone());
            }
            if let Some(hostname) = &self.shared.hostname {
                root.tags
                    .insert(tags::internal::HOSTNAME.to_string(), hostname.clone());
            }
            root.tags
                .insert(tags::internal::LANGUAGE.to_string(), "rust".to_string());
            if let Some(name) = &self.shared.integration_name {
                root.tags
                    .insert(tags::internal::INTEGRATION_NAME.to_string(), name.clone());
            }
            if let Some(version) = &self.shared.integration_version {
                root.tags.insert(
                    tags::internal::INTEGRATION_VERSION.to_string(),
                    version.clone(),
                );
            }

            if decision.origin == DecisionOrigin::Local {
                match decision.mechanism {
                    Some(SamplingMechanism::Rule) => {
                        if let Some(rate) = decision.configured_rate {
                            root.numeric_tags.insert(
                                tags::internal::RULE_SAMPLE_RATE.to_string(),
                                rate.value(),
                            );
                        }
                    }
                    Some(SamplingMechanism::AgentRate) | Some(SamplingMechanism::Default) => {
                        if let Some(rate) = decision.configured_rate {
                            root.numeric_tags.insert(
                                tags::internal::AGENT_SAMPLE_RATE.to_string(),
                                rate.value(),
                            );
                        }
                    }
                    _ => {}
                }
                if let Some(effective_rate) = decision.limiter_effective_rate {
                    root.numeric_tags.insert(
                        tags::internal::RULE_LIMITER_SAMPLE_RATE.to_string(),
                        effective_rate,
                    );
                }
            }

            if let Some(problem) = propagation_error {
                root.tags
                    .insert(tags::internal::PROPAGATION_ERROR.to_string(), problem.clone());
            }
        }

        let mut spans = std::mem::take(&mut inner.spans);
        if decision.priority <= 0 {
            // Dropped trace: span sampling rules may still admit individual
            // spans. The root always travels with the chunk.
            let mut retained = Vec::with_capacity(spans.len());
            for (index, mut span) in spans.drain(..).enumerate() {
                let admitted = self.shared.span_sampler.sample(&mut span);
                if admitted || index == root_index {
                    retained.push(span);
                }
            }
            spans = retained;
        }

        if !self.shared.report_traces {
            return None;
        }
        Some(TraceChunk {
            priority: decision.priority,
            spans,
        })
    }

    /// Write this trace's context through `writer` using the configured
    /// injection styles. `span` is the span on whose behalf injection
    /// happens; its ID becomes the outbound parent ID. The first injection
    /// with no prior decision makes one.
    pub(crate) fn inject(&self, span: &SpanData, writer: &mut dyn Injector) {
        let mut inner = self.inner.lock().unwrap();

        if !self
            .shared
            .injection_styles
            .iter()
            .any(|style| *style != PropagationStyle::None)
        {
            inner.propagation_error = Some("disabled".to_string());
            return;
        }

        let decision = match inner.decision.clone() {
            Some(decision) => decision,
            None => {
                let decision = self.shared.trace_sampler.decide(span);
                inner.decision = Some(decision.clone());
                decision
            }
        };

        ensure_decision_maker_tag(&mut inner.trace_tags, &decision);

        let mut noted_error = None;
        {
            let context = InjectContext {
                trace_id: span.trace_id,
                span_id: span.span_id,
                sampling_priority: decision.priority,
                origin: self.origin.as_deref(),
                trace_tags: &inner.trace_tags,
                max_tags_header_size: self.shared.max_tags_header_size,
            };
            for style in &self.shared.injection_styles {
                match style {
                    PropagationStyle::Datadog => {
                        if let Some(problem) = datadog::inject(&context, writer) {
                            noted_error = Some(problem);
                        }
                    }
                    PropagationStyle::B3 => b3::inject(&context, writer),
                    PropagationStyle::TraceContext => tracecontext::inject(&context, writer),
                    PropagationStyle::None => {}
                }
            }
        }
        if let Some(problem) = noted_error {
            inner.propagation_error = Some(problem.to_string());
        }
    }
}

/// `_dd.p.dm` must be present on any trace that has a sampling decision
/// before that decision propagates. Locally made decisions always know
/// their mechanism; extracted decisions keep whatever `_dd.p.dm` arrived
/// with them.
fn ensure_decision_maker_tag(
    trace_tags: &mut HashMap<String, String>,
    decision: &SamplingDecision,
) {
    if decision.origin != DecisionOrigin::Local {
        return;
    }
    if let Some(mechanism) = decision.mechanism {
        trace_tags.insert(
            tags::internal::DECISION_MAKER.to_string(),
            mechanism.to_string(),
        );
    }
}
