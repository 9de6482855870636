// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The tracer: factory for root and extracted spans.
//!
//! A [`Tracer`] is built from a [`FinalizedTracerConfig`] and owns the
//! sampling pipeline and the collector. It is internally synchronized and
//! meant to be shared by reference across threads for the lifetime of the
//! host process. Dropping the tracer drains the collector (best effort,
//! bounded by the configured shutdown timeout).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::collector::Collector;
use crate::config::{CollectorChoice, FinalizedTracerConfig};
use crate::datadog_agent::DatadogAgent;
use crate::error::{Code, Error};
use crate::propagation::{extract_context, Extractor, PropagationStyle};
use crate::sampling::span_sampler::SpanSampler;
use crate::sampling::trace_sampler::TraceSampler;
use crate::sampling::{DecisionOrigin, SamplingDecision};
use crate::span::{Span, SpanConfig};
use crate::span_data::SpanData;
use crate::tags;
use crate::trace_segment::{TraceSegment, TracerShared};

pub struct Tracer {
    shared: Arc<TracerShared>,
    extraction_styles: Vec<PropagationStyle>,
    shutdown_timeout: Duration,
}

impl Tracer {
    pub fn new(config: FinalizedTracerConfig) -> Result<Tracer, Error> {
        let banner = if config.log_on_startup {
            Some(startup_banner(&config))
        } else {
            None
        };

        let logger = Arc::clone(&config.logger);
        let trace_sampler = Arc::new(TraceSampler::new(
            config.trace_rules,
            config.trace_limit_per_second,
            config.clock.clone(),
        ));
        let span_sampler = Arc::new(SpanSampler::new(config.span_rules, config.clock.clone()));

        let collector: Option<Arc<dyn Collector>> = if config.report_traces {
            match config.collector {
                CollectorChoice::Custom(custom) => Some(custom),
                CollectorChoice::Agent(agent_config) => {
                    Some(DatadogAgent::new(agent_config, Arc::clone(&logger))?)
                }
            }
        } else {
            // Traces are discarded at finalization; no collector is built.
            None
        };

        let shared = Arc::new(TracerShared {
            logger,
            collector,
            trace_sampler,
            span_sampler,
            id_generator: config.id_generator,
            clock: config.clock,
            defaults: Arc::new(config.defaults),
            injection_styles: config.injection_styles,
            hostname: config.hostname,
            report_traces: config.report_traces,
            max_tags_header_size: config.max_tags_header_size,
            integration_name: config.integration_name,
            integration_version: config.integration_version,
        });

        if let Some(banner) = banner {
            shared.logger.log_startup(&banner);
        }

        Ok(Tracer {
            shared,
            extraction_styles: config.extraction_styles,
            shutdown_timeout: config.shutdown_timeout,
        })
    }

    /// Begin a new trace rooted in this process.
    pub fn create_span(&self) -> Span {
        self.create_span_with_config(&SpanConfig::default())
    }

    pub fn create_span_with_config(&self, config: &SpanConfig) -> Span {
        let mut data = SpanData::with_config(&self.shared.defaults, config, &self.shared.clock);
        let trace_id = self.shared.id_generator.trace_id(data.start.wall);
        data.trace_id = trace_id;
        // The root span of a locally created trace shares the low bits of
        // its trace ID.
        data.span_id = trace_id.low;
        data.parent_id = 0;

        let mut trace_tags = HashMap::new();
        if trace_id.high != 0 {
            trace_tags.insert(
                tags::internal::TRACE_ID_HIGH.to_string(),
                trace_id.high_hex(),
            );
        }

        let segment = TraceSegment::new(
            Arc::clone(&self.shared),
            None,
            trace_tags,
            None,
            None,
            data.span_id,
        );
        Span::new(data, segment)
    }

    /// Continue a trace from inbound request headers. The returned span is
    /// the local root: a child of the extracted context.
    pub fn extract_span(&self, reader: &dyn Extractor) -> Result<Span, Error> {
        self.extract_span_with_config(reader, &SpanConfig::default())
    }

    pub fn extract_span_with_config(
        &self,
        reader: &dyn Extractor,
        config: &SpanConfig,
    ) -> Result<Span, Error> {
        let extracted = extract_context(
            reader,
            &self.extraction_styles,
            self.shared.max_tags_header_size,
        )?;
        let no_trace = || {
            Error::new(
                Code::MissingTraceId,
                "no trace context was found in the provided headers",
            )
        };
        let Some(extracted) = extracted else {
            return Err(no_trace());
        };
        let Some(mut trace_id) = extracted.trace_id else {
            return Err(no_trace());
        };

        let mut trace_tags = extracted.trace_tags;
        let mut propagation_error = extracted.propagation_error.map(str::to_string);

        // Reconcile the 128-bit upper word between the style's trace ID and
        // the propagated `_dd.p.tid` tag. The style's value wins; conflicts
        // and garbage are noted as `malformed_tid`.
        match trace_tags.get(tags::internal::TRACE_ID_HIGH).cloned() {
            Some(tag_value) => match parse_trace_id_high(&tag_value) {
                Some(high_from_tag) => {
                    if trace_id.high == 0 {
                        trace_id.high = high_from_tag;
                    } else if high_from_tag != trace_id.high {
                        propagation_error = Some("malformed_tid".to_string());
                        trace_tags.insert(
                            tags::internal::TRACE_ID_HIGH.to_string(),
                            trace_id.high_hex(),
                        );
                    }
                }
                None => {
                    propagation_error = Some("malformed_tid".to_string());
                    if trace_id.high != 0 {
                        trace_tags.insert(
                            tags::internal::TRACE_ID_HIGH.to_string(),
                            trace_id.high_hex(),
                        );
                    } else {
                        trace_tags.remove(tags::internal::TRACE_ID_HIGH);
                    }
                }
            },
            None => {
                if trace_id.high != 0 {
                    trace_tags.insert(
                        tags::internal::TRACE_ID_HIGH.to_string(),
                        trace_id.high_hex(),
                    );
                }
            }
        }

        let decision = extracted.sampling_priority.map(|priority| SamplingDecision {
            priority,
            mechanism: None,
            origin: DecisionOrigin::Extracted,
            configured_rate: None,
            limiter_effective_rate: None,
        });

        let mut data = SpanData::with_config(&self.shared.defaults, config, &self.shared.clock);
        data.trace_id = trace_id;
        data.span_id = self.shared.id_generator.span_id();
        data.parent_id = extracted.parent_id.unwrap_or(0);

        let segment = TraceSegment::new(
            Arc::clone(&self.shared),
            extracted.origin,
            trace_tags,
            decision,
            propagation_error,
            data.span_id,
        );
        Ok(Span::new(data, segment))
    }

    /// [`extract_span`](Tracer::extract_span), except that "no trace
    /// context" begins a fresh trace instead of failing.
    pub fn extract_or_create_span(&self, reader: &dyn Extractor) -> Result<Span, Error> {
        self.extract_or_create_span_with_config(reader, &SpanConfig::default())
    }

    pub fn extract_or_create_span_with_config(
        &self,
        reader: &dyn Extractor,
        config: &SpanConfig,
    ) -> Result<Span, Error> {
        match self.extract_span_with_config(reader, config) {
            Err(error) if error.code == Code::MissingTraceId => {
                Ok(self.create_span_with_config(config))
            }
            other => other,
        }
    }
}

impl Drop for Tracer {
    fn drop(&mut self) {
        if let Some(collector) = &self.shared.collector {
            collector.flush_and_stop(self.shutdown_timeout);
        }
    }
}

/// `_dd.p.tid` carries exactly 16 lowercase hex digits.
fn parse_trace_id_high(text: &str) -> Option<u64> {
    if text.len() != 16 || !text.bytes().all(|byte| byte.is_ascii_hexdigit()) {
        return None;
    }
    u64::from_str_radix(text, 16).ok()
}

fn startup_banner(config: &FinalizedTracerConfig) -> String {
    let agent_url = match &config.collector {
        CollectorChoice::Agent(agent) => Some(agent.traces_endpoint.to_string()),
        CollectorChoice::Custom(_) => None,
    };
    let styles = |styles: &[PropagationStyle]| {
        styles
            .iter()
            .map(PropagationStyle::to_string)
            .collect::<Vec<_>>()
    };
    let banner = serde_json::json!({
        "version": crate::VERSION,
        "language": "rust",
        "runtime_id": config.runtime_id,
        "service": config.defaults.service,
        "env": config.defaults.environment,
        "service_version": config.defaults.version,
        "agent_url": agent_url,
        "enabled": config.report_traces,
        "report_hostname": config.hostname.is_some(),
        "trace_id_128_bit_generation_enabled": config.trace_id_128_bit,
        "telemetry_enabled": config.report_telemetry,
        "propagation_style_inject": styles(&config.injection_styles),
        "propagation_style_extract": styles(&config.extraction_styles),
        "trace_sampling_rules_count": config.trace_rule_count(),
        "span_sampling_rules_count": config.span_rule_count(),
        "trace_rate_limit": config.trace_limit_per_second,
    });
    format!("DATADOG TRACER CONFIGURATION - {}", banner)
}
