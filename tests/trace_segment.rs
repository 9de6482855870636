// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! End-to-end behavior of trace segments: finalization, sampling imprints,
//! propagation errors, and collector hand-off.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use common::{headers, test_config, FailureCollector, MockCollector, MockLogger};
use dd_trace::sampling::priority;
use dd_trace::{
    finalize_config, Collector, DecisionOrigin, Logger, SpanRuleConfig, TraceRuleConfig, Tracer,
    TracerConfig,
};

fn build_tracer(config: TracerConfig) -> Tracer {
    Tracer::new(finalize_config(config).unwrap()).unwrap()
}

#[test]
fn single_root_span_reaches_the_collector() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    {
        let root = tracer.create_span();
        let _ = root;
    }

    assert_eq!(collector.chunk_count(), 1);
    assert_eq!(collector.span_count(), 1);
    let span = collector.first_span();
    assert_eq!(span.service, "testsvc");
    assert_eq!(span.parent_id, 0);

    // Default configuration: no rule, no agent rate, so rate 1.0 via the
    // default mechanism.
    assert_eq!(span.numeric_tags.get("_dd.agent_psr"), Some(&1.0));
    let priority = span.numeric_tags.get("_sampling_priority_v1").copied();
    assert!(
        priority == Some(0.0) || priority == Some(1.0),
        "unexpected priority {:?}",
        priority
    );
    assert!(span.tags.contains_key("_dd.p.dm"));
    assert_eq!(span.tags.get("language").map(String::as_str), Some("rust"));
    assert_eq!(logger.error_count(), 0);
}

#[test]
fn child_spans_travel_in_the_same_chunk() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let (root_id, child_id);
    {
        let root = tracer.create_span();
        root_id = root.id();
        let child = root.create_child();
        child_id = child.id();
        drop(root);
        // The segment does not finalize until every span has finished.
        assert_eq!(collector.chunk_count(), 0);
    }

    assert_eq!(collector.chunk_count(), 1);
    let chunk = collector.first_chunk();
    assert_eq!(chunk.spans.len(), 2);
    let root = chunk
        .spans
        .iter()
        .find(|span| span.span_id == root_id)
        .unwrap();
    let child = chunk
        .spans
        .iter()
        .find(|span| span.span_id == child_id)
        .unwrap();
    assert_eq!(root.parent_id, 0);
    assert_eq!(child.parent_id, root_id);
    assert_eq!(child.trace_id, root.trace_id);
    // Trace-level imprints land on the root only.
    assert!(root.numeric_tags.contains_key("_sampling_priority_v1"));
    assert!(!child.numeric_tags.contains_key("_sampling_priority_v1"));
}

#[test]
fn extraction_seeds_the_segment() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let carrier = headers(&[
        ("x-datadog-trace-id", "123"),
        ("x-datadog-parent-id", "456"),
        ("x-datadog-origin", "Unalaska"),
    ]);
    {
        let span = tracer.extract_span(&carrier).unwrap();
        assert_eq!(span.trace_id().low, 123);
        assert_eq!(span.parent_id(), Some(456));
        assert_eq!(span.trace_segment().origin(), Some("Unalaska"));
    }

    assert_eq!(collector.span_count(), 1);
    let span = collector.first_span();
    assert_eq!(span.trace_id.low, 123);
    assert_eq!(span.parent_id, 456);
    assert_eq!(span.tags.get("_dd.origin").map(String::as_str), Some("Unalaska"));
}

#[test]
fn extracted_priority_is_preserved_verbatim() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let carrier = headers(&[
        ("x-datadog-trace-id", "123"),
        ("x-datadog-parent-id", "456"),
        ("x-datadog-sampling-priority", "7"),
    ]);
    {
        let span = tracer.extract_span(&carrier).unwrap();
        let decision = span.trace_segment().sampling_decision().unwrap();
        assert_eq!(decision.priority, 7);
        assert_eq!(decision.origin, DecisionOrigin::Extracted);
    }

    assert_eq!(
        collector
            .first_span()
            .numeric_tags
            .get("_sampling_priority_v1"),
        Some(&7.0)
    );
}

#[test]
fn oversized_trace_tags_suppress_injection() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let mut trace_tags_value = String::from("foo=bar");
    for i in 0..10_000 {
        trace_tags_value.push_str(&format!(",_dd.p.{}={}", i, 2 * i));
    }
    let carrier = headers(&[
        ("x-datadog-trace-id", "123"),
        ("x-datadog-parent-id", "456"),
        ("x-datadog-tags", &trace_tags_value),
    ]);

    {
        let span = tracer.extract_span(&carrier).unwrap();
        let mut writer: HashMap<String, String> = HashMap::new();
        span.inject(&mut writer);
        assert!(!writer.contains_key("x-datadog-tags"));
        assert!(writer.contains_key("x-datadog-trace-id"));
    }

    assert_eq!(
        collector
            .first_span()
            .tags
            .get("_dd.propagation_error")
            .map(String::as_str),
        Some("inject_max_size")
    );
}

#[test]
fn trace_tags_are_filtered_and_decision_maker_is_added() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let carrier = headers(&[
        ("x-datadog-trace-id", "123"),
        ("x-datadog-parent-id", "456"),
        ("x-datadog-tags", "_dd.p.one=1,_dd.p.two=2,three=3"),
    ]);
    {
        let span = tracer.extract_span(&carrier).unwrap();
        let _ = span;
    }

    let span = collector.first_span();
    assert_eq!(span.tags.get("_dd.p.one").map(String::as_str), Some("1"));
    assert_eq!(span.tags.get("_dd.p.two").map(String::as_str), Some("2"));
    assert!(!span.tags.contains_key("three"));
    // No priority arrived, so the local sampler decided and recorded its
    // mechanism.
    assert!(span.tags.contains_key("_dd.p.dm"));
}

#[test]
fn override_sampling_priority_always_wins() {
    for priority_override in [-10, -1, 0, 1, 2, 7] {
        let collector = MockCollector::new();
        let logger = MockLogger::new();
        let tracer = build_tracer(test_config(&collector, &logger));

        {
            let root = tracer.create_span();
            root.trace_segment()
                .override_sampling_priority(priority_override);
            let decision = root.trace_segment().sampling_decision().unwrap();
            assert_eq!(decision.origin, DecisionOrigin::Local);
        }

        assert_eq!(
            collector
                .first_span()
                .numeric_tags
                .get("_sampling_priority_v1"),
            Some(&(priority_override as f64))
        );
        // Manual decisions are decision-maker -4.
        assert_eq!(
            collector.first_span().tags.get("_dd.p.dm").map(String::as_str),
            Some("-4")
        );
    }
}

#[test]
fn no_decision_until_one_is_needed() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    let span = tracer.create_span();
    assert!(span.trace_segment().sampling_decision().is_none());

    let mut writer: HashMap<String, String> = HashMap::new();
    span.inject(&mut writer);
    let decision = span.trace_segment().sampling_decision().unwrap();
    assert_eq!(decision.origin, DecisionOrigin::Local);
    // The injected priority matches the decision.
    assert_eq!(
        writer.get("x-datadog-sampling-priority").unwrap(),
        &decision.priority.to_string()
    );
    // Injection carries the decision maker tag.
    assert!(writer.get("x-datadog-tags").unwrap().contains("_dd.p.dm="));
}

#[test]
fn collector_failure_is_logged_not_raised() {
    let failure_collector = FailureCollector::new();
    let logger = MockLogger::new();
    let config = TracerConfig {
        service: Some("testsvc".to_string()),
        collector: Some(Arc::clone(&failure_collector) as Arc<dyn Collector>),
        logger: Some(Arc::clone(&logger) as Arc<dyn Logger>),
        log_on_startup: Some(false),
        ..Default::default()
    };
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        let _ = span;
    }

    assert_eq!(logger.error_count(), 1);
    assert_eq!(logger.first_error().code, failure_collector.failure.code);
}

#[test]
fn report_traces_false_discards_everything() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.report_traces = Some(false);
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        let _ = span;
    }
    assert_eq!(collector.chunk_count(), 0);
    assert_eq!(logger.error_count(), 0);
}

#[test]
fn hostname_reported_when_enabled() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.report_hostname = Some(true);
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        assert!(span.trace_segment().hostname().is_some());
    }
    assert!(collector.first_span().tags.contains_key("_dd.hostname"));

    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));
    {
        let span = tracer.create_span();
        assert!(span.trace_segment().hostname().is_none());
    }
    assert!(!collector.first_span().tags.contains_key("_dd.hostname"));
}

#[test]
fn segment_accessors_expose_defaults_and_logger() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.environment = Some("test".to_string());
    config.version = Some("v0".to_string());
    let tracer = build_tracer(config);

    let span = tracer.create_span();
    let defaults = span.trace_segment().defaults();
    assert_eq!(defaults.service, "testsvc");
    assert_eq!(defaults.environment, "test");
    assert_eq!(defaults.version, "v0");
    span.trace_segment()
        .logger()
        .log_warning("hello from the test");
    assert_eq!(logger.warnings.lock().unwrap().len(), 1);
}

#[test]
fn dropped_trace_keeps_span_sampled_spans_and_root() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    // Drop every trace, but span-sample every span of the "keepme"
    // operation.
    config.trace_sampler.rules = vec![TraceRuleConfig {
        sample_rate: 0.0,
        ..Default::default()
    }];
    config.span_sampler.rules = vec![SpanRuleConfig {
        matcher: dd_trace::sampling::SpanMatcher {
            name: "keepme".to_string(),
            ..Default::default()
        },
        sample_rate: 1.0,
        max_per_second: None,
    }];
    let tracer = build_tracer(config);

    let root_id;
    {
        let mut root = tracer.create_span();
        root.set_name("root.op");
        root_id = root.id();
        let mut keeper = root.create_child();
        keeper.set_name("keepme");
        let mut dropper = root.create_child();
        dropper.set_name("dropme");
    }

    assert_eq!(collector.chunk_count(), 1);
    let chunk = collector.first_chunk();
    assert_eq!(chunk.priority, priority::AUTO_DROP);
    assert_eq!(chunk.spans.len(), 2);

    let root = chunk
        .spans
        .iter()
        .find(|span| span.span_id == root_id)
        .expect("root travels with the chunk");
    assert!(!root.numeric_tags.contains_key("_dd.span_sampling.mechanism"));

    let keeper = chunk
        .spans
        .iter()
        .find(|span| span.name == "keepme")
        .expect("span-sampled span is retained");
    assert_eq!(
        keeper.numeric_tags.get("_dd.span_sampling.mechanism"),
        Some(&8.0)
    );
    assert_eq!(
        keeper.numeric_tags.get("_dd.span_sampling.rule_rate"),
        Some(&1.0)
    );

    assert!(!chunk.spans.iter().any(|span| span.name == "dropme"));
}

#[test]
fn rule_sampling_imprints_rule_rate() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.trace_sampler.rules = vec![TraceRuleConfig {
        sample_rate: 1.0,
        ..Default::default()
    }];
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        let _ = span;
    }

    let span = collector.first_span();
    assert_eq!(span.numeric_tags.get("_dd.rule_psr"), Some(&1.0));
    assert_eq!(
        span.numeric_tags.get("_sampling_priority_v1"),
        Some(&(priority::AUTO_KEEP as f64))
    );
    assert!(span.numeric_tags.contains_key("_dd.limit_psr"));
    assert_eq!(span.tags.get("_dd.p.dm").map(String::as_str), Some("-3"));
}

#[test]
fn injection_disabled_by_none_style() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.injection_styles = Some(vec![dd_trace::PropagationStyle::None]);
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        let mut writer: HashMap<String, String> = HashMap::new();
        span.inject(&mut writer);
        assert!(writer.is_empty());
    }

    assert_eq!(
        collector
            .first_span()
            .tags
            .get("_dd.propagation_error")
            .map(String::as_str),
        Some("disabled")
    );
}

#[test]
fn finished_spans_have_sane_timestamps() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let tracer = build_tracer(test_config(&collector, &logger));

    {
        let root = tracer.create_span();
        let _child = root.create_child();
    }

    let now = std::time::SystemTime::now();
    for chunk in collector.chunks.lock().unwrap().iter() {
        for span in &chunk.spans {
            assert!(span.start.wall <= now);
        }
    }
}

#[test]
fn integration_tags_are_imprinted() {
    let collector = MockCollector::new();
    let logger = MockLogger::new();
    let mut config = test_config(&collector, &logger);
    config.integration_name = Some("nginx".to_string());
    config.integration_version = Some("1.27.0".to_string());
    let tracer = build_tracer(config);

    {
        let span = tracer.create_span();
        let _ = span;
    }

    let span = collector.first_span();
    assert_eq!(
        span.tags.get("_dd.integration.name").map(String::as_str),
        Some("nginx")
    );
    assert_eq!(
        span.tags.get("_dd.integration.version").map(String::as_str),
        Some("1.27.0")
    );
}
