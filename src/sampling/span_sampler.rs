// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span-level sampling.
//!
//! When the trace-level decision is a drop, individual spans can still be
//! kept by span sampling rules. Each rule has its own rate (drawn
//! deterministically on the span ID) and, optionally, its own token-bucket
//! limiter. Admitted spans are tagged so the backend knows they arrived via
//! span sampling, and they are included in the flushed payload even though
//! their trace was dropped.

use std::sync::Mutex;

use super::limiter::Limiter;
use super::matcher::SpanMatcher;
use super::rate::Rate;
use super::rules::SpanRule;
use super::trace_sampler::knuth_keep;
use super::SamplingMechanism;
use crate::clock::Clock;
use crate::span_data::SpanData;
use crate::tags;

struct Rule {
    matcher: SpanMatcher,
    rate: Rate,
    max_per_second: Option<f64>,
    limiter: Option<Mutex<Limiter>>,
}

pub struct SpanSampler {
    rules: Vec<Rule>,
}

impl SpanSampler {
    pub(crate) fn new(rules: Vec<SpanRule>, clock: Clock) -> SpanSampler {
        let rules = rules
            .into_iter()
            .map(|rule| Rule {
                limiter: rule
                    .max_per_second
                    .map(|per_second| Mutex::new(Limiter::new(clock.clone(), per_second))),
                matcher: rule.matcher,
                rate: rule.rate,
                max_per_second: rule.max_per_second,
            })
            .collect();
        SpanSampler { rules }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Offer `span` to the first matching rule. On admission the span is
    /// tagged with the span-sampling metrics and `true` is returned.
    pub(crate) fn sample(&self, span: &mut SpanData) -> bool {
        let Some(rule) = self.rules.iter().find(|rule| rule.matcher.matches(span)) else {
            return false;
        };
        if !knuth_keep(span.span_id, rule.rate.value()) {
            return false;
        }
        if let Some(limiter) = &rule.limiter {
            if !limiter.lock().unwrap().allow() {
                return false;
            }
        }

        span.numeric_tags.insert(
            tags::internal::SPAN_SAMPLING_MECHANISM.to_string(),
            SamplingMechanism::SpanRule.value() as f64,
        );
        span.numeric_tags.insert(
            tags::internal::SPAN_SAMPLING_RULE_RATE.to_string(),
            rule.rate.value(),
        );
        if let Some(max_per_second) = rule.max_per_second {
            span.numeric_tags.insert(
                tags::internal::SPAN_SAMPLING_LIMIT.to_string(),
                max_per_second,
            );
        }
        true
    }
}
