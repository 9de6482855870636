// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace-level sampling.
//!
//! For each local trace, the sampler picks an effective rate from the first
//! matching user rule, else from the agent's per-service rate table, else
//! 1.0. A deterministic draw on the trace ID decides keep/drop at that rate,
//! and kept traces must additionally pass a global token-bucket limiter
//! (default 200 traces per second).

use std::collections::HashMap;
use std::sync::Mutex;

use super::limiter::Limiter;
use super::rate::Rate;
use super::rules::TraceRule;
use super::{priority, DecisionOrigin, SamplingDecision, SamplingMechanism};
use crate::clock::Clock;
use crate::span_data::SpanData;

/// Multiplier from Knuth's multiplicative hashing scheme. Every Datadog
/// tracer uses this same constant so that all tracers in a distributed trace
/// draw the same conclusion from the same trace ID.
const KNUTH_FACTOR: u64 = 1111111111111111111;

/// Deterministic keep/drop draw: hash the ID and keep when the hash falls
/// below `rate` of the 64-bit space.
pub(crate) fn knuth_keep(id: u64, rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    (id.wrapping_mul(KNUTH_FACTOR) as f64) < rate * (u64::MAX as f64)
}

/// The key format of the agent's `rate_by_service` feedback table.
pub(crate) fn service_key(service: &str, environment: &str) -> String {
    format!("service:{},env:{}", service, environment)
}

/// Key used when the agent has no entry for a specific service/env pair.
const CATCH_ALL_KEY: &str = "service:,env:";

struct Inner {
    limiter: Limiter,
    agent_rates: HashMap<String, Rate>,
}

pub struct TraceSampler {
    rules: Vec<TraceRule>,
    inner: Mutex<Inner>,
}

impl TraceSampler {
    pub(crate) fn new(rules: Vec<TraceRule>, limit_per_second: f64, clock: Clock) -> TraceSampler {
        TraceSampler {
            rules,
            inner: Mutex::new(Inner {
                limiter: Limiter::new(clock, limit_per_second),
                agent_rates: HashMap::new(),
            }),
        }
    }

    /// Decide the sampling priority for the trace whose local root is
    /// `span`.
    pub fn decide(&self, span: &SpanData) -> SamplingDecision {
        let matched = self
            .rules
            .iter()
            .find(|rule| rule.matcher.matches(span))
            .map(|rule| rule.rate);

        let mut inner = self.inner.lock().unwrap();

        let (rate, mechanism) = match matched {
            Some(rate) => (rate, SamplingMechanism::Rule),
            None => {
                let key = service_key(&span.service, span.environment().unwrap_or(""));
                match inner
                    .agent_rates
                    .get(&key)
                    .or_else(|| inner.agent_rates.get(CATCH_ALL_KEY))
                {
                    Some(rate) => (*rate, SamplingMechanism::AgentRate),
                    None => (Rate::one(), SamplingMechanism::Default),
                }
            }
        };

        if !knuth_keep(span.trace_id.low, rate.value()) {
            return SamplingDecision {
                priority: priority::AUTO_DROP,
                mechanism: Some(mechanism),
                origin: DecisionOrigin::Local,
                configured_rate: Some(rate),
                limiter_effective_rate: None,
            };
        }

        if inner.limiter.allow() {
            let effective_rate = inner.limiter.effective_rate();
            SamplingDecision {
                priority: priority::AUTO_KEEP,
                mechanism: Some(mechanism),
                origin: DecisionOrigin::Local,
                configured_rate: Some(rate),
                limiter_effective_rate: Some(effective_rate),
            }
        } else {
            SamplingDecision {
                priority: priority::AUTO_DROP,
                mechanism: Some(mechanism),
                origin: DecisionOrigin::Local,
                configured_rate: Some(rate),
                limiter_effective_rate: None,
            }
        }
    }

    /// Ingest the agent's `rate_by_service` feedback. The new table replaces
    /// the previous one wholesale, so an entry absent from the response is
    /// no longer used.
    pub fn update_agent_rates(&self, rates: HashMap<String, Rate>) {
        self.inner.lock().unwrap().agent_rates = rates;
    }

    /// Number of configured rules, in match order.
    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}
