// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling decisions, priorities, and mechanisms.
//!
//! A trace's sampling decision is a `(priority, mechanism, origin)` triple.
//! The priority says whether the trace should be kept server-side; the
//! mechanism says which subsystem chose that priority and is what travels in
//! the `_dd.p.dm` trace tag; the origin says whether this process made the
//! decision or inherited it.

use std::fmt;

pub mod limiter;
pub mod matcher;
pub mod rate;
pub(crate) mod rules;
pub mod span_sampler;
pub mod trace_sampler;

pub use limiter::Limiter;
pub use matcher::SpanMatcher;
pub use rate::Rate;
pub use span_sampler::SpanSampler;
pub use trace_sampler::TraceSampler;

/// Standard sampling priority values. Other integers are accepted from
/// inbound propagation and preserved verbatim.
pub mod priority {
    /// The user chose to drop the trace.
    pub const USER_DROP: i32 = -1;
    /// The sampler chose to drop the trace.
    pub const AUTO_DROP: i32 = 0;
    /// The sampler chose to keep the trace.
    pub const AUTO_KEEP: i32 = 1;
    /// The user chose to keep the trace.
    pub const USER_KEEP: i32 = 2;
}

/// Which subsystem chose a trace's sampling priority. The numeric values are
/// part of the Datadog wire protocol (`_dd.p.dm` carries `-<value>`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum SamplingMechanism {
    /// No sampling configuration was applicable.
    Default = 0,
    /// A rate returned by the agent for the service/env pair.
    AgentRate = 1,
    /// A locally configured trace sampling rule.
    Rule = 3,
    /// `TraceSegment::override_sampling_priority`.
    Manual = 4,
    /// A span sampling rule admitted an individual span.
    SpanRule = 8,
    /// A user-defined rule delivered by remote configuration.
    RemoteUserRule = 11,
    /// A Datadog-generated rule delivered by remote configuration.
    RemoteRule = 12,
}

impl SamplingMechanism {
    pub fn value(self) -> i32 {
        self as i32
    }
}

impl fmt::Display for SamplingMechanism {
    /// The `_dd.p.dm` rendering, e.g. `-4` for [`SamplingMechanism::Manual`].
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.value())
    }
}

/// Where a sampling decision came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecisionOrigin {
    /// This process decided (sampler or manual override).
    Local,
    /// The decision arrived in extracted trace context.
    Extracted,
    /// The decision was delegated to the agent.
    Agent,
}

/// A trace-level sampling decision.
#[derive(Clone, Debug, PartialEq)]
pub struct SamplingDecision {
    /// Standard values are in [`priority`]; extracted values outside that
    /// range are preserved as-is.
    pub priority: i32,
    /// Absent for decisions extracted from upstream without a decision-maker
    /// tag.
    pub mechanism: Option<SamplingMechanism>,
    pub origin: DecisionOrigin,
    /// The sample rate the deciding rule or table entry was configured with.
    pub configured_rate: Option<Rate>,
    /// The limiter's effective rate at admission time, destined for the
    /// `_dd.limit_psr` metric.
    pub limiter_effective_rate: Option<f64>,
}
