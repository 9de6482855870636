// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span tag names that have special meaning.

pub const ENVIRONMENT: &str = "env";
pub const VERSION: &str = "version";
pub const ERROR_MESSAGE: &str = "error.msg";
pub const ERROR_TYPE: &str = "error.type";
pub const ERROR_STACK: &str = "error.stack";

/// Tags written only by the library itself, never directly by callers.
pub(crate) mod internal {
    pub const PROPAGATION_ERROR: &str = "_dd.propagation_error";
    pub const DECISION_MAKER: &str = "_dd.p.dm";
    pub const TRACE_ID_HIGH: &str = "_dd.p.tid";
    pub const ORIGIN: &str = "_dd.origin";
    pub const HOSTNAME: &str = "_dd.hostname";
    pub const SAMPLING_PRIORITY: &str = "_sampling_priority_v1";
    pub const RULE_SAMPLE_RATE: &str = "_dd.rule_psr";
    pub const RULE_LIMITER_SAMPLE_RATE: &str = "_dd.limit_psr";
    pub const AGENT_SAMPLE_RATE: &str = "_dd.agent_psr";
    pub const SPAN_SAMPLING_MECHANISM: &str = "_dd.span_sampling.mechanism";
    pub const SPAN_SAMPLING_RULE_RATE: &str = "_dd.span_sampling.rule_rate";
    pub const SPAN_SAMPLING_LIMIT: &str = "_dd.span_sampling.max_per_second";
    pub const LANGUAGE: &str = "language";
    pub const INTEGRATION_NAME: &str = "_dd.integration.name";
    pub const INTEGRATION_VERSION: &str = "_dd.integration.version";
}

/// The prefix shared by trace tags that participate in context propagation
/// via the `x-datadog-tags` header.
pub(crate) const PROPAGATION_TAG_PREFIX: &str = "_dd.p.";

/// Whether `tag_name` is reserved for use internal to this library. Reserved
/// tags are only written through documented segment-level paths.
pub fn is_internal(tag_name: &str) -> bool {
    tag_name.starts_with("_dd.")
}
