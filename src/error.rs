// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error type shared by every fallible operation in this library.
//!
//! An [`Error`] is a `(code, message)` pair. Codes are stable small integers
//! so that embedders can match on failures across library versions; messages
//! are human-readable and not meant to be parsed.

use std::fmt;

/// Stable identifier for a kind of failure.
///
/// The numeric value of each variant is part of the public contract and must
/// not change between releases.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
#[repr(u32)]
pub enum Code {
    ServiceNameRequired = 1,
    DatadogAgentInvalidFlushInterval = 2,
    UrlMissingSeparator = 3,
    UrlUnsupportedScheme = 4,
    UrlUnixDomainSocketPathNotAbsolute = 5,
    InvalidDouble = 6,
    InvalidInteger = 7,
    RateOutOfRange = 8,
    MaxPerSecondOutOfRange = 9,
    TraceSamplingRulesInvalidJson = 10,
    TraceSamplingRulesWrongType = 11,
    TraceSamplingRulesSampleRateWrongType = 12,
    TraceSamplingRulesUnknownProperty = 13,
    RuleWrongType = 14,
    RulePropertyWrongType = 15,
    RuleTagWrongType = 16,
    SpanSamplingRulesInvalidJson = 17,
    SpanSamplingRulesWrongType = 18,
    SpanSamplingRulesSampleRateWrongType = 19,
    SpanSamplingRulesMaxPerSecondWrongType = 20,
    SpanSamplingRulesUnknownProperty = 21,
    SpanSamplingRulesFileIo = 22,
    TagMissingSeparator = 23,
    UnknownPropagationStyle = 24,
    MissingSpanInjectionStyle = 25,
    MissingSpanExtractionStyle = 26,
    MissingTraceId = 27,
    MissingParentSpanId = 28,
    MalformedTraceId = 29,
    MalformedParentId = 30,
    MalformedSamplingPriority = 31,
    MalformedTags = 32,
    MalformedUrl = 33,
    HttpClientSetupFailed = 34,
    HttpClientFailure = 35,
    DatadogAgentBadResponse = 36,
    MessagePackEncodeFailed = 37,
}

impl Code {
    /// The stable integer value of this code.
    pub fn value(self) -> u32 {
        self as u32
    }
}

/// A failure: a stable [`Code`] together with a human-readable message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub code: Code,
    pub message: String,
}

impl Error {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
        }
    }

    /// Return a copy of this error whose message is prepended with `prefix`.
    /// The code is preserved. Nested parsers use this to add context, e.g.
    /// `"While parsing DD_SPAN_SAMPLING_RULES: " + message`.
    pub fn with_prefix(&self, prefix: &str) -> Error {
        Error {
            code: self.code,
            message: format!("{}{}", prefix, self.message),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[error code {}] {}", self.code.value(), self.message)
    }
}

impl std::error::Error for Error {}
