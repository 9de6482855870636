// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Parsing of trace and span sampling rules from their JSON representation
//! (`DD_TRACE_SAMPLING_RULES`, `DD_SPAN_SAMPLING_RULES`).
//!
//! Rules are arrays of objects with the keys `service`, `name`, `resource`
//! (glob patterns), `tags` (object of pattern to pattern), `sample_rate`
//! (number in [0, 1]), and, for span rules only, `max_per_second` (positive
//! number). Unknown keys are rejected. The JSON is walked by hand rather
//! than derived so that each way the input can be wrong maps to its own
//! stable error code.

use std::collections::HashMap;

use serde_json::Value;

use super::matcher::SpanMatcher;
use super::rate::Rate;
use crate::error::{Code, Error};

/// A finalized trace sampling rule.
#[derive(Clone, Debug)]
pub(crate) struct TraceRule {
    pub matcher: SpanMatcher,
    pub rate: Rate,
}

/// A finalized span sampling rule.
#[derive(Clone, Debug)]
pub(crate) struct SpanRule {
    pub matcher: SpanMatcher,
    pub rate: Rate,
    pub max_per_second: Option<f64>,
}

#[derive(Clone, Copy)]
enum RuleKind {
    Trace,
    Span,
}

impl RuleKind {
    fn noun(self) -> &'static str {
        match self {
            RuleKind::Trace => "trace sampling rules",
            RuleKind::Span => "span sampling rules",
        }
    }

    fn invalid_json(self) -> Code {
        match self {
            RuleKind::Trace => Code::TraceSamplingRulesInvalidJson,
            RuleKind::Span => Code::SpanSamplingRulesInvalidJson,
        }
    }

    fn wrong_type(self) -> Code {
        match self {
            RuleKind::Trace => Code::TraceSamplingRulesWrongType,
            RuleKind::Span => Code::SpanSamplingRulesWrongType,
        }
    }

    fn sample_rate_wrong_type(self) -> Code {
        match self {
            RuleKind::Trace => Code::TraceSamplingRulesSampleRateWrongType,
            RuleKind::Span => Code::SpanSamplingRulesSampleRateWrongType,
        }
    }

    fn unknown_property(self) -> Code {
        match self {
            RuleKind::Trace => Code::TraceSamplingRulesUnknownProperty,
            RuleKind::Span => Code::SpanSamplingRulesUnknownProperty,
        }
    }
}

struct RawRule {
    matcher: SpanMatcher,
    rate: Rate,
    max_per_second: Option<f64>,
}

pub(crate) fn parse_trace_rules(json: &str) -> Result<Vec<TraceRule>, Error> {
    let raw = parse_rules(json, RuleKind::Trace)?;
    Ok(raw
        .into_iter()
        .map(|rule| TraceRule {
            matcher: rule.matcher,
            rate: rule.rate,
        })
        .collect())
}

pub(crate) fn parse_span_rules(json: &str) -> Result<Vec<SpanRule>, Error> {
    let raw = parse_rules(json, RuleKind::Span)?;
    Ok(raw
        .into_iter()
        .map(|rule| SpanRule {
            matcher: rule.matcher,
            rate: rule.rate,
            max_per_second: rule.max_per_second,
        })
        .collect())
}

fn parse_rules(json: &str, kind: RuleKind) -> Result<Vec<RawRule>, Error> {
    let document: Value = serde_json::from_str(json).map_err(|parse_error| {
        Error::new(
            kind.invalid_json(),
            format!("invalid JSON for {}: {}", kind.noun(), parse_error),
        )
    })?;

    let Value::Array(entries) = document else {
        return Err(Error::new(
            kind.wrong_type(),
            format!("{} must be an array, but got: {}", kind.noun(), document),
        ));
    };

    let mut rules = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        let rule = parse_rule(entry, kind)
            .map_err(|error| error.with_prefix(&format!("in rule at index {}: ", index)))?;
        rules.push(rule);
    }
    Ok(rules)
}

fn parse_rule(entry: Value, kind: RuleKind) -> Result<RawRule, Error> {
    let Value::Object(properties) = entry else {
        return Err(Error::new(
            Code::RuleWrongType,
            format!("each rule must be an object, but got: {}", entry),
        ));
    };

    let mut matcher = SpanMatcher::default();
    let mut rate = Rate::one();
    let mut max_per_second = None;

    for (property, value) in properties {
        match property.as_str() {
            "service" => matcher.service = pattern_string(&property, value)?,
            "name" => matcher.name = pattern_string(&property, value)?,
            "resource" => matcher.resource = pattern_string(&property, value)?,
            "tags" => matcher.tags = tag_patterns(value)?,
            "sample_rate" => {
                let Some(number) = value.as_f64() else {
                    return Err(Error::new(
                        kind.sample_rate_wrong_type(),
                        format!("sample_rate must be a number, but got: {}", value),
                    ));
                };
                rate = Rate::try_new(number)?;
            }
            "max_per_second" if matches!(kind, RuleKind::Span) => {
                let Some(number) = value.as_f64() else {
                    return Err(Error::new(
                        Code::SpanSamplingRulesMaxPerSecondWrongType,
                        format!("max_per_second must be a number, but got: {}", value),
                    ));
                };
                if !number.is_finite() || number <= 0.0 {
                    return Err(Error::new(
                        Code::MaxPerSecondOutOfRange,
                        format!("max_per_second must be greater than zero, but got {}", number),
                    ));
                }
                max_per_second = Some(number);
            }
            _ => {
                return Err(Error::new(
                    kind.unknown_property(),
                    format!("unknown rule property: {:?}", property),
                ));
            }
        }
    }

    Ok(RawRule {
        matcher,
        rate,
        max_per_second,
    })
}

fn pattern_string(property: &str, value: Value) -> Result<String, Error> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(Error::new(
            Code::RulePropertyWrongType,
            format!("{} must be a string, but got: {}", property, other),
        )),
    }
}

fn tag_patterns(value: Value) -> Result<HashMap<String, String>, Error> {
    let Value::Object(entries) = value else {
        return Err(Error::new(
            Code::RuleTagWrongType,
            format!("tags must be an object, but got: {}", value),
        ));
    };
    let mut patterns = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let Value::String(text) = value else {
            return Err(Error::new(
                Code::RuleTagWrongType,
                format!("tag pattern for {:?} must be a string, but got: {}", key, value),
            ));
        };
        patterns.insert(key, text);
    }
    Ok(patterns)
}
