// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Environment variables recognized by the tracer, and the little parsers
//! they share. The environment is read only during configuration
//! finalization; nothing else in the library touches process-wide state.

use std::collections::HashMap;

use crate::error::{Code, Error};
use crate::propagation::PropagationStyle;

pub(crate) const DD_SERVICE: &str = "DD_SERVICE";
pub(crate) const DD_ENV: &str = "DD_ENV";
pub(crate) const DD_VERSION: &str = "DD_VERSION";
pub(crate) const DD_TAGS: &str = "DD_TAGS";
pub(crate) const DD_AGENT_HOST: &str = "DD_AGENT_HOST";
pub(crate) const DD_TRACE_AGENT_PORT: &str = "DD_TRACE_AGENT_PORT";
pub(crate) const DD_TRACE_AGENT_URL: &str = "DD_TRACE_AGENT_URL";
pub(crate) const DD_TRACE_ENABLED: &str = "DD_TRACE_ENABLED";
pub(crate) const DD_TRACE_STARTUP_LOGS: &str = "DD_TRACE_STARTUP_LOGS";
pub(crate) const DD_TRACE_SAMPLE_RATE: &str = "DD_TRACE_SAMPLE_RATE";
pub(crate) const DD_TRACE_RATE_LIMIT: &str = "DD_TRACE_RATE_LIMIT";
pub(crate) const DD_TRACE_SAMPLING_RULES: &str = "DD_TRACE_SAMPLING_RULES";
pub(crate) const DD_SPAN_SAMPLING_RULES: &str = "DD_SPAN_SAMPLING_RULES";
pub(crate) const DD_SPAN_SAMPLING_RULES_FILE: &str = "DD_SPAN_SAMPLING_RULES_FILE";
pub(crate) const DD_PROPAGATION_STYLE_INJECT: &str = "DD_PROPAGATION_STYLE_INJECT";
pub(crate) const DD_PROPAGATION_STYLE_EXTRACT: &str = "DD_PROPAGATION_STYLE_EXTRACT";
pub(crate) const DD_TRACE_PROPAGATION_STYLE: &str = "DD_TRACE_PROPAGATION_STYLE";
pub(crate) const DD_TRACE_128_BIT_TRACEID_GENERATION_ENABLED: &str =
    "DD_TRACE_128_BIT_TRACEID_GENERATION_ENABLED";
pub(crate) const DD_INSTRUMENTATION_TELEMETRY_ENABLED: &str =
    "DD_INSTRUMENTATION_TELEMETRY_ENABLED";

pub(crate) fn lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Datadog boolean convention: exactly `0`, `false`, and `no`
/// (case-insensitive) are false, everything else is true.
pub(crate) fn parse_bool(value: &str) -> bool {
    !matches!(
        value.trim().to_lowercase().as_str(),
        "0" | "false" | "no"
    )
}

pub(crate) fn parse_double(value: &str) -> Result<f64, Error> {
    value.trim().parse::<f64>().map_err(|_| {
        Error::new(
            Code::InvalidDouble,
            format!("{:?} is not a valid number", value),
        )
    })
}

pub(crate) fn parse_integer(value: &str) -> Result<i64, Error> {
    value.trim().parse::<i64>().map_err(|_| {
        Error::new(
            Code::InvalidInteger,
            format!("{:?} is not a valid integer", value),
        )
    })
}

/// Parse `DD_TAGS`: `key:value` pairs separated by commas and/or spaces.
pub(crate) fn parse_tags(value: &str) -> Result<HashMap<String, String>, Error> {
    let mut tags = HashMap::new();
    for pair in value
        .split(|character| character == ',' || character == ' ')
        .filter(|pair| !pair.is_empty())
    {
        let Some((key, tag_value)) = pair.split_once(':') else {
            return Err(Error::new(
                Code::TagMissingSeparator,
                format!("tag {:?} is missing a \":\" separator", pair),
            ));
        };
        if key.is_empty() {
            return Err(Error::new(
                Code::TagMissingSeparator,
                format!("tag {:?} has an empty name", pair),
            ));
        }
        tags.insert(key.to_string(), tag_value.to_string());
    }
    Ok(tags)
}

/// Parse a propagation style list separated by commas and/or spaces, e.g.
/// `"datadog,tracecontext"`. Duplicates are collapsed, order preserved.
pub(crate) fn parse_styles(value: &str) -> Result<Vec<PropagationStyle>, Error> {
    let mut styles = Vec::new();
    for word in value
        .split(|character| character == ',' || character == ' ')
        .filter(|word| !word.is_empty())
    {
        let style: PropagationStyle = word.parse()?;
        if !styles.contains(&style) {
            styles.push(style);
        }
    }
    Ok(styles)
}

// The process environment is global state; tests that set `DD_*` variables
// and tests that read them through `finalize_config` serialize on this lock.
#[cfg(test)]
pub(crate) mod test_lock {
    use std::sync::{Mutex, MutexGuard};

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    pub(crate) fn lock() -> MutexGuard<'static, ()> {
        ENV_LOCK
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
