// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Trace context propagation across process boundaries.
//!
//! Extraction reads inbound request headers through an [`Extractor`] and
//! yields the upstream trace context, if any. Injection writes outbound
//! headers through an [`Injector`]. Multiple header conventions
//! ("propagation styles") are supported; extraction tries the configured
//! styles in order, and the first style that yields either a context or an
//! error determines the result. A style is "absent" when its trace ID
//! header is missing, in which case iteration continues.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub(crate) mod b3;
pub(crate) mod datadog;
pub(crate) mod trace_tags;
pub(crate) mod tracecontext;

use crate::error::{Code, Error};
use crate::id_generator::TraceId;

/// Read-only, case-insensitive lookup of propagation headers. Implementors
/// must treat `key` case-insensitively; keys passed by this library are
/// always lowercase.
pub trait Extractor {
    fn get(&self, key: &str) -> Option<&str>;
}

/// Write access to outbound propagation headers.
pub trait Injector {
    fn set(&mut self, key: &str, value: &str);
}

impl Extractor for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        HashMap::get(self, key)
            .or_else(|| HashMap::get(self, &key.to_lowercase()))
            .map(String::as_str)
    }
}

impl Injector for HashMap<String, String> {
    fn set(&mut self, key: &str, value: &str) {
        self.insert(key.to_string(), value.to_string());
    }
}

/// A trace propagation header convention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropagationStyle {
    /// `x-datadog-trace-id` and friends.
    Datadog,
    /// Zipkin-style `x-b3-*` headers.
    B3,
    /// W3C `traceparent`.
    TraceContext,
    /// Do not propagate.
    None,
}

impl FromStr for PropagationStyle {
    type Err = Error;

    fn from_str(text: &str) -> Result<PropagationStyle, Error> {
        match text.to_lowercase().as_str() {
            "datadog" => Ok(PropagationStyle::Datadog),
            "b3" => Ok(PropagationStyle::B3),
            "tracecontext" => Ok(PropagationStyle::TraceContext),
            "none" => Ok(PropagationStyle::None),
            _ => Err(Error::new(
                Code::UnknownPropagationStyle,
                format!("unknown propagation style: {:?}", text),
            )),
        }
    }
}

impl fmt::Display for PropagationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropagationStyle::Datadog => "datadog",
            PropagationStyle::B3 => "b3",
            PropagationStyle::TraceContext => "tracecontext",
            PropagationStyle::None => "none",
        };
        f.write_str(name)
    }
}

/// Context produced by extraction, before it seeds a trace segment.
#[derive(Clone, Debug, Default)]
pub(crate) struct ExtractedData {
    pub trace_id: Option<TraceId>,
    pub parent_id: Option<u64>,
    pub origin: Option<String>,
    pub sampling_priority: Option<i32>,
    /// Trace tags from `x-datadog-tags`, already filtered to `_dd.p.*` keys.
    pub trace_tags: HashMap<String, String>,
    /// A `_dd.propagation_error` value noted during extraction, e.g.
    /// `"decoding_error"` or `"extract_max_size"`.
    pub propagation_error: Option<&'static str>,
    pub style: Option<PropagationStyle>,
}

/// Run extraction over `styles` in order. `Ok(None)` means no style found a
/// trace; an error from a style stops the iteration.
pub(crate) fn extract_context(
    reader: &dyn Extractor,
    styles: &[PropagationStyle],
    max_tags_header_size: usize,
) -> Result<Option<ExtractedData>, Error> {
    for style in styles {
        let extracted = match style {
            PropagationStyle::Datadog => datadog::extract(reader, max_tags_header_size)?,
            PropagationStyle::B3 => b3::extract(reader)?,
            PropagationStyle::TraceContext => tracecontext::extract(reader)?,
            PropagationStyle::None => None,
        };
        if let Some(mut data) = extracted {
            data.style = Some(*style);
            return Ok(Some(data));
        }
    }
    Ok(None)
}

/// Everything injection needs about the trace, assembled by the segment
/// under its lock.
pub(crate) struct InjectContext<'a> {
    pub trace_id: TraceId,
    pub span_id: u64,
    pub sampling_priority: i32,
    pub origin: Option<&'a str>,
    pub trace_tags: &'a HashMap<String, String>,
    pub max_tags_header_size: usize,
}
