// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The Datadog propagation style: `x-datadog-trace-id`,
//! `x-datadog-parent-id`, `x-datadog-sampling-priority`, `x-datadog-origin`,
//! and `x-datadog-tags`.

use super::trace_tags::{decode_tags, encode_tags};
use super::{ExtractedData, Extractor, InjectContext, Injector};
use crate::error::{Code, Error};
use crate::id_generator::TraceId;

pub(crate) const TRACE_ID_HEADER: &str = "x-datadog-trace-id";
pub(crate) const PARENT_ID_HEADER: &str = "x-datadog-parent-id";
pub(crate) const SAMPLING_PRIORITY_HEADER: &str = "x-datadog-sampling-priority";
pub(crate) const ORIGIN_HEADER: &str = "x-datadog-origin";
pub(crate) const TAGS_HEADER: &str = "x-datadog-tags";

pub(crate) fn extract(
    reader: &dyn Extractor,
    max_tags_header_size: usize,
) -> Result<Option<ExtractedData>, Error> {
    let Some(trace_id_text) = reader.get(TRACE_ID_HEADER) else {
        return Ok(None);
    };

    let trace_id = trace_id_text.parse::<u64>().map_err(|_| {
        Error::new(
            Code::MalformedTraceId,
            format!("could not parse {}: {:?}", TRACE_ID_HEADER, trace_id_text),
        )
    })?;

    let parent_id = match reader.get(PARENT_ID_HEADER) {
        Some(text) => Some(text.parse::<u64>().map_err(|_| {
            Error::new(
                Code::MalformedParentId,
                format!("could not parse {}: {:?}", PARENT_ID_HEADER, text),
            )
        })?),
        None => None,
    };

    let sampling_priority = match reader.get(SAMPLING_PRIORITY_HEADER) {
        Some(text) => Some(text.parse::<i32>().map_err(|_| {
            Error::new(
                Code::MalformedSamplingPriority,
                format!("could not parse {}: {:?}", SAMPLING_PRIORITY_HEADER, text),
            )
        })?),
        None => None,
    };

    let origin = reader.get(ORIGIN_HEADER).map(str::to_string);

    // A trace ID with no parent is valid for traces that originate outside
    // of an instrumented service (e.g. synthetics), which are recognizable
    // by the presence of an origin or a priority.
    if parent_id.is_none() && origin.is_none() && sampling_priority.is_none() {
        return Err(Error::new(
            Code::MissingParentSpanId,
            format!(
                "{} is present, but {} is missing",
                TRACE_ID_HEADER, PARENT_ID_HEADER
            ),
        ));
    }

    let mut data = ExtractedData {
        trace_id: Some(TraceId::from_low(trace_id)),
        parent_id: Some(parent_id.unwrap_or(0)),
        origin,
        sampling_priority,
        ..Default::default()
    };

    if let Some(header) = reader.get(TAGS_HEADER) {
        if !header.is_empty() {
            if header.len() > max_tags_header_size {
                data.propagation_error = Some("extract_max_size");
            }
            match decode_tags(header) {
                Ok(pairs) => data.trace_tags = pairs.into_iter().collect(),
                Err(_) => data.propagation_error = Some("decoding_error"),
            }
        }
    }

    Ok(Some(data))
}

/// Write the Datadog-style headers. Returns a `_dd.propagation_error` value
/// when the serialized trace tags exceed the configured limit, in which case
/// the tags header is omitted entirely.
pub(crate) fn inject(
    context: &InjectContext<'_>,
    writer: &mut dyn Injector,
) -> Option<&'static str> {
    writer.set(TRACE_ID_HEADER, &context.trace_id.low.to_string());
    writer.set(PARENT_ID_HEADER, &context.span_id.to_string());
    writer.set(
        SAMPLING_PRIORITY_HEADER,
        &context.sampling_priority.to_string(),
    );
    if let Some(origin) = context.origin {
        writer.set(ORIGIN_HEADER, origin);
    }

    let encoded = encode_tags(context.trace_tags);
    if encoded.is_empty() {
        return None;
    }
    if encoded.len() > context.max_tags_header_size {
        return Some("inject_max_size");
    }
    writer.set(TAGS_HEADER, &encoded);
    None
}
