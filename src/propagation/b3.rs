// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The B3 (Zipkin) propagation style: `x-b3-traceid`, `x-b3-spanid`, and
//! `x-b3-sampled`.
//!
//! B3 trace IDs are 16 or 32 hex characters. When a 32-character ID is
//! extracted, the upper 64 bits are retained so the segment can carry them
//! in the `_dd.p.tid` trace tag.

use super::{ExtractedData, Extractor, InjectContext, Injector};
use crate::error::{Code, Error};
use crate::id_generator::TraceId;

pub(crate) const TRACE_ID_HEADER: &str = "x-b3-traceid";
pub(crate) const SPAN_ID_HEADER: &str = "x-b3-spanid";
pub(crate) const SAMPLED_HEADER: &str = "x-b3-sampled";

pub(crate) fn extract(reader: &dyn Extractor) -> Result<Option<ExtractedData>, Error> {
    let Some(trace_id_text) = reader.get(TRACE_ID_HEADER) else {
        return Ok(None);
    };

    let trace_id = TraceId::parse_hex(trace_id_text).ok_or_else(|| {
        Error::new(
            Code::MalformedTraceId,
            format!("could not parse {}: {:?}", TRACE_ID_HEADER, trace_id_text),
        )
    })?;

    let Some(span_id_text) = reader.get(SPAN_ID_HEADER) else {
        return Err(Error::new(
            Code::MissingParentSpanId,
            format!("{} is present, but {} is missing", TRACE_ID_HEADER, SPAN_ID_HEADER),
        ));
    };
    let parent_id = u64::from_str_radix(span_id_text, 16).map_err(|_| {
        Error::new(
            Code::MalformedParentId,
            format!("could not parse {}: {:?}", SPAN_ID_HEADER, span_id_text),
        )
    })?;

    let sampling_priority = match reader.get(SAMPLED_HEADER) {
        Some(text) => Some(text.parse::<i32>().map_err(|_| {
            Error::new(
                Code::MalformedSamplingPriority,
                format!("could not parse {}: {:?}", SAMPLED_HEADER, text),
            )
        })?),
        None => None,
    };

    Ok(Some(ExtractedData {
        trace_id: Some(trace_id),
        parent_id: Some(parent_id),
        sampling_priority,
        ..Default::default()
    }))
}

pub(crate) fn inject(context: &InjectContext<'_>, writer: &mut dyn Injector) {
    writer.set(TRACE_ID_HEADER, &context.trace_id.hex());
    writer.set(SPAN_ID_HEADER, &format!("{:016x}", context.span_id));
    let sampled = if context.sampling_priority > 0 { "1" } else { "0" };
    writer.set(SAMPLED_HEADER, sampled);
}
