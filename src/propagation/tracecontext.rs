// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The W3C Trace Context propagation style (`traceparent`).
//!
//! Per the W3C recommendation, a malformed `traceparent` is treated as if
//! it were absent rather than reported as an error, so extraction falls
//! through to the next configured style.

use super::{ExtractedData, Extractor, InjectContext, Injector};
use crate::error::Error;
use crate::id_generator::TraceId;

pub(crate) const TRACEPARENT_HEADER: &str = "traceparent";

const SAMPLED_FLAG: u8 = 0x01;

pub(crate) fn extract(reader: &dyn Extractor) -> Result<Option<ExtractedData>, Error> {
    let Some(header) = reader.get(TRACEPARENT_HEADER) else {
        return Ok(None);
    };
    Ok(parse_traceparent(header.trim()))
}

fn parse_traceparent(header: &str) -> Option<ExtractedData> {
    let mut parts = header.split('-');
    let version = parts.next()?;
    let trace_id_text = parts.next()?;
    let span_id_text = parts.next()?;
    let flags_text = parts.next()?;

    if version.len() != 2 || !is_hex(version) || version == "ff" {
        return None;
    }
    // Version 00 has exactly four fields; later versions may append more.
    if version == "00" && parts.next().is_some() {
        return None;
    }
    if trace_id_text.len() != 32 || span_id_text.len() != 16 || flags_text.len() != 2 {
        return None;
    }

    let trace_id = TraceId::parse_hex(trace_id_text)?;
    let parent_id = u64::from_str_radix(span_id_text, 16).ok()?;
    let flags = u8::from_str_radix(flags_text, 16).ok()?;
    if trace_id.low == 0 && trace_id.high == 0 || parent_id == 0 {
        return None;
    }

    let sampling_priority = if flags & SAMPLED_FLAG != 0 { 1 } else { 0 };

    Some(ExtractedData {
        trace_id: Some(trace_id),
        parent_id: Some(parent_id),
        sampling_priority: Some(sampling_priority),
        ..Default::default()
    })
}

fn is_hex(text: &str) -> bool {
    !text.is_empty()
        && text
            .bytes()
            .all(|byte| byte.is_ascii_digit() || (b'a'..=b'f').contains(&byte))
}

pub(crate) fn inject(context: &InjectContext<'_>, writer: &mut dyn Injector) {
    let flags = if context.sampling_priority > 0 {
        SAMPLED_FLAG
    } else {
        0
    };
    let traceparent = format!(
        "00-{:016x}{:016x}-{:016x}-{:02x}",
        context.trace_id.high, context.trace_id.low, context.span_id, flags
    );
    writer.set(TRACEPARENT_HEADER, &traceparent);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn absent_without_traceparent() {
        let carrier = headers(&[]);
        assert!(extract(&carrier).unwrap().is_none());
    }

    #[test]
    fn extracts_ids_and_sampled_flag() {
        let carrier = headers(&[(
            "traceparent",
            "00-000000000000beef00000000000000ff-0000000000000010-01",
        )]);
        let data = extract(&carrier).unwrap().unwrap();
        assert_eq!(
            data.trace_id,
            Some(TraceId {
                high: 0xbeef,
                low: 255
            })
        );
        assert_eq!(data.parent_id, Some(16));
        assert_eq!(data.sampling_priority, Some(1));
    }

    #[test]
    fn unsampled_flag_maps_to_priority_zero() {
        let carrier = headers(&[(
            "traceparent",
            "00-000000000000000000000000000000ff-0000000000000010-00",
        )]);
        let data = extract(&carrier).unwrap().unwrap();
        assert_eq!(data.sampling_priority, Some(0));
    }

    #[test]
    fn malformed_traceparent_is_treated_as_absent() {
        for bogus in [
            "garbage",
            "00-123-456-01",
            "ff-000000000000000000000000000000ff-0000000000000010-01",
            "00-000000000000000000000000000000ff-0000000000000010-01-extra",
            "00-00000000000000000000000000000000-0000000000000010-01",
            "00-000000000000000000000000000000ff-0000000000000000-01",
            "00-ZZ0000000000000000000000000000ff-0000000000000010-01",
        ] {
            let carrier = headers(&[("traceparent", bogus)]);
            assert!(
                extract(&carrier).unwrap().is_none(),
                "expected absent for {:?}",
                bogus
            );
        }
    }

    #[test]
    fn inject_round_trips() {
        let trace_tags = HashMap::new();
        let context = InjectContext {
            trace_id: TraceId {
                high: 0xbeef,
                low: 255,
            },
            span_id: 16,
            sampling_priority: 1,
            origin: None,
            trace_tags: &trace_tags,
            max_tags_header_size: 512,
        };
        let mut carrier: HashMap<String, String> = HashMap::new();
        inject(&context, &mut carrier);
        assert_eq!(
            carrier.get("traceparent").unwrap(),
            "00-000000000000beef00000000000000ff-0000000000000010-01"
        );

        let data = extract(&carrier).unwrap().unwrap();
        assert_eq!(data.trace_id, Some(context.trace_id));
        assert_eq!(data.parent_id, Some(16));
        assert_eq!(data.sampling_priority, Some(1));
    }
}
