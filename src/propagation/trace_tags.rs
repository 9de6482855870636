// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Codec for the `x-datadog-tags` header.
//!
//! Some span tags are associated with the entire trace rather than a single
//! span, and a subset of those propagate across process boundaries. The wire
//! format is comma-separated `key=value` pairs; only keys beginning with
//! `_dd.p.` participate. Keys outside that namespace are silently dropped
//! on decode. A structurally undecodable header (an entry with no `=`, or
//! an empty key) poisons the whole header.

use std::collections::HashMap;

use crate::error::{Code, Error};
use crate::tags;

pub(crate) fn decode_tags(header_value: &str) -> Result<Vec<(String, String)>, Error> {
    let mut pairs = Vec::new();
    for entry in header_value.split(',') {
        let Some((key, value)) = entry.split_once('=') else {
            return Err(Error::new(
                Code::MalformedTags,
                format!(
                    "invalid x-datadog-tags entry {:?} in header {:?}",
                    entry, header_value
                ),
            ));
        };
        if key.is_empty() {
            return Err(Error::new(
                Code::MalformedTags,
                format!(
                    "empty tag name in x-datadog-tags entry {:?} in header {:?}",
                    entry, header_value
                ),
            ));
        }
        if key.starts_with(tags::PROPAGATION_TAG_PREFIX) {
            pairs.push((key.to_string(), value.to_string()));
        }
    }
    Ok(pairs)
}

/// Serialize the propagating subset (`_dd.p.*`) of `trace_tags`. Keys are
/// written in sorted order so the output is deterministic.
pub(crate) fn encode_tags(trace_tags: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = trace_tags
        .keys()
        .filter(|key| key.starts_with(tags::PROPAGATION_TAG_PREFIX))
        .collect();
    keys.sort();

    let mut encoded = String::new();
    for key in keys {
        if !encoded.is_empty() {
            encoded.push(',');
        }
        encoded.push_str(key);
        encoded.push('=');
        encoded.push_str(&trace_tags[key]);
    }
    encoded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_keeps_only_propagation_tags() {
        let pairs = decode_tags("_dd.p.one=1,_dd.p.two=2,three=3").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("_dd.p.one".to_string(), "1".to_string()),
                ("_dd.p.two".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn decode_rejects_entry_without_separator() {
        let error = decode_tags("_dd.p.one=1,bogus").unwrap_err();
        assert_eq!(error.code, Code::MalformedTags);
        let error = decode_tags("").unwrap_err();
        assert_eq!(error.code, Code::MalformedTags);
    }

    #[test]
    fn decode_rejects_empty_key() {
        let error = decode_tags("=value").unwrap_err();
        assert_eq!(error.code, Code::MalformedTags);
    }

    #[test]
    fn decode_allows_empty_value() {
        let pairs = decode_tags("_dd.p.flag=").unwrap();
        assert_eq!(pairs, vec![("_dd.p.flag".to_string(), String::new())]);
    }

    #[test]
    fn encode_filters_and_sorts() {
        let tags = HashMap::from([
            ("_dd.p.dm".to_string(), "-4".to_string()),
            ("_dd.p.atag".to_string(), "x".to_string()),
            ("not_propagated".to_string(), "y".to_string()),
        ]);
        assert_eq!(encode_tags(&tags), "_dd.p.atag=x,_dd.p.dm=-4");
    }

    #[test]
    fn encode_empty_map_is_empty() {
        assert_eq!(encode_tags(&HashMap::new()), "");
    }

    #[test]
    fn round_trip() {
        let tags = HashMap::from([
            ("_dd.p.dm".to_string(), "-1".to_string()),
            ("_dd.p.tid".to_string(), "000000000000beef".to_string()),
        ]);
        let encoded = encode_tags(&tags);
        let decoded: HashMap<String, String> = decode_tags(&encoded).unwrap().into_iter().collect();
        assert_eq!(decoded, tags);
    }
}
