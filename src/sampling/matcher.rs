// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Glob-based span matching used by sampling rules.

use std::collections::HashMap;

use crate::span_data::SpanData;

/// Matches spans by service, operation name, resource, and tags. Patterns
/// support `*` (any sequence, including empty) and `?` (any single
/// character); all four criteria must match. The default matcher matches
/// every span.
#[derive(Clone, Debug, PartialEq)]
pub struct SpanMatcher {
    pub service: String,
    pub name: String,
    pub resource: String,
    /// Pattern-to-pattern pairs. Every entry must match some tag on the span.
    pub tags: HashMap<String, String>,
}

impl Default for SpanMatcher {
    fn default() -> Self {
        SpanMatcher {
            service: "*".to_string(),
            name: "*".to_string(),
            resource: "*".to_string(),
            tags: HashMap::new(),
        }
    }
}

impl SpanMatcher {
    pub fn matches(&self, span: &SpanData) -> bool {
        glob_match(&self.service, &span.service)
            && glob_match(&self.name, &span.name)
            && glob_match(&self.resource, &span.resource)
            && self.tags.iter().all(|(key_pattern, value_pattern)| {
                span.tags.iter().any(|(key, value)| {
                    glob_match(key_pattern, key) && glob_match(value_pattern, value)
                })
            })
    }
}

/// Byte-wise glob match with `*` and `?` wildcards.
pub(crate) fn glob_match(pattern: &str, subject: &str) -> bool {
    // Fast path for the catch-all pattern.
    if pattern == "*" {
        return true;
    }

    let pattern = pattern.as_bytes();
    let subject = subject.as_bytes();
    let mut p = 0;
    let mut s = 0;
    // Most recent '*' in the pattern and the subject position to resume from
    // when backtracking.
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while s < subject.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == subject[s]) {
            p += 1;
            s += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = s;
            p += 1;
        } else if let Some(star_pos) = star {
            p = star_pos + 1;
            mark += 1;
            s = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
