// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pseudorandom trace and span ID generation.

use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;

/// A trace ID. Datadog trace IDs are 64 bits wide on the wire; when 128-bit
/// generation is enabled the upper 64 bits travel separately as the
/// `_dd.p.tid` trace tag, a fixed-width lowercase hex string.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TraceId {
    pub high: u64,
    pub low: u64,
}

impl TraceId {
    pub fn from_low(low: u64) -> TraceId {
        TraceId { high: 0, low }
    }

    /// Parse a 16 or 32 character hex string, e.g. a B3 or W3C trace ID.
    pub(crate) fn parse_hex(text: &str) -> Option<TraceId> {
        match text.len() {
            16 => {
                let low = u64::from_str_radix(text, 16).ok()?;
                Some(TraceId { high: 0, low })
            }
            32 => {
                let high = u64::from_str_radix(&text[..16], 16).ok()?;
                let low = u64::from_str_radix(&text[16..], 16).ok()?;
                Some(TraceId { high, low })
            }
            _ => None,
        }
    }

    /// The upper 64 bits formatted the way `_dd.p.tid` carries them.
    pub(crate) fn high_hex(&self) -> String {
        format!("{:016x}", self.high)
    }

    /// Full 128-bit (or padded 64-bit) hex rendering.
    pub fn hex(&self) -> String {
        if self.high != 0 {
            format!("{:016x}{:016x}", self.high, self.low)
        } else {
            format!("{:016x}", self.low)
        }
    }
}

/// Source of trace and span IDs. Injectable so tests can produce
/// deterministic traces.
pub trait IdGenerator: Send + Sync {
    /// Generate the ID for a new trace. `start` is the wall clock time of the
    /// trace's root span.
    fn trace_id(&self, start: SystemTime) -> TraceId;
    /// Generate the ID for a new span.
    fn span_id(&self) -> u64;
}

/// Default generator. Span IDs and the low 64 trace ID bits are uniformly
/// random nonzero values. With 128-bit trace IDs enabled, the upper word
/// encodes the trace start time in its high 32 bits, matching what the
/// Datadog backend expects from `_dd.p.tid`.
#[derive(Debug)]
pub struct RandomIdGenerator {
    pub trace_id_128_bit: bool,
}

impl IdGenerator for RandomIdGenerator {
    fn trace_id(&self, start: SystemTime) -> TraceId {
        let low = rand::thread_rng().gen_range(1..u64::MAX);
        let high = if self.trace_id_128_bit {
            let seconds = start
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0);
            seconds << 32
        } else {
            0
        };
        TraceId { high, low }
    }

    fn span_id(&self) -> u64 {
        rand::thread_rng().gen_range(1..u64::MAX)
    }
}
