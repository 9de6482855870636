// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Token-bucket rate limiter.
//!
//! Admits at most R events per second with burst capacity R. Each call to
//! [`Limiter::allow`] first refills `R * elapsed_seconds` tokens (capped at
//! the bucket capacity), then admits the event if at least one whole token
//! is available. The limiter also tracks its effective admission rate
//! (admitted / total) over a rolling window of seconds; that value becomes
//! the `_dd.limit_psr` metric on sampled traces.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::clock::Clock;

/// Number of previous one-second buckets that participate in the effective
/// rate, in addition to the current one.
const EFFECTIVE_RATE_HISTORY: usize = 9;

pub struct Limiter {
    clock: Clock,
    tokens: f64,
    max_tokens: f64,
    refill_per_second: f64,
    last_refill: Instant,
    window_start: Instant,
    num_allowed: u32,
    num_requested: u32,
    previous_rates: VecDeque<f64>,
}

impl Limiter {
    /// A limiter admitting `per_second` events per second. `per_second` must
    /// be positive; configuration validates this before construction. Burst
    /// capacity equals the rate (with a floor of one token so fractional
    /// rates can still admit).
    pub fn new(clock: Clock, per_second: f64) -> Limiter {
        let now = crate::clock::now(&clock).tick;
        let max_tokens = per_second.max(1.0);
        Limiter {
            clock,
            tokens: max_tokens,
            max_tokens,
            refill_per_second: per_second,
            last_refill: now,
            window_start: now,
            num_allowed: 0,
            num_requested: 0,
            previous_rates: VecDeque::with_capacity(EFFECTIVE_RATE_HISTORY),
        }
    }

    /// Admit or reject one event.
    pub fn allow(&mut self) -> bool {
        let now = crate::clock::now(&self.clock).tick;

        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens =
            (self.tokens + elapsed.as_secs_f64() * self.refill_per_second).min(self.max_tokens);
        self.last_refill = now;

        self.maybe_roll_window(now);

        self.num_requested += 1;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            self.num_allowed += 1;
            true
        } else {
            false
        }
    }

    /// Admitted / requested over the rolling window. Seconds with no
    /// requests count as fully admitted.
    pub fn effective_rate(&self) -> f64 {
        let current = if self.num_requested == 0 {
            1.0
        } else {
            f64::from(self.num_allowed) / f64::from(self.num_requested)
        };
        let total: f64 = current + self.previous_rates.iter().sum::<f64>();
        total / (1 + self.previous_rates.len()) as f64
    }

    fn maybe_roll_window(&mut self, now: Instant) {
        let since_window = now.saturating_duration_since(self.window_start);
        if since_window < Duration::from_secs(1) {
            return;
        }
        let rate = if self.num_requested == 0 {
            1.0
        } else {
            f64::from(self.num_allowed) / f64::from(self.num_requested)
        };
        self.previous_rates.push_front(rate);
        // Whole idle seconds between the last bucket and now.
        let idle_seconds = (since_window.as_secs() - 1).min(EFFECTIVE_RATE_HISTORY as u64);
        for _ in 0..idle_seconds {
            self.previous_rates.push_front(1.0);
        }
        self.previous_rates.truncate(EFFECTIVE_RATE_HISTORY);
        self.window_start = now;
        self.num_allowed = 0;
        self.num_requested = 0;
    }
}
