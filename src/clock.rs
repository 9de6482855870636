// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Time source used throughout the tracer.
//!
//! Spans record a wall clock time (for the agent payload) together with a
//! monotonic tick (for duration arithmetic). Both are captured in one
//! [`TimePoint`] so that they always refer to the same instant. The [`Clock`]
//! itself is injectable so tests can drive time by hand; production code uses
//! [`default_clock`].

use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A wall clock reading paired with the monotonic tick taken at the same
/// moment.
#[derive(Clone, Copy, Debug)]
pub struct TimePoint {
    pub wall: SystemTime,
    pub tick: Instant,
}

impl TimePoint {
    pub fn now() -> TimePoint {
        TimePoint {
            wall: SystemTime::now(),
            tick: Instant::now(),
        }
    }
}

/// Source of [`TimePoint`]s. The environment reader and this clock are the
/// only process-wide inputs, and both are threaded explicitly through
/// configuration finalization.
pub type Clock = Arc<dyn Fn() -> TimePoint + Send + Sync>;

pub fn default_clock() -> Clock {
    Arc::new(TimePoint::now)
}

/// Read the clock. (`Arc<dyn Fn>` is not directly callable.)
pub(crate) fn now(clock: &Clock) -> TimePoint {
    let read: &(dyn Fn() -> TimePoint + Send + Sync) = &**clock;
    read()
}

/// Nanoseconds since the unix epoch, saturated into the range the agent's
/// wire format can carry.
pub(crate) fn wall_nanos(wall: SystemTime) -> i64 {
    match wall.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => elapsed.as_nanos().min(i64::MAX as u128) as i64,
        Err(_) => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wall_nanos_is_nonnegative() {
        assert!(wall_nanos(SystemTime::now()) > 0);
        assert_eq!(wall_nanos(UNIX_EPOCH - Duration::from_secs(1)), 0);
    }

    #[test]
    fn default_clock_pairs_wall_and_tick() {
        let clock = default_clock();
        let before = clock();
        let after = clock();
        assert!(after.tick >= before.tick);
    }
}
