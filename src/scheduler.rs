// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Background event scheduling.
//!
//! The agent collector flushes on a fixed interval. The scheduler that
//! drives those ticks is injectable so tests can fire flushes by hand; the
//! default runs one dedicated thread per scheduled event, parked on a
//! condvar so cancellation takes effect immediately.

use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Cancels the associated recurring event when invoked. Dropping it without
/// invoking leaves the event running for the scheduler's lifetime.
pub type Cancel = Box<dyn FnOnce() + Send>;

pub trait EventScheduler: Send + Sync {
    /// Invoke `callback` every `interval` until the returned [`Cancel`] is
    /// called. The first invocation happens one full interval after this
    /// call returns.
    fn schedule_recurring_event(
        &self,
        interval: Duration,
        callback: Box<dyn FnMut() + Send>,
    ) -> Cancel;
}

#[derive(Default)]
struct EventState {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// One thread per recurring event, woken either by its tick deadline or by
/// cancellation.
#[derive(Debug, Default)]
pub struct ThreadedEventScheduler;

impl EventScheduler for ThreadedEventScheduler {
    fn schedule_recurring_event(
        &self,
        interval: Duration,
        mut callback: Box<dyn FnMut() + Send>,
    ) -> Cancel {
        let state = Arc::new(EventState::default());
        let worker_state = Arc::clone(&state);

        // If thread spawning fails the process is in far worse trouble than
        // a missing flush loop; treat the event as already cancelled.
        let _ = thread::Builder::new()
            .name("dd-trace-event".to_string())
            .spawn(move || loop {
                let deadline = Instant::now() + interval;
                let mut cancelled = worker_state.cancelled.lock().unwrap();
                loop {
                    if *cancelled {
                        return;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    let (guard, _timeout) = worker_state
                        .condvar
                        .wait_timeout(cancelled, deadline - now)
                        .unwrap();
                    cancelled = guard;
                }
                drop(cancelled);
                callback();
            });

        Box::new(move || {
            *state.cancelled.lock().unwrap() = true;
            state.condvar.notify_all();
        })
    }
}
