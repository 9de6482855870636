// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Diagnostic output.
//!
//! The tracer never writes to stderr or panics on the user path; everything
//! diagnostic funnels through a [`Logger`]. The default implementation
//! forwards to the `log` crate facade, so embedders see tracer diagnostics
//! through whatever logger their process already installs.

use crate::error::Error;

pub trait Logger: Send + Sync {
    /// A runtime failure (extraction problem, collector send failure, ...).
    /// Errors reported here were already handled; this is informational.
    fn log_error(&self, error: &Error);

    /// A condition worth flagging that is not a failure, e.g. conflicting
    /// configuration where one side won.
    fn log_warning(&self, message: &str);

    /// The one-time startup banner.
    fn log_startup(&self, message: &str);
}

/// Forwards to `log::error!` / `log::warn!` / `log::info!`.
#[derive(Debug, Default)]
pub struct DefaultLogger;

impl Logger for DefaultLogger {
    fn log_error(&self, error: &Error) {
        log::error!("{}", error);
    }

    fn log_warning(&self, message: &str) {
        log::warn!("{}", message);
    }

    fn log_startup(&self, message: &str) {
        log::info!("{}", message);
    }
}
