// Copyright 2024-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A sampling rate that is known to be a valid probability.

use crate::error::{Code, Error};

/// A finite `f64` in `[0, 1]`. Construction is validated, so any `Rate` held
/// by a finalized sampler is usable without further checks.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Rate(f64);

impl Rate {
    pub fn try_new(value: f64) -> Result<Rate, Error> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Rate(value))
        } else {
            Err(Error::new(
                Code::RateOutOfRange,
                format!("sample rate must be within [0, 1], but got {}", value),
            ))
        }
    }

    pub fn one() -> Rate {
        Rate(1.0)
    }

    pub fn zero() -> Rate {
        Rate(0.0)
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Rate {
    type Error = Error;

    fn try_from(value: f64) -> Result<Rate, Error> {
        Rate::try_new(value)
    }
}
