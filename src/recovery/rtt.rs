// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! The connection-level RTT smoother (§4.7), distinct from the CUBIC
//! controller's own simple EWMA (§4.5). Standard QUIC-style smoothing.

use std::time::Duration;

/// Samples of 1 ms or less are rejected as clock artefacts.
const MIN_ACCEPTED_SAMPLE: Duration = Duration::from_millis(1);

#[derive(Clone, Copy, Debug)]
pub struct RttEstimator {
    smoothed_rtt: Option<Duration>,
    rtt_variance: Duration,
    min_rtt: Option<Duration>,
    latest_rtt: Duration,
}

impl RttEstimator {
    pub fn new() -> Self {
        Self {
            smoothed_rtt: None,
            rtt_variance: Duration::ZERO,
            min_rtt: None,
            latest_rtt: Duration::ZERO,
        }
    }

    /// Folds a new RTT sample into the estimate. Samples at or below
    /// [`MIN_ACCEPTED_SAMPLE`] are discarded and do not perturb
    /// `smoothed_rtt`.
    pub fn update(&mut self, sample: Duration) {
        if sample <= MIN_ACCEPTED_SAMPLE {
            return;
        }

        self.latest_rtt = sample;
        self.min_rtt = Some(self.min_rtt.map_or(sample, |m| m.min(sample)));

        match self.smoothed_rtt {
            None => {
                self.smoothed_rtt = Some(sample);
                self.rtt_variance = sample / 2;
            }
            Some(prev) => {
                let diff = if prev > sample { prev - sample } else { sample - prev };
                self.rtt_variance = self.rtt_variance.mul_f64(0.75) + diff.mul_f64(0.25);
                self.smoothed_rtt = Some(prev.mul_f64(0.875) + sample.mul_f64(0.125));
            }
        }
    }

    pub fn smoothed_rtt(&self) -> Option<Duration> {
        self.smoothed_rtt
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.min_rtt
    }

    pub fn latest_rtt(&self) -> Duration {
        self.latest_rtt
    }

    pub fn variance(&self) -> Duration {
        self.rtt_variance
    }
}

impl Default for RttEstimator {
    fn default() -> Self {
        Self::new()
    }
}
