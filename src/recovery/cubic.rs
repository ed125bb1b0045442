// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! CUBIC congestion controller (§4.5), simplified from RFC 8312: window unit
//! is packets, not bytes, and there is no Hybrid Slow Start.

use std::time::{Duration, Instant};

pub const BETA: f64 = 0.7;
pub const C: f64 = 0.4;
pub const INITIAL_WINDOW: f64 = 10.0;
pub const MIN_WINDOW: f64 = 2.0;
pub const MAX_WINDOW: f64 = 1000.0;
pub const INITIAL_SSTHRESH: f64 = 50.0;

/// A simple EWMA seed for the controller's own RTT estimate (distinct from
/// the connection-level [`super::rtt::RttEstimator`]).
const INITIAL_RTT_ESTIMATE: Duration = Duration::from_millis(100);
const EWMA_WEIGHT: f64 = 0.2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum State {
    SlowStart,
    CongestionAvoidance,
    Recovery,
}

#[derive(Copy, Clone, Debug)]
pub struct CongestionStats {
    pub cwnd: u32,
    pub ssthresh: u32,
    pub state: State,
    pub rtt_estimate: Duration,
    pub in_flight: u32,
    pub w_max: f64,
}

/// Per-connection CUBIC state. Time is threaded through explicitly via the
/// `now` parameter on each call rather than read from a hidden clock, so the
/// controller stays trivially testable.
#[derive(Debug)]
pub struct CubicCongestionController {
    cwnd: f64,
    ssthresh: f64,
    state: State,
    w_max: f64,
    last_congestion_time: Option<Instant>,
    rtt_estimate: Duration,
    in_flight: u32,
}

impl CubicCongestionController {
    pub fn new() -> Self {
        Self {
            cwnd: INITIAL_WINDOW,
            ssthresh: INITIAL_SSTHRESH,
            state: State::SlowStart,
            w_max: 0.0,
            last_congestion_time: None,
            rtt_estimate: INITIAL_RTT_ESTIMATE,
            in_flight: 0,
        }
    }

    /// `in_flight < cwnd` is the send-gating precondition (I4); checked here,
    /// not enforced afterwards.
    pub fn can_send(&self) -> bool {
        self.in_flight < self.cwnd as u32
    }

    pub fn on_sent(&mut self, _size: usize) {
        self.in_flight += 1;
    }

    pub fn on_acked(&mut self, _size: usize, rtt: Duration, now: Instant) {
        self.in_flight = self.in_flight.saturating_sub(1);
        self.rtt_estimate = self
            .rtt_estimate
            .mul_f64(1.0 - EWMA_WEIGHT)
            .saturating_add(rtt.mul_f64(EWMA_WEIGHT));

        match self.state {
            State::SlowStart => {
                self.cwnd += 1.0;
                if self.cwnd >= self.ssthresh {
                    self.state = State::CongestionAvoidance;
                }
            }
            State::CongestionAvoidance => {
                self.cubic_update(now);
            }
            State::Recovery => {
                self.cubic_update(now);
                if self.in_flight <= self.cwnd as u32 {
                    self.state = State::CongestionAvoidance;
                }
            }
        }
    }

    pub fn on_lost(&mut self, _size: usize, now: Instant) {
        self.w_max = self.cwnd;
        self.cwnd = (self.cwnd * BETA).floor().max(MIN_WINDOW);
        self.ssthresh = self.cwnd;
        self.state = State::Recovery;
        self.last_congestion_time = Some(now);
    }

    /// `W(t) = C*(t-K)^3 + w_max`, `K = cbrt(w_max*(1-BETA)/C)`. Raises
    /// `cwnd` if the computed window exceeds it; never reduces here.
    fn cubic_update(&mut self, now: Instant) {
        let Some(last_congestion_time) = self.last_congestion_time else {
            return;
        };
        let t = now.saturating_duration_since(last_congestion_time).as_secs_f64();
        if t < 0.001 {
            return;
        }

        let k = (self.w_max * (1.0 - BETA) / C).cbrt();
        let w_cubic = (C * (t - k).powi(3) + self.w_max).clamp(MIN_WINDOW, MAX_WINDOW);

        if w_cubic > self.cwnd {
            self.cwnd = w_cubic.min(MAX_WINDOW);
        }
    }

    pub fn stats(&self) -> CongestionStats {
        CongestionStats {
            cwnd: self.cwnd as u32,
            ssthresh: self.ssthresh as u32,
            state: self.state,
            rtt_estimate: self.rtt_estimate,
            in_flight: self.in_flight,
            w_max: self.w_max,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd as u32
    }
}

impl Default for CubicCongestionController {
    fn default() -> Self {
        Self::new()
    }
}
