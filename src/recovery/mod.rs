// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Congestion control (§4.5) and RTT estimation (§4.7).

pub mod cubic;
pub mod rtt;

pub use cubic::{CongestionStats, CubicCongestionController};
pub use rtt::RttEstimator;
