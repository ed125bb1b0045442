// Copyright pathquic contributors
// SPDX-License-Identifier: Apache-2.0

//! Loss detection (§4.7, §9 design note): factored behind a trait so the
//! simplistic "oldest in-flight older than 1s while >20 outstanding"
//! heuristic can be replaced by a proper RFC 9002 algorithm without touching
//! the connection state machine.

use std::time::{Duration, Instant};

/// The packet-number/send-time pair a [`LossDetector`] inspects.
pub struct InFlightEntry {
    pub packet_number: u64,
    pub sent_at: Instant,
}

pub trait LossDetector {
    /// Given the in-flight set (oldest first) and the current time, returns
    /// the packet numbers that should be declared lost.
    fn detect(&self, in_flight: &[InFlightEntry], now: Instant) -> Vec<u64>;
}

/// The original source's heuristic: once more than 20 packets are
/// outstanding, the oldest is declared lost if it has been in flight for at
/// least 1 second.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdLossDetector {
    pub outstanding_threshold: usize,
    pub age_threshold: Duration,
}

impl Default for ThresholdLossDetector {
    fn default() -> Self {
        Self {
            outstanding_threshold: 20,
            age_threshold: Duration::from_secs(1),
        }
    }
}

impl LossDetector for ThresholdLossDetector {
    fn detect(&self, in_flight: &[InFlightEntry], now: Instant) -> Vec<u64> {
        if in_flight.len() <= self.outstanding_threshold {
            return Vec::new();
        }

        match in_flight.first() {
            Some(oldest) if now.saturating_duration_since(oldest.sent_at) >= self.age_threshold => {
                vec![oldest.packet_number]
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_loss_declared_at_or_below_the_outstanding_threshold() {
        let detector = ThresholdLossDetector::default();
        let now = Instant::now();
        let old = now - Duration::from_secs(5);
        let entries: Vec<_> = (0..20)
            .map(|n| InFlightEntry {
                packet_number: n,
                sent_at: old,
            })
            .collect();
        assert!(detector.detect(&entries, now).is_empty());
    }

    #[test]
    fn loss_declared_past_threshold_and_age() {
        let detector = ThresholdLossDetector::default();
        let now = Instant::now();
        let old = now - Duration::from_secs(5);
        let entries: Vec<_> = (0..21)
            .map(|n| InFlightEntry {
                packet_number: n,
                sent_at: old,
            })
            .collect();
        assert_eq!(detector.detect(&entries, now), vec![0]);
    }

    #[test]
    fn no_loss_declared_when_oldest_is_too_recent() {
        let detector = ThresholdLossDetector::default();
        let now = Instant::now();
        let entries: Vec<_> = (0..21)
            .map(|n| InFlightEntry {
                packet_number: n,
                sent_at: now,
            })
            .collect();
        assert!(detector.detect(&entries, now).is_empty());
    }
}
