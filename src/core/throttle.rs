use std::time::Duration;

use tokio::time::Instant;

use super::geo::LocationSample;

/// Outcome of a throttle evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThrottleDecision {
    /// No baseline yet.
    First,
    /// Moved at least the minimum distance since the last transmission.
    Moved { meters: f64 },
    /// Below the distance floor but the freshness floor elapsed.
    Stale { since: Duration },
    Suppress { meters: f64 },
}

impl ThrottleDecision {
    pub fn should_send(self) -> bool {
        !matches!(self, ThrottleDecision::Suppress { .. })
    }
}

/// Significance filter for position updates.
///
/// The baseline is the last *transmitted* sample, shared by every trigger (motion-driven
/// sends and the periodic flush) so both paths agree on what the server has already seen.
#[derive(Debug, Clone)]
pub struct LocationThrottle {
    min_distance_meters: f64,
    max_silence: Duration,
    last_sent: Option<(LocationSample, Instant)>,
}

impl LocationThrottle {
    pub fn new(min_distance_meters: f64, max_silence: Duration) -> Self {
        Self {
            min_distance_meters: min_distance_meters.max(0.0),
            max_silence,
            last_sent: None,
        }
    }

    /// Evaluate `sample` at `now` without touching the baseline.
    ///
    /// Silence is measured between admission instants; the sample's own fix timestamp is
    /// not consulted.
    pub fn evaluate(&self, sample: &LocationSample, now: Instant) -> ThrottleDecision {
        let Some((last, at)) = self.last_sent.as_ref() else {
            return ThrottleDecision::First;
        };
        let meters = sample.distance_to(last);
        if meters >= self.min_distance_meters {
            return ThrottleDecision::Moved { meters };
        }
        let since = now.saturating_duration_since(*at);
        if since > self.max_silence {
            ThrottleDecision::Stale { since }
        } else {
            ThrottleDecision::Suppress { meters }
        }
    }

    /// Evaluate and, when the sample is significant, adopt it as the new baseline.
    pub fn admit(&mut self, sample: &LocationSample, now: Instant) -> ThrottleDecision {
        let decision = self.evaluate(sample, now);
        if decision.should_send() {
            self.last_sent = Some((*sample, now));
        }
        decision
    }

    pub fn last_sent(&self) -> Option<&LocationSample> {
        self.last_sent.as_ref().map(|(sample, _)| sample)
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

impl Default for LocationThrottle {
    fn default() -> Self {
        Self::new(2.0, Duration::from_secs(10))
    }
}
