use std::time::Duration;

use tokio::time::Instant;

use super::message::OutboundMessage;

/// Application-level heartbeat bookkeeping.
///
/// Liveness is left to the transport's close/error events: a missing `heartbeat_response`
/// is recorded but never tears the connection down.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    interval: Duration,
    last_sent: Option<Instant>,
    last_response: Option<Instant>,
    last_rtt: Option<Duration>,
    sent: u64,
    responses: u64,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: None,
            last_response: None,
            last_rtt: None,
            sent: 0,
            responses: 0,
        }
    }

    /// Build the next heartbeat and stamp its send time.
    pub fn create_heartbeat(&mut self, now: Instant) -> OutboundMessage {
        self.last_sent = Some(now);
        self.sent = self.sent.saturating_add(1);
        OutboundMessage::Heartbeat
    }

    /// Record a `heartbeat_response`; returns the round trip to the latest heartbeat.
    pub fn record_response(&mut self, now: Instant) -> Option<Duration> {
        self.last_response = Some(now);
        self.responses = self.responses.saturating_add(1);
        let rtt = self
            .last_sent
            .map(|sent| now.saturating_duration_since(sent));
        self.last_rtt = rtt;
        rtt
    }

    /// A heartbeat went out and nothing came back after it yet.
    pub fn awaiting_response(&self) -> bool {
        match (self.last_sent, self.last_response) {
            (Some(sent), Some(resp)) => resp < sent,
            (Some(_), None) => true,
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
        self.last_response = None;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn responses(&self) -> u64 {
        self.responses
    }

    pub fn last_rtt(&self) -> Option<Duration> {
        self.last_rtt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_reports_rtt_against_latest_heartbeat() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        let t0 = Instant::now();

        assert!(!monitor.awaiting_response());
        assert_eq!(monitor.create_heartbeat(t0), OutboundMessage::Heartbeat);
        assert!(monitor.awaiting_response());

        let rtt = monitor.record_response(t0 + Duration::from_millis(120));
        assert_eq!(rtt, Some(Duration::from_millis(120)));
        assert!(!monitor.awaiting_response());
        assert_eq!(monitor.sent(), 1);
        assert_eq!(monitor.responses(), 1);
    }

    #[test]
    fn unsolicited_response_has_no_rtt() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        assert_eq!(monitor.record_response(Instant::now()), None);
    }

    #[test]
    fn reset_clears_pending_state_but_keeps_counters() {
        let mut monitor = HeartbeatMonitor::new(Duration::from_secs(30));
        monitor.create_heartbeat(Instant::now());
        monitor.reset();
        assert!(!monitor.awaiting_response());
        assert_eq!(monitor.sent(), 1);
    }
}
