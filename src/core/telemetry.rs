use serde::{Deserialize, Serialize};

use super::geo::LocationSample;

/// Routing identifiers tagging every frame of a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteContext {
    pub vehicle_id: String,
    pub organization_id: String,
    pub operation_id: String,
}

impl RouteContext {
    pub fn new(
        vehicle_id: impl Into<String>,
        organization_id: impl Into<String>,
        operation_id: impl Into<String>,
    ) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            organization_id: organization_id.into(),
            operation_id: operation_id.into(),
        }
    }
}

/// Boarding direction reported with `passengerBoarding` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoardingAction {
    Board,
    Alight,
}

/// Latest known vehicle telemetry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryState {
    last_location: Option<LocationSample>,
    occupied_seats: u32,
}

impl TelemetryState {
    /// Caller must have validated the sample.
    pub fn set_location(&mut self, sample: LocationSample) {
        self.last_location = Some(sample);
    }

    pub fn set_occupancy(&mut self, count: u32) {
        self.occupied_seats = count;
    }

    /// Apply a boarding event; alighting below zero saturates.
    pub fn apply_boarding(&mut self, action: BoardingAction, count: u32) -> u32 {
        self.occupied_seats = match action {
            BoardingAction::Board => self.occupied_seats.saturating_add(count),
            BoardingAction::Alight => self.occupied_seats.saturating_sub(count),
        };
        self.occupied_seats
    }

    pub fn last_location(&self) -> Option<&LocationSample> {
        self.last_location.as_ref()
    }

    pub fn occupied_seats(&self) -> u32 {
        self.occupied_seats
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alighting_never_goes_negative() {
        let mut state = TelemetryState::default();
        state.set_occupancy(3);
        assert_eq!(state.apply_boarding(BoardingAction::Alight, 5), 0);
        assert_eq!(state.apply_boarding(BoardingAction::Board, 2), 2);
    }

    #[test]
    fn boarding_action_uses_upper_case_on_the_wire() {
        let encoded = sonic_rs::to_string(&BoardingAction::Alight).unwrap();
        assert_eq!(encoded, "\"ALIGHT\"");
    }
}
