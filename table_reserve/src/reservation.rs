//! Reservation request value object.

use crate::table::{LocationZone, TimeSlot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Seating preference stated by the guest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeatingPreference {
    #[default]
    NoPreference,
    Indoor,
    Outdoor,
    Bar,
    Private,
}

impl SeatingPreference {
    /// Zone requested, or `None` for no preference
    pub fn zone(&self) -> Option<LocationZone> {
        match self {
            SeatingPreference::NoPreference => None,
            SeatingPreference::Indoor => Some(LocationZone::Indoor),
            SeatingPreference::Outdoor => Some(LocationZone::Outdoor),
            SeatingPreference::Bar => Some(LocationZone::Bar),
            SeatingPreference::Private => Some(LocationZone::Private),
        }
    }
}

impl From<LocationZone> for SeatingPreference {
    fn from(zone: LocationZone) -> Self {
        match zone {
            LocationZone::Indoor => SeatingPreference::Indoor,
            LocationZone::Outdoor => SeatingPreference::Outdoor,
            LocationZone::Bar => SeatingPreference::Bar,
            LocationZone::Private => SeatingPreference::Private,
        }
    }
}

impl std::fmt::Display for SeatingPreference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.zone() {
            Some(zone) => write!(f, "{}", zone),
            None => write!(f, "no-preference"),
        }
    }
}

impl std::str::FromStr for SeatingPreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "no-preference" | "" => Ok(SeatingPreference::NoPreference),
            other => other.parse::<LocationZone>().map(SeatingPreference::from),
        }
    }
}

/// A request for a table. Never persisted directly; an unsatisfied request
/// seeds a waitlist entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationRequest {
    /// Party size (at least 1)
    pub guest_count: u32,
    pub date: NaiveDate,
    pub time_slot: TimeSlot,
    #[serde(default)]
    pub seating_preference: SeatingPreference,
    /// Free-text occasion, e.g. "anniversary dinner"
    #[serde(default)]
    pub occasion: Option<String>,
}

impl ReservationRequest {
    /// Create a request with no preference and no occasion
    pub fn new(guest_count: u32, date: NaiveDate, time_slot: TimeSlot) -> Self {
        Self {
            guest_count,
            date,
            time_slot,
            seating_preference: SeatingPreference::NoPreference,
            occasion: None,
        }
    }

    /// Set the seating preference
    pub fn with_preference(mut self, preference: SeatingPreference) -> Self {
        self.seating_preference = preference;
        self
    }

    /// Set the occasion label
    pub fn with_occasion(mut self, occasion: impl Into<String>) -> Self {
        self.occasion = Some(occasion.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preference_zone_mapping() {
        assert_eq!(SeatingPreference::NoPreference.zone(), None);
        assert_eq!(
            SeatingPreference::Outdoor.zone(),
            Some(LocationZone::Outdoor)
        );
        assert_eq!(
            SeatingPreference::from(LocationZone::Private),
            SeatingPreference::Private
        );
    }

    #[test]
    fn test_preference_parse() {
        assert_eq!(
            "no-preference".parse::<SeatingPreference>(),
            Ok(SeatingPreference::NoPreference)
        );
        assert_eq!("bar".parse::<SeatingPreference>(), Ok(SeatingPreference::Bar));
        assert!("rooftop".parse::<SeatingPreference>().is_err());
    }

    #[test]
    fn test_request_deserializes_with_defaults() {
        let json = r#"{"guestCount":2,"date":"2030-06-01","timeSlot":"19:00"}"#;
        let request: ReservationRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.guest_count, 2);
        assert_eq!(request.seating_preference, SeatingPreference::NoPreference);
        assert!(request.occasion.is_none());
    }
}
