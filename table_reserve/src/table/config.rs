//! Daily seating grid configuration.

use chrono::{NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// A bookable time slot on the daily grid, serialized as `"HH:MM"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot(NaiveTime);

impl TimeSlot {
    /// Create a slot from hour and minute
    pub fn from_hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Wall-clock start of the slot
    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Minutes since midnight
    pub fn minutes_from_midnight(&self) -> u32 {
        self.0.hour() * 60 + self.0.minute()
    }
}

impl From<NaiveTime> for TimeSlot {
    fn from(time: NaiveTime) -> Self {
        // Slots are minute-granular
        Self(time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time))
    }
}

impl std::fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl std::str::FromStr for TimeSlot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .map(Self)
            .map_err(|e| format!("Invalid time slot '{}': {}", s, e))
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Fixed daily grid of seatings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotGrid {
    /// First seating of the day
    pub first_seating: TimeSlot,
    /// Last seating of the day (inclusive)
    pub last_seating: TimeSlot,
    /// Minutes between seatings
    pub interval_minutes: u32,
}

impl Default for SlotGrid {
    fn default() -> Self {
        Self {
            first_seating: TimeSlot(NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()),
            last_seating: TimeSlot(NaiveTime::from_hms_opt(22, 0, 0).unwrap_or_default()),
            interval_minutes: 30,
        }
    }
}

impl SlotGrid {
    /// Load the grid from environment variables
    ///
    /// - `SLOT_FIRST`: first seating as HH:MM (default: 17:00)
    /// - `SLOT_LAST`: last seating as HH:MM (default: 22:00)
    /// - `SLOT_INTERVAL_MINUTES`: spacing (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            first_seating: std::env::var("SLOT_FIRST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.first_seating),
            last_seating: std::env::var("SLOT_LAST")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.last_seating),
            interval_minutes: std::env::var("SLOT_INTERVAL_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.interval_minutes),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_minutes == 0 || self.interval_minutes > 24 * 60 {
            return Err("Slot interval must be between 1 and 1440 minutes".to_string());
        }

        if self.last_seating < self.first_seating {
            return Err("Last seating must not be before first seating".to_string());
        }

        Ok(())
    }

    /// All slots of the day in ascending order
    pub fn slots(&self) -> Vec<TimeSlot> {
        if self.interval_minutes == 0 {
            return vec![self.first_seating];
        }

        let first = self.first_seating.minutes_from_midnight();
        let last = self.last_seating.minutes_from_midnight();

        (first..=last)
            .step_by(self.interval_minutes as usize)
            .filter_map(|m| TimeSlot::from_hm(m / 60, m % 60))
            .collect()
    }

    /// Whether a slot lies on the grid
    pub fn contains(&self, slot: TimeSlot) -> bool {
        let minutes = slot.minutes_from_midnight();
        let first = self.first_seating.minutes_from_midnight();
        let last = self.last_seating.minutes_from_midnight();

        if minutes < first || minutes > last {
            return false;
        }

        self.interval_minutes == 0 || (minutes - first) % self.interval_minutes == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_slot_parse_and_display() {
        let slot: TimeSlot = "19:30".parse().unwrap();
        assert_eq!(slot.to_string(), "19:30");
        assert_eq!(slot.minutes_from_midnight(), 19 * 60 + 30);
        assert!("7pm".parse::<TimeSlot>().is_err());
    }

    #[test]
    fn test_time_slot_serde_as_string() {
        let slot = TimeSlot::from_hm(18, 0).unwrap();
        let json = serde_json::to_string(&slot).unwrap();
        assert_eq!(json, "\"18:00\"");

        let back: TimeSlot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn test_default_grid_slots() {
        let grid = SlotGrid::default();
        let slots = grid.slots();
        assert_eq!(slots.len(), 11);
        assert_eq!(slots[0].to_string(), "17:00");
        assert_eq!(slots[10].to_string(), "22:00");
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_grid_contains() {
        let grid = SlotGrid::default();
        assert!(grid.contains(TimeSlot::from_hm(17, 30).unwrap()));
        assert!(grid.contains(TimeSlot::from_hm(22, 0).unwrap()));
        assert!(!grid.contains(TimeSlot::from_hm(17, 15).unwrap()));
        assert!(!grid.contains(TimeSlot::from_hm(12, 0).unwrap()));
        assert!(!grid.contains(TimeSlot::from_hm(22, 30).unwrap()));
    }

    #[test]
    fn test_grid_validation() {
        let grid = SlotGrid {
            interval_minutes: 0,
            ..SlotGrid::default()
        };
        assert!(grid.validate().is_err());

        let grid = SlotGrid {
            first_seating: TimeSlot::from_hm(22, 0).unwrap(),
            last_seating: TimeSlot::from_hm(17, 0).unwrap(),
            interval_minutes: 30,
        };
        assert!(grid.validate().is_err());
    }
}
