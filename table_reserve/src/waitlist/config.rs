//! Waitlist configuration.

use super::models::PriorityTier;
use crate::table::SlotGrid;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Occasion keywords that earn the special-occasion tier
pub const DEFAULT_SPECIAL_OCCASIONS: &[&str] = &[
    "anniversary",
    "birthday",
    "proposal",
    "engagement",
    "wedding",
    "graduation",
    "celebration",
];

/// Waitlist configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistConfig {
    /// Time a notified guest has to confirm (default: 30 minutes)
    pub notification_window_secs: u64,

    /// Turnover assumed when there is no seating history (default: 15)
    pub default_turnover_minutes: u32,

    /// Number of recent turnover samples averaged (default: 20)
    pub turnover_samples: usize,

    /// Party size at which the large-party tier applies (default: 6)
    pub large_party_threshold: u32,

    /// Interval between expiry sweeps (default: 60 seconds)
    pub sweep_interval_secs: u64,

    /// Occasion keywords for the special-occasion tier
    pub special_occasions: Vec<String>,

    /// Daily seating grid that acceptable slots must lie on
    pub slot_grid: SlotGrid,
}

impl Default for WaitlistConfig {
    fn default() -> Self {
        Self {
            notification_window_secs: 30 * 60,
            default_turnover_minutes: 15,
            turnover_samples: 20,
            large_party_threshold: 6,
            sweep_interval_secs: 60,
            special_occasions: DEFAULT_SPECIAL_OCCASIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            slot_grid: SlotGrid::default(),
        }
    }
}

impl WaitlistConfig {
    /// Load configuration from environment variables
    ///
    /// - `WAITLIST_NOTIFICATION_WINDOW_SECS` (default: 1800)
    /// - `WAITLIST_DEFAULT_TURNOVER_MINUTES` (default: 15)
    /// - `WAITLIST_TURNOVER_SAMPLES` (default: 20)
    /// - `WAITLIST_LARGE_PARTY` (default: 6)
    /// - `WAITLIST_SWEEP_INTERVAL_SECS` (default: 60)
    /// - `WAITLIST_SPECIAL_OCCASIONS`: comma-separated keywords
    ///
    /// The slot grid is read with [`SlotGrid::from_env`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            notification_window_secs: std::env::var("WAITLIST_NOTIFICATION_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.notification_window_secs),
            default_turnover_minutes: std::env::var("WAITLIST_DEFAULT_TURNOVER_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_turnover_minutes),
            turnover_samples: std::env::var("WAITLIST_TURNOVER_SAMPLES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.turnover_samples),
            large_party_threshold: std::env::var("WAITLIST_LARGE_PARTY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.large_party_threshold),
            sweep_interval_secs: std::env::var("WAITLIST_SWEEP_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.sweep_interval_secs),
            special_occasions: std::env::var("WAITLIST_SPECIAL_OCCASIONS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_lowercase())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.special_occasions),
            slot_grid: SlotGrid::from_env(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.notification_window_secs == 0 {
            return Err("Notification window must be greater than 0".to_string());
        }

        if self.default_turnover_minutes == 0 {
            return Err("Default turnover must be greater than 0".to_string());
        }

        if self.turnover_samples == 0 {
            return Err("Turnover sample size must be greater than 0".to_string());
        }

        if self.large_party_threshold < 2 {
            return Err("Large party threshold must be at least 2".to_string());
        }

        if self.sweep_interval_secs == 0 {
            return Err("Sweep interval must be greater than 0".to_string());
        }

        self.slot_grid.validate()
    }

    /// Notification window as a chrono duration
    pub fn notification_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.notification_window_secs.min(i64::MAX as u64) as i64)
    }

    /// Sweep interval as a std duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Whether the occasion text names a special occasion
    pub fn is_special_occasion(&self, occasion: &str) -> bool {
        let occasion = occasion.to_lowercase();
        occasion
            .split(|c: char| !c.is_alphanumeric())
            .any(|word| self.special_occasions.iter().any(|k| k == word))
    }

    /// Priority tier for a party. Special occasions outrank large parties.
    pub fn priority_for(&self, guest_count: u32, occasion: Option<&str>) -> PriorityTier {
        if occasion.is_some_and(|o| self.is_special_occasion(o)) {
            PriorityTier::SpecialOccasion
        } else if guest_count >= self.large_party_threshold {
            PriorityTier::LargeParty
        } else {
            PriorityTier::Standard
        }
    }
}
