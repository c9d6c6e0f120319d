//! Waitlist queue management.
//!
//! Entries move through a small state machine:
//!
//! ```text
//! pending ──notify──▶ notified ──confirm──▶ confirmed
//!    ▲                   │
//!    └──window lapses────┘
//! pending | notified ──cancel──▶ cancelled
//! pending | notified ──expire──▶ expired
//! ```
//!
//! Pending entries are ordered by priority tier (special occasion, then
//! large party, then standard) and within a tier by the time they joined the
//! queue. An entry whose confirmation window lapses rejoins at the back of
//! its tier.

pub mod config;
pub mod errors;
pub mod manager;
pub mod models;
pub mod sweeper;
pub mod turnover;

pub use config::{DEFAULT_SPECIAL_OCCASIONS, WaitlistConfig};
pub use errors::{WaitlistError, WaitlistResult};
pub use manager::WaitlistManager;
pub use models::{
    ContactInfo, Opening, PriorityTier, QueuePosition, SearchCriteria, SweepReport,
    WaitlistEntry, WaitlistId, WaitlistRequest, WaitlistStatus, normalize_phone,
};
pub use sweeper::{ExpirySweep, spawn_sweeper};
pub use turnover::TurnoverTracker;
