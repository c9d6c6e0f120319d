//! Table module describing the restaurant floor.
//!
//! This module provides:
//! - [`Table`]: a physical seating unit with capacity, zone and feature tags
//! - [`TimeSlot`] and [`SlotGrid`]: the fixed daily grid of bookable seatings
//!
//! Table status is owned by the store and the availability feed. Nothing in
//! this crate changes a table's status in place; scoring and waitlist code
//! only read it.

pub mod config;
pub mod models;

pub use config::{SlotGrid, TimeSlot};
pub use models::{LayoutPosition, LocationZone, Table, TableId, TableShape, TableStatus};
