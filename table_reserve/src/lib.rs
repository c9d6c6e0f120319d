//! # Table Reserve
//!
//! Reservation coordination for a restaurant floor: picking the right table
//! for a party, running a fair waitlist when no table is free, and keeping a
//! live view of table availability in sync with the reservation server.
//!
//! ## Core Modules
//!
//! - [`scoring`]: Pure, deterministic ranking of candidate tables
//! - [`waitlist`]: Priority queue with notification windows and re-queueing
//! - [`sync`]: Real-time availability subscription over WebSocket
//! - [`coordinator`]: Glue that assigns tables or waitlists requests and
//!   offers freed tables to waiting parties
//! - [`db`]: Postgres and in-memory persistence
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use table_reserve::{ReservationRequest, Table, LocationZone, TimeSlot, scoring};
//!
//! let tables = vec![Table::new(1, 1, 2, LocationZone::Indoor)];
//! let request = ReservationRequest::new(
//!     2,
//!     NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
//!     TimeSlot::from_hm(18, 30).unwrap(),
//! );
//!
//! assert_eq!(scoring::best(&tables, &request).unwrap().table.id, 1);
//! ```

/// Reservation coordination across scoring, waitlist and availability.
pub mod coordinator;
pub use coordinator::{
    Allocation, ConfirmedOffer, CoordinatorConfig, CoordinatorError, CoordinatorResult,
    HeldTable, ReservationCoordinator,
};

/// Persistence layer.
pub mod db;

/// Guest notification delivery.
pub mod notify;

pub mod reservation;
pub use reservation::{ReservationRequest, SeatingPreference};

/// Table assignment scoring.
pub mod scoring;

/// Real-time availability synchronization.
pub mod sync;

/// Table inventory and seating grid.
pub mod table;
pub use table::{LocationZone, SlotGrid, Table, TableId, TableShape, TableStatus, TimeSlot};

/// Waitlist queue management.
pub mod waitlist;
