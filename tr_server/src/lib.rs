//! Reservation availability and waitlist server.
//!
//! Exposes the waitlist and table inventory over REST, pushes live
//! availability to WebSocket subscribers, and runs the coordinator that
//! offers freed tables to waitlisted parties.

pub mod api;
pub mod config;
pub mod logging;
