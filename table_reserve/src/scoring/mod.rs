//! Table assignment scoring.
//!
//! Ranks candidate tables for a [`ReservationRequest`](crate::reservation::ReservationRequest)
//! as a weighted sum of four components, each in `[0, 100]`:
//!
//! | component        | weight | rule                                              |
//! |------------------|--------|---------------------------------------------------|
//! | capacity fit     | 40%    | 100 on exact fit, minus 25 per spare seat         |
//! | location         | 30%    | 100 on match, 50 for no preference, 0 otherwise   |
//! | occasion         | 20%    | tables tagged with features the occasion wants    |
//! | size efficiency  | 10%    | guests / capacity                                 |
//!
//! Tables that are not available, or too small for the party, are never
//! scored. The output is ordered by score descending with ties broken by
//! ascending table ID, so the same input always produces the same ranking.
//!
//! ## Example
//!
//! ```
//! use chrono::NaiveDate;
//! use table_reserve::reservation::{ReservationRequest, SeatingPreference};
//! use table_reserve::scoring;
//! use table_reserve::table::{LocationZone, Table, TimeSlot};
//!
//! let tables = vec![
//!     Table::new(1, 1, 2, LocationZone::Indoor),
//!     Table::new(2, 2, 4, LocationZone::Indoor),
//!     Table::new(3, 3, 4, LocationZone::Outdoor),
//! ];
//! let request = ReservationRequest::new(
//!     4,
//!     NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
//!     TimeSlot::from_hm(19, 0).unwrap(),
//! )
//! .with_preference(SeatingPreference::Outdoor);
//!
//! let best = scoring::best(&tables, &request).unwrap();
//! assert_eq!(best.table.id, 3);
//! ```

pub mod models;
pub mod rules;
pub mod scorer;

pub use models::{ScoreBreakdown, ScoringWeights, TableAssignmentResult};
pub use rules::{DEFAULT_OCCASION_RULES, OccasionRule, OccasionRules};
pub use scorer::{TableScorer, best, rank};
