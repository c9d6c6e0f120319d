//! Table assignment scoring.

use super::{
    models::{ScoreBreakdown, ScoringWeights, TableAssignmentResult},
    rules::OccasionRules,
};
use crate::{reservation::ReservationRequest, table::Table};
use std::cmp::Ordering;

/// Points lost per surplus seat in the capacity-fit component
const SURPLUS_SEAT_PENALTY: f64 = 25.0;

/// Location score when the guest has no preference
const NEUTRAL_LOCATION_SCORE: f64 = 50.0;

/// Occasion score when there is nothing to match against
const NEUTRAL_OCCASION_SCORE: f64 = 50.0;

/// Components at or above this score are explained in `reasons`
pub const REASON_THRESHOLD: f64 = 70.0;

/// Ranks candidate tables against a reservation request.
///
/// Holds only configuration, so one scorer can be shared freely between tasks.
#[derive(Debug, Clone, Copy)]
pub struct TableScorer<'a> {
    weights: ScoringWeights,
    rules: OccasionRules<'a>,
}

impl Default for TableScorer<'static> {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            rules: OccasionRules::default(),
        }
    }
}

impl<'a> TableScorer<'a> {
    /// Create a scorer with custom weights and rules
    pub fn new(weights: ScoringWeights, rules: OccasionRules<'a>) -> Self {
        Self { weights, rules }
    }

    /// Rank every eligible table, best first.
    ///
    /// Tables that are not available, or that seat fewer than the party, are
    /// left out entirely. Ties on score are broken by ascending table ID.
    pub fn rank(&self, tables: &[Table], request: &ReservationRequest) -> Vec<TableAssignmentResult> {
        if request.guest_count == 0 {
            return Vec::new();
        }

        let mut results: Vec<TableAssignmentResult> = tables
            .iter()
            .filter(|t| t.status.is_available() && t.fits(request.guest_count))
            .map(|t| self.score(t, request))
            .collect();

        results.sort_by(compare_results);
        results
    }

    /// Highest-ranked table, if any table is eligible
    pub fn best(&self, tables: &[Table], request: &ReservationRequest) -> Option<TableAssignmentResult> {
        if request.guest_count == 0 {
            return None;
        }

        tables
            .iter()
            .filter(|t| t.status.is_available() && t.fits(request.guest_count))
            .map(|t| self.score(t, request))
            .min_by(compare_results)
    }

    /// Score a single table. The caller is responsible for the hard
    /// constraints checked by [`rank`](Self::rank).
    pub fn score(&self, table: &Table, request: &ReservationRequest) -> TableAssignmentResult {
        let guests = request.guest_count.max(1);
        let surplus = table.capacity.saturating_sub(guests);

        let capacity_fit = (100.0 - SURPLUS_SEAT_PENALTY * f64::from(surplus)).max(0.0);

        let location = match request.seating_preference.zone() {
            None => NEUTRAL_LOCATION_SCORE,
            Some(zone) if zone == table.location => 100.0,
            Some(_) => 0.0,
        };

        let matched = request
            .occasion
            .as_deref()
            .filter(|o| !self.rules.wanted_features(o).is_empty())
            .map(|o| self.rules.matching_features(table, o));

        let occasion = match &matched {
            None => NEUTRAL_OCCASION_SCORE,
            Some(m) if m.is_empty() => 0.0,
            Some(m) if m.len() == 1 => 70.0,
            Some(_) => 100.0,
        };

        let size_efficiency = if table.capacity == 0 {
            0.0
        } else {
            (100.0 * f64::from(guests) / f64::from(table.capacity)).min(100.0)
        };

        let breakdown = ScoreBreakdown {
            capacity_fit,
            location,
            occasion,
            size_efficiency,
        };

        let mut reasons = Vec::new();
        if capacity_fit >= REASON_THRESHOLD {
            if surplus == 0 {
                reasons.push(format!("Perfect fit for {} guests", guests));
            } else {
                reasons.push(format!(
                    "Seats {} for a party of {} ({} spare)",
                    table.capacity, guests, surplus
                ));
            }
        }
        if location >= REASON_THRESHOLD {
            reasons.push(format!("Matches {} seating preference", table.location));
        }
        if occasion >= REASON_THRESHOLD
            && let (Some(m), Some(o)) = (&matched, request.occasion.as_deref())
        {
            reasons.push(format!("Suits the occasion '{}': {}", o, m.join(", ")));
        }
        if size_efficiency >= REASON_THRESHOLD {
            reasons.push("Efficient use of table size".to_string());
        }

        TableAssignmentResult {
            table: table.clone(),
            score: breakdown.total(&self.weights),
            breakdown,
            reasons,
        }
    }
}

/// Score descending, then table ID ascending
fn compare_results(a: &TableAssignmentResult, b: &TableAssignmentResult) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.table.id.cmp(&b.table.id))
}

/// Rank tables with the default weights and rules
pub fn rank(tables: &[Table], request: &ReservationRequest) -> Vec<TableAssignmentResult> {
    TableScorer::default().rank(tables, request)
}

/// Best table with the default weights and rules
pub fn best(tables: &[Table], request: &ReservationRequest) -> Option<TableAssignmentResult> {
    TableScorer::default().best(tables, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        reservation::SeatingPreference,
        table::{LocationZone, TableStatus, TimeSlot},
    };
    use chrono::NaiveDate;

    fn request(guests: u32) -> ReservationRequest {
        ReservationRequest::new(
            guests,
            NaiveDate::from_ymd_opt(2030, 6, 1).unwrap(),
            TimeSlot::from_hm(19, 0).unwrap(),
        )
    }

    #[test]
    fn test_empty_tables() {
        assert!(rank(&[], &request(2)).is_empty());
        assert!(best(&[], &request(2)).is_none());
    }

    #[test]
    fn test_outdoor_preference_scenario() {
        let tables = vec![
            Table::new(1, 1, 2, LocationZone::Indoor),
            Table::new(2, 2, 4, LocationZone::Indoor),
            Table::new(3, 3, 4, LocationZone::Outdoor),
        ];
        let req = request(4).with_preference(SeatingPreference::Outdoor);

        let ranked = rank(&tables, &req);
        assert_eq!(ranked.len(), 2, "2-seat table must be excluded");
        assert!(ranked.iter().all(|r| r.table.id != 1));

        let top = best(&tables, &req).unwrap();
        assert_eq!(top.table.id, 3);
        assert_eq!(top.score, 90.0);
        assert_eq!(ranked[1].table.id, 2);
        assert_eq!(ranked[1].score, 60.0);
    }

    #[test]
    fn test_unavailable_tables_excluded() {
        let tables = vec![
            Table::new(1, 1, 4, LocationZone::Indoor).with_status(TableStatus::Occupied),
            Table::new(2, 2, 4, LocationZone::Indoor).with_status(TableStatus::Maintenance),
            Table::new(3, 3, 4, LocationZone::Indoor).with_status(TableStatus::Reserved),
        ];
        assert!(rank(&tables, &request(2)).is_empty());
    }

    #[test]
    fn test_capacity_fit_penalizes_oversized_tables() {
        let tables = vec![
            Table::new(1, 1, 8, LocationZone::Indoor),
            Table::new(2, 2, 2, LocationZone::Indoor),
            Table::new(3, 3, 4, LocationZone::Indoor),
        ];
        let ranked = rank(&tables, &request(2));
        let ids: Vec<_> = ranked.iter().map(|r| r.table.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);
        assert_eq!(ranked[2].breakdown.capacity_fit, 0.0);
    }

    #[test]
    fn test_ties_broken_by_table_id() {
        let tables = vec![
            Table::new(9, 9, 4, LocationZone::Indoor),
            Table::new(4, 4, 4, LocationZone::Indoor),
            Table::new(6, 6, 4, LocationZone::Indoor),
        ];
        let ids: Vec<_> = rank(&tables, &request(4)).iter().map(|r| r.table.id).collect();
        assert_eq!(ids, vec![4, 6, 9]);
    }

    #[test]
    fn test_occasion_boosts_matching_features() {
        let tables = vec![
            Table::new(1, 1, 2, LocationZone::Indoor),
            Table::new(2, 2, 2, LocationZone::Indoor).with_features(["intimate", "window-view"]),
            Table::new(3, 3, 2, LocationZone::Indoor).with_features(["quiet"]),
        ];
        let req = request(2).with_occasion("Romantic anniversary");
        let ranked = rank(&tables, &req);

        assert_eq!(ranked[0].table.id, 2);
        assert_eq!(ranked[0].breakdown.occasion, 100.0);
        assert_eq!(ranked[1].table.id, 3);
        assert_eq!(ranked[1].breakdown.occasion, 70.0);
        assert_eq!(ranked[2].breakdown.occasion, 0.0);
        assert!(
            ranked[0]
                .reasons
                .iter()
                .any(|r| r.contains("intimate, window-view"))
        );
    }

    #[test]
    fn test_unknown_occasion_is_neutral() {
        let table = Table::new(1, 1, 2, LocationZone::Indoor).with_features(["romantic"]);
        let result = TableScorer::default().score(&table, &request(2).with_occasion("lunch"));
        assert_eq!(result.breakdown.occasion, 50.0);
    }

    #[test]
    fn test_business_rule() {
        let tables = vec![
            Table::new(1, 1, 4, LocationZone::Indoor).with_features(["romantic"]),
            Table::new(2, 2, 4, LocationZone::Indoor).with_features(["business-friendly"]),
        ];
        let top = best(&tables, &request(4).with_occasion("business lunch")).unwrap();
        assert_eq!(top.table.id, 2);
    }

    #[test]
    fn test_location_mismatch_scores_zero() {
        let table = Table::new(1, 1, 2, LocationZone::Bar);
        let req = request(2).with_preference(SeatingPreference::Private);
        let result = TableScorer::default().score(&table, &req);
        assert_eq!(result.breakdown.location, 0.0);
        assert!(!result.reasons.iter().any(|r| r.contains("preference")));
    }

    #[test]
    fn test_reasons_for_perfect_match() {
        let table = Table::new(1, 1, 4, LocationZone::Outdoor);
        let req = request(4).with_preference(SeatingPreference::Outdoor);
        let result = TableScorer::default().score(&table, &req);
        assert_eq!(
            result.reasons,
            vec![
                "Perfect fit for 4 guests".to_string(),
                "Matches outdoor seating preference".to_string(),
                "Efficient use of table size".to_string(),
            ]
        );
    }

    #[test]
    fn test_zero_guest_request_yields_nothing() {
        let tables = vec![Table::new(1, 1, 2, LocationZone::Indoor)];
        assert!(rank(&tables, &request(0)).is_empty());
        assert!(best(&tables, &request(0)).is_none());
    }

    #[test]
    fn test_custom_weights() {
        let weights = ScoringWeights {
            capacity_fit: 0.0,
            location: 1.0,
            occasion: 0.0,
            size_efficiency: 0.0,
        };
        let scorer = TableScorer::new(weights, OccasionRules::default());
        let tables = vec![
            Table::new(1, 1, 2, LocationZone::Indoor),
            Table::new(2, 2, 10, LocationZone::Outdoor),
        ];
        let req = request(2).with_preference(SeatingPreference::Outdoor);
        let top = scorer.best(&tables, &req).unwrap();
        assert_eq!(top.table.id, 2);
        assert_eq!(top.score, 100.0);
    }
}
