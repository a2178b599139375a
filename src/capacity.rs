//! Capacity-constrained package selection for building deliveries and
//! warehouse transfers.
//!
//! Pure computation over in-memory lists; persistence of the selected
//! packages is the shipment services' job. Candidates arrive already
//! sorted by the caller's priority key (deliveries: ascending expected
//! delivery date; transfers: ascending tracking number), and that order
//! is what makes the greedy pass deterministic.

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

/// A package as the selector sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub id: Uuid,
    pub weight_kg: Decimal,
}

/// Manual-mode report: the toggled set's total against the vehicle
/// capacity. Over-selection is flagged, never prevented.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct LoadSummary {
    pub total_weight_kg: Decimal,
    /// None when no vehicle is selected.
    pub capacity_kg: Option<Decimal>,
    /// None when capacity is unknown ("N/A" in the portal).
    pub exceeded: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoSelection {
    /// Ids of the selected packages, in input order.
    pub selected: Vec<Uuid>,
    pub total_weight_kg: Decimal,
    /// Candidates passed over because they would have overflowed.
    pub skipped: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no packages to choose from")]
    NoCandidates,

    #[error("no packages could be auto-selected")]
    NothingFits,
}

/// Computes the manual-selection load report.
pub fn summarize(weights: &[Decimal], capacity_kg: Option<Decimal>) -> LoadSummary {
    let total: Decimal = weights.iter().copied().sum();
    LoadSummary {
        total_weight_kg: total,
        capacity_kg,
        exceeded: capacity_kg.map(|cap| total > cap),
    }
}

/// Single-pass greedy auto-select. Scans the candidates once in order,
/// including a package iff the running total plus its weight stays
/// within capacity; overflowing candidates are skipped and never
/// reconsidered, while later candidates are still examined. Not optimal
/// by utilized weight, deliberately simple, order-dependent.
pub fn auto_select(
    candidates: &[Candidate],
    capacity_kg: Decimal,
) -> Result<AutoSelection, SelectionError> {
    if candidates.is_empty() {
        return Err(SelectionError::NoCandidates);
    }

    let mut selected = Vec::new();
    let mut total = Decimal::ZERO;
    let mut skipped = 0usize;

    for candidate in candidates {
        if total + candidate.weight_kg <= capacity_kg {
            total += candidate.weight_kg;
            selected.push(candidate.id);
        } else {
            skipped += 1;
        }
    }

    if selected.is_empty() {
        return Err(SelectionError::NothingFits);
    }

    Ok(AutoSelection {
        selected,
        total_weight_kg: total,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn candidates(weights: &[i64]) -> Vec<Candidate> {
        weights
            .iter()
            .map(|w| Candidate {
                id: Uuid::new_v4(),
                weight_kg: Decimal::from(*w),
            })
            .collect()
    }

    #[test]
    fn eight_fifties_at_120_selects_first_two() {
        let pool = candidates(&[50, 50, 50, 50, 50, 50, 50, 50]);
        let picked = auto_select(&pool, dec!(120)).unwrap();

        assert_eq!(picked.selected, vec![pool[0].id, pool[1].id]);
        assert_eq!(picked.total_weight_kg, dec!(100));
        assert_eq!(picked.skipped, 6);
    }

    #[test]
    fn skipping_does_not_stop_the_scan() {
        let pool = candidates(&[60, 80, 50]);
        let picked = auto_select(&pool, dec!(120)).unwrap();

        // 80 overflows (140) and is skipped; 50 still fits (110)
        assert_eq!(picked.selected, vec![pool[0].id, pool[2].id]);
        assert_eq!(picked.total_weight_kg, dec!(110));
        assert_eq!(picked.skipped, 1);
    }

    #[test]
    fn selection_is_order_dependent() {
        let heavy_first = candidates(&[100, 30]);
        let picked = auto_select(&heavy_first, dec!(110)).unwrap();
        assert_eq!(picked.selected, vec![heavy_first[0].id]);

        let light_first = candidates(&[30, 100]);
        let picked = auto_select(&light_first, dec!(110)).unwrap();
        assert_eq!(picked.selected, vec![light_first[0].id]);
        assert_eq!(picked.total_weight_kg, dec!(30));
    }

    #[test]
    fn empty_pool_is_a_no_op() {
        assert_eq!(
            auto_select(&[], dec!(500)).unwrap_err(),
            SelectionError::NoCandidates
        );
    }

    #[test]
    fn too_small_capacity_fails() {
        let pool = candidates(&[40, 55]);
        assert_eq!(
            auto_select(&pool, dec!(30)).unwrap_err(),
            SelectionError::NothingFits
        );
        assert_eq!(
            auto_select(&pool, Decimal::ZERO).unwrap_err(),
            SelectionError::NothingFits
        );
    }

    #[test]
    fn summary_flags_overflow_and_recovers() {
        let report = summarize(&[dec!(70), dec!(60)], Some(dec!(100)));
        assert_eq!(report.total_weight_kg, dec!(130));
        assert_eq!(report.exceeded, Some(true));

        // Deselecting enough weight clears the flag
        let report = summarize(&[dec!(70)], Some(dec!(100)));
        assert_eq!(report.exceeded, Some(false));
    }

    #[test]
    fn summary_without_vehicle_reports_unknown() {
        let report = summarize(&[dec!(70), dec!(60)], None);
        assert_eq!(report.total_weight_kg, dec!(130));
        assert_eq!(report.capacity_kg, None);
        assert_eq!(report.exceeded, None);
    }

    proptest! {
        #[test]
        fn greedy_never_exceeds_capacity(
            weights in prop::collection::vec(0u32..=500, 1..40),
            capacity in 0u32..=2000,
        ) {
            let pool: Vec<Candidate> = weights
                .iter()
                .map(|w| Candidate { id: Uuid::new_v4(), weight_kg: Decimal::from(*w) })
                .collect();
            let capacity = Decimal::from(capacity);

            match auto_select(&pool, capacity) {
                Ok(picked) => {
                    prop_assert!(picked.total_weight_kg <= capacity);
                    prop_assert_eq!(picked.selected.len() + picked.skipped, pool.len());

                    // Deterministic: same input, same output
                    let again = auto_select(&pool, capacity).unwrap();
                    prop_assert_eq!(picked, again);
                }
                Err(SelectionError::NothingFits) => {
                    // Only possible when even the lightest candidate overflows
                    let lightest = pool.iter().map(|c| c.weight_kg).min().unwrap();
                    prop_assert!(lightest > capacity);
                }
                Err(SelectionError::NoCandidates) => {
                    prop_assert!(pool.is_empty());
                }
            }
        }
    }
}
