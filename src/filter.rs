//! Compound criteria evaluation over service records.
//!
//! Every field predicate is evaluated independently and the record passes
//! only when all active predicates agree. Unknown values (absent,
//! unparseable, or outside a field's declared universe) never raise; each
//! field carries its own include-unknown switch. Selecting an empty option
//! set deliberately matches nothing — "show nothing" is a valid request
//! and is never reinterpreted as "show all".

use crate::record::{ClockTime, QualityArea, RatingCode, RatingValue, ServiceRecord};
use crate::types::Config;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

/// Selected options for a single-valued categorical field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CategorySelection {
    /// Codes from the field's universe that should pass.
    pub selected: FxHashSet<RatingCode>,
    /// Whether unknown values pass. Equivalent to selecting the explicit
    /// unknown marker in the option list.
    pub include_unknown: bool,
}

impl CategorySelection {
    /// Select every overall-rating code plus unknown.
    pub fn all_overall() -> Self {
        Self {
            selected: RatingCode::OVERALL.into_iter().collect(),
            include_unknown: true,
        }
    }

    /// Select every quality-area code plus unknown.
    pub fn all_quality() -> Self {
        Self {
            selected: RatingCode::QUALITY_AREA.into_iter().collect(),
            include_unknown: true,
        }
    }

    /// Select specific codes, without unknown.
    pub fn of(codes: impl IntoIterator<Item = RatingCode>) -> Self {
        Self {
            selected: codes.into_iter().collect(),
            include_unknown: false,
        }
    }

    /// Also admit unknown values.
    pub fn with_unknown(mut self) -> Self {
        self.include_unknown = true;
        self
    }

    fn admits(&self, value: RatingValue) -> bool {
        match value {
            RatingValue::Known(code) => self.selected.contains(&code),
            RatingValue::Unknown => self.include_unknown,
        }
    }
}

/// Selected options for the multi-valued service-type field.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TypeSelection {
    /// Type codes that should pass; a record needs at least one of them.
    pub selected: FxHashSet<String>,
    /// Whether records with no type codes at all pass.
    pub include_unknown: bool,
}

impl TypeSelection {
    /// Select specific type codes, without unknown.
    pub fn of<S: Into<String>>(codes: impl IntoIterator<Item = S>) -> Self {
        Self {
            selected: codes.into_iter().map(Into::into).collect(),
            include_unknown: false,
        }
    }

    /// Also admit records with no type codes.
    pub fn with_unknown(mut self) -> Self {
        self.include_unknown = true;
        self
    }

    fn admits(&self, types: &[String]) -> bool {
        if types.is_empty() {
            return self.include_unknown;
        }
        types.iter().any(|t| self.selected.contains(t))
    }
}

/// Inclusive numeric range for the approved-capacity field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityRange {
    /// Smallest capacity that passes.
    pub min: u32,
    /// Largest capacity that passes.
    pub max: u32,
}

impl Default for CapacityRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: u32::MAX,
        }
    }
}

/// Requested time-of-day window for the opening-hours field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Start of the window.
    pub min: ClockTime,
    /// End of the window.
    pub max: ClockTime,
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            min: ClockTime::MIDNIGHT,
            max: ClockTime::END_OF_DAY,
        }
    }
}

/// Tri-state filter on the free-text regulatory-conditions field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionsFilter {
    /// Field is bypassed.
    #[default]
    Either,
    /// Conditions text must be present (non-empty after trim).
    Present,
    /// Conditions text must be absent.
    Absent,
}

/// The full compound filter. Caller-owned, transient, re-evaluated on
/// every change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Overall-rating selection.
    pub overall_rating: CategorySelection,
    /// Service-type selection.
    pub service_types: TypeSelection,
    /// Per-quality-area selections, indexed by [`QualityArea::index`].
    pub quality_areas: [CategorySelection; QualityArea::COUNT],
    /// Approved-capacity window.
    pub capacity: CapacityRange,
    /// Whether records with unknown capacity pass.
    pub include_unknown_capacity: bool,
    /// Requested open-hours window; only consulted when
    /// [`filter_by_hours`](Self::filter_by_hours) is on.
    pub hours: TimeRange,
    /// Master toggle for the hours field; when off the field is bypassed
    /// regardless of its other flags.
    pub filter_by_hours: bool,
    /// Whether records with unknown hours pass (only while the toggle is
    /// on).
    pub include_unknown_hours: bool,
    /// Regulatory-conditions tri-state.
    pub conditions: ConditionsFilter,
}

impl FilterCriteria {
    /// Criteria that admit every record: all codes and unknowns selected,
    /// wide-open ranges, hours bypassed, conditions `Either`.
    pub fn accept_all() -> Self {
        Self {
            overall_rating: CategorySelection::all_overall(),
            service_types: TypeSelection {
                selected: FxHashSet::default(),
                include_unknown: true,
            },
            quality_areas: std::array::from_fn(|_| CategorySelection::all_quality()),
            capacity: CapacityRange::default(),
            include_unknown_capacity: true,
            hours: TimeRange::default(),
            filter_by_hours: false,
            include_unknown_hours: true,
            conditions: ConditionsFilter::Either,
        }
    }

    /// `accept_all` with the given service-type universe selected, so that
    /// typed records pass too.
    pub fn accept_all_with_types<S: Into<String>>(types: impl IntoIterator<Item = S>) -> Self {
        Self {
            service_types: TypeSelection::of(types).with_unknown(),
            ..Self::accept_all()
        }
    }
}

impl Default for FilterCriteria {
    fn default() -> Self {
        Self::accept_all()
    }
}

/// Evaluates [`FilterCriteria`] over record sets.
#[derive(Debug, Clone)]
pub struct FilterEngine {
    max_candidates: usize,
}

impl FilterEngine {
    /// Create an engine from configuration (candidate cap).
    pub fn new(config: &Config) -> Self {
        Self {
            max_candidates: config.max_candidates,
        }
    }

    /// Whether a single record satisfies every active predicate.
    pub fn matches(record: &ServiceRecord, criteria: &FilterCriteria) -> bool {
        if !criteria.overall_rating.admits(record.rating) {
            return false;
        }

        if !criteria.service_types.admits(&record.types) {
            return false;
        }

        match record.places {
            Some(places) => {
                if places < criteria.capacity.min || places > criteria.capacity.max {
                    return false;
                }
            }
            None => {
                if !criteria.include_unknown_capacity {
                    return false;
                }
            }
        }

        if criteria.filter_by_hours {
            match (record.open, record.close) {
                // Full containment of the requested window, not overlap.
                (Some(open), Some(close)) => {
                    if open > criteria.hours.min || close < criteria.hours.max {
                        return false;
                    }
                }
                _ => {
                    if !criteria.include_unknown_hours {
                        return false;
                    }
                }
            }
        }

        for (area, selection) in QualityArea::ALL.iter().zip(&criteria.quality_areas) {
            if !selection.admits(record.quality_rating(*area)) {
                return false;
            }
        }

        match criteria.conditions {
            ConditionsFilter::Either => {}
            ConditionsFilter::Present => {
                if !record.has_conditions() {
                    return false;
                }
            }
            ConditionsFilter::Absent => {
                if record.has_conditions() {
                    return false;
                }
            }
        }

        true
    }

    /// Indices of the records satisfying the criteria, in dataset order.
    pub fn evaluate(&self, records: &[ServiceRecord], criteria: &FilterCriteria) -> Vec<u32> {
        records
            .iter()
            .enumerate()
            .filter(|(_, record)| Self::matches(record, criteria))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// Evaluate over a candidate id list (typically from a spatial-index
    /// viewport query), preserving candidate order.
    ///
    /// Work is bounded: at most the configured candidate cap is processed,
    /// and a pathologically large list is truncated with a warning —
    /// completeness is traded for responsiveness only in that extreme.
    /// Candidate ids outside the dataset are skipped.
    pub fn evaluate_candidates(
        &self,
        records: &[ServiceRecord],
        candidates: &[u32],
        criteria: &FilterCriteria,
    ) -> Vec<u32> {
        let capped = if candidates.len() > self.max_candidates {
            log::warn!(
                "Truncating candidate list from {} to {} records",
                candidates.len(),
                self.max_candidates
            );
            &candidates[..self.max_candidates]
        } else {
            candidates
        };

        capped
            .iter()
            .copied()
            .filter(|&id| {
                records
                    .get(id as usize)
                    .is_some_and(|record| Self::matches(record, criteria))
            })
            .collect()
    }
}
