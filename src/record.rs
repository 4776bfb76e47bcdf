//! Service record schema and parse-once ingestion.
//!
//! Raw tabular rows arrive as text ([`RawServiceRecord`]); they are
//! validated exactly once into [`ServiceRecord`]s with typed fields and an
//! explicit unknown sentinel ([`RatingValue::Unknown`], `Option::None`)
//! instead of empty-string ambiguity. Filtering and indexing only ever see
//! the validated form.

use geo::Point;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

/// A quality rating code from the fixed assessment scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingCode {
    /// `E` — Excellent (awarded overall only, never per quality area).
    Excellent,
    /// `X` — Exceeding.
    Exceeding,
    /// `M` — Meeting.
    Meeting,
    /// `W` — Working Towards.
    WorkingTowards,
    /// `S` — Significant Improvement Required.
    SignificantImprovement,
}

impl RatingCode {
    /// The declared universe for the overall service rating.
    pub const OVERALL: [Self; 5] = [
        Self::Excellent,
        Self::Exceeding,
        Self::Meeting,
        Self::WorkingTowards,
        Self::SignificantImprovement,
    ];

    /// The declared universe for per-quality-area ratings.
    pub const QUALITY_AREA: [Self; 4] = [
        Self::Exceeding,
        Self::Meeting,
        Self::WorkingTowards,
        Self::SignificantImprovement,
    ];

    /// Parse a single-letter code. Anything outside the overall universe is
    /// `None`.
    pub fn parse(code: &str) -> Option<Self> {
        match code.trim() {
            "E" => Some(Self::Excellent),
            "X" => Some(Self::Exceeding),
            "M" => Some(Self::Meeting),
            "W" => Some(Self::WorkingTowards),
            "S" => Some(Self::SignificantImprovement),
            _ => None,
        }
    }

    /// The single-letter wire code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Excellent => "E",
            Self::Exceeding => "X",
            Self::Meeting => "M",
            Self::WorkingTowards => "W",
            Self::SignificantImprovement => "S",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "Excellent",
            Self::Exceeding => "Exceeding",
            Self::Meeting => "Meeting",
            Self::WorkingTowards => "Working Towards",
            Self::SignificantImprovement => "Significant Improvement Required",
        }
    }
}

/// A rating field value: a known code from its universe, or unknown.
///
/// Unknown covers absent, unparseable, and out-of-universe values alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RatingValue {
    /// A code from the field's declared universe.
    Known(RatingCode),
    /// Absent, unparseable, or outside the universe.
    #[default]
    Unknown,
}

impl RatingValue {
    /// Parse an overall-rating field (universe `{E, X, M, W, S}`).
    pub fn parse_overall(raw: &str) -> Self {
        RatingCode::parse(raw).map_or(Self::Unknown, Self::Known)
    }

    /// Parse a quality-area field (universe `{X, M, W, S}`; `E` is not
    /// awarded per area and reads as unknown).
    pub fn parse_quality_area(raw: &str) -> Self {
        match RatingCode::parse(raw) {
            Some(RatingCode::Excellent) | None => Self::Unknown,
            Some(code) => Self::Known(code),
        }
    }

    /// The known code, if any.
    pub fn known(&self) -> Option<RatingCode> {
        match self {
            Self::Known(code) => Some(*code),
            Self::Unknown => None,
        }
    }

    /// Whether the value is in its universe.
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// The seven assessed quality areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityArea {
    /// QA1 — Educational program and practice.
    EducationalProgram,
    /// QA2 — Children's health and safety.
    HealthAndSafety,
    /// QA3 — Physical environment.
    PhysicalEnvironment,
    /// QA4 — Staffing arrangements.
    Staffing,
    /// QA5 — Relationships with children.
    Relationships,
    /// QA6 — Collaborative partnerships with families and communities.
    Partnerships,
    /// QA7 — Governance and leadership.
    Governance,
}

impl QualityArea {
    /// All areas in assessment order.
    pub const ALL: [Self; 7] = [
        Self::EducationalProgram,
        Self::HealthAndSafety,
        Self::PhysicalEnvironment,
        Self::Staffing,
        Self::Relationships,
        Self::Partnerships,
        Self::Governance,
    ];

    /// Number of quality areas.
    pub const COUNT: usize = Self::ALL.len();

    /// Tabular column key (`qa1`..`qa7`).
    pub fn key(&self) -> &'static str {
        match self {
            Self::EducationalProgram => "qa1",
            Self::HealthAndSafety => "qa2",
            Self::PhysicalEnvironment => "qa3",
            Self::Staffing => "qa4",
            Self::Relationships => "qa5",
            Self::Partnerships => "qa6",
            Self::Governance => "qa7",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EducationalProgram => "Educational program and practice",
            Self::HealthAndSafety => "Children's health and safety",
            Self::PhysicalEnvironment => "Physical environment",
            Self::Staffing => "Staffing arrangements",
            Self::Relationships => "Relationships with children",
            Self::Partnerships => "Collaborative partnerships with families and communities",
            Self::Governance => "Governance and leadership",
        }
    }

    /// Position in [`Self::ALL`].
    pub fn index(&self) -> usize {
        *self as usize
    }
}

/// A wall-clock time of day, minutes since midnight.
///
/// Parses the tabular `HH:MM` form; `24:00` is accepted as end-of-day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClockTime(u16);

impl ClockTime {
    /// Midnight.
    pub const MIDNIGHT: Self = Self(0);
    /// End of day (`24:00`).
    pub const END_OF_DAY: Self = Self(24 * 60);

    /// Build from hours and minutes. Returns `None` out of range.
    pub fn from_hm(hours: u16, minutes: u16) -> Option<Self> {
        if minutes >= 60 || hours > 24 || (hours == 24 && minutes != 0) {
            return None;
        }
        Some(Self(hours * 60 + minutes))
    }

    /// Parse an `HH:MM` string. Anything malformed or out of range is
    /// `None` (an unknown value, not an error).
    pub fn parse(raw: &str) -> Option<Self> {
        let (h, m) = raw.trim().split_once(':')?;
        let hours: u16 = h.parse().ok()?;
        let minutes: u16 = m.parse().ok()?;
        Self::from_hm(hours, minutes)
    }

    /// Minutes since midnight.
    pub fn minutes(&self) -> u16 {
        self.0
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// A raw tabular row as produced by the external ingestion step.
///
/// Every field is text; missing columns default to empty. Parsing happens
/// once, in [`ServiceRecord::from_raw`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawServiceRecord {
    /// Service name, carried opaquely.
    #[serde(default)]
    pub name: String,
    /// Street address, carried opaquely.
    #[serde(default)]
    pub address: String,
    /// Latitude in decimal degrees, possibly empty or unparseable.
    #[serde(default)]
    pub latitude: String,
    /// Longitude in decimal degrees, possibly empty or unparseable.
    #[serde(default)]
    pub longitude: String,
    /// Overall rating code.
    #[serde(default)]
    pub rating: String,
    /// Semicolon-delimited service-type codes.
    #[serde(default, rename = "type")]
    pub service_type: String,
    /// Approved capacity (number of places).
    #[serde(default)]
    pub places: String,
    /// Opening time, `HH:MM`.
    #[serde(default)]
    pub start_time: String,
    /// Closing time, `HH:MM`.
    #[serde(default)]
    pub end_time: String,
    /// QA1 rating code.
    #[serde(default)]
    pub qa1: String,
    /// QA2 rating code.
    #[serde(default)]
    pub qa2: String,
    /// QA3 rating code.
    #[serde(default)]
    pub qa3: String,
    /// QA4 rating code.
    #[serde(default)]
    pub qa4: String,
    /// QA5 rating code.
    #[serde(default)]
    pub qa5: String,
    /// QA6 rating code.
    #[serde(default)]
    pub qa6: String,
    /// QA7 rating code.
    #[serde(default)]
    pub qa7: String,
    /// Free-text regulatory conditions.
    #[serde(default)]
    pub conditions: String,
}

/// A validated service record with typed fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    /// Service name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Parsed position; `None` when either coordinate was missing or
    /// non-finite.
    pub position: Option<Point<f64>>,
    /// Overall rating.
    pub rating: RatingValue,
    /// Service-type codes, open universe, deduplicated order preserved.
    pub types: SmallVec<[String; 4]>,
    /// Approved capacity.
    pub places: Option<u32>,
    /// Opening time.
    pub open: Option<ClockTime>,
    /// Closing time.
    pub close: Option<ClockTime>,
    /// Per-quality-area ratings, indexed by [`QualityArea::index`].
    pub quality: [RatingValue; QualityArea::COUNT],
    /// Free-text regulatory conditions.
    pub conditions: String,
}

fn parse_coordinate(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    value.is_finite().then_some(value)
}

impl ServiceRecord {
    /// Parse and validate a raw row. Infallible: malformed fields become
    /// unknowns rather than errors.
    pub fn from_raw(raw: &RawServiceRecord) -> Self {
        let position = match (
            parse_coordinate(&raw.longitude),
            parse_coordinate(&raw.latitude),
        ) {
            (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
            _ => None,
        };

        let types = raw
            .service_type
            .split(';')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_owned)
            .collect();

        let quality_raw = [
            &raw.qa1, &raw.qa2, &raw.qa3, &raw.qa4, &raw.qa5, &raw.qa6, &raw.qa7,
        ];
        let quality = quality_raw.map(|q| RatingValue::parse_quality_area(q));

        Self {
            name: raw.name.clone(),
            address: raw.address.clone(),
            position,
            rating: RatingValue::parse_overall(&raw.rating),
            types,
            places: raw.places.trim().parse().ok(),
            open: ClockTime::parse(&raw.start_time),
            close: ClockTime::parse(&raw.end_time),
            quality,
            conditions: raw.conditions.clone(),
        }
    }

    /// Rating for one quality area.
    pub fn quality_rating(&self, area: QualityArea) -> RatingValue {
        self.quality[area.index()]
    }

    /// Whether regulatory conditions are present (non-empty after trim).
    pub fn has_conditions(&self) -> bool {
        !self.conditions.trim().is_empty()
    }
}

/// Min/max bounds observed in a dataset, for driving range controls.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DataRanges {
    /// Smallest and largest known capacity.
    pub places: Option<(u32, u32)>,
    /// Earliest known opening and latest known closing time.
    pub hours: Option<(ClockTime, ClockTime)>,
}

impl DataRanges {
    /// Scan a dataset, skipping unknown fields.
    pub fn from_records(records: &[ServiceRecord]) -> Self {
        let mut places: Option<(u32, u32)> = None;
        let mut open: Option<ClockTime> = None;
        let mut close: Option<ClockTime> = None;

        for record in records {
            if let Some(p) = record.places {
                places = Some(match places {
                    Some((min, max)) => (min.min(p), max.max(p)),
                    None => (p, p),
                });
            }
            if let Some(o) = record.open {
                open = Some(open.map_or(o, |cur| cur.min(o)));
            }
            if let Some(c) = record.close {
                close = Some(close.map_or(c, |cur| cur.max(c)));
            }
        }

        Self {
            places,
            hours: match (open, close) {
                (Some(o), Some(c)) => Some((o, c)),
                _ => None,
            },
        }
    }
}
