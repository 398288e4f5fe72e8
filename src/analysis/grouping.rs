//! Period bucketing (hour/day/week/month) and per-bucket aggregates.

use chrono::{Datelike, NaiveDate};
use sea_orm::FromQueryResult;
use serde::Serialize;
use std::collections::BTreeMap;
use utoipa::ToSchema;

use super::{ParamError, round2};

/// One non-null value of one metric, with its calendar position.
#[derive(Debug, Clone, PartialEq, FromQueryResult)]
pub struct Observation {
    pub year: i32,
    pub month: i32,
    pub day: i32,
    pub time: String,
    pub value: f64,
}

impl Observation {
    #[must_use]
    pub fn new(year: i32, month: i32, day: i32, time: impl Into<String>, value: f64) -> Self {
        Self {
            year,
            month,
            day,
            time: time.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Hour,
    Day,
    Week,
    Month,
}

impl GroupBy {
    /// # Errors
    ///
    /// Returns a [`ParamError`] on `group_by` for anything but hour/day/week/month.
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hour" | "hourly" => Ok(Self::Hour),
            "day" | "daily" => Ok(Self::Day),
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            other => Err(ParamError::new(
                "group_by",
                format!("'{other}' must be one of hour, day, week, month"),
            )),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

/// How month buckets are labelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MonthFormat {
    /// `2024-03`
    #[default]
    Numeric,
    /// `2024-Mar`
    Abbr,
}

impl MonthFormat {
    /// # Errors
    ///
    /// Returns a [`ParamError`] on `month_format` for unknown values.
    pub fn parse(raw: &str) -> Result<Self, ParamError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "numeric" | "number" => Ok(Self::Numeric),
            "abbr" | "name" | "short" => Ok(Self::Abbr),
            other => Err(ParamError::new(
                "month_format",
                format!("'{other}' must be numeric or abbr"),
            )),
        }
    }
}

const MONTH_ABBR: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[must_use]
pub fn month_abbr(month: i32) -> Option<&'static str> {
    usize::try_from(month - 1).ok().and_then(|i| MONTH_ABBR.get(i)).copied()
}

#[must_use]
pub fn month_name(month: i32) -> Option<&'static str> {
    usize::try_from(month - 1).ok().and_then(|i| MONTH_NAMES.get(i)).copied()
}

/// Hour of day from the first two characters of a `Time` string such as `14:30:00`.
#[must_use]
pub fn parse_hour(time: &str) -> Option<u32> {
    time.get(..2)?.parse::<u32>().ok().filter(|h| *h < 24)
}

/// Bucket identity. Keys of one grouping share a variant, so the derived
/// ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PeriodKey {
    Hour { year: i32, month: i32, day: i32, hour: u32 },
    Day { year: i32, month: i32, day: i32 },
    /// ISO-8601 week-numbering year and week.
    Week { year: i32, week: u32 },
    Month { year: i32, month: i32 },
}

fn iso_week(year: i32, month: i32, day: i32) -> Option<PeriodKey> {
    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;
    let week = date.iso_week();
    Some(PeriodKey::Week {
        year: week.year(),
        week: week.week(),
    })
}

impl PeriodKey {
    /// Bucket for `obs`, or `None` when the record cannot be placed (bad hour, invalid date for week).
    #[must_use]
    pub fn of(group_by: GroupBy, obs: &Observation) -> Option<Self> {
        let (year, month, day) = (obs.year, obs.month, obs.day);
        match group_by {
            GroupBy::Hour => parse_hour(&obs.time).map(|hour| Self::Hour {
                year,
                month,
                day,
                hour,
            }),
            GroupBy::Day => Some(Self::Day { year, month, day }),
            GroupBy::Week => iso_week(year, month, day),
            GroupBy::Month => Some(Self::Month { year, month }),
        }
    }

    /// Maps a finer key onto a coarser grouping. Returns `None` when `target` is finer.
    #[must_use]
    pub fn coarsen(self, target: GroupBy) -> Option<Self> {
        let (year, month, day) = match self {
            Self::Hour {
                year, month, day, ..
            }
            | Self::Day { year, month, day } => (year, month, day),
            Self::Week { .. } => {
                return matches!(target, GroupBy::Week).then_some(self);
            }
            Self::Month { .. } => {
                return matches!(target, GroupBy::Month).then_some(self);
            }
        };
        match (self, target) {
            (Self::Hour { .. }, GroupBy::Hour) => Some(self),
            (_, GroupBy::Hour) => None,
            (_, GroupBy::Day) => Some(Self::Day { year, month, day }),
            (_, GroupBy::Week) => iso_week(year, month, day),
            (_, GroupBy::Month) => Some(Self::Month { year, month }),
        }
    }

    #[must_use]
    pub fn label(&self, month_format: MonthFormat) -> String {
        match *self {
            Self::Hour {
                year,
                month,
                day,
                hour,
            } => format!("{year:04}-{month:02}-{day:02} {hour:02}:00"),
            Self::Day { year, month, day } => format!("{year:04}-{month:02}-{day:02}"),
            Self::Week { year, week } => format!("{year:04}-W{week:02}"),
            Self::Month { year, month } => match (month_format, month_abbr(month)) {
                (MonthFormat::Abbr, Some(abbr)) => format!("{year:04}-{abbr}"),
                _ => format!("{year:04}-{month:02}"),
            },
        }
    }
}

/// Running count/sum/min/max/sum-of-squares. Mergeable, so finer buckets roll up exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub sum_sq: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            sum_sq: 0.0,
        }
    }
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn merge(&mut self, other: &Self) {
        self.count += other.count;
        self.sum += other.sum;
        self.sum_sq += other.sum_sq;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    /// Population standard deviation.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn std_dev(&self) -> Option<f64> {
        let mean = self.mean()?;
        let variance = (self.sum_sq / self.count as f64 - mean * mean).max(0.0);
        Some(variance.sqrt())
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Self::default();
        for v in iter {
            acc.push(v);
        }
        acc
    }
}

/// Buckets `observations`, skipping non-finite values and records that have no bucket.
#[must_use]
pub fn group(observations: &[Observation], group_by: GroupBy) -> BTreeMap<PeriodKey, Accumulator> {
    let mut buckets: BTreeMap<PeriodKey, Accumulator> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.value.is_finite()) {
        if let Some(key) = PeriodKey::of(group_by, obs) {
            buckets.entry(key).or_default().push(obs.value);
        }
    }
    buckets
}

/// Raw values per bucket, for statistics that need the full distribution.
#[must_use]
pub fn group_values(observations: &[Observation], group_by: GroupBy) -> BTreeMap<PeriodKey, Vec<f64>> {
    let mut buckets: BTreeMap<PeriodKey, Vec<f64>> = BTreeMap::new();
    for obs in observations.iter().filter(|o| o.value.is_finite()) {
        if let Some(key) = PeriodKey::of(group_by, obs) {
            buckets.entry(key).or_default().push(obs.value);
        }
    }
    buckets
}

/// Re-aggregates finer buckets into `target` by merging accumulators.
#[must_use]
pub fn roll_up(
    buckets: &BTreeMap<PeriodKey, Accumulator>,
    target: GroupBy,
) -> BTreeMap<PeriodKey, Accumulator> {
    let mut out: BTreeMap<PeriodKey, Accumulator> = BTreeMap::new();
    for (key, acc) in buckets {
        if let Some(coarse) = key.coarsen(target) {
            out.entry(coarse).or_default().merge(acc);
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PeriodSummary {
    pub period: String,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
    /// Present only for accumulating metrics such as rainfall.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<f64>,
}

/// Chronological, 2-decimal summaries of each non-empty bucket.
#[must_use]
pub fn summarize(
    buckets: &BTreeMap<PeriodKey, Accumulator>,
    month_format: MonthFormat,
    include_sum: bool,
) -> Vec<PeriodSummary> {
    buckets
        .iter()
        .filter(|(_, acc)| !acc.is_empty())
        .map(|(key, acc)| PeriodSummary {
            period: key.label(month_format),
            avg: round2(acc.mean().unwrap_or_default()),
            min: round2(acc.min),
            max: round2(acc.max),
            count: acc.count,
            sum: include_sum.then(|| round2(acc.sum)),
        })
        .collect()
}

/// Groups and summarizes in one step.
#[must_use]
pub fn aggregate(
    observations: &[Observation],
    group_by: GroupBy,
    month_format: MonthFormat,
    include_sum: bool,
) -> Vec<PeriodSummary> {
    summarize(&group(observations, group_by), month_format, include_sum)
}
