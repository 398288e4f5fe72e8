//! Time-window filter over the separate `Year`, `Month` and `Day` columns.
//!
//! The sensor table has no comparable date column, so an inclusive lower bound
//! `d0` becomes `Year > y OR (Year = y AND Month > m) OR (Year = y AND Month = m AND Day >= d)`
//! and the upper bound mirrors it with `<`, `<`, `<=`.

use chrono::{Datelike, NaiveDate};
use sea_orm::{ColumnTrait, Condition};
use serde::Serialize;
use utoipa::ToSchema;

use super::ParamError;
use crate::entity::environmental_data::Column;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    /// Set when no filter was given and the latest year was substituted.
    pub defaulted: bool,
}

/// Echo of the filters a response was computed with.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FiltersApplied {
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    /// `latest_year` when no filter was supplied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_window: Option<&'static str>,
}

/// Strict `YYYY-MM-DD` with calendar validation.
///
/// # Errors
///
/// Returns a [`ParamError`] naming `param` when the value is malformed or not a real date.
pub fn parse_date(param: &'static str, raw: &str) -> Result<NaiveDate, ParamError> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    let shaped = bytes.len() == 10
        && bytes[4] == b'-'
        && bytes[7] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
    if !shaped {
        return Err(ParamError::new(param, format!("'{raw}' is not in YYYY-MM-DD format")));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ParamError::new(param, format!("'{raw}' is not a valid calendar date")))
}

/// Calendar parts bound as the `INTEGER` column type.
fn int(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

impl TimeWindow {
    /// Parses the four window parameters. Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamError`] for a non-numeric year, a month outside 1-12,
    /// malformed dates, or a start date after the end date.
    pub fn parse(
        year: Option<&str>,
        month: Option<&str>,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, ParamError> {
        let year = non_empty(year)
            .map(|raw| {
                raw.parse::<i32>()
                    .map_err(|_| ParamError::new("year", format!("'{raw}' is not an integer")))
            })
            .transpose()?;

        let month = non_empty(month)
            .map(|raw| match raw.parse::<u32>() {
                Ok(m) if (1..=12).contains(&m) => Ok(m),
                _ => Err(ParamError::new("month", format!("'{raw}' must be between 1 and 12"))),
            })
            .transpose()?;

        let start = non_empty(start_date)
            .map(|raw| parse_date("start_date", raw))
            .transpose()?;
        let end = non_empty(end_date)
            .map(|raw| parse_date("end_date", raw))
            .transpose()?;

        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return Err(ParamError::new("end_date", "must not be before start_date"));
        }

        Ok(Self {
            year,
            month,
            start,
            end,
            defaulted: false,
        })
    }

    #[must_use]
    pub fn is_unfiltered(&self) -> bool {
        self.year.is_none() && self.month.is_none() && self.start.is_none() && self.end.is_none()
    }

    /// Substitutes `latest_year` when no filter was supplied. An empty table leaves the window open.
    #[must_use]
    pub fn resolve(self, latest_year: Option<i32>) -> Self {
        match latest_year {
            Some(year) if self.is_unfiltered() => Self {
                year: Some(year),
                defaulted: true,
                ..self
            },
            _ => self,
        }
    }

    /// Query condition selecting the records inside this window.
    #[must_use]
    pub fn condition(&self) -> Condition {
        let mut cond = Condition::all();
        if let Some(year) = self.year {
            cond = cond.add(Column::Year.eq(year));
        }
        if let Some(month) = self.month {
            cond = cond.add(Column::Month.eq(int(month)));
        }
        if let Some(start) = self.start {
            let (y, m, d) = (start.year(), int(start.month()), int(start.day()));
            cond = cond.add(
                Condition::any()
                    .add(Column::Year.gt(y))
                    .add(Condition::all().add(Column::Year.eq(y)).add(Column::Month.gt(m)))
                    .add(
                        Condition::all()
                            .add(Column::Year.eq(y))
                            .add(Column::Month.eq(m))
                            .add(Column::Day.gte(d)),
                    ),
            );
        }
        if let Some(end) = self.end {
            let (y, m, d) = (end.year(), int(end.month()), int(end.day()));
            cond = cond.add(
                Condition::any()
                    .add(Column::Year.lt(y))
                    .add(Condition::all().add(Column::Year.eq(y)).add(Column::Month.lt(m)))
                    .add(
                        Condition::all()
                            .add(Column::Year.eq(y))
                            .add(Column::Month.eq(m))
                            .add(Column::Day.lte(d)),
                    ),
            );
        }
        cond
    }

    /// In-memory equivalent of [`Self::condition`].
    #[must_use]
    pub fn matches(&self, year: i32, month: i32, day: i32) -> bool {
        if self.year.is_some_and(|y| y != year) {
            return false;
        }
        if self.month.is_some_and(|m| i64::from(m) != i64::from(month)) {
            return false;
        }
        let key = (i64::from(year), i64::from(month), i64::from(day));
        let triple = |date: NaiveDate| {
            (
                i64::from(date.year()),
                i64::from(date.month()),
                i64::from(date.day()),
            )
        };
        if self.start.is_some_and(|s| key < triple(s)) {
            return false;
        }
        if self.end.is_some_and(|e| key > triple(e)) {
            return false;
        }
        true
    }

    /// Whether every record this window selects lies strictly before `today`.
    #[must_use]
    pub fn is_closed(&self, today: NaiveDate) -> bool {
        let end_passed = self.end.is_some_and(|e| e < today);
        let year_passed = self.year.is_some_and(|y| y < today.year());
        end_passed || year_passed
    }

    /// Stable string parts for cache keys.
    #[must_use]
    pub fn cache_components(&self) -> [String; 4] {
        [
            self.year.map(|v| v.to_string()).unwrap_or_default(),
            self.month.map(|v| v.to_string()).unwrap_or_default(),
            self.start.map(|v| v.to_string()).unwrap_or_default(),
            self.end.map(|v| v.to_string()).unwrap_or_default(),
        ]
    }

    #[must_use]
    pub fn filters_applied(&self) -> FiltersApplied {
        FiltersApplied {
            year: self.year,
            month: self.month,
            start_date: self.start.map(|d| d.format("%Y-%m-%d").to_string()),
            end_date: self.end.map(|d| d.format("%Y-%m-%d").to_string()),
            default_window: self.defaulted.then_some("latest_year"),
        }
    }
}
