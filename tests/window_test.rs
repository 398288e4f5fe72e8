//! Time-window parsing, predicate construction and in-memory matching.
//!
//! Run with: cargo test --test window_test

use chrono::NaiveDate;
use farm_data_api::analysis::window::{TimeWindow, parse_date};
use farm_data_api::entity::environmental_data::Entity as EnvironmentalData;
use farm_data_api::services::series::{chronological, newest_first};
use sea_orm::sea_query::{PostgresQueryBuilder, QueryStatementWriter};
use sea_orm::{EntityTrait, QueryFilter, QueryTrait};

fn window(start: Option<&str>, end: Option<&str>) -> TimeWindow {
    TimeWindow::parse(None, None, start, end).unwrap()
}

fn sql(window: &TimeWindow) -> String {
    EnvironmentalData::find()
        .filter(window.condition())
        .into_query()
        .to_string(PostgresQueryBuilder)
}

#[test]
fn june_record_inside_june_range() {
    let june = window(Some("2023-06-01"), Some("2023-06-30"));
    assert!(june.matches(2023, 6, 15));

    let before_15th = window(Some("2023-06-01"), Some("2023-06-14"));
    assert!(!before_15th.matches(2023, 6, 15));
    assert!(before_15th.matches(2023, 6, 14));
}

#[test]
fn bounds_compare_year_month_day_lexicographically() {
    let w = window(Some("2022-11-20"), Some("2023-02-05"));
    assert!(w.matches(2022, 11, 20));
    assert!(w.matches(2022, 12, 1));
    assert!(w.matches(2023, 1, 31));
    assert!(w.matches(2023, 2, 5));
    assert!(!w.matches(2022, 11, 19));
    assert!(!w.matches(2023, 2, 6));
    assert!(!w.matches(2021, 12, 31));
}

#[test]
fn start_bound_is_a_disjunction_over_split_columns() {
    let query = sql(&window(Some("2023-06-01"), None));
    assert!(query.contains(r#""Year" > 2023"#), "{query}");
    assert!(query.contains(r#""Month" > 6"#), "{query}");
    assert!(query.contains(r#""Day" >= 1"#), "{query}");
    assert!(query.contains(" OR "), "{query}");
}

#[test]
fn end_bound_mirrors_start_bound() {
    let query = sql(&window(None, Some("2023-06-14")));
    assert!(query.contains(r#""Year" < 2023"#), "{query}");
    assert!(query.contains(r#""Month" < 6"#), "{query}");
    assert!(query.contains(r#""Day" <= 14"#), "{query}");
}

#[test]
fn year_and_month_are_equality_filters() {
    let w = TimeWindow::parse(Some("2024"), Some("3"), None, None).unwrap();
    let query = sql(&w);
    assert!(query.contains(r#""Year" = 2024"#), "{query}");
    assert!(query.contains(r#""Month" = 3"#), "{query}");
    assert!(w.matches(2024, 3, 31));
    assert!(!w.matches(2024, 4, 1));
}

#[test]
fn no_filter_defaults_to_latest_year() {
    let w = TimeWindow::parse(None, Some(""), None, None).unwrap();
    assert!(w.is_unfiltered());

    let resolved = w.resolve(Some(2025));
    assert_eq!(resolved.year, Some(2025));
    assert!(resolved.defaulted);
    assert!(resolved.matches(2025, 1, 1));
    assert!(!resolved.matches(2024, 12, 31));
    assert_eq!(
        resolved.filters_applied().default_window,
        Some("latest_year")
    );

    // An empty table leaves the window open.
    assert_eq!(w.resolve(None), w);
}

#[test]
fn explicit_filters_are_not_replaced() {
    let w = TimeWindow::parse(Some("2021"), None, None, None).unwrap();
    let resolved = w.resolve(Some(2025));
    assert_eq!(resolved.year, Some(2021));
    assert!(!resolved.defaulted);
}

#[test]
fn malformed_dates_name_the_parameter() {
    let err = TimeWindow::parse(None, None, Some("2023/06/01"), None).unwrap_err();
    assert_eq!(err.param, "start_date");

    let err = TimeWindow::parse(None, None, None, Some("2023-02-30")).unwrap_err();
    assert_eq!(err.param, "end_date");

    let err = TimeWindow::parse(None, None, Some("20230601"), None).unwrap_err();
    assert_eq!(err.param, "start_date");

    assert_eq!(
        parse_date("start_date", " 2024-02-29 ").unwrap(),
        NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
    );
}

#[test]
fn out_of_range_year_month_and_reversed_range_are_rejected() {
    assert_eq!(
        TimeWindow::parse(Some("twenty"), None, None, None).unwrap_err().param,
        "year"
    );
    assert_eq!(
        TimeWindow::parse(None, Some("13"), None, None).unwrap_err().param,
        "month"
    );
    assert_eq!(
        TimeWindow::parse(None, None, Some("2023-07-01"), Some("2023-06-01"))
            .unwrap_err()
            .param,
        "end_date"
    );
}

#[test]
fn closed_windows_end_before_today() {
    let today = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    assert!(window(None, Some("2025-05-31")).is_closed(today));
    assert!(!window(None, Some("2025-06-01")).is_closed(today));
    assert!(!window(Some("2020-01-01"), None).is_closed(today));
    let past_year = TimeWindow::parse(Some("2024"), None, None, None).unwrap();
    assert!(past_year.is_closed(today));
}

#[test]
fn rows_order_by_date_then_time_width_then_id() {
    let oldest = chronological(EnvironmentalData::find())
        .into_query()
        .to_string(PostgresQueryBuilder);
    assert!(
        oldest.ends_with(
            r#"ORDER BY "Year" ASC, "Month" ASC, "Day" ASC, CHAR_LENGTH("Time") ASC, "Time" ASC, "id" ASC"#
        ),
        "{oldest}"
    );

    let newest = newest_first(EnvironmentalData::find())
        .into_query()
        .to_string(PostgresQueryBuilder);
    assert!(newest.contains(r#"CHAR_LENGTH("Time") DESC, "Time" DESC, "id" DESC"#), "{newest}");
}
