//! Metric registry, request parameters and record-level helpers.
//!
//! Run with: cargo test --test metrics_test

use farm_data_api::analysis::grouping::{GroupBy, Observation};
use farm_data_api::entity::environmental_data;
use farm_data_api::metrics::{Metric, SoilDepth, STATISTICAL_DEFAULTS};
use farm_data_api::routes::download::{csv_chunk, csv_header, csv_row};
use farm_data_api::routes::environmental::monthly_summary;
use farm_data_api::routes::params::RequestParams;
use farm_data_api::services::series::MonthCount;
use serde_json::json;

fn record(value: serde_json::Value) -> environmental_data::Model {
    let mut base = json!({
        "id": 1,
        "timestamp": "2024-03-05 14:30:00",
        "doy": 65.0,
        "year": 2024,
        "month": 3,
        "day": 5,
        "time": "14:30:00",
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), value.as_object()) {
        base.extend(extra.clone());
    }
    serde_json::from_value(base).unwrap()
}

#[test]
fn keys_round_trip_through_parse() {
    for metric in Metric::ALL {
        assert_eq!(Metric::parse(metric.key()), Some(metric), "{metric}");
    }
}

#[test]
fn aliases_and_slugs_resolve() {
    assert_eq!(Metric::parse("Temperature"), Some(Metric::AirTemperature));
    assert_eq!(Metric::parse("relative_humidity"), Some(Metric::RelativeHumidity));
    assert_eq!(Metric::parse("snow-depth"), Some(Metric::SnowDepth));
    assert_eq!(
        Metric::parse("soil_temperature_20cm"),
        Some(Metric::SoilTemperature(SoilDepth::Cm20))
    );
    assert_eq!(Metric::parse("voltage"), None);

    assert_eq!(
        Metric::from_path("soil-temperature", Some(SoilDepth::Cm50)),
        Some(Metric::SoilTemperature(SoilDepth::Cm50))
    );
    assert_eq!(
        Metric::from_path("soil-temperature", None),
        Some(Metric::SoilTemperature(SoilDepth::Cm5))
    );
    assert_eq!(Metric::from_path("wind-speed", None), Some(Metric::WindSpeed));
}

#[test]
fn soil_depths_parse_loosely() {
    assert_eq!(SoilDepth::parse("10cm"), Some(SoilDepth::Cm10));
    assert_eq!(SoilDepth::parse("25 CM"), Some(SoilDepth::Cm25));
    assert_eq!(SoilDepth::parse("5"), Some(SoilDepth::Cm5));
    assert_eq!(SoilDepth::parse("15cm"), None);
}

#[test]
fn list_parsing_dedupes_in_order() {
    let parsed = Metric::parse_list(&["rainfall,temperature", "rainfall", " humidity "], None).unwrap();
    assert_eq!(
        parsed,
        [Metric::Rainfall, Metric::AirTemperature, Metric::RelativeHumidity]
    );

    let err = Metric::parse_list(&["rainfall,bogus"], None).unwrap_err();
    assert_eq!(err.0, "bogus");
}

#[test]
fn only_rainfall_like_metrics_accumulate() {
    let accumulating: Vec<Metric> = Metric::ALL.into_iter().filter(|m| m.accumulates()).collect();
    assert_eq!(accumulating, [Metric::Rainfall, Metric::TotalPrecipitation]);
    assert_eq!(STATISTICAL_DEFAULTS.len(), 8);
}

#[test]
fn metric_info_carries_depth() {
    let info = Metric::SoilTemperature(SoilDepth::Cm10).info();
    assert_eq!(info.key, "soil_temp_10cm");
    assert_eq!(info.depth, Some("10cm"));
    assert_eq!(Metric::Rainfall.info().depth, None);
}

#[test]
fn values_are_read_from_the_matching_column() {
    let r = record(json!({
        "snow_depth_cm": 12.5,
        "soil_temperature_25cm_degc": 3.25,
        "rainfall_mm": 0.2,
    }));
    assert_eq!(Metric::SnowDepth.value(&r), Some(12.5));
    assert_eq!(Metric::SoilTemperature(SoilDepth::Cm25).value(&r), Some(3.25));
    assert_eq!(Metric::Rainfall.value(&r), Some(0.2));
    assert_eq!(Metric::AirTemperature.value(&r), None);
    assert_eq!(r.timestamp_label(), "2024-03-05 14:30:00");
}

#[test]
fn request_params_accept_repeated_and_bracketed_lists() {
    let params = RequestParams::from_pairs([
        ("metrics[]", "rainfall"),
        ("metrics", "humidity,rainfall"),
    ]);
    assert_eq!(
        params.metrics("metrics").unwrap(),
        Some(vec![Metric::Rainfall, Metric::RelativeHumidity])
    );
    assert_eq!(params.metrics("fields").unwrap(), None);

    let bad = RequestParams::from_pairs([("metrics", "rainfall,nope")]);
    assert_eq!(bad.metrics("metrics").unwrap_err().param, "metrics");
}

#[test]
fn metric_lists_take_soil_depth_from_the_request() {
    let params = RequestParams::from_pairs([
        ("metrics", "soil_temperature,rainfall"),
        ("depth", "10cm"),
    ]);
    assert_eq!(
        params.metrics("metrics").unwrap(),
        Some(vec![Metric::SoilTemperature(SoilDepth::Cm10), Metric::Rainfall])
    );

    let soil_temp = RequestParams::from_pairs([("metrics", "soil-temp"), ("depth", "50cm")]);
    assert_eq!(
        soil_temp.metrics("metrics").unwrap(),
        Some(vec![Metric::SoilTemperature(SoilDepth::Cm50)])
    );

    // An explicit depth in the name wins over `depth`.
    let explicit = RequestParams::from_pairs([("fields", "soil_temp_20cm"), ("depth", "10cm")]);
    assert_eq!(
        explicit.metrics("fields").unwrap(),
        Some(vec![Metric::SoilTemperature(SoilDepth::Cm20)])
    );

    let shallow = RequestParams::from_pairs([("metrics", "soil_temperature")]);
    assert_eq!(
        shallow.metrics("metrics").unwrap(),
        Some(vec![Metric::SoilTemperature(SoilDepth::Cm5)])
    );

    let bad = RequestParams::from_pairs([("metrics", "soil_temperature"), ("depth", "7cm")]);
    assert_eq!(bad.metrics("metrics").unwrap_err().param, "depth");
}

#[test]
fn request_limit_rules() {
    let limit = |raw: &str| RequestParams::from_pairs([("limit", raw)]).limit(1000, 10_000);
    assert_eq!(RequestParams::default().limit(1000, 10_000).unwrap(), 1000);
    assert_eq!(limit("250").unwrap(), 250);
    assert_eq!(limit("10000").unwrap(), 10_000);
    assert!(limit("10001").unwrap_err().reason.contains("cannot exceed 10000"));
    assert_eq!(limit("abc").unwrap_err().reason, "must be a number");
    assert_eq!(limit("0").unwrap_err().param, "limit");
}

#[test]
fn request_flags_and_grouping() {
    let params = RequestParams::from_pairs([
        ("include_outliers", "false"),
        ("group_by", "week"),
        ("depth", "20cm"),
    ]);
    assert!(!params.flag("include_outliers", true).unwrap());
    assert!(params.flag("include_p_values", true).unwrap());
    assert_eq!(params.group_by(GroupBy::Day).unwrap(), GroupBy::Week);
    assert_eq!(params.depth().unwrap(), Some(SoilDepth::Cm20));

    let bad = RequestParams::from_pairs([("include_outliers", "maybe")]);
    assert_eq!(bad.flag("include_outliers", true).unwrap_err().param, "include_outliers");
}

#[test]
fn csv_rows_leave_missing_values_blank() {
    let metrics = [Metric::AirTemperature, Metric::Rainfall];
    assert_eq!(
        csv_header(&metrics),
        ["id", "timestamp", "year", "month", "day", "time", "air_temperature", "rainfall"]
    );
    let row = csv_row(&record(json!({ "rainfall_mm": 1.5 })), &metrics);
    assert_eq!(
        row,
        ["1", "2024-03-05 14:30:00", "2024", "3", "5", "14:30:00", "", "1.5"]
    );
}

#[test]
fn csv_chunks_carry_the_header_only_once() {
    let metrics = [Metric::Rainfall];
    let records = [
        record(json!({ "rainfall_mm": 0.5 })),
        record(json!({ "id": 2, "rainfall_mm": null })),
    ];

    let first = String::from_utf8(csv_chunk(&records[..1], &metrics, true).unwrap()).unwrap();
    let second = String::from_utf8(csv_chunk(&records[1..], &metrics, false).unwrap()).unwrap();
    assert_eq!(
        first,
        "id,timestamp,year,month,day,time,rainfall\n1,2024-03-05 14:30:00,2024,3,5,14:30:00,0.5\n"
    );
    assert_eq!(second, "2,2024-03-05 14:30:00,2024,3,5,14:30:00,\n");

    let empty = String::from_utf8(csv_chunk(&[], &metrics, true).unwrap()).unwrap();
    assert_eq!(empty, "id,timestamp,year,month,day,time,rainfall\n");
}

#[test]
fn monthly_summary_joins_counts_and_metrics() {
    let counts = vec![
        MonthCount {
            year: 2024,
            month: 1,
            record_count: 3,
        },
        MonthCount {
            year: 2024,
            month: 2,
            record_count: 1,
        },
    ];
    let series = vec![
        (
            Metric::AirTemperature,
            vec![
                Observation::new(2024, 1, 1, "00:00:00", -2.0),
                Observation::new(2024, 1, 2, "00:00:00", 4.0),
            ],
        ),
        (
            Metric::Rainfall,
            vec![
                Observation::new(2024, 1, 1, "00:00:00", 0.5),
                Observation::new(2024, 1, 3, "00:00:00", 1.25),
            ],
        ),
    ];

    let summary = monthly_summary(&counts, &series);
    assert_eq!(summary.len(), 2);

    let january = &summary[0];
    assert_eq!(january.month_name, "January");
    assert_eq!(january.record_count, 3);
    let air = &january.metrics["air_temperature"];
    assert_eq!((air.min, air.max, air.mean), (Some(Some(-2.0)), Some(4.0), Some(1.0)));
    assert_eq!(air.std, Some(3.0));
    assert_eq!(air.total, None);
    let rain = &january.metrics["rainfall"];
    assert_eq!((rain.total, rain.max), (Some(1.75), Some(1.25)));
    let rain_json = serde_json::to_value(rain).unwrap();
    assert!(rain_json.get("min").is_none());
    assert_eq!(rain_json["total"], 1.75);

    let february = &summary[1];
    assert_eq!(february.month_name, "February");
    assert_eq!(february.metrics["air_temperature"].mean, None);
    let empty_air = serde_json::to_value(&february.metrics["air_temperature"]).unwrap();
    assert!(empty_air["min"].is_null());
    assert!(empty_air.as_object().unwrap().contains_key("min"));
    assert_eq!(february.metrics["rainfall"].total, None);
}
