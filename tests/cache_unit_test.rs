//! Unit tests for response caching and rate-limit keys.
//!
//! Run with: cargo test --test cache_unit_test

use axum::http::HeaderMap;
use chrono::NaiveDate;
use farm_data_api::analysis::window::TimeWindow;
use farm_data_api::routes::cache;
use farm_data_api::routes::params::RequestParams;
use farm_data_api::routes::rate_limit::client_ip;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

#[test]
fn cache_key_builds_correctly() {
    assert_eq!(cache::cache_key("averaged", &[]), "averaged");
    assert_eq!(
        cache::cache_key("averaged", &["rainfall", "day", "2024"]),
        "averaged:rainfall:day:2024"
    );

    // Empty components preserved (ensures query uniqueness)
    assert_ne!(
        cache::cache_key("averaged", &["rainfall", "", "2024"]),
        cache::cache_key("averaged", &["rainfall", "2024"])
    );
}

#[test]
fn canonical_params_ignore_order_and_brackets() {
    let a = RequestParams::from_pairs([("metrics[]", "rainfall"), ("year", "2024")]);
    let b = RequestParams::from_pairs([("year", "2024"), ("metrics", "rainfall")]);
    assert_eq!(a.canonical(), b.canonical());

    let blank = RequestParams::from_pairs([("year", "2024"), ("month", " ")]);
    assert_eq!(blank.canonical(), "year=2024");
}

#[test]
fn closed_windows_skip_watermark() {
    let past = TimeWindow {
        year: Some(2001),
        ..TimeWindow::default()
    };
    assert!(cache::is_fresh(&past, Some(1), Some(99)));

    let ended = TimeWindow {
        end: NaiveDate::from_ymd_opt(2010, 1, 31),
        ..TimeWindow::default()
    };
    assert!(cache::is_fresh(&ended, None, Some(5)));
}

#[test]
fn open_windows_require_matching_watermark() {
    let open = TimeWindow {
        start: NaiveDate::from_ymd_opt(2020, 1, 1),
        end: NaiveDate::from_ymd_opt(2999, 12, 31),
        ..TimeWindow::default()
    };
    assert!(cache::is_fresh(&open, Some(42), Some(42)));
    assert!(!cache::is_fresh(&open, Some(42), Some(43)));
    assert!(!cache::is_fresh(&TimeWindow::default(), None, Some(1)));
}

#[test]
fn client_ip_prefers_forwarded_headers() {
    let peer = Some(SocketAddr::from(([10, 0, 0, 7], 5000)));

    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
    headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
    assert_eq!(client_ip(&headers, peer), "203.0.113.9".parse::<IpAddr>().unwrap());

    let mut headers = HeaderMap::new();
    headers.insert("x-real-ip", "198.51.100.4".parse().unwrap());
    assert_eq!(client_ip(&headers, peer), "198.51.100.4".parse::<IpAddr>().unwrap());

    let mut headers = HeaderMap::new();
    headers.insert("x-forwarded-for", "not-an-ip".parse().unwrap());
    assert_eq!(client_ip(&headers, peer), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));

    assert_eq!(client_ip(&HeaderMap::new(), None), IpAddr::V4(Ipv4Addr::LOCALHOST));
}
