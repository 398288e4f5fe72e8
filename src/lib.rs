//! Trent Farm Data API: environmental sensor records with time-window
//! filtering, period aggregation and statistical summaries.
//!
//! This library exposes the core modules for testing and reuse.

pub mod analysis;
pub mod auth;
pub mod common;
pub mod config;
pub mod entity;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod services;
