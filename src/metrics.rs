//! Registry of the numeric sensor channels stored in `environmental_data`.
//!
//! Every endpoint resolves user-facing metric names through [`Metric::parse`]
//! and reads values through [`Metric::value`], so column names, units and
//! legacy aliases live in exactly one place.

use serde::{Serialize, Serializer};
use std::fmt;
use utoipa::ToSchema;

use crate::entity::environmental_data::{Column, Model};

/// Soil temperature sensor depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SoilDepth {
    Cm5,
    Cm10,
    Cm20,
    Cm25,
    Cm50,
}

impl SoilDepth {
    pub const ALL: [SoilDepth; 5] = [Self::Cm5, Self::Cm10, Self::Cm20, Self::Cm25, Self::Cm50];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Cm5 => "5cm",
            Self::Cm10 => "10cm",
            Self::Cm20 => "20cm",
            Self::Cm25 => "25cm",
            Self::Cm50 => "50cm",
        }
    }

    /// Accepts `5cm`, `5 cm` and bare `5`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim().to_ascii_lowercase();
        let digits = trimmed.trim_end_matches("cm").trim();
        match digits {
            "5" => Some(Self::Cm5),
            "10" => Some(Self::Cm10),
            "20" => Some(Self::Cm20),
            "25" => Some(Self::Cm25),
            "50" => Some(Self::Cm50),
            _ => None,
        }
    }
}

impl fmt::Display for SoilDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    AirTemperature,
    RelativeHumidity,
    ShortwaveRadiation,
    SolarRadiation,
    Rainfall,
    TotalPrecipitation,
    TotalPrecipitationSignal,
    SoilTemperature(SoilDepth),
    WindSpeed,
    WindVector,
    WindDirection,
    WindDirectionStdDev,
    SnowDepth,
    SnowDepthMetres,
    AtmosphericPressure,
    BarometricPressure,
    LoggerTemperature,
    LoggerTemperatureTcs,
    PanelTemperature,
    LoggerVoltage,
    BatteryVoltage,
    MinutesOut,
}

/// Metrics used by the statistical endpoints when the request names none.
pub const STATISTICAL_DEFAULTS: [Metric; 8] = [
    Metric::AirTemperature,
    Metric::RelativeHumidity,
    Metric::WindSpeed,
    Metric::Rainfall,
    Metric::SnowDepth,
    Metric::SoilTemperature(SoilDepth::Cm5),
    Metric::AtmosphericPressure,
    Metric::ShortwaveRadiation,
];

/// Metrics returned by the multi-metric raw endpoints when the request names none.
pub const MULTI_METRIC_DEFAULTS: [Metric; 3] =
    [Metric::AirTemperature, Metric::RelativeHumidity, Metric::WindSpeed];

/// Display metadata returned alongside series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct MetricInfo {
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown metric '{0}'")]
pub struct UnknownMetric(pub String);

impl Metric {
    pub const ALL: [Metric; 26] = [
        Self::AirTemperature,
        Self::RelativeHumidity,
        Self::ShortwaveRadiation,
        Self::SolarRadiation,
        Self::Rainfall,
        Self::TotalPrecipitation,
        Self::TotalPrecipitationSignal,
        Self::SoilTemperature(SoilDepth::Cm5),
        Self::SoilTemperature(SoilDepth::Cm10),
        Self::SoilTemperature(SoilDepth::Cm20),
        Self::SoilTemperature(SoilDepth::Cm25),
        Self::SoilTemperature(SoilDepth::Cm50),
        Self::WindSpeed,
        Self::WindVector,
        Self::WindDirection,
        Self::WindDirectionStdDev,
        Self::SnowDepth,
        Self::SnowDepthMetres,
        Self::AtmosphericPressure,
        Self::BarometricPressure,
        Self::LoggerTemperature,
        Self::LoggerTemperatureTcs,
        Self::PanelTemperature,
        Self::LoggerVoltage,
        Self::BatteryVoltage,
        Self::MinutesOut,
    ];

    /// Canonical key used in responses and accepted in requests.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::AirTemperature => "air_temperature",
            Self::RelativeHumidity => "humidity",
            Self::ShortwaveRadiation => "shortwave_radiation",
            Self::SolarRadiation => "solar_radiation",
            Self::Rainfall => "rainfall",
            Self::TotalPrecipitation => "total_precipitation",
            Self::TotalPrecipitationSignal => "total_precipitation_mv",
            Self::SoilTemperature(SoilDepth::Cm5) => "soil_temp_5cm",
            Self::SoilTemperature(SoilDepth::Cm10) => "soil_temp_10cm",
            Self::SoilTemperature(SoilDepth::Cm20) => "soil_temp_20cm",
            Self::SoilTemperature(SoilDepth::Cm25) => "soil_temp_25cm",
            Self::SoilTemperature(SoilDepth::Cm50) => "soil_temp_50cm",
            Self::WindSpeed => "wind_speed",
            Self::WindVector => "wind_vector",
            Self::WindDirection => "wind_direction",
            Self::WindDirectionStdDev => "wind_direction_sd",
            Self::SnowDepth => "snow_depth",
            Self::SnowDepthMetres => "snow_depth_m",
            Self::AtmosphericPressure => "atmospheric_pressure",
            Self::BarometricPressure => "barometric_pressure",
            Self::LoggerTemperature => "logger_temperature",
            Self::LoggerTemperatureTcs => "logger_temperature_tcs",
            Self::PanelTemperature => "panel_temperature",
            Self::LoggerVoltage => "logger_voltage",
            Self::BatteryVoltage => "battery_voltage",
            Self::MinutesOut => "minutes_out",
        }
    }

    /// Older names still sent by dashboards.
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::AirTemperature => &["temperature", "air_temp"],
            Self::RelativeHumidity => &["relative_humidity"],
            Self::SnowDepth => &["snow_depth_cm"],
            Self::AtmosphericPressure => &["pressure"],
            Self::SoilTemperature(SoilDepth::Cm5) => &["soil_temperature_5cm", "soil_temperature"],
            Self::SoilTemperature(SoilDepth::Cm10) => &["soil_temperature_10cm"],
            Self::SoilTemperature(SoilDepth::Cm20) => &["soil_temperature_20cm"],
            Self::SoilTemperature(SoilDepth::Cm25) => &["soil_temperature_25cm"],
            Self::SoilTemperature(SoilDepth::Cm50) => &["soil_temperature_50cm"],
            Self::TotalPrecipitation => &["precipitation"],
            _ => &[],
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::AirTemperature => "Air temperature",
            Self::RelativeHumidity => "Relative humidity",
            Self::ShortwaveRadiation => "Shortwave radiation",
            Self::SolarRadiation => "Solar radiation",
            Self::Rainfall => "Rainfall",
            Self::TotalPrecipitation => "Total precipitation",
            Self::TotalPrecipitationSignal => "Total precipitation (gauge signal)",
            Self::SoilTemperature(_) => "Soil temperature",
            Self::WindSpeed => "Wind speed",
            Self::WindVector => "Wind vector",
            Self::WindDirection => "Wind direction",
            Self::WindDirectionStdDev => "Wind direction standard deviation",
            Self::SnowDepth => "Snow depth",
            Self::SnowDepthMetres => "Snow depth (m)",
            Self::AtmosphericPressure => "Atmospheric pressure",
            Self::BarometricPressure => "Barometric pressure (TCS)",
            Self::LoggerTemperature => "Logger temperature",
            Self::LoggerTemperatureTcs => "Logger temperature (TCS)",
            Self::PanelTemperature => "Panel temperature",
            Self::LoggerVoltage => "Logger voltage",
            Self::BatteryVoltage => "Battery voltage",
            Self::MinutesOut => "Minutes out",
        }
    }

    #[must_use]
    pub fn unit(self) -> &'static str {
        match self {
            Self::AirTemperature
            | Self::SoilTemperature(_)
            | Self::LoggerTemperature
            | Self::LoggerTemperatureTcs
            | Self::PanelTemperature => "°C",
            Self::RelativeHumidity => "%",
            Self::ShortwaveRadiation | Self::SolarRadiation => "W/m²",
            Self::Rainfall | Self::TotalPrecipitation => "mm",
            Self::TotalPrecipitationSignal => "mV",
            Self::WindSpeed | Self::WindVector => "m/s",
            Self::WindDirection | Self::WindDirectionStdDev => "°",
            Self::SnowDepth => "cm",
            Self::SnowDepthMetres => "m",
            Self::AtmosphericPressure | Self::BarometricPressure => "kPa",
            Self::LoggerVoltage | Self::BatteryVoltage => "V",
            Self::MinutesOut => "min",
        }
    }

    /// Rainfall-like channels also report a per-period total.
    #[must_use]
    pub fn accumulates(self) -> bool {
        matches!(self, Self::Rainfall | Self::TotalPrecipitation)
    }

    #[must_use]
    pub fn info(self) -> MetricInfo {
        MetricInfo {
            key: self.key(),
            label: self.label(),
            unit: self.unit(),
            depth: self.depth().map(SoilDepth::label),
        }
    }

    #[must_use]
    pub fn depth(self) -> Option<SoilDepth> {
        match self {
            Self::SoilTemperature(depth) => Some(depth),
            _ => None,
        }
    }

    #[must_use]
    pub fn column(self) -> Column {
        match self {
            Self::AirTemperature => Column::AirTemperatureDegc,
            Self::RelativeHumidity => Column::RelativeHumidityPct,
            Self::ShortwaveRadiation => Column::ShortwaveRadiationWm2,
            Self::SolarRadiation => Column::SolarRadiationWm2,
            Self::Rainfall => Column::RainfallMm,
            Self::TotalPrecipitation => Column::TotalPrecipitationMm,
            Self::TotalPrecipitationSignal => Column::TotalPrecipitationMv,
            Self::SoilTemperature(SoilDepth::Cm5) => Column::SoilTemperature5cmDegc,
            Self::SoilTemperature(SoilDepth::Cm10) => Column::SoilTemperature10cmDegc,
            Self::SoilTemperature(SoilDepth::Cm20) => Column::SoilTemperature20cmDegc,
            Self::SoilTemperature(SoilDepth::Cm25) => Column::SoilTemperature25cmDegc,
            Self::SoilTemperature(SoilDepth::Cm50) => Column::SoilTemperature50cmDegc,
            Self::WindSpeed => Column::WindSpeedMs,
            Self::WindVector => Column::WindVectorMs,
            Self::WindDirection => Column::WindDirectionDeg,
            Self::WindDirectionStdDev => Column::WindDirectionSdDeg,
            Self::SnowDepth => Column::SnowDepthCm,
            Self::SnowDepthMetres => Column::SnowDepthM,
            Self::AtmosphericPressure => Column::AtmosphericPressureKpa,
            Self::BarometricPressure => Column::BarometricPressureTcsKpa,
            Self::LoggerTemperature => Column::LoggerTemperatureDegc,
            Self::LoggerTemperatureTcs => Column::LoggerTempDegc,
            Self::PanelTemperature => Column::PanelTempDegc,
            Self::LoggerVoltage => Column::LoggerVoltageV,
            Self::BatteryVoltage => Column::BatteryVoltageV,
            Self::MinutesOut => Column::MinutesOutMin,
        }
    }

    /// Reads this channel from a record; `None` when the sensor reported nothing.
    #[must_use]
    pub fn value(self, record: &Model) -> Option<f64> {
        match self {
            Self::AirTemperature => record.air_temperature_degc,
            Self::RelativeHumidity => record.relative_humidity_pct,
            Self::ShortwaveRadiation => record.shortwave_radiation_wm2,
            Self::SolarRadiation => record.solar_radiation_wm2,
            Self::Rainfall => record.rainfall_mm,
            Self::TotalPrecipitation => record.total_precipitation_mm,
            Self::TotalPrecipitationSignal => record.total_precipitation_mv,
            Self::SoilTemperature(SoilDepth::Cm5) => record.soil_temperature_5cm_degc,
            Self::SoilTemperature(SoilDepth::Cm10) => record.soil_temperature_10cm_degc,
            Self::SoilTemperature(SoilDepth::Cm20) => record.soil_temperature_20cm_degc,
            Self::SoilTemperature(SoilDepth::Cm25) => record.soil_temperature_25cm_degc,
            Self::SoilTemperature(SoilDepth::Cm50) => record.soil_temperature_50cm_degc,
            Self::WindSpeed => record.wind_speed_ms,
            Self::WindVector => record.wind_vector_ms,
            Self::WindDirection => record.wind_direction_deg,
            Self::WindDirectionStdDev => record.wind_direction_sd_deg,
            Self::SnowDepth => record.snow_depth_cm,
            Self::SnowDepthMetres => record.snow_depth_m,
            Self::AtmosphericPressure => record.atmospheric_pressure_kpa,
            Self::BarometricPressure => record.barometric_pressure_tcs_kpa,
            Self::LoggerTemperature => record.logger_temperature_degc,
            Self::LoggerTemperatureTcs => record.logger_temp_degc,
            Self::PanelTemperature => record.panel_temp_degc,
            Self::LoggerVoltage => record.logger_voltage_v,
            Self::BatteryVoltage => record.battery_voltage_v,
            Self::MinutesOut => record.minutes_out_min,
        }
    }

    /// Case-insensitive lookup by key or alias. Hyphens are treated as underscores.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.key() == normalized || m.aliases().contains(&normalized.as_str()))
    }

    /// Resolves a URL path segment such as `snow-depth` or `soil-temperature`.
    /// Soil temperature takes its sensor depth from `depth`, defaulting to 5 cm.
    #[must_use]
    pub fn from_path(segment: &str, depth: Option<SoilDepth>) -> Option<Self> {
        let normalized = segment.trim().to_ascii_lowercase().replace('-', "_");
        if normalized == "soil_temperature" || normalized == "soil_temp" {
            return Some(Self::SoilTemperature(depth.unwrap_or(SoilDepth::Cm5)));
        }
        Self::parse(&normalized)
    }

    /// Parses a list of comma-separated entries, dropping duplicates but keeping order.
    /// A bare `soil_temperature` takes its sensor depth from `depth`, like [`Metric::from_path`].
    ///
    /// # Errors
    ///
    /// Returns [`UnknownMetric`] for the first name that is not in the registry.
    pub fn parse_list<S: AsRef<str>>(
        entries: &[S],
        depth: Option<SoilDepth>,
    ) -> Result<Vec<Self>, UnknownMetric> {
        let mut out: Vec<Self> = Vec::new();
        for entry in entries {
            for name in entry.as_ref().split(',') {
                let name = name.trim();
                if name.is_empty() {
                    continue;
                }
                let metric =
                    Self::from_path(name, depth).ok_or_else(|| UnknownMetric(name.to_string()))?;
                if !out.contains(&metric) {
                    out.push(metric);
                }
            }
        }
        Ok(out)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Metric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}
