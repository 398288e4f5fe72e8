use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One logger row. The table is written by the import pipeline and is
/// read-only here; dates are split across `Year`/`Month`/`Day` and `Time`
/// is free text such as `14:30:00`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "environmental_data")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(column_name = "Timestamp")]
    pub timestamp: String,
    #[sea_orm(column_name = "DOY")]
    pub doy: f64,
    #[sea_orm(column_name = "AirTemperature_degC")]
    pub air_temperature_degc: Option<f64>,
    #[sea_orm(column_name = "RelativeHumidity_Pct")]
    pub relative_humidity_pct: Option<f64>,
    #[sea_orm(column_name = "ShortwaveRadiation_Wm2")]
    pub shortwave_radiation_wm2: Option<f64>,
    #[sea_orm(column_name = "Rainfall_mm")]
    pub rainfall_mm: Option<f64>,
    #[sea_orm(column_name = "SoilTemperature_5cm_degC")]
    pub soil_temperature_5cm_degc: Option<f64>,
    #[sea_orm(column_name = "SoilTemperature_10cm_degC")]
    pub soil_temperature_10cm_degc: Option<f64>,
    #[sea_orm(column_name = "SoilTemperature_20cm_degC")]
    pub soil_temperature_20cm_degc: Option<f64>,
    #[sea_orm(column_name = "SoilTemperature_25cm_degC")]
    pub soil_temperature_25cm_degc: Option<f64>,
    #[sea_orm(column_name = "SoilTemperature_50cm_degC")]
    pub soil_temperature_50cm_degc: Option<f64>,
    #[sea_orm(column_name = "WindSpeed_ms")]
    pub wind_speed_ms: Option<f64>,
    #[sea_orm(column_name = "WindVector_ms")]
    pub wind_vector_ms: Option<f64>,
    #[sea_orm(column_name = "WindDirection_deg")]
    pub wind_direction_deg: Option<f64>,
    #[sea_orm(column_name = "WindDirectionSD_deg")]
    pub wind_direction_sd_deg: Option<f64>,
    #[sea_orm(column_name = "SnowDepth_m")]
    pub snow_depth_m: Option<f64>,
    #[sea_orm(column_name = "SnowDepth_cm")]
    pub snow_depth_cm: Option<f64>,
    #[sea_orm(column_name = "LoggerTemperature_degC")]
    pub logger_temperature_degc: Option<f64>,
    #[sea_orm(column_name = "LoggerTemp_degC")]
    pub logger_temp_degc: Option<f64>,
    #[sea_orm(column_name = "LoggerVoltage_V")]
    pub logger_voltage_v: Option<f64>,
    #[sea_orm(column_name = "BatteryVoltage_V")]
    pub battery_voltage_v: Option<f64>,
    #[sea_orm(column_name = "PanelTemp_degC")]
    pub panel_temp_degc: Option<f64>,
    #[sea_orm(column_name = "TotalPrecipitation_mV")]
    pub total_precipitation_mv: Option<f64>,
    #[sea_orm(column_name = "TotalPrecipitation_mm")]
    pub total_precipitation_mm: Option<f64>,
    #[sea_orm(column_name = "AtmosphericPressure_kPa")]
    pub atmospheric_pressure_kpa: Option<f64>,
    #[sea_orm(column_name = "BarometricPressure_TCS_kPa")]
    pub barometric_pressure_tcs_kpa: Option<f64>,
    #[sea_orm(column_name = "SolarRadiation_Wm2")]
    pub solar_radiation_wm2: Option<f64>,
    #[sea_orm(column_name = "MinutesOut_min")]
    pub minutes_out_min: Option<f64>,
    #[sea_orm(column_name = "Record_TCS_30min")]
    pub record_tcs_30min: Option<f64>,
    #[sea_orm(column_name = "Year")]
    pub year: i32,
    #[sea_orm(column_name = "Month")]
    pub month: i32,
    #[sea_orm(column_name = "Day")]
    pub day: i32,
    #[sea_orm(column_name = "Time")]
    pub time: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// `YYYY-MM-DD` rebuilt from the split columns.
    #[must_use]
    pub fn date_label(&self) -> String {
        format!("{}-{:02}-{:02}", self.year, self.month, self.day)
    }

    #[must_use]
    pub fn timestamp_label(&self) -> String {
        format!("{} {}", self.date_label(), self.time)
    }
}
