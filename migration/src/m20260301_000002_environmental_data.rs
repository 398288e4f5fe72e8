use sea_orm_migration::prelude::*;

/// The sensor table is populated by an external logger import. In production
/// it already exists and `if_not_exists` makes this a no-op; local and CI
/// databases get the same shape so the API has something to read.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let measurements = [
            EnvironmentalData::AirTemperature,
            EnvironmentalData::RelativeHumidity,
            EnvironmentalData::ShortwaveRadiation,
            EnvironmentalData::Rainfall,
            EnvironmentalData::SoilTemperature5cm,
            EnvironmentalData::SoilTemperature20cm,
            EnvironmentalData::SoilTemperature50cm,
            EnvironmentalData::WindSpeed,
            EnvironmentalData::WindVector,
            EnvironmentalData::WindDirection,
            EnvironmentalData::WindDirectionSd,
            EnvironmentalData::SnowDepthM,
            EnvironmentalData::LoggerTemperature,
            EnvironmentalData::LoggerVoltage,
            EnvironmentalData::TotalPrecipitationMv,
            EnvironmentalData::TotalPrecipitationMm,
            EnvironmentalData::AtmosphericPressure,
            EnvironmentalData::BatteryVoltage,
            EnvironmentalData::MinutesOut,
            EnvironmentalData::PanelTemp,
            EnvironmentalData::SnowDepthCm,
            EnvironmentalData::SolarRadiation,
            EnvironmentalData::SoilTemperature10cm,
            EnvironmentalData::SoilTemperature25cm,
            EnvironmentalData::RecordTcs30min,
            EnvironmentalData::LoggerTemp,
            EnvironmentalData::BarometricPressureTcs,
        ];

        let mut table = Table::create();
        table
            .table(EnvironmentalData::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(EnvironmentalData::Id)
                    .integer()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(EnvironmentalData::Timestamp).string_len(50).not_null())
            .col(ColumnDef::new(EnvironmentalData::Doy).double().not_null());
        for column in measurements {
            table.col(ColumnDef::new(column).double().null());
        }
        table
            .col(ColumnDef::new(EnvironmentalData::Year).integer().not_null())
            .col(ColumnDef::new(EnvironmentalData::Month).integer().not_null())
            .col(ColumnDef::new(EnvironmentalData::Day).integer().not_null())
            .col(ColumnDef::new(EnvironmentalData::Time).string_len(20).not_null());

        manager.create_table(table.to_owned()).await?;

        // Every query filters and orders on the split date columns
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_environmental_data_ymd")
                    .table(EnvironmentalData::Table)
                    .col(EnvironmentalData::Year)
                    .col(EnvironmentalData::Month)
                    .col(EnvironmentalData::Day)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // The table belongs to the import pipeline; only our index is removed.
        manager
            .drop_index(
                Index::drop()
                    .if_exists()
                    .name("idx_environmental_data_ymd")
                    .table(EnvironmentalData::Table)
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden, Clone, Copy)]
enum EnvironmentalData {
    #[sea_orm(iden = "environmental_data")]
    Table,
    #[sea_orm(iden = "id")]
    Id,
    #[sea_orm(iden = "Timestamp")]
    Timestamp,
    #[sea_orm(iden = "DOY")]
    Doy,
    #[sea_orm(iden = "AirTemperature_degC")]
    AirTemperature,
    #[sea_orm(iden = "RelativeHumidity_Pct")]
    RelativeHumidity,
    #[sea_orm(iden = "ShortwaveRadiation_Wm2")]
    ShortwaveRadiation,
    #[sea_orm(iden = "Rainfall_mm")]
    Rainfall,
    #[sea_orm(iden = "SoilTemperature_5cm_degC")]
    SoilTemperature5cm,
    #[sea_orm(iden = "SoilTemperature_20cm_degC")]
    SoilTemperature20cm,
    #[sea_orm(iden = "SoilTemperature_50cm_degC")]
    SoilTemperature50cm,
    #[sea_orm(iden = "WindSpeed_ms")]
    WindSpeed,
    #[sea_orm(iden = "WindVector_ms")]
    WindVector,
    #[sea_orm(iden = "WindDirection_deg")]
    WindDirection,
    #[sea_orm(iden = "WindDirectionSD_deg")]
    WindDirectionSd,
    #[sea_orm(iden = "SnowDepth_m")]
    SnowDepthM,
    #[sea_orm(iden = "LoggerTemperature_degC")]
    LoggerTemperature,
    #[sea_orm(iden = "LoggerVoltage_V")]
    LoggerVoltage,
    #[sea_orm(iden = "TotalPrecipitation_mV")]
    TotalPrecipitationMv,
    #[sea_orm(iden = "TotalPrecipitation_mm")]
    TotalPrecipitationMm,
    #[sea_orm(iden = "AtmosphericPressure_kPa")]
    AtmosphericPressure,
    #[sea_orm(iden = "BatteryVoltage_V")]
    BatteryVoltage,
    #[sea_orm(iden = "MinutesOut_min")]
    MinutesOut,
    #[sea_orm(iden = "PanelTemp_degC")]
    PanelTemp,
    #[sea_orm(iden = "SnowDepth_cm")]
    SnowDepthCm,
    #[sea_orm(iden = "SolarRadiation_Wm2")]
    SolarRadiation,
    #[sea_orm(iden = "SoilTemperature_10cm_degC")]
    SoilTemperature10cm,
    #[sea_orm(iden = "SoilTemperature_25cm_degC")]
    SoilTemperature25cm,
    #[sea_orm(iden = "Record_TCS_30min")]
    RecordTcs30min,
    #[sea_orm(iden = "LoggerTemp_degC")]
    LoggerTemp,
    #[sea_orm(iden = "BarometricPressure_TCS_kPa")]
    BarometricPressureTcs,
    #[sea_orm(iden = "Year")]
    Year,
    #[sea_orm(iden = "Month")]
    Month,
    #[sea_orm(iden = "Day")]
    Day,
    #[sea_orm(iden = "Time")]
    Time,
}
