//! Read-only queries against `environmental_data`.

use futures::future::try_join_all;
use sea_orm::sea_query::{Expr, Func, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, QueryFilter,
    QueryOrder, QuerySelect,
};

use crate::analysis::grouping::Observation;
use crate::analysis::window::TimeWindow;
use crate::entity::environmental_data::{self, Column, Entity as EnvironmentalData};
use crate::metrics::Metric;

/// Records returned by the public sample endpoint.
pub const SAMPLE_SIZE: u64 = 40;

#[derive(Debug, FromQueryResult)]
struct MaxValue {
    max_value: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct MonthCount {
    pub year: i32,
    pub month: i32,
    pub record_count: i64,
}

async fn max_of(db: &DatabaseConnection, column: Column) -> Result<Option<i32>, DbErr> {
    Ok(EnvironmentalData::find()
        .select_only()
        .column_as(column.max(), "max_value")
        .into_model::<MaxValue>()
        .one(db)
        .await?
        .and_then(|row| row.max_value))
}

/// `MAX(Year)` over the whole table, `None` when it is empty.
pub async fn latest_year(db: &DatabaseConnection) -> Result<Option<i32>, DbErr> {
    max_of(db, Column::Year).await
}

/// Highest record id; changes whenever ingestion appends rows.
pub async fn latest_id(db: &DatabaseConnection) -> Result<Option<i32>, DbErr> {
    max_of(db, Column::Id).await
}

/// Applies the latest-year default, querying only when no filter was given.
pub async fn resolve_window(
    db: &DatabaseConnection,
    window: TimeWindow,
) -> Result<TimeWindow, DbErr> {
    if window.is_unfiltered() {
        Ok(window.resolve(latest_year(db).await?))
    } else {
        Ok(window)
    }
}

fn time_width() -> SimpleExpr {
    Func::char_length(Expr::col(Column::Time)).into()
}

/// Oldest first. `Time` is free text and may lack a leading zero (`9:30:00`),
/// so shorter strings sort first within a day; `id` breaks remaining ties.
pub fn chronological<Q: QueryOrder>(query: Q) -> Q {
    query
        .order_by_asc(Column::Year)
        .order_by_asc(Column::Month)
        .order_by_asc(Column::Day)
        .order_by_asc(time_width())
        .order_by_asc(Column::Time)
        .order_by_asc(Column::Id)
}

/// Reverse of [`chronological`].
pub fn newest_first<Q: QueryOrder>(query: Q) -> Q {
    query
        .order_by_desc(Column::Year)
        .order_by_desc(Column::Month)
        .order_by_desc(Column::Day)
        .order_by_desc(time_width())
        .order_by_desc(Column::Time)
        .order_by_desc(Column::Id)
}

/// Non-null values of `metric` inside `window`, in time order.
pub async fn load_series(
    db: &DatabaseConnection,
    window: &TimeWindow,
    metric: Metric,
    limit: Option<u64>,
) -> Result<Vec<Observation>, DbErr> {
    let column = metric.column();
    let query = EnvironmentalData::find()
        .select_only()
        .column_as(Column::Year, "year")
        .column_as(Column::Month, "month")
        .column_as(Column::Day, "day")
        .column_as(Column::Time, "time")
        .column_as(column, "value")
        .filter(window.condition())
        .filter(column.is_not_null());
    chronological(query)
        .limit(limit)
        .into_model::<Observation>()
        .all(db)
        .await
}

/// Loads several series concurrently, in the order given.
pub async fn load_many(
    db: &DatabaseConnection,
    window: &TimeWindow,
    metrics: &[Metric],
) -> Result<Vec<(Metric, Vec<Observation>)>, DbErr> {
    let loaded = try_join_all(
        metrics
            .iter()
            .map(|metric| load_series(db, window, *metric, None)),
    )
    .await?;
    Ok(metrics.iter().copied().zip(loaded).collect())
}

/// Full records inside `window` where at least one of `metrics` is present.
pub async fn load_records(
    db: &DatabaseConnection,
    window: &TimeWindow,
    metrics: &[Metric],
    limit: u64,
) -> Result<Vec<environmental_data::Model>, DbErr> {
    let mut any_present = Condition::any();
    for metric in metrics {
        any_present = any_present.add(metric.column().is_not_null());
    }
    let mut query = EnvironmentalData::find().filter(window.condition());
    if !metrics.is_empty() {
        query = query.filter(any_present);
    }
    chronological(query).limit(limit).all(db).await
}

/// Most recent records first.
pub async fn latest_records(
    db: &DatabaseConnection,
    window: &TimeWindow,
    limit: u64,
) -> Result<Vec<environmental_data::Model>, DbErr> {
    newest_first(EnvironmentalData::find().filter(window.condition()))
        .limit(limit)
        .all(db)
        .await
}

/// Latest records with snow depth, humidity, rainfall and 5 cm soil temperature all present.
pub async fn sample_records(
    db: &DatabaseConnection,
) -> Result<Vec<environmental_data::Model>, DbErr> {
    let complete = EnvironmentalData::find()
        .filter(Column::SnowDepthCm.is_not_null())
        .filter(Column::RelativeHumidityPct.is_not_null())
        .filter(Column::RainfallMm.is_not_null())
        .filter(Column::SoilTemperature5cmDegc.is_not_null());
    newest_first(complete).limit(SAMPLE_SIZE).all(db).await
}

/// Record count per `(Year, Month)` inside `window`, chronological.
pub async fn monthly_counts(
    db: &DatabaseConnection,
    window: &TimeWindow,
) -> Result<Vec<MonthCount>, DbErr> {
    EnvironmentalData::find()
        .select_only()
        .column_as(Column::Year, "year")
        .column_as(Column::Month, "month")
        .column_as(Expr::col(Column::Id).count(), "record_count")
        .filter(window.condition())
        .group_by(Column::Year)
        .group_by(Column::Month)
        .order_by_asc(Column::Year)
        .order_by_asc(Column::Month)
        .into_model::<MonthCount>()
        .all(db)
        .await
}
