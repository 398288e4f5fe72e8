//! Field-selected export of raw records as JSON or streamed CSV.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::collections::BTreeMap;
use tokio_stream::wrappers::ReceiverStream;
use utoipa::ToSchema;

use super::params::{DownloadQuery, RequestParams, WindowQuery};
use crate::analysis::window::FiltersApplied;
use crate::auth::AuthUser;
use crate::common::AppState;
use crate::entity::environmental_data;
use crate::error::{AppError, AppResult};
use crate::metrics::{Metric, MetricInfo};
use crate::services::series;

/// Rows serialized per channel message.
const CSV_CHUNK_ROWS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    /// `format` wins over the `Accept` header; JSON otherwise.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam(format)` for anything but json or csv.
    pub fn negotiate(raw: Option<&str>, headers: &HeaderMap) -> AppResult<Self> {
        if let Some(raw) = raw {
            return match raw.trim().to_ascii_lowercase().as_str() {
                "json" => Ok(Self::Json),
                "csv" => Ok(Self::Csv),
                other => Err(AppError::invalid(
                    "format",
                    format!("'{other}' must be json or csv"),
                )),
            };
        }
        let wants_csv = headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|accept| accept.contains("text/csv"));
        Ok(if wants_csv { Self::Csv } else { Self::Json })
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DownloadRow {
    pub id: i32,
    pub timestamp: String,
    /// Requested fields by metric key.
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub values: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DownloadResponse {
    pub success: bool,
    pub fields: Vec<MetricInfo>,
    pub data: Vec<DownloadRow>,
    pub count: usize,
    pub limit: u64,
    pub filters_applied: FiltersApplied,
}

#[must_use]
pub fn csv_header(metrics: &[Metric]) -> Vec<String> {
    ["id", "timestamp", "year", "month", "day", "time"]
        .into_iter()
        .map(str::to_string)
        .chain(metrics.iter().map(|m| m.key().to_string()))
        .collect()
}

/// One CSV record; missing values are empty cells.
#[must_use]
pub fn csv_row(record: &environmental_data::Model, metrics: &[Metric]) -> Vec<String> {
    let mut row = vec![
        record.id.to_string(),
        record.timestamp_label(),
        record.year.to_string(),
        record.month.to_string(),
        record.day.to_string(),
        record.time.clone(),
    ];
    row.extend(
        metrics
            .iter()
            .map(|m| m.value(record).map(|v| v.to_string()).unwrap_or_default()),
    );
    row
}

fn download_row(record: &environmental_data::Model, metrics: &[Metric]) -> DownloadRow {
    DownloadRow {
        id: record.id,
        timestamp: record.timestamp_label(),
        values: metrics
            .iter()
            .map(|m| (m.key().to_string(), m.value(record)))
            .collect(),
    }
}

type Chunk = Result<Vec<u8>, std::io::Error>;

/// Encodes one body chunk, optionally led by the header row.
///
/// # Errors
///
/// Returns the writer's I/O error when a record cannot be encoded.
pub fn csv_chunk(
    records: &[environmental_data::Model],
    metrics: &[Metric],
    with_header: bool,
) -> Chunk {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if with_header {
        writer.write_record(csv_header(metrics))?;
    }
    for record in records {
        writer.write_record(csv_row(record, metrics))?;
    }
    writer
        .into_inner()
        .map_err(|e| std::io::Error::new(e.error().kind(), e.error().to_string()))
}

fn build_csv_response(
    records: Vec<environmental_data::Model>,
    metrics: Vec<Metric>,
    permit: tokio::sync::OwnedSemaphorePermit,
) -> AppResult<Response> {
    let (tx, rx) = tokio::sync::mpsc::channel::<Chunk>(16);

    tokio::spawn(async move {
        // Held until the last chunk is queued.
        let _permit = permit;
        if records.is_empty() {
            let _ = tx.send(csv_chunk(&[], &metrics, true)).await;
            return;
        }
        for (index, batch) in records.chunks(CSV_CHUNK_ROWS).enumerate() {
            let chunk = csv_chunk(batch, &metrics, index == 0);
            let failed = chunk.is_err();
            if tx.send(chunk).await.is_err() {
                tracing::debug!("csv_client_disconnected");
                return;
            }
            if failed {
                return;
            }
        }
    });

    let body = axum::body::Body::from_stream(ReceiverStream::new(rx));
    Response::builder()
        .header(header::CONTENT_TYPE, HeaderValue::from_static("text/csv"))
        .header(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment; filename=\"environmental_data.csv\""),
        )
        .body(body)
        .map_err(|e| AppError::Internal(e.to_string()))
}

/// Download records
///
/// Exports the selected fields of every record in the window that carries at
/// least one of them. Concurrent downloads are bounded; saturated requests
/// receive 503.
#[utoipa::path(
    get,
    path = "/api/download/",
    params(WindowQuery, DownloadQuery),
    responses(
        (status = 200, description = "Records as JSON, or a text/csv attachment when CSV is requested", body = DownloadResponse),
        (status = 400, description = "Invalid fields, format, window or limit"),
        (status = 401, description = "Missing or invalid token"),
        (status = 503, description = "Too many concurrent downloads"),
    ),
    security(("bearer" = [])),
    tag = "download"
)]
pub async fn download(
    State(state): State<AppState>,
    _user: AuthUser,
    headers: HeaderMap,
    params: RequestParams,
) -> AppResult<Response> {
    let metrics = params
        .metrics("fields")?
        .unwrap_or_else(|| Metric::ALL.to_vec());
    let format = ExportFormat::negotiate(params.get("format"), &headers)?;
    let limit = params.limit(state.config.raw_default_limit, state.config.raw_max_limit)?;
    let window = params.window()?;

    let Ok(permit) = state.bulk_permits.clone().try_acquire_owned() else {
        tracing::warn!(
            status = StatusCode::SERVICE_UNAVAILABLE.as_u16(),
            "bulk_request_rejected"
        );
        return Err(AppError::ServiceUnavailable(
            "Too many concurrent downloads. Please try again later.".to_string(),
        ));
    };

    let window = series::resolve_window(&state.db, window).await?;
    let records = series::load_records(&state.db, &window, &metrics, limit).await?;
    tracing::info!(rows = records.len(), format = ?format, "download_prepared");

    match format {
        ExportFormat::Csv => build_csv_response(records, metrics, permit),
        ExportFormat::Json => {
            let data: Vec<DownloadRow> = records.iter().map(|r| download_row(r, &metrics)).collect();
            drop(permit);
            Ok(Json(DownloadResponse {
                success: true,
                fields: metrics.iter().map(|m| m.info()).collect(),
                count: data.len(),
                data,
                limit,
                filters_applied: window.filters_applied(),
            })
            .into_response())
        }
    }
}
