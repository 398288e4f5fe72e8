pub mod accounts;
pub mod averaged;
pub mod cache;
pub mod download;
pub mod email;
pub mod environmental;
pub mod health;
pub mod params;
pub mod rate_limit;
pub mod raw;
pub mod statistical;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_governor::{GovernorLayer, governor::GovernorConfigBuilder};

use rate_limit::FallbackIpKeyExtractor;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_scalar::{Scalar, Servable};

use crate::common::AppState;
use crate::config::ConfigError;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthz,
        accounts::register,
        accounts::verify_email,
        accounts::resend_code,
        accounts::login,
        accounts::me,
        accounts::logout,
        accounts::admin_dashboard,
        environmental::list_records,
        environmental::sample_records,
        environmental::monthly_summary_handler,
        averaged::get_averaged,
        raw::get_raw_metric,
        raw::get_raw_multi_metric,
        statistical::get_boxplot,
        statistical::get_boxplot_periods,
        statistical::get_histogram,
        statistical::get_correlation,
        download::download,
        email::test_email,
        email::test_multiple,
    ),
    components(
        schemas(
            crate::metrics::MetricInfo,
            crate::analysis::window::FiltersApplied,
            crate::analysis::grouping::GroupBy,
            crate::analysis::grouping::PeriodSummary,
            crate::analysis::stats::boxplot::BoxplotSummary,
            crate::analysis::stats::boxplot::PeriodBoxplot,
            crate::analysis::stats::histogram::Histogram,
            crate::analysis::stats::histogram::HistogramBin,
            crate::analysis::stats::histogram::HistogramStats,
            crate::analysis::stats::correlation::CorrelationMethod,
            crate::analysis::stats::correlation::CorrelationReport,
            crate::analysis::stats::correlation::PairwiseCorrelation,
            crate::analysis::stats::correlation::CorrelationStatistics,
            crate::analysis::stats::correlation::Strength,
            accounts::RegisterRequest,
            accounts::RegisterResponse,
            accounts::VerifyEmailRequest,
            accounts::ResendCodeRequest,
            accounts::ResendCodeResponse,
            accounts::LoginRequest,
            accounts::LoginResponse,
            accounts::UserResponse,
            accounts::UserWrapper,
            accounts::MessageResponse,
            environmental::RecordsResponse,
            environmental::MonthlySummary,
            environmental::MonthlyMetricStats,
            environmental::MonthlySummaryResponse,
            averaged::AveragedResponse,
            raw::SeriesPoint,
            raw::RawDataResponse,
            statistical::BoxplotResponse,
            statistical::PeriodBoxplotResponse,
            statistical::HistogramResponse,
            statistical::CorrelationResponse,
            download::DownloadRow,
            download::DownloadResponse,
            email::SmtpOverride,
            email::TestEmailRequest,
            email::TestMultipleRequest,
            email::TestEmailResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "auth", description = "Registration, email verification and sessions"),
        (name = "environmental", description = "Records, public sample and monthly summary"),
        (name = "charts", description = "Period-averaged chart series"),
        (name = "raw", description = "Raw points with row limits"),
        (name = "statistics", description = "Boxplot, histogram and correlation"),
        (name = "download", description = "JSON and CSV export"),
        (name = "email", description = "SMTP self-tests"),
    ),
    info(
        title = "Trent Farm Data API",
        description = "Environmental sensor data: filtering, period aggregation and statistical summaries",
        version = "0.1.0"
    )
)]
struct ApiDoc;

/// Builds the full application router.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` when a rate-limit budget cannot be built
/// (for example a zero rate or burst).
pub fn build_router(state: AppState) -> Result<Router, ConfigError> {
    let config = &state.config;

    if config.disable_rate_limiting {
        tracing::warn!("Rate limiting DISABLED");
    } else {
        tracing::info!(
            metadata_rate = %format!("{}/s burst {}", config.rate_limit_metadata_per_second, config.rate_limit_metadata_burst),
            data_rate = %format!("{}/s burst {}", config.rate_limit_data_per_second, config.rate_limit_data_burst),
            bulk_concurrent = config.bulk_concurrent_limit,
            "Rate limiting configured"
        );
    }

    // Accounts, the public sample and the cheap summary endpoints
    let metadata_routes_base = Router::new()
        .route("/auth/register/", post(accounts::register))
        .route("/auth/verify-email/", post(accounts::verify_email))
        .route("/auth/resend-code/", post(accounts::resend_code))
        .route("/auth/login/", post(accounts::login))
        .route("/auth/me/", get(accounts::me))
        .route("/auth/logout/", post(accounts::logout))
        .route("/admin/dashboard/", get(accounts::admin_dashboard))
        .route("/environmental/sample/", get(environmental::sample_records))
        .route(
            "/environmental/monthly-summary/",
            get(environmental::monthly_summary_handler),
        )
        .route("/email/test/", post(email::test_email))
        .route("/email/test-multiple/", post(email::test_multiple));

    let data_routes_base = Router::new()
        .route("/environmental/", get(environmental::list_records))
        .route("/charts/averaged/{metric}/", get(averaged::get_averaged))
        .route("/raw-data/multi-metric/", get(raw::get_raw_multi_metric))
        .route("/raw-data/{metric}/", get(raw::get_raw_metric))
        .route(
            "/charts/environmental/multi-metric/",
            get(raw::get_raw_multi_metric),
        )
        .route("/charts/environmental/{metric}/", get(raw::get_raw_metric))
        .route("/charts/statistical/boxplot/", get(statistical::get_boxplot))
        .route(
            "/charts/statistical/boxplot/periods/",
            get(statistical::get_boxplot_periods),
        )
        .route("/charts/statistical/histogram/", get(statistical::get_histogram))
        .route(
            "/charts/statistical/correlation/",
            get(statistical::get_correlation),
        )
        .route("/download/", get(download::download));

    // Combine API routes, conditionally applying rate limiting
    let api_routes = if config.disable_rate_limiting {
        Router::new()
            .merge(metadata_routes_base)
            .merge(data_routes_base)
    } else {
        let metadata_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_metadata_per_second)
            .burst_size(config.rate_limit_metadata_burst)
            .finish()
            .ok_or_else(|| ConfigError::Invalid("metadata rate limit".to_string()))?;

        let data_limiter = GovernorConfigBuilder::default()
            .key_extractor(FallbackIpKeyExtractor)
            .per_second(config.rate_limit_data_per_second)
            .burst_size(config.rate_limit_data_burst)
            .finish()
            .ok_or_else(|| ConfigError::Invalid("data rate limit".to_string()))?;

        Router::new()
            .merge(metadata_routes_base.layer(GovernorLayer {
                config: Arc::new(metadata_limiter),
            }))
            .merge(data_routes_base.layer(GovernorLayer {
                config: Arc::new(data_limiter),
            }))
    }
    .layer(RequestBodyLimitLayer::new(1024 * 1024)); // 1MB body limit

    // Health check routes (NO rate limiting)
    let health_routes = Router::new().route("/healthz", get(health::healthz));

    // OpenAPI documentation
    let docs_routes = Router::new().merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    Ok(Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(docs_routes)
        .layer(CompressionLayer::new())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
