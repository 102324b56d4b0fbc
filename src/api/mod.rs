mod cli;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router,
    extract::{DefaultBodyLimit, Json, State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::core::{
    AccumulationPayload, Portfolio, ProjectionEngine, ProjectionResult, ValidationReport,
    ValidationRules, WithdrawalPayload, WithdrawalProjection,
};

pub use cli::{Cli, CliError, Command, run_cli};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub body_limit: usize,
    pub rules: ValidationRules,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            body_limit: DEFAULT_BODY_LIMIT,
            rules: ValidationRules::default(),
        }
    }
}

/// Shared read-only state; handlers never mutate it.
#[derive(Debug)]
pub struct AppState {
    pub engine: ProjectionEngine,
    pub rules: ValidationRules,
    pub started: Instant,
}

impl AppState {
    pub fn new(engine: ProjectionEngine, rules: ValidationRules) -> Self {
        Self {
            engine,
            rules,
            started: Instant::now(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationReport),
    #[error("malformed JSON body: {0}")]
    MalformedJson(String),
    #[error("request body too large")]
    PayloadTooLarge,
    #[error("{context}: {detail}")]
    Internal {
        context: &'static str,
        detail: String,
    },
    #[error("not found")]
    NotFound,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl ErrorResponse {
    fn new(error: &str) -> Self {
        Self {
            error: error.to_string(),
            details: None,
            message: None,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::MalformedJson(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(report) => {
                debug!(errors = ?report.errors, "request failed validation");
                json_response(
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        details: Some(report.errors),
                        ..ErrorResponse::new("Validation failed")
                    },
                )
            }
            ApiError::MalformedJson(detail) => {
                debug!(%detail, "rejected malformed JSON body");
                json_response(
                    StatusCode::BAD_REQUEST,
                    ErrorResponse {
                        message: Some("Please check your request body".to_string()),
                        ..ErrorResponse::new("Invalid JSON format")
                    },
                )
            }
            ApiError::PayloadTooLarge => json_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                ErrorResponse::new("Payload too large"),
            ),
            ApiError::Internal { context, detail } => {
                error!(%detail, "{context}");
                json_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        message: Some(
                            "Something went wrong processing your request".to_string(),
                        ),
                        ..ErrorResponse::new(context)
                    },
                )
            }
            ApiError::NotFound => {
                json_response(StatusCode::NOT_FOUND, ErrorResponse::new("Not found"))
            }
        }
    }
}

pub fn router(state: Arc<AppState>, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/calculate", post(calculate_handler))
        .route("/api/calculate", post(calculate_handler))
        .route("/withdrawal-scenarios", post(withdrawal_handler))
        .route("/api/withdrawal-scenarios", post(withdrawal_handler))
        .route("/portfolios", get(portfolios_handler))
        .route("/api/portfolios", get(portfolios_handler))
        .fallback(not_found_handler)
        .with_state(state)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_XSS_PROTECTION,
            HeaderValue::from_static("1; mode=block"),
        ))
        .layer(TraceLayer::new_for_http())
}

/// Router over the default portfolio table with the config's rules and limits.
pub fn app(config: &ServerConfig) -> Router {
    let state = Arc::new(AppState::new(ProjectionEngine::default(), config.rules));
    router(state, config.body_limit)
}

pub async fn run_http_server(config: ServerConfig) -> std::io::Result<()> {
    let addr = SocketAddr::new(config.host, config.port);
    let app = app(&config);

    let listener = TcpListener::bind(addr).await?;
    info!("Retirement projection API listening on http://{addr}");
    info!(
        floor = ?config.rules.retirement_age_floor,
        "Desired-age retirement floor"
    );

    axum::serve(listener, app).await
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp: String,
    uptime: f64,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "healthy",
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime: state.started.elapsed().as_secs_f64(),
        },
    )
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PortfoliosResponse<'a> {
    portfolios: Vec<&'a Portfolio>,
    withdrawal_tiers: &'a [f64],
    max_age: u32,
}

async fn portfolios_handler(State(state): State<Arc<AppState>>) -> Response {
    let config = state.engine.config();
    json_response(
        StatusCode::OK,
        PortfoliosResponse {
            portfolios: config.portfolios().collect(),
            withdrawal_tiers: &config.withdrawal_tiers,
            max_age: config.max_age,
        },
    )
}

async fn calculate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AccumulationPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let request = payload
        .into_request(&state.rules)
        .map_err(ApiError::Validation)?;

    let result = state.engine.project_accumulation(&request);
    if !projection_is_finite(&result) {
        return Err(ApiError::Internal {
            context: "Calculation failed",
            detail: format!("non-finite projection for {request:?}"),
        });
    }
    Ok(json_response(StatusCode::OK, result))
}

async fn withdrawal_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WithdrawalPayload>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = payload?;
    let request = payload
        .into_request(&state.rules)
        .map_err(ApiError::Validation)?;

    let projection = state.engine.project_withdrawal_scenarios(&request);
    if !withdrawal_is_finite(&projection) {
        return Err(ApiError::Internal {
            context: "Withdrawal calculation failed",
            detail: format!("non-finite withdrawal simulation for {request:?}"),
        });
    }
    Ok(json_response(StatusCode::OK, projection))
}

async fn not_found_handler() -> Response {
    ApiError::NotFound.into_response()
}

fn projection_is_finite(result: &ProjectionResult) -> bool {
    result.scenarios.iter().all(|s| {
        s.fv.value().is_finite()
            && s.total_contributed.value().is_finite()
            && s.interest_earned.value().is_finite()
    }) && result
        .graph_data
        .datasets
        .iter()
        .flat_map(|d| &d.data)
        .chain(&result.total_contributions_data)
        .all(|m| m.value().is_finite())
}

fn withdrawal_is_finite(projection: &WithdrawalProjection) -> bool {
    projection.scenarios.iter().all(|scenario| {
        [
            &scenario.balances.conservative,
            &scenario.balances.moderate,
            &scenario.balances.aggressive,
        ]
        .into_iter()
        .flatten()
        .all(|m| m.value().is_finite())
    })
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}
