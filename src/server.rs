//! HTTP front end: axum router and request handlers.
//!
//! The server runs on the tokio runtime while the device loop runs on a
//! plain `std::thread`. Handlers parse their query into an [`HttpAction`],
//! queue it with a `oneshot` reply channel, and await the device's answer.
//!
//! Query keys match case-insensitively, and every route except `/` needs a
//! valid `userid`.

use crate::device::{HttpAction, StatusReport};
use crate::protocol::DisplayRequest;
use crate::runtime::{DeviceEvent, DeviceRequest};
use crate::sequencer::Phase;
use crate::{Color, Error};
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use std::collections::HashMap;
use std::sync::mpsc::Sender;
use tokio::sync::oneshot;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub const NOT_FOUND_TEXT: &str = "Oops. Looks like you entered a bad URL.";

// ── App State ──────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    /// Channel into the device loop
    pub events: Sender<DeviceEvent>,
}

// ── OpenAPI Documentation ──────────────────────────────────────────

#[derive(OpenApi)]
#[openapi(
    paths(
        get_root,
        get_status,
        get_status_json,
        get_preset,
        get_off,
        get_color,
        get_message,
    ),
    components(schemas(StatusReport, Phase)),
    tags(
        (name = "display", description = "LED strip and LCD control"),
        (name = "system", description = "Device status"),
    ),
    info(
        title = "Status Light API",
        version = env!("CARGO_PKG_VERSION"),
        description = "HTTP API for a networked desk status light"
    )
)]
pub struct ApiDoc;

// ── Query parameters ───────────────────────────────────────────────

/// Query parameters with lowercased keys. Empty values read as absent.
struct Params(HashMap<String, String>);

impl Params {
    fn new(raw: HashMap<String, String>) -> Self {
        Self(
            raw.into_iter()
                .map(|(key, value)| (key.to_ascii_lowercase(), value))
                .collect(),
        )
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(&key.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }
}

/// Colors with a route of their own under `/Display/`.
fn preset(name: &str) -> Option<Color> {
    Some(match name {
        "Red" => Color::new(128, 0, 0),
        "Green" => Color::new(0, 128, 0),
        "Blue" => Color::new(0, 0, 128),
        "Yellow" => Color::new(64, 32, 0),
        "Purple" => Color::new(64, 0, 32),
        "White" => Color::new(32, 32, 32),
        _ => return None,
    })
}

// ── Router ─────────────────────────────────────────────────────────

/// Build the axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(
            SwaggerUi::new("/docs")
                .url("/api-docs/openapi.json", ApiDoc::openapi())
                .config(utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"]).validator_url("none")),
        )
        .route("/", get(get_root))
        .route("/Display", get(get_status))
        .route("/Display/Json", get(get_status_json))
        .route("/Display/Off", get(get_off))
        .route("/Display/Color", get(get_color))
        .route("/Display/Message", get(get_message))
        .route("/Display/{color}", get(get_preset))
        .fallback(not_found)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Dispatch ───────────────────────────────────────────────────────

type ApiError = (StatusCode, String);

fn error_response(err: Error) -> ApiError {
    let status = match err {
        Error::UnauthorizedCommand => StatusCode::UNAUTHORIZED,
        Error::MalformedCommand(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

fn device_gone() -> ApiError {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "Device loop is not running".to_string(),
    )
}

async fn send(state: &AppState, params: &Params, action: HttpAction) -> Result<StatusReport, ApiError> {
    let (reply, rx) = oneshot::channel();
    state
        .events
        .send(DeviceEvent::Request(DeviceRequest {
            user_id: params.get("userid").map(str::to_string),
            action,
            reply,
        }))
        .map_err(|_| device_gone())?;

    rx.await.map_err(|_| device_gone())?.map_err(error_response)
}

/// Run `action` on the device. A request whose parameters did not parse is
/// still checked for a valid user id first, so strangers only ever see 401.
async fn dispatch(
    state: &AppState,
    params: &Params,
    action: crate::Result<HttpAction>,
) -> Result<StatusReport, ApiError> {
    match action {
        Ok(action) => send(state, params, action).await,
        Err(err) => {
            send(state, params, HttpAction::Status).await?;
            tracing::warn!("Rejected request: {}", err);
            Err(error_response(err))
        }
    }
}

async fn dispatch_text(
    state: &AppState,
    params: &Params,
    action: crate::Result<HttpAction>,
) -> Result<String, ApiError> {
    dispatch(state, params, action).await.map(|report| report.to_string())
}

// ── Handlers ───────────────────────────────────────────────────────

/// GET /: banner
#[utoipa::path(
    get,
    path = "/",
    tag = "system",
    responses((status = 200, description = "Name and version", body = String))
)]
async fn get_root() -> String {
    format!("Status Light v{}", env!("CARGO_PKG_VERSION"))
}

/// GET /Display: current display status as text
#[utoipa::path(
    get,
    path = "/Display",
    tag = "system",
    params(("userid" = String, Query, description = "One of the configured User Ids")),
    responses(
        (status = 200, description = "Display status line", body = String),
        (status = 401, description = "Missing or unknown User Id")
    )
)]
async fn get_status(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    dispatch_text(&state, &Params::new(raw), Ok(HttpAction::Status)).await
}

/// GET /Display/Json: current display status as JSON
#[utoipa::path(
    get,
    path = "/Display/Json",
    tag = "system",
    params(("userid" = String, Query, description = "One of the configured User Ids")),
    responses(
        (status = 200, description = "Display status", body = StatusReport),
        (status = 401, description = "Missing or unknown User Id")
    )
)]
async fn get_status_json(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<Json<StatusReport>, ApiError> {
    dispatch(&state, &Params::new(raw), Ok(HttpAction::Status))
        .await
        .map(Json)
}

/// GET /Display/{color}: show a preset color
#[utoipa::path(
    get,
    path = "/Display/{color}",
    tag = "display",
    params(
        ("color" = String, Path, description = "Red, Green, Blue, Yellow, Purple or White"),
        ("userid" = String, Query, description = "One of the configured User Ids"),
        ("flashtime" = Option<i32>, Query, description = "Flash ticks (100 ms); negative flashes forever"),
        ("displaytime" = Option<i32>, Query, description = "Hold ticks (100 ms); negative holds forever"),
    ),
    responses(
        (status = 200, description = "Display status line", body = String),
        (status = 400, description = "Malformed parameter"),
        (status = 401, description = "Missing or unknown User Id"),
        (status = 404, description = "Unknown color")
    )
)]
async fn get_preset(
    State(state): State<AppState>,
    Path(color): Path<String>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let color = preset(&color).ok_or_else(not_found_error)?;
    let params = Params::new(raw);
    let action = DisplayRequest::with_timing(color, |key| params.get(key)).map(HttpAction::Display);
    dispatch_text(&state, &params, action).await
}

/// GET /Display/Off: turn the strip off
#[utoipa::path(
    get,
    path = "/Display/Off",
    tag = "display",
    params(("userid" = String, Query, description = "One of the configured User Ids")),
    responses(
        (status = 200, description = "Display status line", body = String),
        (status = 401, description = "Missing or unknown User Id")
    )
)]
async fn get_off(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    dispatch_text(&state, &Params::new(raw), Ok(HttpAction::Off)).await
}

/// GET /Display/Color: show a custom color
#[utoipa::path(
    get,
    path = "/Display/Color",
    tag = "display",
    params(
        ("userid" = String, Query, description = "One of the configured User Ids"),
        ("red" = Option<u8>, Query, description = "0-255, default 0"),
        ("green" = Option<u8>, Query, description = "0-255, default 0"),
        ("blue" = Option<u8>, Query, description = "0-255, default 0"),
        ("flashtime" = Option<i32>, Query, description = "Flash ticks (100 ms); negative flashes forever"),
        ("displaytime" = Option<i32>, Query, description = "Hold ticks (100 ms); negative holds forever"),
    ),
    responses(
        (status = 200, description = "Display status line", body = String),
        (status = 400, description = "Malformed parameter"),
        (status = 401, description = "Missing or unknown User Id")
    )
)]
async fn get_color(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let params = Params::new(raw);
    let action = DisplayRequest::from_fields(|key| params.get(key)).map(HttpAction::Display);
    dispatch_text(&state, &params, action).await
}

/// GET /Display/Message: set or clear the LCD message
#[utoipa::path(
    get,
    path = "/Display/Message",
    tag = "display",
    params(
        ("userid" = String, Query, description = "One of the configured User Ids"),
        ("message" = Option<String>, Query, description = "Message text; empty clears the LCD"),
    ),
    responses(
        (status = 200, description = "Display status line", body = String),
        (status = 401, description = "Missing or unknown User Id")
    )
)]
async fn get_message(
    State(state): State<AppState>,
    Query(raw): Query<HashMap<String, String>>,
) -> Result<String, ApiError> {
    let params = Params::new(raw);
    let text = params.get("message").unwrap_or_default().to_string();
    dispatch_text(&state, &params, Ok(HttpAction::Message(text))).await
}

fn not_found_error() -> ApiError {
    (StatusCode::NOT_FOUND, NOT_FOUND_TEXT.to_string())
}

async fn not_found() -> ApiError {
    not_found_error()
}
