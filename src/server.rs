//! Web server for the calibration and pointing API

use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::calibration::{calibration_points, CalibrationPoint, FlowState};
use crate::config::Config;
use crate::error::{FrameError, MapperError};
use crate::geometry::Point;
use crate::gesture::GestureMessage;
use crate::layout::Layout;
use crate::quad::{Corner, ScreenQuad};
use crate::session::{FrameReport, PointerSession};

/// Shared application state
pub struct AppState {
    /// Configuration (with saved calibration)
    pub config: Arc<RwLock<Config>>,
    /// Path to save configuration
    config_path: PathBuf,
    /// Live mapper, layout and hover state
    session: Mutex<PointerSession>,
}

impl AppState {
    pub fn new(config: Arc<RwLock<Config>>, config_path: PathBuf) -> Self {
        let session = {
            let cfg = config.read();
            PointerSession::new(
                cfg.build_mapper(),
                Layout::new(cfg.targets.clone()),
                cfg.search.clone(),
            )
        };

        Self {
            config,
            config_path,
            session: Mutex::new(session),
        }
    }

    /// Decode one gesture stream message and run it through the session
    pub fn process_message(&self, text: &str) -> Result<Option<FrameReport>, FrameError> {
        match GestureMessage::from_json(text)? {
            GestureMessage::Keepalive => Ok(None),
            GestureMessage::Frame(frame) => Ok(Some(self.session.lock().handle_frame(&frame))),
        }
    }

    /// Save the live calibration to the configuration file
    pub fn save_config(&self) -> Result<()> {
        let mut config = self.config.write();
        config.store_calibration(&self.session.lock().mapper);
        config.save(&self.config_path)
    }
}

/// Build the API router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/calibration", get(get_calibration))
        .route("/api/calibration", post(set_calibration))
        .route("/api/calibration/source/:corner", post(set_source_corner))
        .route("/api/calibration/target/:corner", post(set_target_corner))
        .route("/api/calibration/viewport", post(set_viewport))
        .route("/api/calibration/reset", post(reset_calibration))
        .route("/api/calibration/save", post(save_calibration))
        .route("/api/calibration/flow/begin", post(begin_flow))
        .route("/api/calibration/flow/back", post(flow_back))
        .route("/api/map", post(map_point))
        .route("/api/frame", post(post_frame))
        .route("/api/gestures", get(gesture_socket))
        .route("/api/info", get(get_info))
        .layer(cors)
        .with_state(state)
}

/// Run the web server
pub async fn run_server(addr: &str, state: Arc<AppState>) -> Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Web server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn mapper_error_response(e: MapperError) -> Response {
    let status = match e {
        MapperError::InvalidCalibration => StatusCode::CONFLICT,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, e.to_string()).into_response()
}

/// API response for calibration data
#[derive(Serialize)]
struct CalibrationResponse {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<MapperError>,
    source: ScreenQuad,
    target: ScreenQuad,
    points: Vec<CalibrationPoint>,
    flow: FlowState,
}

fn calibration_response(session: &PointerSession) -> CalibrationResponse {
    let mapper = &session.mapper;
    CalibrationResponse {
        valid: mapper.is_valid(),
        error: mapper.calibration_error(),
        source: *mapper.source(),
        target: *mapper.target(),
        points: calibration_points(mapper),
        flow: session.flow.state(),
    }
}

/// Get current calibration
async fn get_calibration(State(state): State<Arc<AppState>>) -> Json<CalibrationResponse> {
    Json(calibration_response(&state.session.lock()))
}

/// Request to replace the calibration
#[derive(Deserialize)]
struct SetCalibrationRequest {
    source: Vec<Point>,
    #[serde(default)]
    target: Option<Vec<Point>>,
}

/// Set full calibration data
async fn set_calibration(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SetCalibrationRequest>,
) -> Response {
    let mut session = state.session.lock();
    let target = req
        .target
        .unwrap_or_else(|| session.mapper.target().to_array().to_vec());

    match session.mapper.set_calibration_points(&req.source, &target) {
        Ok(()) => Json(calibration_response(&session)).into_response(),
        Err(e) => mapper_error_response(e),
    }
}

async fn set_source_corner(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(point): Json<Point>,
) -> Response {
    update_corner(&state, &name, point, true)
}

async fn set_target_corner(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Json(point): Json<Point>,
) -> Response {
    update_corner(&state, &name, point, false)
}

fn update_corner(state: &AppState, name: &str, point: Point, source: bool) -> Response {
    let Some(corner) = Corner::parse(name) else {
        return (StatusCode::NOT_FOUND, format!("Unknown corner: {}", name)).into_response();
    };

    let mut session = state.session.lock();
    let result = if source {
        session.mapper.set_source_corner(corner, point)
    } else {
        session.mapper.set_target_corner(corner, point)
    };

    match result {
        Ok(()) => Json(calibration_response(&session)).into_response(),
        Err(e) => mapper_error_response(e),
    }
}

#[derive(Deserialize)]
struct ViewportRequest {
    width: f64,
    height: f64,
}

/// Point the target quad at the whole viewport
async fn set_viewport(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ViewportRequest>,
) -> Response {
    {
        let mut config = state.config.write();
        config.viewport.width = req.width;
        config.viewport.height = req.height;
    }

    let mut session = state.session.lock();
    match session
        .mapper
        .auto_initialize_target_from_viewport(req.width, req.height)
    {
        Ok(()) => Json(calibration_response(&session)).into_response(),
        Err(e) => mapper_error_response(e),
    }
}

/// Reset calibration to the saved configuration
async fn reset_calibration(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mapper = state.config.read().build_mapper();
    let mut session = state.session.lock();
    session.mapper = mapper;
    Json(calibration_response(&session))
}

/// Save calibration to file
async fn save_calibration(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.save_config() {
        Ok(_) => (StatusCode::OK, "Saved").into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn begin_flow(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut session = state.session.lock();
    let PointerSession { flow, mapper, .. } = &mut *session;
    flow.begin(mapper);
    Json(calibration_response(&session))
}

async fn flow_back(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut session = state.session.lock();
    let PointerSession { flow, mapper, .. } = &mut *session;
    flow.back(mapper);
    Json(calibration_response(&session))
}

#[derive(Serialize)]
struct MapResponse {
    x: f64,
    y: f64,
}

/// Map a raw point to viewport coordinates
async fn map_point(State(state): State<Arc<AppState>>, Json(point): Json<Point>) -> Response {
    match state.session.lock().mapper.map_point(point) {
        Ok(p) => Json(MapResponse { x: p.x, y: p.y }).into_response(),
        Err(e) => mapper_error_response(e),
    }
}

/// Handle one gesture frame posted as raw JSON
async fn post_frame(State(state): State<Arc<AppState>>, body: String) -> Response {
    match state.process_message(&body) {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => Json(serde_json::json!({ "type": "pong" })).into_response(),
        Err(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
    }
}

/// Gesture stream: every text message is a frame, answered with a report
async fn gesture_socket(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_gesture_socket(socket, state))
}

async fn handle_gesture_socket(socket: WebSocket, state: Arc<AppState>) {
    tracing::info!("Gesture stream connected");
    let (mut sender, mut receiver) = socket.split();

    while let Some(message) = receiver.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!("Gesture stream error: {}", e);
                break;
            }
        };

        let Some(reply) = socket_reply(&state, &text) else {
            continue;
        };
        if sender.send(Message::Text(reply)).await.is_err() {
            break;
        }
    }

    tracing::info!("Gesture stream disconnected");
}

/// Reply for one gesture stream message; malformed frames get none
fn socket_reply(state: &AppState, text: &str) -> Option<String> {
    let reply = match state.process_message(text) {
        Ok(Some(report)) => serde_json::to_string(&report),
        Ok(None) => Ok(r#"{"type":"pong"}"#.to_string()),
        Err(e) => {
            tracing::debug!("Dropping gesture frame: {}", e);
            return None;
        }
    };

    match reply {
        Ok(json) => Some(json),
        Err(e) => {
            tracing::error!("Failed to encode frame report: {}", e);
            None
        }
    }
}

/// System information response
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    viewport_width: f64,
    viewport_height: f64,
    calibration_valid: bool,
    targets: usize,
}

/// Get system information
async fn get_info(State(state): State<Arc<AppState>>) -> Json<InfoResponse> {
    let (viewport_width, viewport_height) = {
        let config = state.config.read();
        (config.viewport.width, config.viewport.height)
    };
    let session = state.session.lock();

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        viewport_width,
        viewport_height,
        calibration_valid: session.mapper.is_valid(),
        targets: session.layout.regions().len(),
    })
}
