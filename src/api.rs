//! REST API for the pallet loading service.
//!
//! Provides HTTP endpoints for planning a load and streaming its progress.
//! Built on axum with permissive CORS so browser frontends can call it directly.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use std::sync::OnceLock;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::config::{ApiConfig, LoaderConfig};
use crate::loader::{
    LoadOptions, LoadResult, LoadSummary, load_pallets, load_pallets_with_progress,
};
use crate::model::{ContainerSection, Pallet, PlacedPallet, ValidationError, validate_padding};

#[derive(Clone)]
struct ApiState {
    loader_config: LoaderConfig,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>pallet-loader API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request structure for the loading endpoints.
///
/// `padding`, `center_loading` and `allow_rotation` override the server defaults when present.
#[derive(Deserialize, ToSchema)]
#[schema(
    example = json!({
        "container": { "height": 1360.0, "width": 245.0 },
        "pallets": [
            { "id": 1, "height": 120.0, "width": 80.0, "allow_rotation": true, "label": "EUR" }
        ],
        "padding": 2.0,
        "center_loading": false
    })
)]
pub struct LoadRequest {
    pub container: ContainerSection,
    #[schema(value_type = Vec<Object>)]
    pub pallets: Vec<Pallet>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub padding: Option<f64>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub center_loading: Option<bool>,
    #[serde(default)]
    #[schema(nullable = true)]
    pub allow_rotation: Option<bool>,
}

#[derive(Debug)]
struct ValidatedLoadRequest {
    section: ContainerSection,
    pallets: Vec<Pallet>,
    options: LoadOptions,
}

impl ValidatedLoadRequest {
    fn pallet_count(&self) -> usize {
        self.pallets.len()
    }

    fn into_parts(self) -> (ContainerSection, Vec<Pallet>, LoadOptions) {
        (self.section, self.pallets, self.options)
    }
}

#[derive(Debug)]
enum LoadRequestValidationError {
    InvalidContainer(ValidationError),
    InvalidPallet(ValidationError),
    InvalidOptions(ValidationError),
}

impl LoadRequest {
    /// Applies request-level overrides on top of the configured defaults.
    fn resolve_options(&self, defaults: LoadOptions) -> LoadOptions {
        LoadOptions {
            padding: self.padding.unwrap_or(defaults.padding),
            center_loading: self.center_loading.unwrap_or(defaults.center_loading),
            allow_rotation: self.allow_rotation.unwrap_or(defaults.allow_rotation),
        }
    }

    fn into_validated(
        self,
        defaults: LoadOptions,
    ) -> Result<ValidatedLoadRequest, LoadRequestValidationError> {
        self.container
            .validate()
            .map_err(LoadRequestValidationError::InvalidContainer)?;

        let options = self.resolve_options(defaults);
        validate_padding(options.padding).map_err(LoadRequestValidationError::InvalidOptions)?;

        for pallet in &self.pallets {
            pallet
                .validate()
                .map_err(LoadRequestValidationError::InvalidPallet)?;
        }

        Ok(ValidatedLoadRequest {
            section: self.container,
            pallets: self.pallets,
            options,
        })
    }
}

/// Response structure with the loading plan.
///
/// # Fields
/// * `placed` - Placed pallets with their attributes, `x`, `y` and `rotated`
/// * `unplaced` - IDs of pallets that did not fit
#[derive(Serialize, ToSchema)]
pub struct LoadResponse {
    #[schema(value_type = Vec<Object>)]
    pub placed: Vec<PlacedPallet>,
    #[schema(value_type = Vec<Object>)]
    pub unplaced: Vec<serde_json::Value>,
    pub is_complete: bool,
    pub summary: LoadSummary,
}

impl LoadResponse {
    pub fn from_load_result(result: LoadResult) -> Self {
        let is_complete = result.is_complete();
        let LoadResult {
            placed,
            unplaced,
            summary,
        } = result;

        Self {
            placed,
            unplaced: unplaced.into_iter().map(|pallet| pallet.id).collect(),
            is_complete,
            summary,
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn validation_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid input data",
        details,
    )
}

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn parse_load_request(
    payload: Result<Json<LoadRequest>, JsonRejection>,
    defaults: LoadOptions,
) -> Result<ValidatedLoadRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    match payload.into_validated(defaults) {
        Ok(validated) => Ok(validated),
        Err(LoadRequestValidationError::InvalidContainer(err)) => {
            Err(container_config_error(err.to_string()))
        }
        Err(LoadRequestValidationError::InvalidPallet(err))
        | Err(LoadRequestValidationError::InvalidOptions(err)) => {
            Err(validation_error(err.to_string()))
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_load, handle_load_stream),
    components(schemas(
        LoadRequest,
        LoadResponse,
        ContainerSection,
        LoadSummary,
        ErrorResponse
    )),
    tags((name = "loading", description = "Endpoints for pallet load planning"))
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // API endpoints
        .route("/load", post(handle_load))
        .route("/load_stream", post(handle_load_stream))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Runs until the listener fails or the process is stopped.
pub async fn start_api_server(config: ApiConfig, loader_config: LoaderConfig) {
    let app = router(ApiState { loader_config });

    let addr = config.socket_addr();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(err) => {
            log::error!("❌ Could not bind API server to {}: {}", addr, err);
            return;
        }
    };

    let display_host = config.display_host().to_string();
    log::info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        log::info!("💡 Local access: http://localhost:{}", config.port());
    }
    log::info!("📦 API Endpoints: POST /load, POST /load_stream");
    log::info!("📑 Documentation: GET /docs, GET /docs/openapi.json");

    if let Err(err) = axum::serve(listener, app).await {
        log::error!("❌ API server terminated with an error: {err}");
    }
}

/// Handler for POST /load endpoint.
///
/// Plans the load of the given pallets into the container section.
#[utoipa::path(
    post,
    path = "/load",
    request_body = LoadRequest,
    responses(
        (status = 200, description = "Loading plan computed", body = LoadResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        ),
        (status = INTERNAL_SERVER_ERROR, description = "Loading task failed", body = ErrorResponse)
    ),
    tag = "loading"
)]
async fn handle_load(
    State(state): State<ApiState>,
    payload: Result<Json<LoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_load_request(payload, state.loader_config.load_options()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    log::info!("📥 New load request: {} pallets", request.pallet_count());
    let (section, pallets, options) = request.into_parts();

    let outcome =
        tokio::task::spawn_blocking(move || load_pallets(section, pallets, options)).await;

    match outcome {
        Ok(Ok(result)) => {
            log::info!(
                "📦 Result: {} placed, {} unplaced ({:.1}% utilization)",
                result.summary.placed,
                result.summary.unplaced,
                result.summary.utilization_percent
            );
            (StatusCode::OK, Json(LoadResponse::from_load_result(result))).into_response()
        }
        Ok(Err(err)) => validation_error(err.to_string()),
        Err(err) => {
            log::error!("❌ Load task failed: {err}");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Loading failed",
                err.to_string(),
            )
        }
    }
}

/// Handler for POST /load_stream endpoint (SSE).
///
/// Streams load events in real-time as Server-Sent Events (text/event-stream).
#[utoipa::path(
    post,
    path = "/load_stream",
    request_body = LoadRequest,
    responses(
        (
            status = 200,
            description = "Streams load events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Invalid request or container configuration",
            body = ErrorResponse
        )
    ),
    tag = "loading"
)]
async fn handle_load_stream(
    State(state): State<ApiState>,
    payload: Result<Json<LoadRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match parse_load_request(payload, state.loader_config.load_options()) {
        Ok(request) => request,
        Err(response) => return response,
    };

    log::info!("📥 New streaming load request: {} pallets", request.pallet_count());
    let (section, pallets, options) = request.into_parts();
    let (tx, rx) = mpsc::channel::<String>(32);

    tokio::task::spawn_blocking(move || {
        let outcome = load_pallets_with_progress(section, pallets, options, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means the client went away.
                let _ = tx.blocking_send(json);
            }
        });
        if let Err(err) = outcome {
            log::warn!("⚠️ Streaming load aborted: {err}");
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|msg| Ok::<_, std::convert::Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
