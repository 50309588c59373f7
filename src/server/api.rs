//! HTTP API server implementation

use axum::{
    extract::{rejection::JsonRejection, Json, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Router,
};
use futures::{future, stream, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::core::chain::TranslationChain;
use crate::core::errors::{ErrorResponse, TranslationError};
use crate::core::models::TranslationInput;
use crate::server::docs;

/// Path prefix the chain is mounted under
pub const CHAIN_PATH: &str = "/chain";

/// Application state
#[derive(Clone)]
pub struct AppState {
    chain: Arc<TranslationChain>,
}

/// Health check response
#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    service: String,
    version: String,
    model: String,
}

/// Body of `/chain/invoke` and `/chain/stream`
#[derive(Debug, Deserialize, ToSchema)]
pub struct InvokeRequest {
    /// Chain input
    pub input: TranslationInput,
}

/// Per-run metadata
#[derive(Debug, Serialize, ToSchema)]
pub struct RunMetadata {
    /// Identifier of this run
    pub run_id: String,
    /// Always empty; kept for client compatibility
    pub feedback_tokens: Vec<String>,
}

/// Response of `/chain/invoke`
#[derive(Debug, Serialize, ToSchema)]
pub struct InvokeResponse {
    /// Translated text
    pub output: String,
    /// Run metadata
    pub metadata: RunMetadata,
}

/// Body of `/chain/batch`
#[derive(Debug, Deserialize, ToSchema)]
pub struct BatchRequest {
    /// Independent chain inputs
    pub inputs: Vec<TranslationInput>,
}

/// Metadata for a batch
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchMetadata {
    /// One run id per input, in input order
    pub run_ids: Vec<String>,
}

/// Response of `/chain/batch`
#[derive(Debug, Serialize, ToSchema)]
pub struct BatchResponse {
    /// Translations in input order
    pub output: Vec<String>,
    /// Batch metadata
    pub metadata: BatchMetadata,
}

/// Handler failure: a rejected body or a failed chain run
#[derive(Debug)]
pub enum ApiError {
    /// Body missing, malformed, or not matching the schema
    Rejected(JsonRejection),
    /// Chain failed
    Translation(TranslationError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<TranslationError> for ApiError {
    fn from(err: TranslationError) -> Self {
        ApiError::Translation(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected(rejection) => {
                debug!("Rejected request body: {}", rejection.body_text());
                let body = ErrorResponse::new(
                    rejection.body_text(),
                    "invalid_request",
                    "invalid_request_error",
                );
                (rejection.status(), Json(body)).into_response()
            }
            ApiError::Translation(err) => {
                warn!("Translation failed: {}", err);
                err.into_response()
            }
        }
    }
}

fn new_run_id() -> String {
    Uuid::new_v4().to_string()
}

/// Health check handler
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        model: state.chain.model_name().to_string(),
    })
}

/// Run the chain once
#[utoipa::path(
    post,
    path = "/chain/invoke",
    tag = "chain",
    request_body = InvokeRequest,
    responses(
        (status = 200, description = "Translated text", body = InvokeResponse),
        (status = 422, description = "Body does not match the input schema", body = ErrorResponse),
        (status = 500, description = "Provider or authentication failure", body = ErrorResponse),
        (status = 502, description = "Provider unreachable", body = ErrorResponse),
        (status = 504, description = "Provider timed out", body = ErrorResponse)
    )
)]
pub async fn invoke(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Json<InvokeResponse>, ApiError> {
    let Json(request) = payload?;
    debug!("Invoke into {}", request.input.language);

    let output = state.chain.translate(&request.input).await?;

    Ok(Json(InvokeResponse {
        output,
        metadata: RunMetadata {
            run_id: new_run_id(),
            feedback_tokens: Vec::new(),
        },
    }))
}

/// Run the chain on several inputs concurrently
#[utoipa::path(
    post,
    path = "/chain/batch",
    tag = "chain",
    request_body = BatchRequest,
    responses(
        (status = 200, description = "Translations in input order", body = BatchResponse),
        (status = 422, description = "Body does not match the input schema", body = ErrorResponse),
        (status = 500, description = "Provider or authentication failure", body = ErrorResponse)
    )
)]
pub async fn batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchResponse>, ApiError> {
    let Json(request) = payload?;
    debug!("Batch of {} inputs", request.inputs.len());

    let output = state.chain.translate_batch(&request.inputs).await?;
    let run_ids = output.iter().map(|_| new_run_id()).collect();

    Ok(Json(BatchResponse {
        output,
        metadata: BatchMetadata { run_ids },
    }))
}

fn error_event(err: &TranslationError) -> Event {
    let payload = serde_json::json!({
        "status_code": err.status_code().as_u16(),
        "message": err.to_string(),
    });
    Event::default().event("error").data(payload.to_string())
}

/// Run the chain and stream the output as server-sent events
///
/// Emits `metadata`, then one `data` event per chunk, then `end`. A failure
/// emits a single `error` event and closes the stream.
#[utoipa::path(
    post,
    path = "/chain/stream",
    tag = "chain",
    request_body = InvokeRequest,
    responses(
        (status = 200, description = "Event stream of output chunks", content_type = "text/event-stream", body = String),
        (status = 422, description = "Body does not match the input schema", body = ErrorResponse)
    )
)]
pub async fn stream_chain(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<InvokeRequest>, JsonRejection>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let Json(request) = payload?;

    let metadata = serde_json::json!({ "run_id": new_run_id() });
    let head = Event::default().event("metadata").data(metadata.to_string());

    let chunks = state.chain.translate_stream(&request.input).map(|chunk| {
        chunk.map(|text| {
            Event::default()
                .event("data")
                .data(serde_json::Value::String(text).to_string())
        })
    });

    let events = stream::once(future::ready(Ok(head)))
        .chain(chunks)
        .chain(stream::once(future::ready(Ok(Event::default().event("end")))))
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            let event = match item {
                Ok(event) => event,
                Err(err) => {
                    warn!("Stream failed: {}", err);
                    *failed = true;
                    error_event(&err)
                }
            };
            future::ready(Some(Ok::<Event, Infallible>(event)))
        });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

fn schema_json<'s, T: utoipa::ToSchema<'s>>() -> serde_json::Value {
    let (_, schema) = T::schema();
    serde_json::to_value(schema).unwrap_or_default()
}

/// JSON schema of the chain input
#[utoipa::path(
    get,
    path = "/chain/input_schema",
    tag = "chain",
    responses((status = 200, description = "JSON schema of the input object"))
)]
pub async fn input_schema() -> Json<serde_json::Value> {
    Json(schema_json::<TranslationInput>())
}

/// JSON schema of the chain output
#[utoipa::path(
    get,
    path = "/chain/output_schema",
    tag = "chain",
    responses((status = 200, description = "JSON schema of the output value"))
)]
pub async fn output_schema() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "title": "TranslationOutput", "type": "string" }))
}

async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse::new("Not found", "not_found", "invalid_request_error")),
    )
}

/// Configurable fields of the chain; this chain exposes none
#[utoipa::path(
    get,
    path = "/chain/config_schema",
    tag = "chain",
    responses((status = 200, description = "JSON schema of the chain config"))
)]
pub async fn config_schema() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "title": "ChainConfig", "type": "object", "properties": {} }))
}

/// Build the application router for a chain
pub fn router(chain: Arc<TranslationChain>) -> Router {
    let state = Arc::new(AppState { chain });

    let chain_routes = Router::new()
        .route("/invoke", post(invoke))
        .route("/batch", post(batch))
        .route("/stream", post(stream_chain))
        .route("/input_schema", get(input_schema))
        .route("/output_schema", get(output_schema))
        .route("/config_schema", get(config_schema));

    Router::new()
        .route("/", get(health_check))
        .nest(CHAIN_PATH, chain_routes)
        .fallback(not_found)
        .with_state(state)
        .merge(docs::swagger_ui())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server
pub async fn run_server(chain: Arc<TranslationChain>, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(chain.clone());

    let listener = tokio::net::TcpListener::bind((host, port)).await?;
    let addr: SocketAddr = listener.local_addr()?;

    info!("Serving {} on http://{}{}", chain.model_name(), addr, CHAIN_PATH);

    axum::serve(listener, app).await?;

    Ok(())
}
