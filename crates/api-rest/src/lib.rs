//! # API REST
//!
//! REST surface over the PAMA decision-support core.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON serialisation, CORS, status codes)
//!
//! Sessions live in memory behind a `tokio::sync::Mutex`, so events for one session are
//! delivered one at a time. Trigger keys contain a `/` and are percent-encoded in paths, for
//! example `/hooks/pama%2Forder-select/sessions`.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use fhir::{Action, MessageData, SessionContext, Suggestion};
use pama_core::{
    apply_suggestion, CdsError, CdsService, MessageOutcome, OrderCommand, Rating, SelectOption,
    Session, SessionState, SourceHandle, VocabularyKind, WidgetState,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// An open session plus the widget state its context is generated from.
struct SessionEntry {
    session: Session,
    widget: WidgetState,
}

/// Application state for the REST API server
///
/// Holds the decision-support service built at startup and the sessions opened through
/// `/hooks/{trigger}/sessions`.
#[derive(Clone)]
pub struct AppState {
    service: Arc<CdsService>,
    sessions: Arc<Mutex<HashMap<Uuid, SessionEntry>>>,
}

impl AppState {
    pub fn new(service: CdsService) -> Self {
        Self {
            service: Arc::new(service),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

// ============================================================================
// Request and response bodies
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OptionsRes {
    #[schema(value_type = Vec<Object>)]
    pub options: Vec<SelectOption>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenSessionReq {
    #[schema(value_type = Object)]
    pub state: WidgetState,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TriggerReq {
    pub tag: String,
    /// Replaces the stored widget state before the trigger fires.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub state: Option<WidgetState>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionRes {
    #[schema(value_type = String)]
    pub id: Uuid,
    pub trigger: String,
    #[schema(value_type = String)]
    pub state: SessionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub context: Option<SessionContext>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SystemActionsReq {
    #[schema(value_type = Vec<Object>)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemActionsRes {
    #[schema(value_type = String)]
    pub state: SessionState,
    /// Whether the session was active and handled the batch.
    pub handled: bool,
    #[schema(value_type = Vec<Object>)]
    pub commands: Vec<OrderCommand>,
    /// Symbol for the last rating the commands apply, when that rating has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_symbol: Option<&'static str>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MessageReq {
    #[schema(value_type = Object)]
    pub message: MessageData,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageRes {
    #[schema(value_type = String)]
    pub state: SessionState,
    #[schema(value_type = String)]
    pub outcome: MessageOutcome,
    /// Whether the message source was closed.
    pub closed: bool,
    #[schema(value_type = Vec<Object>)]
    pub commands: Vec<OrderCommand>,
    /// Symbol for the last rating the commands apply, when that rating has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_symbol: Option<&'static str>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SuggestionReq {
    #[schema(value_type = Object)]
    pub suggestion: Suggestion,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SuggestionRes {
    pub applied: usize,
    #[schema(value_type = Vec<Object>)]
    pub commands: Vec<OrderCommand>,
    /// Symbol for the last rating the commands apply, when that rating has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating_symbol: Option<&'static str>,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        default_options,
        search,
        open_session,
        explicit_trigger,
        system_actions,
        post_message,
        close_session,
        suggestion,
    ),
    components(schemas(
        HealthRes,
        OptionsRes,
        SearchParams,
        OpenSessionReq,
        TriggerReq,
        SessionRes,
        SystemActionsReq,
        SystemActionsRes,
        MessageReq,
        MessageRes,
        SuggestionReq,
        SuggestionRes,
    ))
)]
pub struct ApiDoc;

/// Build the REST router with Swagger UI mounted at `/swagger-ui`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/vocabularies/:kind/options", get(default_options))
        .route("/vocabularies/:kind/search", get(search))
        .route("/hooks/:trigger/sessions", post(open_session))
        .route("/sessions/:id", axum::routing::delete(close_session))
        .route("/sessions/:id/trigger", post(explicit_trigger))
        .route("/sessions/:id/system-actions", post(system_actions))
        .route("/sessions/:id/messages", post(post_message))
        .route("/suggestions", post(suggestion))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Source handle for a REST-delivered message: records the close so the response can report it.
#[derive(Default)]
struct RecordingSource {
    closed: bool,
}

impl SourceHandle for RecordingSource {
    fn close(&mut self) {
        self.closed = true;
    }
}

fn error_response(context: &str, err: CdsError) -> ApiError {
    let status = match &err {
        CdsError::MalformedUpdate { .. }
        | CdsError::DuplicateReason(_)
        | CdsError::Fhir(_)
        | CdsError::Text(_) => StatusCode::UNPROCESSABLE_ENTITY,
        CdsError::UnknownTrigger(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("{context} error: {:?}", err);
        return (status, "Internal error".into());
    }
    tracing::warn!("{context} rejected: {}", err);
    (status, err.to_string())
}

/// Symbol of the last rating applied by `commands`.
fn rating_symbol(commands: &[OrderCommand]) -> Option<&'static str> {
    commands
        .iter()
        .rev()
        .find_map(OrderCommand::rating)
        .and_then(Rating::symbol)
}

fn session_not_found(id: Uuid) -> ApiError {
    tracing::warn!("Unknown session: {id}");
    (StatusCode::NOT_FOUND, format!("no session {id}"))
}

fn parse_kind(kind: &str) -> Result<VocabularyKind, ApiError> {
    kind.parse().map_err(|e: CdsError| {
        tracing::warn!("Unknown vocabulary: {kind}");
        (StatusCode::NOT_FOUND, e.to_string())
    })
}

// ============================================================================
// Handlers
// ============================================================================

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "PAMA REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/vocabularies/{kind}/options",
    params(("kind" = String, Path, description = "`procedures` or `reasons`")),
    responses(
        (status = 200, description = "Options listed before any typing", body = OptionsRes),
        (status = 404, description = "Unknown vocabulary")
    )
)]
/// The first entries of a vocabulary.
#[axum::debug_handler]
async fn default_options(
    State(state): State<AppState>,
    AxumPath(kind): AxumPath<String>,
) -> ApiResult<OptionsRes> {
    let kind = parse_kind(&kind)?;
    Ok(Json(OptionsRes {
        options: state.service.default_options(kind),
    }))
}

#[utoipa::path(
    get,
    path = "/vocabularies/{kind}/search",
    params(
        ("kind" = String, Path, description = "`procedures` or `reasons`"),
        ("q" = String, Query, description = "Search query")
    ),
    responses(
        (status = 200, description = "Ranked options", body = OptionsRes),
        (status = 404, description = "Unknown vocabulary")
    )
)]
/// Ranked search over a vocabulary.
///
/// Each request is one settled query, so no debounce is applied here.
#[axum::debug_handler]
async fn search(
    State(state): State<AppState>,
    AxumPath(kind): AxumPath<String>,
    Query(params): Query<SearchParams>,
) -> ApiResult<OptionsRes> {
    let kind = parse_kind(&kind)?;
    Ok(Json(OptionsRes {
        options: state.service.search(kind, &params.q),
    }))
}

#[utoipa::path(
    post,
    path = "/hooks/{trigger}/sessions",
    params(("trigger" = String, Path, description = "Percent-encoded trigger point")),
    request_body = OpenSessionReq,
    responses(
        (status = 200, description = "Session opened", body = SessionRes),
        (status = 404, description = "Unknown trigger"),
        (status = 422, description = "Invalid widget state")
    )
)]
/// Open a session for a trigger point and request its context.
///
/// An immediately-gated trigger returns context and an active session; an explicitly-gated one
/// returns a session awaiting its trigger and no context.
#[axum::debug_handler]
async fn open_session(
    State(state): State<AppState>,
    AxumPath(trigger): AxumPath<String>,
    Json(req): Json<OpenSessionReq>,
) -> ApiResult<SessionRes> {
    let mut session = state
        .service
        .open_session(&trigger)
        .map_err(|e| error_response("Open session", e))?;
    let context = session.request_context(&req.state);

    let res = SessionRes {
        id: session.id(),
        trigger: session.trigger().to_owned(),
        state: session.state(),
        context,
    };

    state.sessions.lock().await.insert(
        session.id(),
        SessionEntry {
            session,
            widget: req.state,
        },
    );
    Ok(Json(res))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/trigger",
    params(("id" = String, Path, description = "Session id")),
    request_body = TriggerReq,
    responses(
        (status = 200, description = "Trigger delivered", body = SessionRes),
        (status = 404, description = "Unknown session")
    )
)]
/// Fire an explicit trigger on a session.
#[axum::debug_handler]
async fn explicit_trigger(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<TriggerReq>,
) -> ApiResult<SessionRes> {
    let mut sessions = state.sessions.lock().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;

    if let Some(widget) = req.state {
        entry.widget = widget;
    }
    let context = entry.session.explicit_trigger(&req.tag, &entry.widget);

    Ok(Json(SessionRes {
        id,
        trigger: entry.session.trigger().to_owned(),
        state: entry.session.state(),
        context,
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/system-actions",
    params(("id" = String, Path, description = "Session id")),
    request_body = SystemActionsReq,
    responses(
        (status = 200, description = "Commands produced by the batch", body = SystemActionsRes),
        (status = 404, description = "Unknown session")
    )
)]
/// Deliver a system-action batch to a session.
#[axum::debug_handler]
async fn system_actions(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<SystemActionsReq>,
) -> ApiResult<SystemActionsRes> {
    let mut sessions = state.sessions.lock().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;

    let mut commands: Vec<OrderCommand> = Vec::new();
    let handled = entry.session.on_system_actions(&req.actions, &mut commands);

    Ok(Json(SystemActionsRes {
        state: entry.session.state(),
        handled,
        rating_symbol: rating_symbol(&commands),
        commands,
    }))
}

#[utoipa::path(
    post,
    path = "/sessions/{id}/messages",
    params(("id" = String, Path, description = "Session id")),
    request_body = MessageReq,
    responses(
        (status = 200, description = "Commands produced by the message", body = MessageRes),
        (status = 404, description = "Unknown session"),
        (status = 422, description = "Malformed update payload")
    )
)]
/// Deliver a session message.
#[axum::debug_handler]
async fn post_message(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
    Json(req): Json<MessageReq>,
) -> ApiResult<MessageRes> {
    let mut sessions = state.sessions.lock().await;
    let entry = sessions.get_mut(&id).ok_or_else(|| session_not_found(id))?;

    let mut source = RecordingSource::default();
    let mut commands: Vec<OrderCommand> = Vec::new();
    let outcome = entry
        .session
        .on_message(&req.message, &mut source, &mut commands)
        .map_err(|e| error_response("Session message", e))?;

    let state = entry.session.state();
    if outcome == MessageOutcome::Closed {
        sessions.remove(&id);
        tracing::info!("Session {id} finished");
    }

    Ok(Json(MessageRes {
        state,
        outcome,
        closed: source.closed,
        rating_symbol: rating_symbol(&commands),
        commands,
    }))
}

#[utoipa::path(
    delete,
    path = "/sessions/{id}",
    params(("id" = String, Path, description = "Session id")),
    responses(
        (status = 200, description = "Session closed and forgotten", body = SessionRes),
        (status = 404, description = "Unknown session")
    )
)]
/// Close a session locally and drop it.
#[axum::debug_handler]
async fn close_session(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<Uuid>,
) -> ApiResult<SessionRes> {
    let mut entry = state
        .sessions
        .lock()
        .await
        .remove(&id)
        .ok_or_else(|| session_not_found(id))?;
    entry.session.close();

    Ok(Json(SessionRes {
        id,
        trigger: entry.session.trigger().to_owned(),
        state: entry.session.state(),
        context: None,
    }))
}

#[utoipa::path(
    post,
    path = "/suggestions",
    request_body = SuggestionReq,
    responses(
        (status = 200, description = "Commands produced by the suggestion", body = SuggestionRes),
        (status = 422, description = "Malformed update payload")
    )
)]
/// Apply an accepted card suggestion. All of its updates apply, or none do.
#[axum::debug_handler]
async fn suggestion(
    State(_state): State<AppState>,
    Json(req): Json<SuggestionReq>,
) -> ApiResult<SuggestionRes> {
    let mut commands: Vec<OrderCommand> = Vec::new();
    let applied = apply_suggestion(&req.suggestion, &mut commands)
        .map_err(|e| error_response("Apply suggestion", e))?;

    Ok(Json(SuggestionRes {
        applied,
        rating_symbol: rating_symbol(&commands),
        commands,
    }))
}
