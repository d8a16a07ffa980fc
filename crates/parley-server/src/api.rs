use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use parley_shared::constants::PUSH_PATH;
use parley_shared::{ContentType, Message, MessageId, NewMessage, Role};
use parley_store::MessageStore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::AuthUser;
use crate::completion::Completer;
use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::hub::{Broadcaster, ConnectionRegistry};
use crate::service::ChatService;
use crate::users::UserDirectory;
use crate::ws;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ChatService>,
    pub registry: Arc<ConnectionRegistry>,
    pub broadcaster: Broadcaster,
    pub users: Arc<dyn UserDirectory>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        store: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        completer: Arc<dyn Completer>,
    ) -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let broadcaster = Broadcaster::new(registry.clone());
        let service = Arc::new(ChatService::new(store, broadcaster.clone(), completer));
        Self {
            service,
            registry,
            broadcaster,
            users,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route(PUSH_PATH, get(ws::push_handler))
        .route("/api/chat", post(chat))
        .route("/api/chat/history", get(chat_history))
        .route("/api/messages", post(create_message))
        .route("/api/messages/search", get(search_messages))
        .route("/api/messages/range", get(messages_in_range))
        .route("/api/messages/tags", get(messages_by_tags))
        .route("/api/messages/favorites", get(favorite_messages))
        .route(
            "/api/messages/:id",
            get(get_message).patch(edit_message).delete(delete_message),
        )
        .route("/api/messages/:id/favorite", post(toggle_favorite))
        .route("/api/messages/:id/reactions", post(add_reaction))
        .route(
            "/api/messages/:id/reactions/:kind",
            axum::routing::delete(remove_reaction),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ChatRequest {
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    response: String,
    messages: [Message; 2],
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateMessageRequest {
    content: String,
    #[serde(default)]
    role: Role,
    #[serde(default)]
    content_type: ContentType,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    metadata: Map<String, Value>,
}

#[derive(Deserialize)]
struct EditRequest {
    content: String,
}

#[derive(Deserialize)]
struct ReactionRequest {
    kind: String,
}

#[derive(Serialize)]
struct DeleteResponse {
    id: MessageId,
    deleted: bool,
}

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Deserialize)]
struct RangeParams {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TagsParams {
    #[serde(default)]
    tags: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn chat(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
    let exchange = state.service.chat(user.id(), req.message).await?;
    Ok(Json(ChatResponse {
        response: exchange.response,
        messages: [exchange.user_message, exchange.assistant_message],
    }))
}

async fn chat_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.history(user.id()).await?))
}

async fn create_message(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateMessageRequest>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let new = NewMessage::new(user.id(), req.role, req.content)
        .with_content_type(req.content_type)
        .with_tags(req.tags)
        .with_metadata(req.metadata);

    let message = state.service.create(new).await?;
    info!(user = %user.id(), message = %message.id, "Message created via API");
    Ok((StatusCode::CREATED, Json(message)))
}

async fn get_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<MessageId>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.service.get(user.id(), id).await?))
}

async fn edit_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<MessageId>,
    Json(req): Json<EditRequest>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.service.edit(user.id(), id, req.content).await?))
}

async fn delete_message(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<MessageId>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let id = state.service.delete(user.id(), id).await?;
    Ok(Json(DeleteResponse { id, deleted: true }))
}

async fn toggle_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<MessageId>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.service.toggle_favorite(user.id(), id).await?))
}

async fn add_reaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<MessageId>,
    Json(req): Json<ReactionRequest>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.service.add_reaction(user.id(), id, &req.kind).await?))
}

async fn remove_reaction(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, kind)): Path<(MessageId, String)>,
) -> Result<Json<Message>, ApiError> {
    Ok(Json(state.service.remove_reaction(user.id(), id, &kind).await?))
}

async fn search_messages(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.search(user.id(), &params.q).await?))
}

async fn messages_in_range(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<RangeParams>,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(
        state
            .service
            .by_date_range(user.id(), params.start, params.end)
            .await?,
    ))
}

async fn messages_by_tags(
    State(state): State<AppState>,
    user: AuthUser,
    Query(params): Query<TagsParams>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let tags: Vec<String> = params
        .tags
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect();
    Ok(Json(state.service.by_tags(user.id(), &tags).await?))
}

async fn favorite_messages(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Vec<Message>>, ApiError> {
    Ok(Json(state.service.favorites(user.id()).await?))
}

/// Bind and serve until the listener fails.
pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "HTTP API listening");
    axum::serve(listener, app).await?;
    Ok(())
}
