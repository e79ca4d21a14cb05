//! HTTP surface of the room directory.
//!
//! Thin translation layer: parse and validate the request shape, call the
//! directory, map the error taxonomy onto status codes. Validation
//! failures answer 409 and NotFound answers 404, matching the deployed
//! service this replaces. Room membership is pushed to the owner as a
//! server-sent event stream.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        IntoResponse, Response,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use linkdrop_core::{Peer, PeerId, Room, RoomId};
use serde::Deserialize;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use uuid::Uuid;

use crate::{
    directory::RoomDirectory, error::DirectoryError, store::MemoryStore, system_env::SystemEnv,
};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    /// The directory behind every route.
    pub directory: Arc<RoomDirectory<SystemEnv, MemoryStore>>,
}

/// Build the directory router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/user/{id}", post(register_user).patch(update_user))
        .route("/room", post(create_room).get(room_by_code))
        .route("/room/{id}", axum::routing::delete(delete_room))
        .route("/room/{id}/user", get(stream_room_users))
        .with_state(state)
}

/// `PATCH /user/{id}` body.
#[derive(Debug, Deserialize)]
struct UpdateUserBody {
    room_id: String,
}

/// `POST /room` and `DELETE /room/{id}` body.
#[derive(Debug, Deserialize)]
struct RoomOwnerBody {
    user_id: String,
}

/// `GET /room` query string.
#[derive(Debug, Deserialize)]
struct RoomQuery {
    code: Option<String>,
}

/// Directory error carrier implementing the status mapping.
struct ApiError(DirectoryError);

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            DirectoryError::PeerNotFound(_) | DirectoryError::RoomNotFound => {
                StatusCode::NOT_FOUND
            },
            DirectoryError::Validation(_) | DirectoryError::NotOwner(_) => StatusCode::CONFLICT,
            DirectoryError::Store(err) => {
                tracing::error!(%err, "store failure surfaced to a request");
                StatusCode::INTERNAL_SERVER_ERROR
            },
        };

        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Peer identities on this transport are UUID-shaped; anything else is a
/// malformed request, not a missing record.
fn parse_peer_id(raw: &str) -> Result<PeerId, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|e| ApiError(DirectoryError::Validation(format!("peer id: {e}"))))?;
    Ok(PeerId::from(raw))
}

fn parse_room_id(raw: &str) -> Result<RoomId, ApiError> {
    Uuid::parse_str(raw).map_err(|e| ApiError(DirectoryError::Validation(format!("room id: {e}"))))
}

async fn register_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Peer>, ApiError> {
    let peer_id = parse_peer_id(&id)?;
    Ok(Json(state.directory.register(peer_id)?))
}

async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<Peer>, ApiError> {
    let peer_id = parse_peer_id(&id)?;
    let room_id = parse_room_id(&body.room_id)?;
    Ok(Json(state.directory.assign_room(&peer_id, room_id)?))
}

async fn create_room(
    State(state): State<AppState>,
    Json(body): Json<RoomOwnerBody>,
) -> Result<Json<Room>, ApiError> {
    let owner = parse_peer_id(&body.user_id)?;
    Ok(Json(state.directory.create_room(&owner)?))
}

async fn room_by_code(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
) -> Result<Json<Room>, ApiError> {
    let code = query
        .code
        .ok_or_else(|| ApiError(DirectoryError::Validation("missing code".to_owned())))?;
    Ok(Json(state.directory.room_by_code(&code)?))
}

async fn delete_room(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<RoomOwnerBody>,
) -> Result<Json<Room>, ApiError> {
    let room_id = parse_room_id(&id)?;
    let requester = parse_peer_id(&body.user_id)?;
    Ok(Json(state.directory.delete_room(&room_id, &requester)?))
}

/// Server-push stream of `{ "userId": ... }` events, one per peer that
/// joins the room while the stream is open.
async fn stream_room_users(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let room_id = parse_room_id(&id)?;
    let rx = state.directory.subscribe_members(room_id)?;

    let stream = ReceiverStream::new(rx)
        .map(|peer_id| Event::default().json_data(serde_json::json!({ "userId": peer_id })));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}
