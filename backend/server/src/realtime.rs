//! Realtime rooms — one per exchange.
//!
//! The registry maps a room key (the exchange id) to a broadcast sender;
//! join and leave mutate the map under a single mutex. HTTP handlers and
//! the sweeper publish state events through the same registry, so a
//! connected participant sees transitions regardless of who triggered them.
//!
//! A socket is admitted only after the bearer credential has been decoded
//! and the caller verified as a participant of the exchange.

use std::collections::HashMap;
use std::sync::Mutex;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use chrono::Utc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::api::AppState;
use crate::auth::Identity;
use crate::errors::{ApiError, Result};
use crate::events::RoomEvent;
use crate::models::NewMessage;
use crate::{db, messages};

const ROOM_CAPACITY: usize = 64;

/// Registry of live rooms.
#[derive(Debug, Default)]
pub struct Rooms {
    inner: Mutex<HashMap<i64, broadcast::Sender<RoomEvent>>>,
}

impl Rooms {
    pub fn new() -> Self {
        Self::default()
    }

    /// Join a room, creating it on first subscription.
    pub fn subscribe(&self, room: i64) -> broadcast::Receiver<RoomEvent> {
        let mut rooms = self.inner.lock().expect("rooms mutex poisoned");
        rooms
            .entry(room)
            .or_insert_with(|| broadcast::channel(ROOM_CAPACITY).0)
            .subscribe()
    }

    /// Publish an event to a room. A room nobody listens to is dropped from
    /// the registry on the way out.
    pub fn publish(&self, room: i64, event: RoomEvent) {
        let mut rooms = self.inner.lock().expect("rooms mutex poisoned");
        if let Some(sender) = rooms.get(&room) {
            if sender.send(event).is_err() {
                rooms.remove(&room);
            }
        }
    }
}

/// `GET /api/intercambios/:id/ws` — upgrade to the exchange's room.
pub async fn exchange_ws(
    State(state): State<AppState>,
    Identity(user_id): Identity,
    Path(exchange_id): Path<i64>,
    ws: WebSocketUpgrade,
) -> Result<Response> {
    let exchange = db::get_exchange(&state.pool, exchange_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;

    if !exchange.is_participant(user_id) {
        return Err(ApiError::Forbidden(
            "No participas en este intercambio".to_string(),
        ));
    }

    Ok(ws.on_upgrade(move |socket| pump_socket(socket, state, exchange_id, user_id)))
}

/// Bridge one WebSocket to its room: incoming frames become persisted
/// messages, room events become outgoing frames.
async fn pump_socket(mut socket: WebSocket, state: AppState, room: i64, user_id: i64) {
    debug!("user {user_id} joined room {room}");

    let mut events = state.rooms.subscribe(room);

    loop {
        tokio::select! {
            frame = socket.recv() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_incoming(&state, room, user_id, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        warn!("socket error in room {room}: {e}");
                        break;
                    }
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let Ok(json) = serde_json::to_string(&event) else {
                            continue;
                        };
                        if socket.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("room {room} subscriber lagged, {skipped} events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("user {user_id} left room {room}");
}

async fn handle_incoming(state: &AppState, room: i64, user_id: i64, text: &str) {
    let payload = match serde_json::from_str::<NewMessage>(text) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("unparseable frame from user {user_id} in room {room}: {e}");
            return;
        }
    };

    // Persist + rebroadcast. A rejected message (bad shape, lost
    // participancy) is logged and dropped; the socket stays open.
    if let Err(e) =
        messages::append(&state.pool, &state.rooms, room, user_id, payload, Utc::now()).await
    {
        warn!("message from user {user_id} in room {room} rejected: {e}");
    }
}
