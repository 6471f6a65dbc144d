//! Axum REST API — shared state, router assembly, health.

use std::sync::Arc;

use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::realtime::{self, Rooms};

pub mod cards;
pub mod intercambios;
pub mod notificaciones;
pub mod solicitudes;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub rooms: Arc<Rooms>,
    pub auth_secret: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Assemble every route under the `/api` prefix.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/solicitudes", post(solicitudes::crear))
        .route("/api/solicitudes/recibidas", get(solicitudes::recibidas))
        .route("/api/solicitudes/enviadas", get(solicitudes::enviadas))
        .route("/api/solicitudes/:id/aceptar", put(solicitudes::aceptar))
        .route("/api/solicitudes/:id/rechazar", put(solicitudes::rechazar))
        .route("/api/solicitudes/:id/cancelar", put(solicitudes::cancelar))
        .route("/api/solicitudes/:id/reofertar", put(solicitudes::reofertar))
        .route("/api/intercambios/en_proceso", get(intercambios::en_proceso))
        .route("/api/intercambios/historial", get(intercambios::historial))
        .route("/api/intercambios/:id", get(intercambios::detalle))
        .route("/api/intercambios/:id/mensajes", get(intercambios::mensajes))
        .route("/api/intercambios/:id/cancelar", put(intercambios::cancelar))
        .route("/api/intercambios/:id/finalizar", put(intercambios::finalizar))
        .route("/api/intercambios/:id/ws", get(realtime::exchange_ws))
        .route("/api/notificaciones", get(notificaciones::listar))
        .route(
            "/api/notificaciones/:id/leida",
            put(notificaciones::marcar_leida),
        )
        .with_state(state)
}
