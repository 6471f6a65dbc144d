//! Notification handlers under `/api/notificaciones`.

use axum::extract::{Path, State};
use axum::Json;

use crate::auth::Identity;
use crate::errors::{ApiError, Result};
use crate::models::NotificationRow;
use crate::db;

use super::AppState;

/// `GET /api/notificaciones`
pub async fn listar(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<NotificationRow>>> {
    let rows = db::list_notifications(&state.pool, user).await?;
    Ok(Json(rows))
}

/// `PUT /api/notificaciones/:id/leida`
pub async fn marcar_leida(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<serde_json::Value>> {
    let changed = db::mark_notification_read(&state.pool, id, user).await?;
    if !changed {
        return Err(ApiError::NotFound("Notificación no existe".to_string()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
