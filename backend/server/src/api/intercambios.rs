//! Exchange handlers under `/api/intercambios`.
//!
//! Every read path reconciles the confirmation deadline before serializing,
//! so a lapsed window is acted on no later than the next fetch.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use trueque_protocol::ConfirmationStatus;

use crate::api::cards::{self, ExchangeCard, ExchangeDetail};
use crate::auth::Identity;
use crate::errors::{ApiError, Result};
use crate::models::{ExchangeRow, MessageRow};
use crate::{db, exchange, messages};

use super::AppState;

#[derive(Serialize)]
pub struct ExchangeActionResponse {
    #[serde(flatten)]
    pub detalle: ExchangeDetail,
    pub msg: &'static str,
}

async fn load_participant_exchange(
    state: &AppState,
    id: i64,
    user: i64,
) -> Result<ExchangeRow> {
    let row = db::get_exchange(&state.pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;
    if !row.is_participant(user) {
        return Err(ApiError::Forbidden(
            "No participas en este intercambio".to_string(),
        ));
    }
    Ok(row)
}

/// `GET /api/intercambios/en_proceso`
///
/// A row penalized during this very read is no longer in process and is
/// dropped from the listing.
pub async fn en_proceso(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<ExchangeCard>>> {
    let now = Utc::now();
    let rows = db::list_pending_exchanges(&state.pool, user).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let row = exchange::reconcile(&state.pool, &state.rooms, row, now).await;
        if row.status()? == ConfirmationStatus::Pending {
            out.push(cards::exchange_card(&state.pool, &row, user).await?);
        }
    }
    Ok(Json(out))
}

/// `GET /api/intercambios/historial`
pub async fn historial(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<ExchangeCard>>> {
    let rows = db::list_accepted_exchanges(&state.pool, user).await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(cards::exchange_card(&state.pool, &row, user).await?);
    }
    Ok(Json(out))
}

/// `GET /api/intercambios/:id`
pub async fn detalle(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<ExchangeDetail>> {
    let row = load_participant_exchange(&state, id, user).await?;
    let row = exchange::reconcile(&state.pool, &state.rooms, row, Utc::now()).await;
    Ok(Json(cards::exchange_detail(&state.pool, &row, user).await?))
}

/// `GET /api/intercambios/:id/mensajes`
pub async fn mensajes(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<Vec<MessageRow>>> {
    let rows = messages::list(&state.pool, id, user).await?;
    Ok(Json(rows))
}

/// `PUT /api/intercambios/:id/cancelar`
pub async fn cancelar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<ExchangeActionResponse>> {
    let row = exchange::cancel(&state.pool, &state.rooms, id, user, Utc::now()).await?;
    Ok(Json(ExchangeActionResponse {
        detalle: cards::exchange_detail(&state.pool, &row, user).await?,
        msg: "Intercambio cancelado",
    }))
}

/// `PUT /api/intercambios/:id/finalizar`
pub async fn finalizar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<ExchangeActionResponse>> {
    let row = exchange::confirm(&state.pool, &state.rooms, id, user, Utc::now()).await?;
    Ok(Json(ExchangeActionResponse {
        detalle: cards::exchange_detail(&state.pool, &row, user).await?,
        msg: "Estado actualizado",
    }))
}
