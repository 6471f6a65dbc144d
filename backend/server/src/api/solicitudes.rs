//! Solicitud handlers under `/api/solicitudes`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;

use crate::api::cards::{self, RequestCard};
use crate::auth::Identity;
use crate::errors::Result;
use crate::models::RequestRow;
use crate::requests::{self, CreateRequest, ReofferRequest};

use super::AppState;

async fn card(state: &AppState, row: &RequestRow, user: i64) -> Result<Json<RequestCard>> {
    Ok(Json(cards::request_card(&state.pool, row, user).await?))
}

async fn card_list(
    state: &AppState,
    rows: Vec<RequestRow>,
    user: i64,
) -> Result<Json<Vec<RequestCard>>> {
    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        out.push(cards::request_card(&state.pool, row, user).await?);
    }
    Ok(Json(out))
}

/// `POST /api/solicitudes`
pub async fn crear(
    State(state): State<AppState>,
    Identity(user): Identity,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<RequestCard>)> {
    let row = requests::create(&state.pool, user, body, Utc::now()).await?;
    let card = card(&state, &row, user).await?;
    Ok((StatusCode::CREATED, card))
}

/// `GET /api/solicitudes/recibidas`
pub async fn recibidas(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<RequestCard>>> {
    let rows = requests::list_received(&state.pool, user).await?;
    card_list(&state, rows, user).await
}

/// `GET /api/solicitudes/enviadas`
pub async fn enviadas(
    State(state): State<AppState>,
    Identity(user): Identity,
) -> Result<Json<Vec<RequestCard>>> {
    let rows = requests::list_sent(&state.pool, user).await?;
    card_list(&state, rows, user).await
}

/// `PUT /api/solicitudes/:id/aceptar`
pub async fn aceptar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<RequestCard>> {
    let (row, _created) = requests::accept(&state.pool, id, user, Utc::now()).await?;
    card(&state, &row, user).await
}

/// `PUT /api/solicitudes/:id/rechazar`
pub async fn rechazar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<RequestCard>> {
    let row = requests::reject(&state.pool, id, user).await?;
    card(&state, &row, user).await
}

/// `PUT /api/solicitudes/:id/cancelar`
pub async fn cancelar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
) -> Result<Json<RequestCard>> {
    let row = requests::cancel(&state.pool, id, user).await?;
    card(&state, &row, user).await
}

/// `PUT /api/solicitudes/:id/reofertar`
pub async fn reofertar(
    State(state): State<AppState>,
    Identity(user): Identity,
    Path(id): Path<i64>,
    Json(body): Json<ReofferRequest>,
) -> Result<Json<RequestCard>> {
    let row = requests::reoffer(&state.pool, id, user, body, Utc::now()).await?;
    card(&state, &row, user).await
}
