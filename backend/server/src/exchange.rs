//! Exchange orchestration — the bridge between the pure state machine and
//! storage, authorization and event fan-out.
//!
//! Every mutation here follows the same shape: load the row, authorize the
//! actor, run the protocol transition, persist it with a compare-and-swap
//! on the row version, then broadcast the resulting event to the room.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::{info, warn};

use trueque_protocol::Transition;

use crate::errors::{ApiError, Result};
use crate::events;
use crate::models::{ExchangeRow, RequestRow};
use crate::realtime::Rooms;
use crate::db;

fn money(value: rust_decimal::Decimal) -> String {
    format!("{:.2}", value)
}

/// Create the exchange backing an accepted request.
///
/// Called exactly on the transition into `aceptado`; the existence check
/// plus the unique index on the request id make duplicate accepts a no-op.
/// Offering side = the requester, receiving side = the target product's
/// owner, adjustment copied from the proposal (zero when absent).
pub async fn create_for_request(
    pool: &SqlitePool,
    request: &RequestRow,
    now: DateTime<Utc>,
) -> Result<Option<ExchangeRow>> {
    if db::exchange_for_request(pool, request.id_solicitud)
        .await?
        .is_some()
    {
        return Ok(None);
    }

    let target = db::get_product(pool, request.id_producto_objetivo)
        .await?
        .ok_or_else(|| ApiError::NotFound("Producto objetivo no existe".to_string()))?;

    let adjustment = request.adjustment().unwrap_or_default();

    let created = db::insert_exchange(
        pool,
        request.id_solicitud,
        request.id_producto_ofrece,
        request.id_producto_objetivo,
        request.id_solicitante,
        target.id_usuario,
        &money(adjustment),
        request.creado,
        now,
    )
    .await?;

    if created {
        info!(
            "exchange created for request {} (ofrece {}, recibe {})",
            request.id_solicitud, request.id_solicitante, target.id_usuario
        );
    }

    db::exchange_for_request(pool, request.id_solicitud).await
}

async fn load_for_participant(
    pool: &SqlitePool,
    exchange_id: i64,
    actor: i64,
) -> Result<(ExchangeRow, trueque_protocol::Side)> {
    let row = db::get_exchange(pool, exchange_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;

    let side = row.side_of(actor).ok_or_else(|| {
        ApiError::Forbidden("No participas en este intercambio".to_string())
    })?;
    Ok((row, side))
}

async fn persist_transition(
    pool: &SqlitePool,
    rooms: &Rooms,
    row: &ExchangeRow,
    confirmation: &trueque_protocol::Confirmation,
    transition: &Transition,
    now: DateTime<Utc>,
) -> Result<ExchangeRow> {
    let wrote =
        db::update_exchange_state(pool, row.id_intercambio, confirmation, now, row.version).await?;
    if !wrote {
        return Err(ApiError::Conflict);
    }

    let updated = db::get_exchange(pool, row.id_intercambio)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;

    rooms.publish(row.id_intercambio, events::state_event(transition, &updated));
    Ok(updated)
}

/// One participant confirms. First confirmation arms the counterpart's
/// deadline, the second completes the exchange.
pub async fn confirm(
    pool: &SqlitePool,
    rooms: &Rooms,
    exchange_id: i64,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<ExchangeRow> {
    let (row, side) = load_for_participant(pool, exchange_id, actor).await?;

    let mut confirmation = row.confirmation()?;
    let transition = confirmation
        .confirm(side, now)
        .map_err(|e| ApiError::InvalidOperation(e.to_string()))?;

    persist_transition(pool, rooms, &row, &confirmation, &transition, now).await
}

/// One participant backs out.
pub async fn cancel(
    pool: &SqlitePool,
    rooms: &Rooms,
    exchange_id: i64,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<ExchangeRow> {
    let (row, side) = load_for_participant(pool, exchange_id, actor).await?;

    let mut confirmation = row.confirmation()?;
    let transition = confirmation
        .cancel(side)
        .map_err(|e| ApiError::InvalidOperation(e.to_string()))?;

    persist_transition(pool, rooms, &row, &confirmation, &transition, now).await
}

/// Lazy deadline reconcile, run on every read path and by the background
/// sweeper.
///
/// Fail-open: a reconcile error must not break the read that triggered it,
/// so failures are logged and the row is returned unpenalized.
pub async fn reconcile(
    pool: &SqlitePool,
    rooms: &Rooms,
    row: ExchangeRow,
    now: DateTime<Utc>,
) -> ExchangeRow {
    match try_reconcile(pool, rooms, &row, now).await {
        Ok(Some(updated)) => updated,
        Ok(None) => row,
        Err(e) => {
            warn!(
                "deadline reconcile failed for exchange {}: {e}",
                row.id_intercambio
            );
            row
        }
    }
}

async fn try_reconcile(
    pool: &SqlitePool,
    rooms: &Rooms,
    row: &ExchangeRow,
    now: DateTime<Utc>,
) -> Result<Option<ExchangeRow>> {
    let mut confirmation = row.confirmation()?;
    let Some(transition) = confirmation.sweep(now) else {
        return Ok(None);
    };
    let Transition::Penalized { side } = transition else {
        return Ok(None);
    };

    // The CAS claims the penalty: under concurrent sweeps (or a racing
    // confirm) exactly one writer wins, so the flag is revoked once.
    let wrote =
        db::update_exchange_state(pool, row.id_intercambio, &confirmation, now, row.version).await?;
    if !wrote {
        return db::get_exchange(pool, row.id_intercambio).await;
    }

    let penalized = row.user_of(side);
    if let Some(user) = db::get_user(pool, penalized).await? {
        if user.verificado {
            db::set_user_verified(pool, penalized, false).await?;
            info!(
                "user {penalized} lost the trust flag on exchange {}",
                row.id_intercambio
            );
        }
    }

    let updated = db::get_exchange(pool, row.id_intercambio)
        .await?
        .ok_or_else(|| ApiError::NotFound("Intercambio no existe".to_string()))?;

    rooms.publish(row.id_intercambio, events::state_event(&transition, &updated));
    Ok(Some(updated))
}
