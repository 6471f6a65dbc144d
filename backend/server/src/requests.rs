//! Solicitudes — proposals to acquire another user's product.
//!
//! A request may be re-offered: the requester rewrites the proposal in
//! place (offered product, adjustment, message) and it returns to
//! `pendiente` with a fresh timestamp, keeping its id.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::warn;

use trueque_protocol::RequestStatus;

use crate::errors::{ApiError, Result};
use crate::exchange;
use crate::models::{parse_adjustment, ExchangeRow, RequestRow};
use crate::db;

const DEFAULT_MESSAGE: &str = "Me interesa tu producto";

#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    pub id_producto_objetivo: Option<i64>,
    #[serde(default)]
    pub id_producto_ofrece: Option<i64>,
    #[serde(default)]
    pub mensaje: Option<String>,
    /// Accepted as number, numeric string, or null.
    #[serde(default)]
    pub diferencia_propuesta: Option<serde_json::Value>,
}

/// Re-offer body. Absent fields keep the current value; an explicit `null`
/// clears the offered product / adjustment.
#[derive(Debug, Deserialize, Default)]
pub struct ReofferRequest {
    #[serde(default)]
    pub id_producto_ofrece: Option<serde_json::Value>,
    #[serde(default)]
    pub mensaje: Option<String>,
    #[serde(default)]
    pub diferencia_propuesta: Option<serde_json::Value>,
}

/// Create a pending request against someone else's product.
pub async fn create(
    pool: &SqlitePool,
    requester: i64,
    body: CreateRequest,
    now: DateTime<Utc>,
) -> Result<RequestRow> {
    let adjustment = parse_adjustment(body.diferencia_propuesta.as_ref())?;

    let target_id = body
        .id_producto_objetivo
        .ok_or_else(|| ApiError::InvalidArgument("Falta id_producto_objetivo".to_string()))?;

    let target = db::get_product(pool, target_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Producto objetivo no existe".to_string()))?;

    if target.id_usuario == requester {
        return Err(ApiError::InvalidOperation(
            "No puedes solicitar tu propio producto".to_string(),
        ));
    }

    if let Some(offered) = body.id_producto_ofrece {
        if !db::owns_product(pool, requester, offered).await? {
            return Err(ApiError::Forbidden(
                "No eres dueño del producto que ofreces".to_string(),
            ));
        }
    }

    let mensaje = body
        .mensaje
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

    let id = db::insert_request(
        pool,
        requester,
        target_id,
        body.id_producto_ofrece,
        &mensaje,
        adjustment.map(|d| format!("{d:.2}")).as_deref(),
        now,
    )
    .await?;

    // Fail-open side effect: the request stands even if the owner cannot
    // be notified.
    if let Err(e) = db::insert_notification(
        pool,
        target.id_usuario,
        None,
        &format!("Nuevo interés en tu producto '{}'", target.titulo),
        now,
    )
    .await
    {
        warn!("could not notify product owner {}: {e}", target.id_usuario);
    }

    db::get_request(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Solicitud no existe".to_string()))
}

/// Pending requests against the caller's products, newest first.
pub async fn list_received(pool: &SqlitePool, owner: i64) -> Result<Vec<RequestRow>> {
    db::list_received_requests(pool, owner).await
}

/// Requests authored by the caller, any state, newest first.
pub async fn list_sent(pool: &SqlitePool, requester: i64) -> Result<Vec<RequestRow>> {
    db::list_sent_requests(pool, requester).await
}

async fn load(pool: &SqlitePool, id: i64) -> Result<RequestRow> {
    db::get_request(pool, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Solicitud no existe".to_string()))
}

/// Only the owner of the target product may accept or reject.
async fn require_target_owner(pool: &SqlitePool, request: &RequestRow, actor: i64) -> Result<()> {
    let owns = db::get_product(pool, request.id_producto_objetivo)
        .await?
        .is_some_and(|p| p.id_usuario == actor);
    if owns {
        Ok(())
    } else {
        Err(ApiError::Forbidden("No autorizado".to_string()))
    }
}

/// Accept a request. On the transition *into* `aceptado` the backing
/// exchange is created; accepting an already-accepted request changes
/// nothing there.
pub async fn accept(
    pool: &SqlitePool,
    id: i64,
    actor: i64,
    now: DateTime<Utc>,
) -> Result<(RequestRow, Option<ExchangeRow>)> {
    let request = load(pool, id).await?;
    require_target_owner(pool, &request, actor).await?;

    let was_accepted = request.status()? == RequestStatus::Accepted;
    db::update_request_status(pool, id, RequestStatus::Accepted.as_str()).await?;

    let created = if was_accepted {
        None
    } else {
        exchange::create_for_request(pool, &request, now).await?
    };

    Ok((load(pool, id).await?, created))
}

pub async fn reject(pool: &SqlitePool, id: i64, actor: i64) -> Result<RequestRow> {
    let request = load(pool, id).await?;
    require_target_owner(pool, &request, actor).await?;

    db::update_request_status(pool, id, RequestStatus::Rejected.as_str()).await?;
    load(pool, id).await
}

pub async fn cancel(pool: &SqlitePool, id: i64, actor: i64) -> Result<RequestRow> {
    let request = load(pool, id).await?;
    if request.id_solicitante != actor {
        return Err(ApiError::Forbidden(
            "Solo el solicitante puede cancelar".to_string(),
        ));
    }

    db::update_request_status(pool, id, RequestStatus::Cancelled.as_str()).await?;
    load(pool, id).await
}

/// Rewrite and resubmit an existing request as pending.
///
/// Allowed from any prior state — including `aceptado`, which can resurface
/// a proposal whose exchange already exists; the exchange, if any, is left
/// untouched.
pub async fn reoffer(
    pool: &SqlitePool,
    id: i64,
    actor: i64,
    body: ReofferRequest,
    now: DateTime<Utc>,
) -> Result<RequestRow> {
    let request = load(pool, id).await?;
    if request.id_solicitante != actor {
        return Err(ApiError::Forbidden(
            "Solo el solicitante puede reofertar".to_string(),
        ));
    }

    let adjustment = match body.diferencia_propuesta {
        None => request.adjustment(),
        Some(value) => parse_adjustment(Some(&value))?,
    };

    let offered = match body.id_producto_ofrece {
        None => request.id_producto_ofrece,
        Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => Some(n.as_i64().ok_or_else(|| {
            ApiError::InvalidArgument("id_producto_ofrece inválido".to_string())
        })?),
        Some(_) => {
            return Err(ApiError::InvalidArgument(
                "id_producto_ofrece inválido".to_string(),
            ))
        }
    };

    if let Some(offered) = offered {
        if !db::owns_product(pool, actor, offered).await? {
            return Err(ApiError::Forbidden(
                "No eres dueño del producto que ofreces".to_string(),
            ));
        }
    }

    let mensaje = body
        .mensaje
        .or_else(|| request.mensaje.clone())
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_MESSAGE.to_string());

    db::reoffer_request(
        pool,
        id,
        offered,
        adjustment.map(|d| format!("{d:.2}")).as_deref(),
        &mensaje,
        now,
    )
    .await?;

    load(pool, id).await
}
