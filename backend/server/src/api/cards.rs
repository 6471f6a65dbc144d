//! Wire shapes of the JSON responses, assembled from row types.
//!
//! Field names match the client contract exactly; everything the card
//! needs is resolved here so the handlers stay one-liners.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::errors::Result;
use crate::models::{ExchangeRow, ProductRow, RequestRow, UserRow};
use crate::db;

#[derive(Debug, Clone, Serialize)]
pub struct UserRef {
    pub id_usuario: i64,
    pub nombre: String,
    pub avatar_url: Option<String>,
}

impl UserRef {
    fn from_row(row: UserRow) -> Self {
        Self {
            id_usuario: row.id_usuario,
            nombre: row.nombre_completo,
            avatar_url: row.avatar_url,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductCard {
    pub id_producto: i64,
    pub id_usuario: i64,
    pub titulo: String,
    pub imagen: Option<String>,
    pub precio: Option<f64>,
    pub ubicacion: Option<String>,
    pub estado: String,
}

impl ProductCard {
    fn from_row(row: ProductRow) -> Self {
        Self {
            id_producto: row.id_producto,
            id_usuario: row.id_usuario,
            precio: row.valor().and_then(|v| v.to_f64()),
            titulo: row.titulo,
            imagen: row.imagen_url,
            ubicacion: row.ubicacion,
            estado: row.estado,
        }
    }
}

async fn user_ref(pool: &SqlitePool, id: i64) -> Result<Option<UserRef>> {
    Ok(db::get_user(pool, id).await?.map(UserRef::from_row))
}

async fn product_card(pool: &SqlitePool, id: Option<i64>) -> Result<Option<ProductCard>> {
    let Some(id) = id else {
        return Ok(None);
    };
    Ok(db::get_product(pool, id).await?.map(ProductCard::from_row))
}

// ─────────────────────────────────────────────────────────
// Solicitud card
// ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct RequestCard {
    pub id_solicitud: i64,
    pub estado: String,
    pub mensaje: Option<String>,
    pub creado: DateTime<Utc>,
    pub soy_solicitante: bool,
    pub diferencia_propuesta: Option<f64>,
    pub producto_objetivo: Option<ProductCard>,
    pub producto_ofrece: Option<ProductCard>,
    pub solicitante: Option<UserRef>,
    pub receptor: Option<UserRef>,
}

pub async fn request_card(
    pool: &SqlitePool,
    row: &RequestRow,
    current_user: i64,
) -> Result<RequestCard> {
    let producto_objetivo = product_card(pool, Some(row.id_producto_objetivo)).await?;
    let receptor = match &producto_objetivo {
        Some(p) => user_ref(pool, p.id_usuario).await?,
        None => None,
    };

    Ok(RequestCard {
        id_solicitud: row.id_solicitud,
        estado: row.estado.clone(),
        mensaje: row.mensaje.clone(),
        creado: row.creado,
        soy_solicitante: row.id_solicitante == current_user,
        diferencia_propuesta: row.adjustment().and_then(|d| d.to_f64()),
        producto_ofrece: product_card(pool, row.id_producto_ofrece).await?,
        solicitante: user_ref(pool, row.id_solicitante).await?,
        producto_objetivo,
        receptor,
    })
}

// ─────────────────────────────────────────────────────────
// Intercambio card & detail
// ─────────────────────────────────────────────────────────

/// Listing entry: the exchange seen from the caller's side ("yo"/"otro").
#[derive(Debug, Serialize)]
pub struct ExchangeCard {
    pub id_intercambio: i64,
    pub estado: String,
    pub estado_solicitante: String,
    pub estado_receptor: String,
    pub diferencia_monetaria: String,
    pub soy_ofertante: bool,
    pub yo: Option<UserRef>,
    pub otro: Option<UserRef>,
    pub producto_ofrece: Option<ProductCard>,
    pub producto_objetivo: Option<ProductCard>,
    pub fecha_solicitud: DateTime<Utc>,
    pub fecha_limite_confirmacion: Option<DateTime<Utc>>,
}

pub async fn exchange_card(
    pool: &SqlitePool,
    row: &ExchangeRow,
    current_user: i64,
) -> Result<ExchangeCard> {
    let soy_ofertante = row.id_usuario_ofrece == current_user;
    let other_id = if soy_ofertante {
        row.id_usuario_recibe
    } else {
        row.id_usuario_ofrece
    };

    Ok(ExchangeCard {
        id_intercambio: row.id_intercambio,
        estado: row.estado.clone(),
        estado_solicitante: row.estado_solicitante.clone(),
        estado_receptor: row.estado_receptor.clone(),
        diferencia_monetaria: row.diferencia_monetaria.clone(),
        soy_ofertante,
        yo: user_ref(pool, current_user).await?,
        otro: user_ref(pool, other_id).await?,
        producto_ofrece: product_card(pool, row.id_producto_ofrecido).await?,
        producto_objetivo: product_card(pool, Some(row.id_producto_solicitado)).await?,
        fecha_solicitud: row.fecha_solicitud,
        fecha_limite_confirmacion: row.fecha_limite_confirmacion,
    })
}

/// Detail view: both participants named explicitly.
#[derive(Debug, Serialize)]
pub struct ExchangeDetail {
    pub id_intercambio: i64,
    pub estado: String,
    pub estado_solicitante: String,
    pub estado_receptor: String,
    pub diferencia_monetaria: String,
    pub yo_soy_ofertante: bool,
    pub usuario_ofrece: Option<UserRef>,
    pub usuario_recibe: Option<UserRef>,
    pub producto_ofrece: Option<ProductCard>,
    pub producto_objetivo: Option<ProductCard>,
    pub fecha_limite_confirmacion: Option<DateTime<Utc>>,
}

pub async fn exchange_detail(
    pool: &SqlitePool,
    row: &ExchangeRow,
    current_user: i64,
) -> Result<ExchangeDetail> {
    Ok(ExchangeDetail {
        id_intercambio: row.id_intercambio,
        estado: row.estado.clone(),
        estado_solicitante: row.estado_solicitante.clone(),
        estado_receptor: row.estado_receptor.clone(),
        diferencia_monetaria: row.diferencia_monetaria.clone(),
        yo_soy_ofertante: row.id_usuario_ofrece == current_user,
        usuario_ofrece: user_ref(pool, row.id_usuario_ofrece).await?,
        usuario_recibe: user_ref(pool, row.id_usuario_recibe).await?,
        producto_ofrece: product_card(pool, row.id_producto_ofrecido).await?,
        producto_objetivo: product_card(pool, Some(row.id_producto_solicitado)).await?,
        fecha_limite_confirmacion: row.fecha_limite_confirmacion,
    })
}
