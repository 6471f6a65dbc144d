//! Database row types and their bridges into the protocol vocabulary.
//!
//! Status columns are stored as their wire spelling; the accessors here
//! parse them back into the `trueque_protocol` enums so the rest of the
//! service never touches raw strings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use trueque_protocol::{Confirmation, ConfirmationStatus, MessageKind, RequestStatus, Side};

use crate::errors::{ApiError, Result};

fn corrupt_column(column: &str, value: &str) -> ApiError {
    ApiError::Database(sqlx::Error::Decode(
        format!("unexpected {column} value: {value:?}").into(),
    ))
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id_usuario: i64,
    pub nombre_completo: String,
    pub avatar_url: Option<String>,
    pub verificado: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id_producto: i64,
    pub id_usuario: i64,
    pub titulo: String,
    pub valor_estimado: String,
    pub imagen_url: Option<String>,
    pub ubicacion: Option<String>,
    pub estado: String,
}

impl ProductRow {
    pub fn valor(&self) -> Option<Decimal> {
        self.valor_estimado.parse().ok()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RequestRow {
    pub id_solicitud: i64,
    pub id_solicitante: i64,
    pub id_producto_objetivo: i64,
    pub id_producto_ofrece: Option<i64>,
    pub mensaje: Option<String>,
    pub diferencia_propuesta: Option<String>,
    pub estado: String,
    pub creado: DateTime<Utc>,
}

impl RequestRow {
    pub fn status(&self) -> Result<RequestStatus> {
        RequestStatus::parse(&self.estado).ok_or_else(|| corrupt_column("estado", &self.estado))
    }

    pub fn adjustment(&self) -> Option<Decimal> {
        self.diferencia_propuesta.as_deref().and_then(|s| s.parse().ok())
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ExchangeRow {
    pub id_intercambio: i64,
    pub id_solicitud: i64,
    pub id_producto_ofrecido: Option<i64>,
    pub id_producto_solicitado: i64,
    pub id_usuario_ofrece: i64,
    pub id_usuario_recibe: i64,
    pub diferencia_monetaria: String,
    pub estado: String,
    pub estado_solicitante: String,
    pub estado_receptor: String,
    pub fecha_solicitud: DateTime<Utc>,
    pub fecha_actualizacion: DateTime<Utc>,
    pub fecha_limite_confirmacion: Option<DateTime<Utc>>,
    pub version: i64,
}

impl ExchangeRow {
    pub fn is_participant(&self, user_id: i64) -> bool {
        user_id == self.id_usuario_ofrece || user_id == self.id_usuario_recibe
    }

    /// Which side of the exchange a user sits on, if any.
    pub fn side_of(&self, user_id: i64) -> Option<Side> {
        if user_id == self.id_usuario_ofrece {
            Some(Side::Offering)
        } else if user_id == self.id_usuario_recibe {
            Some(Side::Receiving)
        } else {
            None
        }
    }

    pub fn user_of(&self, side: Side) -> i64 {
        match side {
            Side::Offering => self.id_usuario_ofrece,
            Side::Receiving => self.id_usuario_recibe,
        }
    }

    pub fn status(&self) -> Result<ConfirmationStatus> {
        ConfirmationStatus::parse(&self.estado)
            .ok_or_else(|| corrupt_column("estado", &self.estado))
    }

    /// Reconstruct the protocol state machine from the stored columns.
    pub fn confirmation(&self) -> Result<Confirmation> {
        Ok(Confirmation {
            offering: ConfirmationStatus::parse(&self.estado_solicitante)
                .ok_or_else(|| corrupt_column("estado_solicitante", &self.estado_solicitante))?,
            receiving: ConfirmationStatus::parse(&self.estado_receptor)
                .ok_or_else(|| corrupt_column("estado_receptor", &self.estado_receptor))?,
            deadline: self.fecha_limite_confirmacion,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MessageRow {
    pub id_mensaje: i64,
    pub id_intercambio: i64,
    pub id_usuario: i64,
    pub tipo: String,
    pub contenido: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub creado: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct NotificationRow {
    pub id_notificacion: i64,
    pub id_usuario: i64,
    pub id_intercambio: Option<i64>,
    pub mensaje: String,
    pub leido: bool,
    pub fecha_envio: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────
// Incoming message payload (HTTP-free, shared with the ws channel)
// ─────────────────────────────────────────────────────────

/// A message as submitted by a participant, before persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMessage {
    pub tipo: MessageKind,
    #[serde(default)]
    pub contenido: Option<String>,
    #[serde(default)]
    pub lat: Option<f64>,
    #[serde(default)]
    pub lng: Option<f64>,
}

impl NewMessage {
    /// Shape check by kind: text needs a body, a location needs both
    /// coordinates. Returns the payload normalized to its kind (a text
    /// message never stores coordinates, a location never stores a body).
    pub fn validated(self) -> Result<Self> {
        match self.tipo {
            MessageKind::Text => {
                let contenido = self
                    .contenido
                    .filter(|c| !c.trim().is_empty())
                    .ok_or_else(|| {
                        ApiError::InvalidArgument("Falta contenido del mensaje".to_string())
                    })?;
                Ok(Self {
                    tipo: MessageKind::Text,
                    contenido: Some(contenido),
                    lat: None,
                    lng: None,
                })
            }
            MessageKind::Location => {
                let (lat, lng) = match (self.lat, self.lng) {
                    (Some(lat), Some(lng)) => (lat, lng),
                    _ => {
                        return Err(ApiError::InvalidArgument(
                            "Faltan coordenadas de la ubicación".to_string(),
                        ))
                    }
                };
                Ok(Self {
                    tipo: MessageKind::Location,
                    contenido: None,
                    lat: Some(lat),
                    lng: Some(lng),
                })
            }
        }
    }
}

/// Parse a client-supplied monetary adjustment.
///
/// Accepts a JSON number, a numeric string, `null`, or the empty string
/// (the last three all mean "no adjustment"), and normalizes to two
/// fraction digits.
pub fn parse_adjustment(raw: Option<&serde_json::Value>) -> Result<Option<Decimal>> {
    let invalid = || ApiError::InvalidArgument("diferencia_propuesta inválida".to_string());

    match raw {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) if s.trim().is_empty() || s == "null" => Ok(None),
        Some(serde_json::Value::String(s)) => {
            let value: Decimal = s.trim().parse().map_err(|_| invalid())?;
            Ok(Some(value.round_dp(2)))
        }
        Some(serde_json::Value::Number(n)) => {
            let value: Decimal = n.to_string().parse().map_err(|_| invalid())?;
            Ok(Some(value.round_dp(2)))
        }
        Some(_) => Err(invalid()),
    }
}
