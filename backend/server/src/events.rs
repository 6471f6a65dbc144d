//! Events broadcast to an exchange's realtime room.
//!
//! Every payload is tagged with an `evento` discriminator so a client can
//! subscribe to one socket and switch on the event name. Chat messages and
//! state-machine transitions share the channel: the latter are emitted by
//! the HTTP handlers and the deadline sweeper, independently of any chat
//! activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use trueque_protocol::Transition;

use crate::models::{ExchangeRow, MessageRow};

/// Confirmation-state snapshot carried by every state event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeState {
    pub id_intercambio: i64,
    pub estado: String,
    pub estado_solicitante: String,
    pub estado_receptor: String,
    pub fecha_limite_confirmacion: Option<DateTime<Utc>>,
}

impl ExchangeState {
    pub fn from_row(row: &ExchangeRow) -> Self {
        Self {
            id_intercambio: row.id_intercambio,
            estado: row.estado.clone(),
            estado_solicitante: row.estado_solicitante.clone(),
            estado_receptor: row.estado_receptor.clone(),
            fecha_limite_confirmacion: row.fecha_limite_confirmacion,
        }
    }
}

/// A state event plus the participant who paid the deadline penalty.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PenaltyNotice {
    #[serde(flatten)]
    pub intercambio: ExchangeState,
    pub id_usuario_penalizado: i64,
}

/// Everything a room subscriber can receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "evento")]
pub enum RoomEvent {
    /// A chat or location message was appended.
    #[serde(rename = "mensaje_recibido")]
    MessageReceived(MessageRow),
    /// One side confirmed; the counterpart's deadline is running.
    #[serde(rename = "confirmacion_parcial")]
    PartiallyConfirmed(ExchangeState),
    /// Both sides confirmed; the exchange is complete.
    #[serde(rename = "confirmacion_total")]
    FullyConfirmed(ExchangeState),
    /// A participant backed out.
    #[serde(rename = "intercambio_cancelado")]
    Cancelled(ExchangeState),
    /// The confirmation window lapsed; the named user lost the trust flag.
    #[serde(rename = "usuario_penalizado")]
    Penalized(PenaltyNotice),
}

/// Build the room event announcing a state-machine transition, from the
/// exchange row as persisted *after* the transition.
pub fn state_event(transition: &Transition, row: &ExchangeRow) -> RoomEvent {
    let state = ExchangeState::from_row(row);
    match transition {
        Transition::PartiallyConfirmed { .. } => RoomEvent::PartiallyConfirmed(state),
        Transition::FullyConfirmed => RoomEvent::FullyConfirmed(state),
        Transition::Cancelled { .. } => RoomEvent::Cancelled(state),
        Transition::Penalized { side } => RoomEvent::Penalized(PenaltyNotice {
            id_usuario_penalizado: row.user_of(*side),
            intercambio: state,
        }),
    }
}
