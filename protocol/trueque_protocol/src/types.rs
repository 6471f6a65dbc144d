//! # Types
//!
//! Shared vocabulary of the exchange lifecycle.
//!
//! All enums carry their Spanish wire/storage spelling (`as_str`) next to a
//! `parse` constructor, so the database layer and the JSON layer share one
//! source of truth for the legal values.
//!
//! ### Status as a Finite-State Machine
//!
//! A confirmation side moves forward only:
//!
//! ```text
//! Pending ──► Accepted
//!     └─────► Cancelled
//! ```
//!
//! There is no transition out of `Accepted` or `Cancelled` at the side
//! level; the aggregate is always derived from the two sides (see
//! [`Confirmation::aggregate`](crate::Confirmation::aggregate)).

use serde::{Deserialize, Serialize};

/// Confirmation status of one exchange side, and of the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// Waiting on this side's decision.
    #[serde(rename = "pendiente")]
    Pending,
    /// This side confirmed the exchange.
    #[serde(rename = "aceptado")]
    Accepted,
    /// This side backed out (or was penalized out).
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl ConfirmationStatus {
    /// Storage / wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Accepted => "aceptado",
            Self::Cancelled => "cancelado",
        }
    }

    /// Parse the storage spelling back into a status.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(Self::Pending),
            "aceptado" => Some(Self::Accepted),
            "cancelado" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Lifecycle status of a request (solicitud).
///
/// Unlike an exchange side, a request is allowed to re-enter `Pending`
/// through a re-offer, which rewrites the proposal in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    #[serde(rename = "pendiente")]
    Pending,
    #[serde(rename = "aceptado")]
    Accepted,
    #[serde(rename = "rechazado")]
    Rejected,
    #[serde(rename = "cancelado")]
    Cancelled,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pendiente",
            Self::Accepted => "aceptado",
            Self::Rejected => "rechazado",
            Self::Cancelled => "cancelado",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pendiente" => Some(Self::Pending),
            "aceptado" => Some(Self::Accepted),
            "rechazado" => Some(Self::Rejected),
            "cancelado" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// The two fixed participants of an exchange.
///
/// `Offering` is the original requester (the one who proposed products or
/// money), `Receiving` is the owner of the requested product. The pairing
/// never changes after the exchange is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Offering,
    Receiving,
}

impl Side {
    /// The counterpart of this side.
    pub fn other(&self) -> Self {
        match self {
            Self::Offering => Self::Receiving,
            Self::Receiving => Self::Offering,
        }
    }
}

/// Kind of a chat message inside an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    /// Free text; requires a non-empty body.
    #[serde(rename = "texto")]
    Text,
    /// A meeting point; requires a latitude/longitude pair.
    #[serde(rename = "ubicacion")]
    Location,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "texto",
            Self::Location => "ubicacion",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "texto" => Some(Self::Text),
            "ubicacion" => Some(Self::Location),
            _ => None,
        }
    }
}
