//! # Lifecycle
//!
//! The bilateral confirmation state machine of an exchange.
//!
//! An exchange tracks one [`ConfirmationStatus`] per side plus an optional
//! confirmation deadline. The aggregate status is never stored here — it is
//! always *derived*:
//!
//! | offering   | receiving  | aggregate   |
//! |------------|------------|-------------|
//! | accepted   | accepted   | `aceptado`  |
//! | cancelled  | *any*      | `cancelado` |
//! | *any*      | cancelled  | `cancelado` |
//! | otherwise  | otherwise  | `pendiente` |
//!
//! The first confirmation arms a [`CONFIRMATION_WINDOW_MINUTES`]-minute
//! deadline for the counterpart. If the deadline lapses while exactly one
//! side has confirmed, [`Confirmation::sweep`] cancels the exchange and
//! names the side to penalize. The predicate behind the sweep,
//! [`Confirmation::overdue_side`], is a standalone pure function so it can
//! be tested without any clock or storage.

use chrono::{DateTime, Duration, Utc};

use crate::types::{ConfirmationStatus, Side};

/// How long the second participant has to confirm after the first one did.
pub const CONFIRMATION_WINDOW_MINUTES: i64 = 15;

/// Errors raised by the state machine.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The exchange was already cancelled; no further action is accepted.
    #[error("el intercambio ya está cancelado")]
    AlreadyCancelled,
}

/// Outcome of a successful transition, for the caller to persist and
/// broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// One side confirmed while the other is still pending. Carries the
    /// deadline now in force for the counterpart.
    PartiallyConfirmed { deadline: DateTime<Utc> },
    /// Both sides confirmed; the exchange is complete.
    FullyConfirmed,
    /// A participant backed out.
    Cancelled { by: Side },
    /// The confirmation window lapsed with only one confirmation; the named
    /// side never answered and is to be penalized.
    Penalized { side: Side },
}

/// The mutable confirmation state of one exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub offering: ConfirmationStatus,
    pub receiving: ConfirmationStatus,
    /// Non-null only while exactly one side has confirmed.
    pub deadline: Option<DateTime<Utc>>,
}

impl Default for Confirmation {
    fn default() -> Self {
        Self::new()
    }
}

impl Confirmation {
    /// Fresh exchange: both sides pending, no deadline.
    pub fn new() -> Self {
        Self {
            offering: ConfirmationStatus::Pending,
            receiving: ConfirmationStatus::Pending,
            deadline: None,
        }
    }

    pub fn status_of(&self, side: Side) -> ConfirmationStatus {
        match side {
            Side::Offering => self.offering,
            Side::Receiving => self.receiving,
        }
    }

    fn set_status(&mut self, side: Side, status: ConfirmationStatus) {
        match side {
            Side::Offering => self.offering = status,
            Side::Receiving => self.receiving = status,
        }
    }

    /// Aggregate status, derived from the two sides.
    pub fn aggregate(&self) -> ConfirmationStatus {
        use ConfirmationStatus::*;
        if self.offering == Cancelled || self.receiving == Cancelled {
            Cancelled
        } else if self.offering == Accepted && self.receiving == Accepted {
            Accepted
        } else {
            Pending
        }
    }

    /// One side confirms the exchange.
    ///
    /// The first confirmation leaves the aggregate pending and arms the
    /// deadline (unless one is already running); the second completes the
    /// exchange and clears it.
    pub fn confirm(&mut self, side: Side, now: DateTime<Utc>) -> Result<Transition, LifecycleError> {
        if self.aggregate() == ConfirmationStatus::Cancelled {
            return Err(LifecycleError::AlreadyCancelled);
        }

        self.set_status(side, ConfirmationStatus::Accepted);

        if self.aggregate() == ConfirmationStatus::Accepted {
            self.deadline = None;
            return Ok(Transition::FullyConfirmed);
        }

        let deadline = *self
            .deadline
            .get_or_insert(now + Duration::minutes(CONFIRMATION_WINDOW_MINUTES));
        Ok(Transition::PartiallyConfirmed { deadline })
    }

    /// One side backs out. Terminal: the aggregate becomes cancelled and the
    /// deadline is dropped.
    pub fn cancel(&mut self, side: Side) -> Result<Transition, LifecycleError> {
        if self.aggregate() == ConfirmationStatus::Cancelled {
            return Err(LifecycleError::AlreadyCancelled);
        }

        self.set_status(side, ConfirmationStatus::Cancelled);
        self.deadline = None;
        Ok(Transition::Cancelled { by: side })
    }

    /// The sweep predicate: which side, if any, let the confirmation window
    /// lapse without answering?
    ///
    /// Fires only when a deadline exists and has passed, the aggregate is
    /// still pending, and exactly one side has confirmed. Returns the
    /// *non-confirming* side. Pure — callers decide what to do with it.
    pub fn overdue_side(&self, now: DateTime<Utc>) -> Option<Side> {
        let deadline = self.deadline?;
        if now <= deadline || self.aggregate() != ConfirmationStatus::Pending {
            return None;
        }

        let offering_confirmed = self.offering == ConfirmationStatus::Accepted;
        let receiving_confirmed = self.receiving == ConfirmationStatus::Accepted;
        match (offering_confirmed, receiving_confirmed) {
            (true, false) => Some(Side::Receiving),
            (false, true) => Some(Side::Offering),
            _ => None,
        }
    }

    /// Apply the deadline penalty if [`Self::overdue_side`] fires.
    ///
    /// The non-confirming side is cancelled (so the aggregate derivation
    /// keeps holding) and the deadline is cleared. Idempotent: once the
    /// aggregate leaves pending the predicate never fires again.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Option<Transition> {
        let side = self.overdue_side(now)?;
        self.set_status(side, ConfirmationStatus::Cancelled);
        self.deadline = None;
        Some(Transition::Penalized { side })
    }
}
