//! # Trueque Protocol
//!
//! Domain crate of the **Trueque** barter marketplace: the exchange
//! lifecycle state machine, free of any storage or transport concern.
//!
//! | Phase          | Entry point(s)                                   |
//! |----------------|--------------------------------------------------|
//! | Creation       | [`Confirmation::new`]                            |
//! | Confirmation   | [`Confirmation::confirm`]                        |
//! | Cancellation   | [`Confirmation::cancel`]                         |
//! | Deadline sweep | [`Confirmation::overdue_side`], [`Confirmation::sweep`] |
//! | Queries        | [`Confirmation::aggregate`], [`Confirmation::status_of`] |
//!
//! ## Architecture
//!
//! The backend service owns persistence, authorization and event fan-out;
//! this crate contains **only** the legal states and transitions. Every
//! function here is pure over its inputs — time is always an argument, so
//! the deadline behavior is testable without a clock.

mod lifecycle;
mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_lifecycle;

pub use lifecycle::{
    Confirmation, LifecycleError, Transition, CONFIRMATION_WINDOW_MINUTES,
};
pub use types::{ConfirmationStatus, MessageKind, RequestStatus, Side};
