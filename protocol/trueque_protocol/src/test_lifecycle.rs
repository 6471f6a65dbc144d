use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::invariants;
use crate::lifecycle::{Confirmation, LifecycleError, Transition, CONFIRMATION_WINDOW_MINUTES};
use crate::types::{ConfirmationStatus, Side};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap()
}

fn all_statuses() -> [ConfirmationStatus; 3] {
    [
        ConfirmationStatus::Pending,
        ConfirmationStatus::Accepted,
        ConfirmationStatus::Cancelled,
    ]
}

#[test]
fn fresh_exchange_is_all_pending_without_deadline() {
    let c = Confirmation::new();
    assert_eq!(c.offering, ConfirmationStatus::Pending);
    assert_eq!(c.receiving, ConfirmationStatus::Pending);
    assert_eq!(c.aggregate(), ConfirmationStatus::Pending);
    assert_eq!(c.deadline, None);
    invariants::assert_all(&c, t0());
}

#[test]
fn aggregate_is_derived_for_every_side_pair() {
    for offering in all_statuses() {
        for receiving in all_statuses() {
            let c = Confirmation {
                offering,
                receiving,
                deadline: None,
            };
            invariants::assert_aggregate_derivation(&c);
        }
    }
}

#[test]
fn first_confirmation_keeps_aggregate_pending_and_arms_deadline() {
    let mut c = Confirmation::new();
    let transition = c.confirm(Side::Offering, t0()).unwrap();

    let expected_deadline = t0() + Duration::minutes(CONFIRMATION_WINDOW_MINUTES);
    assert_eq!(
        transition,
        Transition::PartiallyConfirmed {
            deadline: expected_deadline
        }
    );
    assert_eq!(c.offering, ConfirmationStatus::Accepted);
    assert_eq!(c.receiving, ConfirmationStatus::Pending);
    assert_eq!(c.aggregate(), ConfirmationStatus::Pending);
    assert_eq!(c.deadline, Some(expected_deadline));
    invariants::assert_all(&c, t0());
}

#[test]
fn second_confirmation_completes_and_clears_deadline() {
    let mut c = Confirmation::new();
    c.confirm(Side::Offering, t0()).unwrap();

    let later = t0() + Duration::minutes(5);
    let transition = c.confirm(Side::Receiving, later).unwrap();

    assert_eq!(transition, Transition::FullyConfirmed);
    assert_eq!(c.aggregate(), ConfirmationStatus::Accepted);
    assert_eq!(c.deadline, None);
    invariants::assert_all(&c, later);
}

#[test]
fn repeated_confirmation_does_not_rearm_the_deadline() {
    let mut c = Confirmation::new();
    c.confirm(Side::Offering, t0()).unwrap();
    let armed = c.deadline;

    // Same side confirms again, later. Still partial, same deadline.
    let transition = c.confirm(Side::Offering, t0() + Duration::minutes(10)).unwrap();
    assert_eq!(
        transition,
        Transition::PartiallyConfirmed {
            deadline: armed.unwrap()
        }
    );
    assert_eq!(c.deadline, armed);
}

#[test]
fn cancel_is_terminal_for_both_sides() {
    let mut c = Confirmation::new();
    let transition = c.cancel(Side::Receiving).unwrap();

    assert_eq!(transition, Transition::Cancelled { by: Side::Receiving });
    assert_eq!(c.aggregate(), ConfirmationStatus::Cancelled);
    assert_eq!(c.deadline, None);

    assert_eq!(
        c.confirm(Side::Offering, t0()),
        Err(LifecycleError::AlreadyCancelled)
    );
    assert_eq!(c.cancel(Side::Offering), Err(LifecycleError::AlreadyCancelled));
    invariants::assert_all(&c, t0());
}

#[test]
fn cancel_after_partial_confirmation_drops_the_deadline() {
    let mut c = Confirmation::new();
    c.confirm(Side::Offering, t0()).unwrap();
    assert!(c.deadline.is_some());

    c.cancel(Side::Offering).unwrap();
    assert_eq!(c.aggregate(), ConfirmationStatus::Cancelled);
    assert_eq!(c.deadline, None);
    invariants::assert_all(&c, t0());
}

#[test]
fn cancel_after_full_acceptance_is_not_rejected() {
    // Acceptance is terminal by convention, not re-validated: only an
    // already-cancelled exchange rejects further actions.
    let mut c = Confirmation::new();
    c.confirm(Side::Offering, t0()).unwrap();
    c.confirm(Side::Receiving, t0()).unwrap();
    assert_eq!(c.aggregate(), ConfirmationStatus::Accepted);

    let transition = c.cancel(Side::Offering).unwrap();
    assert_eq!(transition, Transition::Cancelled { by: Side::Offering });
    assert_eq!(c.aggregate(), ConfirmationStatus::Cancelled);
}

#[test]
fn side_other_is_an_involution() {
    assert_eq!(Side::Offering.other(), Side::Receiving);
    assert_eq!(Side::Receiving.other(), Side::Offering);
    assert_eq!(Side::Offering.other().other(), Side::Offering);
}
