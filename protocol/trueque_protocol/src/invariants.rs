#![allow(dead_code)]

use chrono::{DateTime, Utc};

use crate::lifecycle::Confirmation;
use crate::types::ConfirmationStatus;

/// INV-1: Aggregate derivation. `aceptado` iff both sides accepted,
/// `cancelado` iff at least one side cancelled, `pendiente` otherwise.
pub fn assert_aggregate_derivation(c: &Confirmation) {
    use ConfirmationStatus::*;
    let expected = if c.offering == Cancelled || c.receiving == Cancelled {
        Cancelled
    } else if c.offering == Accepted && c.receiving == Accepted {
        Accepted
    } else {
        Pending
    };
    assert_eq!(
        c.aggregate(),
        expected,
        "INV-1 violated: aggregate {:?} for sides ({:?}, {:?})",
        c.aggregate(),
        c.offering,
        c.receiving
    );
}

/// INV-2: Deadline lifecycle. A deadline may exist only while the aggregate
/// is pending and exactly one side has confirmed.
pub fn assert_deadline_lifecycle(c: &Confirmation) {
    if c.deadline.is_some() {
        assert_eq!(
            c.aggregate(),
            ConfirmationStatus::Pending,
            "INV-2 violated: deadline present on a terminal exchange"
        );
        let confirmed = [c.offering, c.receiving]
            .iter()
            .filter(|s| **s == ConfirmationStatus::Accepted)
            .count();
        assert_eq!(
            confirmed, 1,
            "INV-2 violated: deadline present with {confirmed} confirmations"
        );
    }
}

/// INV-3: Penalty exclusivity. The sweep predicate fires only on the XOR
/// case — never with zero or two confirmations, never after a terminal
/// state, never before the deadline.
pub fn assert_penalty_exclusivity(c: &Confirmation, now: DateTime<Utc>) {
    if let Some(side) = c.overdue_side(now) {
        let deadline = c.deadline.expect("INV-3 violated: penalty without deadline");
        assert!(now > deadline, "INV-3 violated: penalty before the deadline");
        assert_eq!(
            c.aggregate(),
            ConfirmationStatus::Pending,
            "INV-3 violated: penalty on a terminal exchange"
        );
        assert_eq!(
            c.status_of(side.other()),
            ConfirmationStatus::Accepted,
            "INV-3 violated: penalized side's counterpart never confirmed"
        );
        assert_ne!(
            c.status_of(side),
            ConfirmationStatus::Accepted,
            "INV-3 violated: penalized side had confirmed"
        );
    }
}

/// Run every stateless invariant against a confirmation state.
pub fn assert_all(c: &Confirmation, now: DateTime<Utc>) {
    assert_aggregate_derivation(c);
    assert_deadline_lifecycle(c);
    assert_penalty_exclusivity(c, now);
}
