//! Legal edges of the payment state graph.
//!
//! The gateway is the authority on forward progress, so any non-terminal
//! status may move to any other status except `REFUNDED`. Terminal statuses
//! are final, with the single exception of `SUCCEEDED → REFUNDED`.
//! Re-applying the current status is a successful no-op.

use {super::payment::PaymentStatus, thiserror::Error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Unchanged,
    Advance,
}

/// A rejected move. Callers drop the event as stale or duplicate; it is
/// never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal status transition: {from} → {to}")]
pub struct IllegalTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

pub struct StatusTransitionGuard;

impl StatusTransitionGuard {
    pub fn check(from: PaymentStatus, to: PaymentStatus) -> Result<Transition, IllegalTransition> {
        if from == to {
            return Ok(Transition::Unchanged);
        }
        if from.can_transition_to(to) {
            Ok(Transition::Advance)
        } else {
            Err(IllegalTransition { from, to })
        }
    }
}

impl PaymentStatus {
    /// Whether `self → next` is an edge of the state graph. Identity is not an
    /// edge; see [`StatusTransitionGuard::check`] for the idempotent form.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (*self, next) {
            (from, to) if from == to => false,
            (Succeeded, Refunded) => true,
            (from, _) if from.is_terminal() => false,
            (_, Refunded) => false,
            _ => true,
        }
    }
}
