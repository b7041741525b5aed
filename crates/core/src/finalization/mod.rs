//! Request/response handshake that turns agreed terms into a locked booking.
//!
//! The negotiation is locked only when the vendor accepts. While a request is
//! pending the negotiation sits in `accepted`, which already refuses new
//! offers, so a decline never has to unlock anything.

pub mod confirmation;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bid::{Bid, BidStatus};
use crate::domain::finalization::{FinalizationRequest, FinalizationResponse, FinalizationStatus};
use crate::domain::negotiation::{Negotiation, NegotiationStatus};
use crate::domain::party::Party;
use crate::domain::Operation;
use crate::errors::NegotiationError;
use crate::negotiation::engine;
use crate::schedule::PaymentSchedule;

pub use confirmation::BookingConfirmation;

pub const DEFAULT_DECLINE_REASON_MIN_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationPolicy {
    pub decline_reason_min_chars: usize,
}

impl Default for FinalizationPolicy {
    fn default() -> Self {
        Self { decline_reason_min_chars: DEFAULT_DECLINE_REASON_MIN_CHARS }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FinalizationOutcome {
    Finalized { schedule: PaymentSchedule },
    Declined { reason: String },
}

pub fn request_finalization(
    bid: &mut Bid,
    negotiation: &Negotiation,
    finalization: &mut FinalizationRequest,
    requester: Party,
    now: DateTime<Utc>,
) -> Result<(), NegotiationError> {
    if requester != Party::Customer {
        return Err(NegotiationError::PartyNotPermitted {
            party: requester,
            operation: Operation::RequestFinalization,
        });
    }
    if negotiation.status() != NegotiationStatus::Accepted {
        return Err(NegotiationError::NotReadyToFinalize { status: negotiation.status() });
    }
    if bid.status != BidStatus::UnderNegotiation {
        return Err(NegotiationError::invalid_state(
            Operation::RequestFinalization,
            format!("bid is {}", bid.status),
        ));
    }
    if finalization.status != FinalizationStatus::NotRequested {
        return Err(NegotiationError::invalid_state(
            Operation::RequestFinalization,
            format!("finalization is {}", finalization.status),
        ));
    }

    bid.transition_to(BidStatus::FinalizationRequested, now)?;
    finalization.status = FinalizationStatus::Requested;
    finalization.requested_at = Some(now);
    Ok(())
}

pub fn respond_to_finalization(
    bid: &mut Bid,
    negotiation: &mut Negotiation,
    finalization: &mut FinalizationRequest,
    responder: Party,
    response: FinalizationResponse,
    policy: &FinalizationPolicy,
    now: DateTime<Utc>,
) -> Result<FinalizationOutcome, NegotiationError> {
    if bid.status != BidStatus::FinalizationRequested {
        return Err(NegotiationError::invalid_state(
            Operation::RespondToFinalization,
            format!("bid is {}", bid.status),
        ));
    }
    if responder != Party::Vendor {
        return Err(NegotiationError::PartyNotPermitted {
            party: responder,
            operation: Operation::RespondToFinalization,
        });
    }

    match response {
        FinalizationResponse::Accept => {
            if negotiation.status() != NegotiationStatus::Accepted {
                return Err(NegotiationError::NotReadyToFinalize { status: negotiation.status() });
            }
            let price = negotiation.finalized_price().ok_or_else(|| {
                NegotiationError::InvariantViolation(format!(
                    "accepted negotiation for bid {} has no finalized price",
                    bid.id
                ))
            })?;
            let schedule = PaymentSchedule::derive(price)?;

            engine::lock(negotiation)?;
            bid.transition_to(BidStatus::Finalized, now)?;
            finalization.status = FinalizationStatus::Accepted;
            finalization.responded_at = Some(now);
            Ok(FinalizationOutcome::Finalized { schedule })
        }
        FinalizationResponse::Decline { reason } => {
            let reason = reason.trim().to_owned();
            let actual = reason.chars().count();
            if actual < policy.decline_reason_min_chars {
                return Err(NegotiationError::ReasonTooShort {
                    min_chars: policy.decline_reason_min_chars,
                    actual,
                });
            }

            bid.transition_to(BidStatus::Declined, now)?;
            finalization.status = FinalizationStatus::Declined;
            finalization.decline_reason = Some(reason.clone());
            finalization.responded_at = Some(now);
            Ok(FinalizationOutcome::Declined { reason })
        }
    }
}
