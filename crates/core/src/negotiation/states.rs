use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bid::{BidId, BidStatus};
use crate::domain::negotiation::{NegotiationStatus, OfferId};
use crate::domain::party::{Actor, Party};
use crate::domain::Operation;
use crate::schedule::PaymentSchedule;

/// Terms put forward by one side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfferProposal {
    pub actor: Actor,
    pub price: Decimal,
    pub timeline: String,
    pub notes: Option<String>,
}

impl OfferProposal {
    pub fn new(actor: Actor, price: Decimal, timeline: impl Into<String>) -> Self {
        Self { actor, price, timeline: timeline.into(), notes: None }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransitionEvent {
    OfferSubmitted { offer_id: OfferId, countered: Option<OfferId> },
    OfferAccepted { offer_id: OfferId },
    OfferRejected { offer_id: OfferId },
    FinalizationRequested,
    FinalizationAccepted { schedule: PaymentSchedule },
    FinalizationDeclined { reason: String },
}

impl TransitionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::OfferSubmitted { .. } => "negotiation.offer_submitted",
            Self::OfferAccepted { .. } => "negotiation.offer_accepted",
            Self::OfferRejected { .. } => "negotiation.offer_rejected",
            Self::FinalizationRequested => "finalization.requested",
            Self::FinalizationAccepted { .. } => "finalization.accepted",
            Self::FinalizationDeclined { .. } => "finalization.declined",
        }
    }
}

/// What a successful command changed, for audit, logging and notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub bid_id: BidId,
    pub operation: Operation,
    pub actor: Party,
    pub event: TransitionEvent,
    pub negotiation_from: NegotiationStatus,
    pub negotiation_to: NegotiationStatus,
    pub bid_from: BidStatus,
    pub bid_to: BidStatus,
}

impl TransitionOutcome {
    /// Every transition is announced to the side that did not cause it.
    pub fn recipient(&self) -> Party {
        self.actor.counterparty()
    }
}
