use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::negotiation::{Negotiation, NegotiationStatus, Offer, OfferId, OfferStatus};
use crate::domain::party::Party;
use crate::domain::terms::{normalize_notes, validate_notes, validate_price, validate_timeline};
use crate::domain::Operation;
use crate::errors::NegotiationError;
use crate::negotiation::states::OfferProposal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedOffer {
    pub offer_id: OfferId,
    /// The previously active offer, now superseded.
    pub countered: Option<OfferId>,
}

/// Appends a pending offer and hands the turn to the counterparty.
///
/// Checks run in a fixed order (state, turn, terms) and nothing is written
/// until all of them pass.
pub fn submit_offer(
    negotiation: &mut Negotiation,
    proposal: OfferProposal,
    now: DateTime<Utc>,
) -> Result<SubmittedOffer, NegotiationError> {
    let submitter = proposal.actor.party;
    let Some(turn) = negotiation.status.turn() else {
        return Err(NegotiationError::invalid_state(
            Operation::SubmitOffer,
            format!("negotiation is {}", negotiation.status),
        ));
    };
    if !negotiation.offers.is_empty() && turn != submitter {
        return Err(NegotiationError::NotYourTurn { party: submitter, awaiting: turn });
    }

    validate_price(proposal.price)?;
    validate_timeline(&proposal.timeline)?;
    validate_notes(proposal.notes.as_deref())?;

    let countered = negotiation
        .offers
        .iter_mut()
        .rev()
        .find(|offer| offer.status == OfferStatus::Pending)
        .map(|offer| {
            offer.status = OfferStatus::Countered;
            offer.id.clone()
        });

    let offer_id = OfferId(Uuid::new_v4().to_string());
    negotiation.offers.push(Offer {
        id: offer_id.clone(),
        proposed_by: submitter,
        proposer_name: proposal.actor.display_name,
        price: proposal.price,
        timeline: proposal.timeline.trim().to_owned(),
        notes: normalize_notes(proposal.notes),
        status: OfferStatus::Pending,
        created_at: now,
    });
    negotiation.status = NegotiationStatus::awaiting(submitter.counterparty());

    Ok(SubmittedOffer { offer_id, countered })
}

/// Accepts the counterparty's pending offer and records it as the agreed terms.
pub fn accept_offer(
    negotiation: &mut Negotiation,
    offer_id: &OfferId,
    accepter: Party,
) -> Result<(), NegotiationError> {
    let index = respondable_offer(negotiation, offer_id, accepter, Operation::AcceptOffer)?;

    let offer = &mut negotiation.offers[index];
    offer.status = OfferStatus::Accepted;
    negotiation.finalized_price = Some(offer.price);
    negotiation.finalized_timeline = Some(offer.timeline.clone());
    negotiation.status = NegotiationStatus::Accepted;
    Ok(())
}

/// Rejects the counterparty's pending offer, ending the negotiation.
pub fn reject_offer(
    negotiation: &mut Negotiation,
    offer_id: &OfferId,
    rejecter: Party,
) -> Result<(), NegotiationError> {
    let index = respondable_offer(negotiation, offer_id, rejecter, Operation::RejectOffer)?;

    negotiation.offers[index].status = OfferStatus::Rejected;
    negotiation.status = NegotiationStatus::Rejected;
    Ok(())
}

/// Freezes agreed terms. Only reachable from the finalization workflow.
pub(crate) fn lock(negotiation: &mut Negotiation) -> Result<(), NegotiationError> {
    if negotiation.status != NegotiationStatus::Accepted {
        return Err(NegotiationError::NotReadyToFinalize { status: negotiation.status });
    }
    negotiation.status = NegotiationStatus::Locked;
    Ok(())
}

fn respondable_offer(
    negotiation: &Negotiation,
    offer_id: &OfferId,
    responder: Party,
    operation: Operation,
) -> Result<usize, NegotiationError> {
    if !negotiation.status.is_bargaining() {
        return Err(NegotiationError::invalid_state(
            operation,
            format!("negotiation is {}", negotiation.status),
        ));
    }

    let index = negotiation
        .offers
        .iter()
        .position(|offer| &offer.id == offer_id)
        .ok_or_else(|| NegotiationError::OfferNotFound(offer_id.clone()))?;

    let offer = &negotiation.offers[index];
    if offer.status != OfferStatus::Pending {
        return Err(NegotiationError::OfferNotPending {
            offer_id: offer_id.clone(),
            status: offer.status,
        });
    }
    if offer.proposed_by == responder {
        return Err(NegotiationError::SelfAcceptanceForbidden {
            party: responder,
            offer_id: offer_id.clone(),
        });
    }

    Ok(index)
}
