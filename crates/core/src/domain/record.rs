use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bid::{Bid, BidStatus};
use crate::domain::finalization::{FinalizationRequest, FinalizationResponse};
use crate::domain::negotiation::{Negotiation, NegotiationStatus, OfferId};
use crate::domain::party::{Actor, Party};
use crate::domain::Operation;
use crate::errors::NegotiationError;
use crate::finalization::{self, BookingConfirmation, FinalizationOutcome, FinalizationPolicy};
use crate::negotiation::engine;
use crate::negotiation::states::{OfferProposal, TransitionEvent, TransitionOutcome};
use crate::schedule::PaymentSchedule;

/// A bid together with its negotiation and finalization handshake.
///
/// This is the unit that is locked, loaded and committed as one. Each command
/// validates against all three parts before writing any of them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BidRecord {
    pub bid: Bid,
    pub negotiation: Negotiation,
    pub finalization: FinalizationRequest,
    pub version: u64,
}

impl BidRecord {
    pub fn new(bid: Bid) -> Self {
        let negotiation = Negotiation::open(&bid);
        let finalization = FinalizationRequest::none(bid.id.clone());
        Self { bid, negotiation, finalization, version: 1 }
    }

    pub fn submit_offer(
        &mut self,
        proposal: OfferProposal,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let actor = proposal.actor.party;
        self.ensure_open(Operation::SubmitOffer)?;

        let snapshot = self.snapshot();
        let submitted = engine::submit_offer(&mut self.negotiation, proposal, now)?;
        if self.bid.status == BidStatus::Submitted {
            self.bid.transition_to(BidStatus::UnderNegotiation, now)?;
        } else {
            self.bid.updated_at = now;
        }

        Ok(self.outcome(
            snapshot,
            Operation::SubmitOffer,
            actor,
            TransitionEvent::OfferSubmitted {
                offer_id: submitted.offer_id,
                countered: submitted.countered,
            },
        ))
    }

    pub fn accept_offer(
        &mut self,
        offer_id: &OfferId,
        accepter: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        self.ensure_open(Operation::AcceptOffer)?;
        let snapshot = self.snapshot();
        engine::accept_offer(&mut self.negotiation, offer_id, accepter.party)?;
        self.bid.updated_at = now;

        Ok(self.outcome(
            snapshot,
            Operation::AcceptOffer,
            accepter.party,
            TransitionEvent::OfferAccepted { offer_id: offer_id.clone() },
        ))
    }

    pub fn reject_offer(
        &mut self,
        offer_id: &OfferId,
        rejecter: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        self.ensure_open(Operation::RejectOffer)?;

        let snapshot = self.snapshot();
        engine::reject_offer(&mut self.negotiation, offer_id, rejecter.party)?;
        self.bid.transition_to(BidStatus::Declined, now)?;

        Ok(self.outcome(
            snapshot,
            Operation::RejectOffer,
            rejecter.party,
            TransitionEvent::OfferRejected { offer_id: offer_id.clone() },
        ))
    }

    pub fn request_finalization(
        &mut self,
        requester: &Actor,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let snapshot = self.snapshot();
        finalization::request_finalization(
            &mut self.bid,
            &self.negotiation,
            &mut self.finalization,
            requester.party,
            now,
        )?;

        Ok(self.outcome(
            snapshot,
            Operation::RequestFinalization,
            requester.party,
            TransitionEvent::FinalizationRequested,
        ))
    }

    pub fn respond_to_finalization(
        &mut self,
        responder: &Actor,
        response: FinalizationResponse,
        policy: &FinalizationPolicy,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, NegotiationError> {
        let snapshot = self.snapshot();
        let outcome = finalization::respond_to_finalization(
            &mut self.bid,
            &mut self.negotiation,
            &mut self.finalization,
            responder.party,
            response,
            policy,
            now,
        )?;

        let event = match outcome {
            FinalizationOutcome::Finalized { schedule } => {
                TransitionEvent::FinalizationAccepted { schedule }
            }
            FinalizationOutcome::Declined { reason } => {
                TransitionEvent::FinalizationDeclined { reason }
            }
        };
        Ok(self.outcome(snapshot, Operation::RespondToFinalization, responder.party, event))
    }

    /// Payment schedule for the agreed price once the booking is locked.
    pub fn payment_schedule(&self) -> Option<PaymentSchedule> {
        if self.bid.status != BidStatus::Finalized {
            return None;
        }
        self.negotiation.finalized_price().and_then(|price| PaymentSchedule::derive(price).ok())
    }

    pub fn confirmation(&self) -> Option<BookingConfirmation> {
        BookingConfirmation::issue(&self.bid, &self.negotiation, &self.finalization)
    }

    fn ensure_open(&self, operation: Operation) -> Result<(), NegotiationError> {
        if self.bid.is_open_for_offers() {
            return Ok(());
        }
        Err(NegotiationError::invalid_state(operation, format!("bid is {}", self.bid.status)))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot { negotiation: self.negotiation.status(), bid: self.bid.status }
    }

    fn outcome(
        &self,
        before: Snapshot,
        operation: Operation,
        actor: Party,
        event: TransitionEvent,
    ) -> TransitionOutcome {
        TransitionOutcome {
            bid_id: self.bid.id.clone(),
            operation,
            actor,
            event,
            negotiation_from: before.negotiation,
            negotiation_to: self.negotiation.status(),
            bid_from: before.bid,
            bid_to: self.bid.status,
        }
    }
}

#[derive(Clone, Copy)]
struct Snapshot {
    negotiation: NegotiationStatus,
    bid: BidStatus,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::BidRecord;
    use crate::domain::bid::{Bid, BidDraft, BidId, BidStatus, CustomerId, RequirementId, VendorId};
    use crate::domain::finalization::{FinalizationResponse, FinalizationStatus};
    use crate::domain::negotiation::{NegotiationStatus, OfferId, OfferStatus};
    use crate::domain::party::{Actor, Party};
    use crate::errors::NegotiationError;
    use crate::finalization::FinalizationPolicy;
    use crate::negotiation::states::{OfferProposal, TransitionEvent};
    use crate::schedule::PaymentStage;

    fn record() -> BidRecord {
        BidRecord::new(
            Bid::submit(
                BidId("BID-95".to_owned()),
                BidDraft {
                    vendor_id: VendorId("V-9".to_owned()),
                    customer_id: CustomerId("C-9".to_owned()),
                    requirement_id: RequirementId("REQ-9".to_owned()),
                    original_price: Decimal::new(95_000, 0),
                    original_timeline: "10 days".to_owned(),
                    deliverables: vec!["Decor".to_owned(), "Sound".to_owned()],
                },
                Utc::now(),
            )
            .expect("bid fixture"),
        )
    }

    fn submitted_id(event: &TransitionEvent) -> OfferId {
        match event {
            TransitionEvent::OfferSubmitted { offer_id, .. } => offer_id.clone(),
            other => panic!("expected offer submission, got {other:?}"),
        }
    }

    #[test]
    fn canonical_scenario_reaches_a_locked_booking() {
        let customer = Actor::customer("Priya");
        let vendor = Actor::vendor("Lotus Events");
        let mut record = record();

        let opening = record
            .submit_offer(
                OfferProposal::new(customer.clone(), Decimal::new(85_000, 0), "7 days"),
                Utc::now(),
            )
            .expect("customer opens");
        assert_eq!(opening.negotiation_to, NegotiationStatus::AwaitingVendor);
        assert_eq!(opening.bid_from, BidStatus::Submitted);
        assert_eq!(opening.bid_to, BidStatus::UnderNegotiation);
        assert_eq!(opening.recipient(), Party::Vendor);
        let offer1 = submitted_id(&opening.event);

        let counter = record
            .submit_offer(
                OfferProposal::new(vendor.clone(), Decimal::new(90_000, 0), "7 days"),
                Utc::now(),
            )
            .expect("vendor counters");
        let offer2 = submitted_id(&counter.event);
        assert_eq!(counter.negotiation_to, NegotiationStatus::AwaitingCustomer);
        assert_eq!(
            record.negotiation.offer(&offer1).map(|offer| offer.status),
            Some(OfferStatus::Countered)
        );

        record.accept_offer(&offer2, &customer, Utc::now()).expect("customer accepts");
        assert_eq!(record.negotiation.status(), NegotiationStatus::Accepted);
        assert_eq!(record.negotiation.finalized_price(), Some(Decimal::new(90_000, 0)));
        assert!(record.payment_schedule().is_none(), "no schedule before finalization");

        record.request_finalization(&customer, Utc::now()).expect("customer requests");
        assert_eq!(record.bid.status, BidStatus::FinalizationRequested);

        let finalized = record
            .respond_to_finalization(
                &vendor,
                FinalizationResponse::Accept,
                &FinalizationPolicy::default(),
                Utc::now(),
            )
            .expect("vendor accepts");
        assert_eq!(finalized.bid_to, BidStatus::Finalized);
        assert_eq!(finalized.negotiation_to, NegotiationStatus::Locked);

        let schedule = record.payment_schedule().expect("schedule after finalization");
        assert_eq!(
            schedule.slabs.iter().map(|slab| slab.amount).collect::<Vec<_>>(),
            vec![Decimal::new(27_000, 0), Decimal::new(36_000, 0), Decimal::new(27_000, 0)]
        );
        assert_eq!(
            schedule.slab(PaymentStage::PreEvent).map(|slab| slab.amount),
            Some(Decimal::new(36_000, 0))
        );

        let confirmation = record.confirmation().expect("confirmation");
        assert_eq!(confirmation.finalized_price, Decimal::new(90_000, 0));
        assert_eq!(confirmation.deliverables, vec!["Decor".to_owned(), "Sound".to_owned()]);
        assert_eq!(record.finalization.status, FinalizationStatus::Accepted);
    }

    #[test]
    fn locked_record_refuses_all_negotiation_commands() {
        let customer = Actor::customer("Priya");
        let vendor = Actor::vendor("Lotus Events");
        let mut record = record();
        let opening = record
            .submit_offer(
                OfferProposal::new(vendor.clone(), Decimal::new(92_000, 0), "8 days"),
                Utc::now(),
            )
            .expect("vendor opens");
        let offer = submitted_id(&opening.event);
        record.accept_offer(&offer, &customer, Utc::now()).expect("accept");
        record.request_finalization(&customer, Utc::now()).expect("request");
        record
            .respond_to_finalization(
                &vendor,
                FinalizationResponse::Accept,
                &FinalizationPolicy::default(),
                Utc::now(),
            )
            .expect("finalize");
        let before = record.clone();

        let errors = [
            record
                .submit_offer(
                    OfferProposal::new(customer.clone(), Decimal::new(1, 0), "1 day"),
                    Utc::now(),
                )
                .expect_err("submit"),
            record.accept_offer(&offer, &customer, Utc::now()).expect_err("accept"),
            record.reject_offer(&offer, &customer, Utc::now()).expect_err("reject"),
        ];
        for error in errors {
            assert!(matches!(error, NegotiationError::InvalidState { .. }), "{error:?}");
        }
        assert_eq!(record, before);
    }

    #[test]
    fn rejection_declines_the_bid() {
        let mut record = record();
        let opening = record
            .submit_offer(
                OfferProposal::new(Actor::customer("Priya"), Decimal::new(40_000, 0), "3 days"),
                Utc::now(),
            )
            .expect("lowball");
        let offer = submitted_id(&opening.event);

        let outcome =
            record.reject_offer(&offer, &Actor::vendor("Lotus"), Utc::now()).expect("reject");
        assert_eq!(outcome.negotiation_to, NegotiationStatus::Rejected);
        assert_eq!(outcome.bid_to, BidStatus::Declined);
        assert_eq!(outcome.recipient(), Party::Customer);
    }

    #[test]
    fn failed_command_leaves_record_untouched() {
        let mut record = record();
        let before = record.clone();
        let error = record
            .request_finalization(&Actor::customer("Priya"), Utc::now())
            .expect_err("no agreement yet");
        assert!(matches!(error, NegotiationError::NotReadyToFinalize { .. }));
        assert_eq!(record, before);
    }
}
