//! Booking service: serializes commands per bid and commits them atomically.
//!
//! Every command runs load, apply and commit while holding the bid's lock.
//! Audit, logging and notification happen after the lock is released, and a
//! failed notification never undoes a committed transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::domain::bid::{Bid, BidDraft, BidId, RequirementId};
use crate::domain::finalization::FinalizationResponse;
use crate::domain::negotiation::{NegotiationSummary, OfferId};
use crate::domain::party::Actor;
use crate::domain::record::BidRecord;
use crate::domain::Operation;
use crate::errors::{ApplicationError, NegotiationError};
use crate::finalization::{BookingConfirmation, FinalizationPolicy};
use crate::negotiation::states::{OfferProposal, TransitionOutcome};
use crate::notify::{Notifier, TransitionNotice};
use crate::schedule::PaymentSchedule;
use crate::store::BidStore;

type BidLock = Arc<tokio::sync::Mutex<()>>;

/// Upper bound on a single notifier call. The transition is already committed
/// when it runs, so a slow notifier only costs the caller this much.
pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(5);

/// Lazily created per-bid mutexes. Entries are dropped once nobody holds them.
#[derive(Default)]
struct LockRegistry {
    locks: Mutex<HashMap<BidId, BidLock>>,
}

impl LockRegistry {
    fn acquire(&self, bid_id: &BidId) -> BidLock {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(bid_id.clone()).or_default().clone()
    }

    fn release(&self, bid_id: &BidId, lock: BidLock) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        drop(lock);
        if locks.get(bid_id).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(bid_id);
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

pub struct BookingService<S, N, A> {
    store: S,
    notifier: N,
    audit: A,
    policy: FinalizationPolicy,
    notify_timeout: Duration,
    locks: LockRegistry,
}

impl<S, N, A> BookingService<S, N, A>
where
    S: BidStore,
    N: Notifier,
    A: AuditSink,
{
    pub fn new(store: S, notifier: N, audit: A, policy: FinalizationPolicy) -> Self {
        Self {
            store,
            notifier,
            audit,
            policy,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
            locks: LockRegistry::default(),
        }
    }

    pub fn with_notify_timeout(mut self, notify_timeout: Duration) -> Self {
        self.notify_timeout = notify_timeout;
        self
    }

    pub fn policy(&self) -> &FinalizationPolicy {
        &self.policy
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores a vendor's bid together with its empty negotiation.
    pub async fn submit_bid(&self, draft: BidDraft) -> Result<BidRecord, ApplicationError> {
        let bid_id = BidId(format!("BID-{}", Uuid::new_v4().simple()));
        let bid = Bid::submit(bid_id.clone(), draft, Utc::now())?;
        let record = BidRecord::new(bid);
        self.store.insert(record.clone()).await?;

        let context = AuditContext::new(Some(bid_id.clone()), Uuid::new_v4().to_string(), "vendor");
        self.audit.emit(
            AuditEvent::new(&context, "bid.submitted", AuditCategory::Negotiation, AuditOutcome::Success)
                .with_metadata("requirement_id", record.bid.requirement_id.0.as_str())
                .with_metadata("original_price", record.bid.original_price.to_string()),
        );
        info!(
            event_name = "bid.submitted",
            correlation_id = %context.correlation_id,
            bid_id = %bid_id,
            "bid submitted"
        );
        Ok(record)
    }

    pub async fn submit_offer(
        &self,
        bid_id: &BidId,
        proposal: OfferProposal,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let actor = proposal.actor.clone();
        self.execute(bid_id, &actor, Operation::SubmitOffer, move |record, now| {
            record.submit_offer(proposal, now)
        })
        .await
    }

    pub async fn accept_offer(
        &self,
        bid_id: &BidId,
        offer_id: &OfferId,
        accepter: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.execute(bid_id, accepter, Operation::AcceptOffer, |record, now| {
            record.accept_offer(offer_id, accepter, now)
        })
        .await
    }

    pub async fn reject_offer(
        &self,
        bid_id: &BidId,
        offer_id: &OfferId,
        rejecter: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.execute(bid_id, rejecter, Operation::RejectOffer, |record, now| {
            record.reject_offer(offer_id, rejecter, now)
        })
        .await
    }

    pub async fn request_finalization(
        &self,
        bid_id: &BidId,
        requester: &Actor,
    ) -> Result<TransitionOutcome, ApplicationError> {
        self.execute(bid_id, requester, Operation::RequestFinalization, |record, now| {
            record.request_finalization(requester, now)
        })
        .await
    }

    pub async fn respond_to_finalization(
        &self,
        bid_id: &BidId,
        responder: &Actor,
        response: FinalizationResponse,
    ) -> Result<TransitionOutcome, ApplicationError> {
        let policy = &self.policy;
        self.execute(bid_id, responder, Operation::RespondToFinalization, move |record, now| {
            record.respond_to_finalization(responder, response, policy, now)
        })
        .await
    }

    pub async fn record(&self, bid_id: &BidId) -> Result<BidRecord, ApplicationError> {
        self.store.load(bid_id).await?.ok_or_else(|| ApplicationError::NotFound(bid_id.clone()))
    }

    pub async fn summary(&self, bid_id: &BidId) -> Result<NegotiationSummary, ApplicationError> {
        Ok(self.record(bid_id).await?.negotiation.summary())
    }

    pub async fn payment_schedule(
        &self,
        bid_id: &BidId,
    ) -> Result<Option<PaymentSchedule>, ApplicationError> {
        Ok(self.record(bid_id).await?.payment_schedule())
    }

    pub async fn confirmation(
        &self,
        bid_id: &BidId,
    ) -> Result<Option<BookingConfirmation>, ApplicationError> {
        Ok(self.record(bid_id).await?.confirmation())
    }

    pub async fn bids_for_requirement(
        &self,
        requirement_id: &RequirementId,
    ) -> Result<Vec<BidRecord>, ApplicationError> {
        Ok(self.store.list_for_requirement(requirement_id).await?)
    }

    async fn execute<F>(
        &self,
        bid_id: &BidId,
        actor: &Actor,
        operation: Operation,
        apply: F,
    ) -> Result<TransitionOutcome, ApplicationError>
    where
        F: FnOnce(&mut BidRecord, DateTime<Utc>) -> Result<TransitionOutcome, NegotiationError>
            + Send,
    {
        let correlation_id = Uuid::new_v4().to_string();
        let context =
            AuditContext::new(Some(bid_id.clone()), correlation_id.as_str(), actor.party.as_str());

        let lock = self.locks.acquire(bid_id);
        let committed = {
            let _guard = lock.lock().await;
            debug!(
                event_name = "booking.lock_acquired",
                correlation_id = %correlation_id,
                bid_id = %bid_id,
                operation = operation.as_str(),
                "bid lock acquired"
            );
            self.apply_and_commit(bid_id, apply).await
        };
        self.locks.release(bid_id, lock);

        match committed {
            Ok(outcome) => {
                self.audit.emit(AuditEvent::applied(&context, &outcome));
                info!(
                    event_name = outcome.event.name(),
                    correlation_id = %correlation_id,
                    bid_id = %bid_id,
                    actor = %actor.party,
                    negotiation_status = outcome.negotiation_to.as_str(),
                    bid_status = outcome.bid_to.as_str(),
                    "transition applied"
                );
                self.announce(&outcome, &correlation_id).await;
                Ok(outcome)
            }
            Err(error) => {
                let (event_type, category, audit_outcome) = match &error {
                    ApplicationError::Domain(_) | ApplicationError::NotFound(_) => (
                        "negotiation.command_rejected",
                        AuditCategory::Negotiation,
                        AuditOutcome::Rejected,
                    ),
                    _ => (
                        "negotiation.command_failed",
                        AuditCategory::Persistence,
                        AuditOutcome::Failed,
                    ),
                };
                self.audit.emit(
                    AuditEvent::new(&context, event_type, category, audit_outcome)
                        .with_metadata("operation", operation.as_str())
                        .with_metadata("error_kind", error.kind())
                        .with_metadata("error", error.to_string()),
                );
                warn!(
                    event_name = event_type,
                    correlation_id = %correlation_id,
                    bid_id = %bid_id,
                    actor = %actor.party,
                    operation = operation.as_str(),
                    error_kind = error.kind(),
                    error = %error,
                    "command refused"
                );
                Err(error)
            }
        }
    }

    async fn apply_and_commit<F>(
        &self,
        bid_id: &BidId,
        apply: F,
    ) -> Result<TransitionOutcome, ApplicationError>
    where
        F: FnOnce(&mut BidRecord, DateTime<Utc>) -> Result<TransitionOutcome, NegotiationError>
            + Send,
    {
        let current =
            self.store.load(bid_id).await?.ok_or_else(|| ApplicationError::NotFound(bid_id.clone()))?;
        let expected_version = current.version;

        let mut next = current;
        let outcome = apply(&mut next, Utc::now())?;
        next.version = expected_version + 1;

        self.store.commit(next, expected_version).await?;
        Ok(outcome)
    }

    async fn announce(&self, outcome: &TransitionOutcome, correlation_id: &str) {
        let notice = TransitionNotice::from_outcome(outcome, Utc::now());
        let delivery = tokio::time::timeout(self.notify_timeout, self.notifier.notify(notice));
        let error = match delivery.await {
            Ok(Ok(())) => return,
            Ok(Err(error)) => error.to_string(),
            Err(_) => format!("no response within {}ms", self.notify_timeout.as_millis()),
        };
        warn!(
            event_name = "notify.failed",
            correlation_id = %correlation_id,
            bid_id = %outcome.bid_id,
            recipient = %outcome.recipient(),
            error = %error,
            "notification failed; transition stays committed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use rust_decimal::Decimal;

    use super::BookingService;
    use crate::audit::{AuditOutcome, InMemoryAuditSink};
    use crate::domain::bid::{BidDraft, BidId, BidStatus, CustomerId, RequirementId, VendorId};
    use crate::domain::finalization::FinalizationResponse;
    use crate::domain::negotiation::{NegotiationStatus, OfferId, OfferStatus};
    use crate::domain::party::{Actor, Party};
    use crate::errors::{ApplicationError, NegotiationError};
    use crate::finalization::FinalizationPolicy;
    use crate::negotiation::states::{OfferProposal, TransitionEvent, TransitionOutcome};
    use crate::notify::{InMemoryNotifier, Notifier, NotifyError, TransitionNotice};
    use crate::store::InMemoryBidStore;

    type TestService = BookingService<InMemoryBidStore, InMemoryNotifier, InMemoryAuditSink>;

    fn service() -> (TestService, InMemoryNotifier, InMemoryAuditSink) {
        let notifier = InMemoryNotifier::default();
        let audit = InMemoryAuditSink::default();
        let service = BookingService::new(
            InMemoryBidStore::default(),
            notifier.clone(),
            audit.clone(),
            FinalizationPolicy::default(),
        );
        (service, notifier, audit)
    }

    fn draft(requirement: &str) -> BidDraft {
        BidDraft {
            vendor_id: VendorId("V-LOTUS".to_owned()),
            customer_id: CustomerId("C-PRIYA".to_owned()),
            requirement_id: RequirementId(requirement.to_owned()),
            original_price: Decimal::new(95_000, 0),
            original_timeline: "10 days".to_owned(),
            deliverables: vec!["Stage decor".to_owned(), "Lighting".to_owned()],
        }
    }

    fn offer_id(outcome: &TransitionOutcome) -> OfferId {
        match &outcome.event {
            TransitionEvent::OfferSubmitted { offer_id, .. } => offer_id.clone(),
            other => panic!("expected an offer submission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn canonical_booking_flow_commits_each_step() {
        let (service, notifier, audit) = service();
        let customer = Actor::customer("Priya");
        let vendor = Actor::vendor("Lotus Events");
        let bid = service.submit_bid(draft("REQ-1")).await.expect("submit bid");
        let bid_id = bid.bid.id.clone();

        let first = service
            .submit_offer(
                &bid_id,
                OfferProposal::new(customer.clone(), Decimal::new(85_000, 0), "7 days"),
            )
            .await
            .expect("customer offer");
        assert_eq!(first.negotiation_to, NegotiationStatus::AwaitingVendor);

        let counter = service
            .submit_offer(
                &bid_id,
                OfferProposal::new(vendor.clone(), Decimal::new(90_000, 0), "7 days"),
            )
            .await
            .expect("vendor counter");
        service.accept_offer(&bid_id, &offer_id(&counter), &customer).await.expect("accept");
        service.request_finalization(&bid_id, &customer).await.expect("request");
        service
            .respond_to_finalization(&bid_id, &vendor, FinalizationResponse::Accept)
            .await
            .expect("finalize");

        let record = service.record(&bid_id).await.expect("record");
        assert_eq!(record.version, 6);
        assert_eq!(record.bid.status, BidStatus::Finalized);
        assert_eq!(record.negotiation.status(), NegotiationStatus::Locked);
        assert_eq!(
            record.negotiation.offer(&offer_id(&first)).map(|offer| offer.status),
            Some(OfferStatus::Countered)
        );

        let schedule =
            service.payment_schedule(&bid_id).await.expect("load").expect("schedule exists");
        assert_eq!(
            schedule.slabs.iter().map(|slab| slab.amount).collect::<Vec<_>>(),
            vec![Decimal::new(27_000, 0), Decimal::new(36_000, 0), Decimal::new(27_000, 0)]
        );
        let confirmation =
            service.confirmation(&bid_id).await.expect("load").expect("confirmation exists");
        assert!(confirmation.confirmation_code.starts_with("BK-"));

        let recipients = notifier.notices().iter().map(|notice| notice.recipient).collect::<Vec<_>>();
        assert_eq!(
            recipients,
            vec![Party::Vendor, Party::Customer, Party::Vendor, Party::Vendor, Party::Customer]
        );
        let applied = audit
            .events()
            .into_iter()
            .filter(|event| event.outcome == AuditOutcome::Success)
            .count();
        assert_eq!(applied, 6, "bid submission plus five transitions");
    }

    #[tokio::test]
    async fn refused_command_is_audited_and_changes_nothing() {
        let (service, notifier, audit) = service();
        let customer = Actor::customer("Priya");
        let bid_id = service.submit_bid(draft("REQ-1")).await.expect("submit bid").bid.id;
        service
            .submit_offer(
                &bid_id,
                OfferProposal::new(customer.clone(), Decimal::new(85_000, 0), "7 days"),
            )
            .await
            .expect("customer offer");

        let error = service
            .submit_offer(&bid_id, OfferProposal::new(customer, Decimal::new(80_000, 0), "7 days"))
            .await
            .expect_err("customer cannot move twice");

        assert_eq!(
            error,
            ApplicationError::Domain(NegotiationError::NotYourTurn {
                party: Party::Customer,
                awaiting: Party::Vendor,
            })
        );
        let record = service.record(&bid_id).await.expect("record");
        assert_eq!(record.version, 2);
        assert_eq!(record.negotiation.round_count(), 1);
        assert_eq!(notifier.notices().len(), 1);

        let rejected = audit
            .events()
            .into_iter()
            .find(|event| event.outcome == AuditOutcome::Rejected)
            .expect("rejection audited");
        assert_eq!(rejected.event_type, "negotiation.command_rejected");
        assert_eq!(rejected.metadata.get("error_kind").map(String::as_str), Some("not_your_turn"));
    }

    #[tokio::test]
    async fn unknown_bid_is_not_found() {
        let (service, _, _) = service();
        let missing = BidId("BID-missing".to_owned());

        let error = service
            .request_finalization(&missing, &Actor::customer("Priya"))
            .await
            .expect_err("no such bid");
        assert_eq!(error, ApplicationError::NotFound(missing.clone()));
        assert!(matches!(service.summary(&missing).await, Err(ApplicationError::NotFound(_))));
        assert_eq!(service.locks.len(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_counters_on_one_bid_serialize() {
        let (service, _, _) = service();
        let service = Arc::new(service);
        let bid_id = service.submit_bid(draft("REQ-1")).await.expect("submit bid").bid.id;
        service
            .submit_offer(
                &bid_id,
                OfferProposal::new(Actor::customer("Priya"), Decimal::new(85_000, 0), "7 days"),
            )
            .await
            .expect("customer offer");

        let mut handles = Vec::new();
        for price in [90_000, 91_000, 92_000, 93_000] {
            let service = Arc::clone(&service);
            let bid_id = bid_id.clone();
            handles.push(tokio::spawn(async move {
                service
                    .submit_offer(
                        &bid_id,
                        OfferProposal::new(Actor::vendor("Lotus"), Decimal::new(price, 0), "7 days"),
                    )
                    .await
            }));
        }

        let mut applied = 0;
        for handle in handles {
            match handle.await.expect("task joins") {
                Ok(_) => applied += 1,
                Err(error) => assert!(
                    matches!(error, ApplicationError::Domain(NegotiationError::NotYourTurn { .. })),
                    "unexpected error: {error:?}"
                ),
            }
        }

        assert_eq!(applied, 1);
        let record = service.record(&bid_id).await.expect("record");
        assert_eq!(record.negotiation.round_count(), 2);
        assert_eq!(record.version, 3);
        assert_eq!(record.negotiation.status(), NegotiationStatus::AwaitingCustomer);
        assert_eq!(service.locks.len(), 0);
    }

    #[tokio::test]
    async fn bids_on_one_requirement_are_listed_together() {
        let (service, _, _) = service();
        service.submit_bid(draft("REQ-1")).await.expect("first bid");
        service.submit_bid(draft("REQ-1")).await.expect("second bid");
        service.submit_bid(draft("REQ-2")).await.expect("other requirement");

        let bids = service
            .bids_for_requirement(&RequirementId("REQ-1".to_owned()))
            .await
            .expect("list");
        assert_eq!(bids.len(), 2);
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notice: TransitionNotice) -> Result<(), NotifyError> {
            Err(NotifyError::Unavailable("push gateway down".to_owned()))
        }
    }

    #[tokio::test]
    async fn notification_failure_does_not_roll_back() {
        let service = BookingService::new(
            InMemoryBidStore::default(),
            FailingNotifier,
            InMemoryAuditSink::default(),
            FinalizationPolicy::default(),
        );
        let bid_id = service.submit_bid(draft("REQ-1")).await.expect("submit bid").bid.id;

        let outcome = service
            .submit_offer(
                &bid_id,
                OfferProposal::new(Actor::vendor("Lotus"), Decimal::new(90_000, 0), "7 days"),
            )
            .await
            .expect("offer commits despite notifier");
        assert_eq!(outcome.recipient(), Party::Customer);

        let record = service.record(&bid_id).await.expect("record");
        assert_eq!(record.version, 2);
        assert_eq!(record.bid.status, BidStatus::UnderNegotiation);
    }

    struct StalledNotifier;

    #[async_trait]
    impl Notifier for StalledNotifier {
        async fn notify(&self, _notice: TransitionNotice) -> Result<(), NotifyError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn stalled_notifier_cannot_hold_a_committed_command() {
        let service = BookingService::new(
            InMemoryBidStore::default(),
            StalledNotifier,
            InMemoryAuditSink::default(),
            FinalizationPolicy::default(),
        )
        .with_notify_timeout(Duration::from_millis(50));
        let bid_id = service.submit_bid(draft("REQ-1")).await.expect("submit bid").bid.id;

        let outcome = tokio::time::timeout(
            Duration::from_secs(2),
            service.submit_offer(
                &bid_id,
                OfferProposal::new(Actor::customer("Priya"), Decimal::new(85_000, 0), "7 days"),
            ),
        )
        .await
        .expect("command returns despite the stalled notifier")
        .expect("offer commits");
        assert_eq!(outcome.negotiation_to, NegotiationStatus::AwaitingVendor);

        let record = service.record(&bid_id).await.expect("record");
        assert_eq!(record.version, 2);
    }

    #[tokio::test]
    async fn declined_finalization_keeps_requirement_open_for_other_bids() {
        let (service, _, _) = service();
        let customer = Actor::customer("Priya");
        let vendor = Actor::vendor("Lotus");
        let declined = service.submit_bid(draft("REQ-1")).await.expect("bid").bid.id;
        let other = service.submit_bid(draft("REQ-1")).await.expect("bid").bid.id;

        let opening = service
            .submit_offer(
                &declined,
                OfferProposal::new(vendor.clone(), Decimal::new(90_000, 0), "7 days"),
            )
            .await
            .expect("vendor offer");
        service.accept_offer(&declined, &offer_id(&opening), &customer).await.expect("accept");
        service.request_finalization(&declined, &customer).await.expect("request");

        let short = service
            .respond_to_finalization(
                &declined,
                &vendor,
                FinalizationResponse::Decline { reason: "no".to_owned() },
            )
            .await
            .expect_err("reason too short");
        assert!(matches!(
            short,
            ApplicationError::Domain(NegotiationError::ReasonTooShort { min_chars: 10, .. })
        ));

        service
            .respond_to_finalization(
                &declined,
                &vendor,
                FinalizationResponse::Decline { reason: "Venue unavailable on that date".to_owned() },
            )
            .await
            .expect("decline");

        let record = service.record(&declined).await.expect("record");
        assert_eq!(record.bid.status, BidStatus::Declined);
        assert_eq!(service.payment_schedule(&declined).await.expect("load"), None);

        service
            .submit_offer(&other, OfferProposal::new(customer, Decimal::new(88_000, 0), "9 days"))
            .await
            .expect("the other bid still negotiates");
    }
}
