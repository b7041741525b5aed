use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::bid::BidId;
use crate::negotiation::states::{TransitionEvent, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditCategory {
    Negotiation,
    Finalization,
    Persistence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    pub bid_id: Option<BidId>,
    pub correlation_id: String,
    pub actor: String,
}

impl AuditContext {
    pub fn new(
        bid_id: Option<BidId>,
        correlation_id: impl Into<String>,
        actor: impl Into<String>,
    ) -> Self {
        Self { bid_id, correlation_id: correlation_id.into(), actor: actor.into() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub bid_id: Option<BidId>,
    pub correlation_id: String,
    pub event_type: String,
    pub category: AuditCategory,
    pub actor: String,
    pub outcome: AuditOutcome,
    pub metadata: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        context: &AuditContext,
        event_type: impl Into<String>,
        category: AuditCategory,
        outcome: AuditOutcome,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            bid_id: context.bid_id.clone(),
            correlation_id: context.correlation_id.clone(),
            event_type: event_type.into(),
            category,
            actor: context.actor.clone(),
            outcome,
            metadata: BTreeMap::new(),
            occurred_at: Utc::now(),
        }
    }

    /// Success record for an applied transition, with before/after states.
    pub fn applied(context: &AuditContext, outcome: &TransitionOutcome) -> Self {
        let category = match outcome.event {
            TransitionEvent::FinalizationRequested
            | TransitionEvent::FinalizationAccepted { .. }
            | TransitionEvent::FinalizationDeclined { .. } => AuditCategory::Finalization,
            _ => AuditCategory::Negotiation,
        };

        let event = Self::new(context, outcome.event.name(), category, AuditOutcome::Success)
            .with_metadata("operation", outcome.operation.as_str())
            .with_metadata("negotiation_from", outcome.negotiation_from.as_str())
            .with_metadata("negotiation_to", outcome.negotiation_to.as_str())
            .with_metadata("bid_from", outcome.bid_from.as_str())
            .with_metadata("bid_to", outcome.bid_to.as_str());

        match &outcome.event {
            TransitionEvent::OfferSubmitted { offer_id, countered } => {
                let event = event.with_metadata("offer_id", offer_id.0.as_str());
                match countered {
                    Some(countered) => event.with_metadata("countered", countered.0.as_str()),
                    None => event,
                }
            }
            TransitionEvent::OfferAccepted { offer_id }
            | TransitionEvent::OfferRejected { offer_id } => {
                event.with_metadata("offer_id", offer_id.0.as_str())
            }
            TransitionEvent::FinalizationAccepted { schedule } => {
                event.with_metadata("total", schedule.total.to_string())
            }
            TransitionEvent::FinalizationDeclined { reason } => {
                event.with_metadata("reason", reason.as_str())
            }
            TransitionEvent::FinalizationRequested => event,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

#[derive(Clone, Default)]
pub struct InMemoryAuditSink {
    events: Arc<Mutex<Vec<AuditEvent>>>,
}

impl InMemoryAuditSink {
    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl AuditSink for InMemoryAuditSink {
    fn emit(&self, event: AuditEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
