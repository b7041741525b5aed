//! Outbound notifications to the party that did not cause a transition.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::bid::BidId;
use crate::domain::party::Party;
use crate::negotiation::states::{TransitionEvent, TransitionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionNotice {
    pub bid_id: BidId,
    pub event: TransitionEvent,
    pub recipient: Party,
    pub occurred_at: DateTime<Utc>,
}

impl TransitionNotice {
    pub fn from_outcome(outcome: &TransitionOutcome, occurred_at: DateTime<Utc>) -> Self {
        Self {
            bid_id: outcome.bid_id.clone(),
            event: outcome.event.clone(),
            recipient: outcome.recipient(),
            occurred_at,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NotifyError {
    #[error("notification channel unavailable: {0}")]
    Unavailable(String),
    #[error("notification rejected: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: TransitionNotice) -> Result<(), NotifyError>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _notice: TransitionNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Writes each notice as a structured log event.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, notice: TransitionNotice) -> Result<(), NotifyError> {
        info!(
            event_name = "notify.transition",
            bid_id = %notice.bid_id,
            recipient = %notice.recipient,
            transition = notice.event.name(),
            "notifying counterparty"
        );
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryNotifier {
    notices: Arc<Mutex<Vec<TransitionNotice>>>,
}

impl InMemoryNotifier {
    pub fn notices(&self) -> Vec<TransitionNotice> {
        match self.notices.lock() {
            Ok(notices) => notices.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

#[async_trait]
impl Notifier for InMemoryNotifier {
    async fn notify(&self, notice: TransitionNotice) -> Result<(), NotifyError> {
        match self.notices.lock() {
            Ok(mut notices) => notices.push(notice),
            Err(poisoned) => poisoned.into_inner().push(notice),
        }
        Ok(())
    }
}
