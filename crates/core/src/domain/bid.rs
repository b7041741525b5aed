use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::terms::{validate_price, validate_timeline};
use crate::errors::NegotiationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BidId(pub String);

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VendorId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequirementId(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BidStatus {
    Submitted,
    UnderNegotiation,
    FinalizationRequested,
    Finalized,
    Declined,
}

impl BidStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderNegotiation => "under_negotiation",
            Self::FinalizationRequested => "finalization_requested",
            Self::Finalized => "finalized",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "under_negotiation" => Some(Self::UnderNegotiation),
            "finalization_requested" => Some(Self::FinalizationRequested),
            "finalized" => Some(Self::Finalized),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finalized | Self::Declined)
    }
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Vendor's response to a customer requirement, before it is stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BidDraft {
    pub vendor_id: VendorId,
    pub customer_id: CustomerId,
    pub requirement_id: RequirementId,
    pub original_price: Decimal,
    pub original_timeline: String,
    pub deliverables: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub vendor_id: VendorId,
    pub customer_id: CustomerId,
    pub requirement_id: RequirementId,
    pub original_price: Decimal,
    pub original_timeline: String,
    pub deliverables: Vec<String>,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Bid {
    pub fn submit(id: BidId, draft: BidDraft, now: DateTime<Utc>) -> Result<Self, NegotiationError> {
        validate_price(draft.original_price)?;
        validate_timeline(&draft.original_timeline)?;

        let deliverables: Vec<String> = draft
            .deliverables
            .into_iter()
            .map(|item| item.trim().to_owned())
            .filter(|item| !item.is_empty())
            .collect();
        if deliverables.is_empty() {
            return Err(NegotiationError::InvalidTerms(
                "a bid must list at least one deliverable".to_owned(),
            ));
        }

        Ok(Self {
            id,
            vendor_id: draft.vendor_id,
            customer_id: draft.customer_id,
            requirement_id: draft.requirement_id,
            original_price: draft.original_price,
            original_timeline: draft.original_timeline.trim().to_owned(),
            deliverables,
            status: BidStatus::Submitted,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn can_transition_to(&self, next: BidStatus) -> bool {
        matches!(
            (self.status, next),
            (BidStatus::Submitted, BidStatus::UnderNegotiation)
                | (BidStatus::UnderNegotiation, BidStatus::FinalizationRequested)
                | (BidStatus::FinalizationRequested, BidStatus::Finalized)
                | (BidStatus::FinalizationRequested, BidStatus::Declined)
                | (BidStatus::Submitted, BidStatus::Declined)
                | (BidStatus::UnderNegotiation, BidStatus::Declined)
        )
    }

    pub fn transition_to(
        &mut self,
        next: BidStatus,
        now: DateTime<Utc>,
    ) -> Result<(), NegotiationError> {
        if self.can_transition_to(next) {
            self.status = next;
            self.updated_at = now;
            return Ok(());
        }

        Err(NegotiationError::InvalidBidTransition { from: self.status, to: next })
    }

    /// Whether offers may still be exchanged on this bid.
    pub fn is_open_for_offers(&self) -> bool {
        matches!(self.status, BidStatus::Submitted | BidStatus::UnderNegotiation)
    }
}
