use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::bid::{Bid, BidId};
use crate::domain::party::Party;
use crate::errors::NegotiationError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferId(pub String);

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferStatus {
    Pending,
    Accepted,
    Rejected,
    Countered,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Countered => "countered",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "countered" => Some(Self::Countered),
            _ => None,
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub proposed_by: Party,
    pub proposer_name: String,
    pub price: Decimal,
    pub timeline: String,
    pub notes: Option<String>,
    pub status: OfferStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NegotiationStatus {
    AwaitingVendor,
    AwaitingCustomer,
    Accepted,
    Rejected,
    Locked,
}

impl NegotiationStatus {
    /// The status that hands the turn to `party`.
    pub fn awaiting(party: Party) -> Self {
        match party {
            Party::Customer => Self::AwaitingCustomer,
            Party::Vendor => Self::AwaitingVendor,
        }
    }

    pub fn turn(&self) -> Option<Party> {
        match self {
            Self::AwaitingCustomer => Some(Party::Customer),
            Self::AwaitingVendor => Some(Party::Vendor),
            Self::Accepted | Self::Rejected | Self::Locked => None,
        }
    }

    pub fn is_bargaining(&self) -> bool {
        self.turn().is_some()
    }

    pub fn has_agreed_terms(&self) -> bool {
        matches!(self, Self::Accepted | Self::Locked)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AwaitingVendor => "awaiting_vendor",
            Self::AwaitingCustomer => "awaiting_customer",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Locked => "locked",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "awaiting_vendor" => Some(Self::AwaitingVendor),
            "awaiting_customer" => Some(Self::AwaitingCustomer),
            "accepted" => Some(Self::Accepted),
            "rejected" => Some(Self::Rejected),
            "locked" => Some(Self::Locked),
            _ => None,
        }
    }
}

impl fmt::Display for NegotiationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bargaining session attached 1:1 to a bid.
///
/// Fields are only writable from the transition functions in
/// [`crate::negotiation::engine`] and [`crate::finalization`], which validate
/// before mutating. Deserialization goes through [`Negotiation::restore`] so a
/// stored row can never produce a negotiation with two pending offers or
/// finalized terms on a non-agreed status.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NegotiationParts", into = "NegotiationParts")]
pub struct Negotiation {
    pub(crate) bid_id: BidId,
    pub(crate) original_price: Decimal,
    pub(crate) original_timeline: String,
    pub(crate) status: NegotiationStatus,
    pub(crate) offers: Vec<Offer>,
    pub(crate) finalized_price: Option<Decimal>,
    pub(crate) finalized_timeline: Option<String>,
}

/// Unvalidated storage shape of a [`Negotiation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationParts {
    pub bid_id: BidId,
    pub original_price: Decimal,
    pub original_timeline: String,
    pub status: NegotiationStatus,
    pub offers: Vec<Offer>,
    pub finalized_price: Option<Decimal>,
    pub finalized_timeline: Option<String>,
}

impl Negotiation {
    /// Opens an empty negotiation. The bid is the vendor's opening position, so
    /// the ball starts in the customer's court, though either side may open.
    pub fn open(bid: &Bid) -> Self {
        Self {
            bid_id: bid.id.clone(),
            original_price: bid.original_price,
            original_timeline: bid.original_timeline.clone(),
            status: NegotiationStatus::AwaitingCustomer,
            offers: Vec::new(),
            finalized_price: None,
            finalized_timeline: None,
        }
    }

    pub fn restore(parts: NegotiationParts) -> Result<Self, NegotiationError> {
        let mut pending = parts.offers.iter().filter(|offer| offer.status == OfferStatus::Pending);
        let active = pending.next();
        if pending.next().is_some() {
            return Err(NegotiationError::InvariantViolation(format!(
                "negotiation for bid {} has more than one pending offer",
                parts.bid_id
            )));
        }

        match (parts.status.turn(), active) {
            (None, Some(offer)) => {
                return Err(NegotiationError::InvariantViolation(format!(
                    "negotiation for bid {} is {} but offer {} is still pending",
                    parts.bid_id, parts.status, offer.id
                )));
            }
            (Some(turn), Some(offer)) if turn != offer.proposed_by.counterparty() => {
                return Err(NegotiationError::InvariantViolation(format!(
                    "negotiation for bid {} is {} but pending offer {} came from the {}",
                    parts.bid_id, parts.status, offer.id, offer.proposed_by
                )));
            }
            _ => {}
        }

        let agreed = parts.status.has_agreed_terms();
        let has_terms = parts.finalized_price.is_some() && parts.finalized_timeline.is_some();
        let has_any_term = parts.finalized_price.is_some() || parts.finalized_timeline.is_some();
        if agreed != has_terms || (!agreed && has_any_term) {
            return Err(NegotiationError::InvariantViolation(format!(
                "negotiation for bid {} is {} but finalized terms are {}",
                parts.bid_id,
                parts.status,
                if has_any_term { "set" } else { "missing" }
            )));
        }

        if agreed {
            let accepted = parts.offers.iter().find(|offer| offer.status == OfferStatus::Accepted);
            let matches_offer = accepted.is_some_and(|offer| {
                Some(offer.price) == parts.finalized_price
                    && Some(&offer.timeline) == parts.finalized_timeline.as_ref()
            });
            if !matches_offer {
                return Err(NegotiationError::InvariantViolation(format!(
                    "finalized terms for bid {} do not match an accepted offer",
                    parts.bid_id
                )));
            }
        }

        Ok(Self {
            bid_id: parts.bid_id,
            original_price: parts.original_price,
            original_timeline: parts.original_timeline,
            status: parts.status,
            offers: parts.offers,
            finalized_price: parts.finalized_price,
            finalized_timeline: parts.finalized_timeline,
        })
    }

    pub fn bid_id(&self) -> &BidId {
        &self.bid_id
    }

    pub fn original_price(&self) -> Decimal {
        self.original_price
    }

    pub fn original_timeline(&self) -> &str {
        &self.original_timeline
    }

    pub fn status(&self) -> NegotiationStatus {
        self.status
    }

    /// Full chronological ledger, oldest first.
    pub fn offers(&self) -> &[Offer] {
        &self.offers
    }

    pub fn offer(&self, offer_id: &OfferId) -> Option<&Offer> {
        self.offers.iter().find(|offer| &offer.id == offer_id)
    }

    pub fn active_offer(&self) -> Option<&Offer> {
        self.offers.iter().rev().find(|offer| offer.status == OfferStatus::Pending)
    }

    pub fn finalized_price(&self) -> Option<Decimal> {
        self.finalized_price
    }

    pub fn finalized_timeline(&self) -> Option<&str> {
        self.finalized_timeline.as_deref()
    }

    pub fn round_count(&self) -> usize {
        self.offers.len()
    }

    /// Whether `party` may submit the next offer.
    pub fn may_submit(&self, party: Party) -> bool {
        match self.status.turn() {
            Some(_) if self.offers.is_empty() => true,
            Some(turn) => turn == party,
            None => false,
        }
    }

    pub fn summary(&self) -> NegotiationSummary {
        let (current_price, current_timeline) =
            match (self.finalized_price, self.finalized_timeline.as_ref(), self.latest_offer()) {
                (Some(price), Some(timeline), _) => (price, timeline.clone()),
                (_, _, Some(offer)) => (offer.price, offer.timeline.clone()),
                _ => (self.original_price, self.original_timeline.clone()),
            };

        let discount = self.original_price - current_price;
        let discount_pct = if self.original_price.is_zero() {
            Decimal::ZERO
        } else {
            (discount * Decimal::ONE_HUNDRED / self.original_price).round_dp(2)
        };

        NegotiationSummary {
            bid_id: self.bid_id.clone(),
            status: self.status,
            turn: if self.offers.is_empty() { None } else { self.status.turn() },
            round_count: self.round_count(),
            active_offer: self.active_offer().map(|offer| offer.id.clone()),
            original_price: self.original_price,
            current_price,
            current_timeline,
            discount,
            discount_pct,
        }
    }

    fn latest_offer(&self) -> Option<&Offer> {
        self.offers.last()
    }
}

impl TryFrom<NegotiationParts> for Negotiation {
    type Error = NegotiationError;

    fn try_from(parts: NegotiationParts) -> Result<Self, Self::Error> {
        Self::restore(parts)
    }
}

impl From<Negotiation> for NegotiationParts {
    fn from(value: Negotiation) -> Self {
        Self {
            bid_id: value.bid_id,
            original_price: value.original_price,
            original_timeline: value.original_timeline,
            status: value.status,
            offers: value.offers,
            finalized_price: value.finalized_price,
            finalized_timeline: value.finalized_timeline,
        }
    }
}

/// Read model for rendering a negotiation panel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NegotiationSummary {
    pub bid_id: BidId,
    pub status: NegotiationStatus,
    /// `None` before the opening offer (either side may open) and once bargaining ends.
    pub turn: Option<Party>,
    pub round_count: usize,
    pub active_offer: Option<OfferId>,
    pub original_price: Decimal,
    pub current_price: Decimal,
    pub current_timeline: String,
    pub discount: Decimal,
    pub discount_pct: Decimal,
}
