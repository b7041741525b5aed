use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::bid::BidId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizationStatus {
    #[serde(rename = "none")]
    NotRequested,
    Requested,
    Accepted,
    Declined,
}

impl FinalizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequested => "none",
            Self::Requested => "requested",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "none" => Some(Self::NotRequested),
            "requested" => Some(Self::Requested),
            "accepted" => Some(Self::Accepted),
            "declined" => Some(Self::Declined),
            _ => None,
        }
    }
}

impl fmt::Display for FinalizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handshake that turns agreed terms into a booking.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizationRequest {
    pub bid_id: BidId,
    pub status: FinalizationStatus,
    pub decline_reason: Option<String>,
    pub requested_at: Option<DateTime<Utc>>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl FinalizationRequest {
    pub fn none(bid_id: BidId) -> Self {
        Self {
            bid_id,
            status: FinalizationStatus::NotRequested,
            decline_reason: None,
            requested_at: None,
            responded_at: None,
        }
    }
}

/// The vendor's answer to a finalization request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum FinalizationResponse {
    Accept,
    Decline { reason: String },
}
