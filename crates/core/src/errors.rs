use thiserror::Error;

use crate::domain::bid::{BidId, BidStatus};
use crate::domain::negotiation::{NegotiationStatus, OfferId, OfferStatus};
use crate::domain::party::Party;
use crate::domain::Operation;
use crate::store::StoreError;

/// Rejected commands. Every variant is detected before any entity is touched.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NegotiationError {
    #[error("cannot {operation} while {state}")]
    InvalidState { operation: Operation, state: String },
    #[error("invalid bid transition from {from} to {to}")]
    InvalidBidTransition { from: BidStatus, to: BidStatus },
    #[error("it is not the {party}'s turn; awaiting {awaiting}")]
    NotYourTurn { party: Party, awaiting: Party },
    #[error("{party} cannot respond to its own offer {offer_id}")]
    SelfAcceptanceForbidden { party: Party, offer_id: OfferId },
    #[error("offer {0} not found")]
    OfferNotFound(OfferId),
    #[error("offer {offer_id} is {status}, not pending")]
    OfferNotPending { offer_id: OfferId, status: OfferStatus },
    #[error("invalid terms: {0}")]
    InvalidTerms(String),
    #[error("decline reason must be at least {min_chars} characters (got {actual})")]
    ReasonTooShort { min_chars: usize, actual: usize },
    #[error("negotiation is {status}; only accepted terms can be finalized")]
    NotReadyToFinalize { status: NegotiationStatus },
    #[error("{party} is not permitted to {operation}")]
    PartyNotPermitted { party: Party, operation: Operation },
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

impl NegotiationError {
    pub(crate) fn invalid_state(operation: Operation, state: impl Into<String>) -> Self {
        Self::InvalidState { operation, state: state.into() }
    }

    /// Stable machine-readable error class.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidState { .. } | Self::InvalidBidTransition { .. } => "invalid_state",
            Self::NotYourTurn { .. } => "not_your_turn",
            Self::SelfAcceptanceForbidden { .. } => "self_acceptance_forbidden",
            Self::OfferNotFound(_) => "offer_not_found",
            Self::OfferNotPending { .. } => "offer_not_pending",
            Self::InvalidTerms(_) => "invalid_terms",
            Self::ReasonTooShort { .. } => "reason_too_short",
            Self::NotReadyToFinalize { .. } => "not_ready_to_finalize",
            Self::PartyNotPermitted { .. } => "party_not_permitted",
            Self::InvariantViolation(_) => "invariant_violation",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] NegotiationError),
    #[error("bid {0} not found")]
    NotFound(BidId),
    #[error("concurrent modification: {0}")]
    Conflict(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

impl ApplicationError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Domain(error) => error.kind(),
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }
}

impl From<StoreError> for ApplicationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::AlreadyExists(bid_id) => {
                Self::Conflict(format!("bid {bid_id} already exists"))
            }
            conflict @ StoreError::Conflict { .. } => Self::Conflict(conflict.to_string()),
            StoreError::Backend(message) => Self::Persistence(message),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request ({kind}): {message}")]
    BadRequest { kind: &'static str, message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "The requested bid could not be found.",
            Self::Conflict { .. } => {
                "The negotiation changed while your request was processed. Refresh and try again."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Domain(error) => {
                Self::BadRequest { kind: error.kind(), message: error.to_string(), correlation_id }
            }
            ApplicationError::NotFound(bid_id) => {
                Self::NotFound { message: format!("bid {bid_id}"), correlation_id }
            }
            ApplicationError::Conflict(message) => Self::Conflict { message, correlation_id },
            ApplicationError::Persistence(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::Configuration(message) => Self::Internal { message, correlation_id },
        }
    }
}
