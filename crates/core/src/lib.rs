pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod finalization;
pub mod negotiation;
pub mod notify;
pub mod schedule;
pub mod service;
pub mod store;

pub use domain::bid::{Bid, BidDraft, BidId, BidStatus, CustomerId, RequirementId, VendorId};
pub use domain::finalization::{FinalizationRequest, FinalizationResponse, FinalizationStatus};
pub use domain::negotiation::{
    Negotiation, NegotiationStatus, NegotiationSummary, Offer, OfferId, OfferStatus,
};
pub use domain::party::{Actor, Party};
pub use domain::record::BidRecord;
pub use domain::Operation;
pub use errors::{ApplicationError, InterfaceError, NegotiationError};
pub use finalization::{BookingConfirmation, FinalizationPolicy};
pub use negotiation::{OfferProposal, TransitionEvent, TransitionOutcome};
pub use notify::{
    InMemoryNotifier, NoopNotifier, Notifier, NotifyError, TracingNotifier, TransitionNotice,
};
pub use schedule::{PaymentSchedule, PaymentSlab, PaymentStage};
pub use service::BookingService;
pub use store::{BidStore, InMemoryBidStore, StoreError};
