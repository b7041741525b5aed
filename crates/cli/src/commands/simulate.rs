use anyhow::{bail, Context};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::commands::{runtime, CommandResult};
use dealroom_core::audit::InMemoryAuditSink;
use dealroom_core::config::{AppConfig, LoadOptions};
use dealroom_core::{
    Actor, ApplicationError, BidDraft, BidId, BidStatus, BidStore, BookingConfirmation,
    BookingService, CustomerId, FinalizationPolicy, FinalizationResponse, InMemoryBidStore,
    NegotiationStatus, OfferId, OfferProposal, RequirementId, TracingNotifier, TransitionEvent,
    TransitionOutcome, VendorId,
};
use dealroom_db::{connect_with_config, migrations, SqlBidStore};

#[derive(Debug, Serialize)]
struct SimulationReport {
    store: &'static str,
    bid_id: BidId,
    bid_status: BidStatus,
    negotiation_status: NegotiationStatus,
    version: u64,
    steps: Vec<TransitionOutcome>,
    confirmation: Option<BookingConfirmation>,
    audit_events: usize,
}

pub fn run(in_memory: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "simulate",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match runtime("simulate") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    let policy = config.finalization_policy();
    let correlation_id = Uuid::new_v4().to_string();
    let result = runtime.block_on(async {
        if in_memory {
            return run_scenario(InMemoryBidStore::default(), "memory", policy)
                .await
                .map_err(|error| classify(error, &correlation_id));
        }

        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;
        let report = run_scenario(SqlBidStore::new(pool.clone()), "sqlite", policy)
            .await
            .map_err(|error| classify(error, &correlation_id));
        pool.close().await;
        report
    });

    match result {
        Ok(report) => CommandResult::success_with(
            "simulate",
            format!("bid {} finalized after {} steps", report.bid_id, report.steps.len()),
            report,
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("simulate", error_class, message, exit_code)
        }
    }
}

fn classify(error: anyhow::Error, correlation_id: &str) -> (&'static str, String, u8) {
    match error.downcast_ref::<ApplicationError>() {
        Some(application) => {
            let kind = application.kind();
            let interface = application.clone().into_interface(correlation_id);
            (
                kind,
                format!("{error:#} ({}; correlation_id={})", interface.user_message(), correlation_id),
                6,
            )
        }
        None => ("simulation", format!("{error:#}"), 6),
    }
}

/// Replays a vendor bid through one counter-offer round into a confirmed booking.
async fn run_scenario<S: BidStore>(
    store: S,
    store_name: &'static str,
    policy: FinalizationPolicy,
) -> anyhow::Result<SimulationReport> {
    let audit = InMemoryAuditSink::default();
    let service = BookingService::new(store, TracingNotifier, audit.clone(), policy);
    let customer = Actor::customer("Priya Sharma");
    let vendor = Actor::vendor("Lotus Events");

    let record = service
        .submit_bid(BidDraft {
            vendor_id: VendorId("V-LOTUS".to_owned()),
            customer_id: CustomerId("C-PRIYA".to_owned()),
            requirement_id: RequirementId("REQ-WEDDING-DECOR".to_owned()),
            original_price: Decimal::new(95_000, 0),
            original_timeline: "10 days".to_owned(),
            deliverables: vec![
                "Stage decor".to_owned(),
                "Floral arrangements".to_owned(),
                "Lighting".to_owned(),
            ],
        })
        .await
        .context("vendor bid submission")?;
    let bid_id = record.bid.id.clone();
    info!(event_name = "simulate.bid_submitted", bid_id = %bid_id, store = store_name, "simulation started");

    let mut steps = Vec::new();

    let opening = service
        .submit_offer(
            &bid_id,
            OfferProposal::new(customer.clone(), Decimal::new(85_000, 0), "7 days")
                .with_notes("Can we tighten the timeline?"),
        )
        .await
        .context("customer opening offer")?;
    steps.push(opening);

    let counter = service
        .submit_offer(&bid_id, OfferProposal::new(vendor.clone(), Decimal::new(90_000, 0), "7 days"))
        .await
        .context("vendor counter-offer")?;
    let counter_id = submitted_offer(&counter)?;
    steps.push(counter);

    steps.push(
        service
            .accept_offer(&bid_id, &counter_id, &customer)
            .await
            .context("customer accepts counter-offer")?,
    );
    steps.push(
        service
            .request_finalization(&bid_id, &customer)
            .await
            .context("customer requests finalization")?,
    );
    steps.push(
        service
            .respond_to_finalization(&bid_id, &vendor, FinalizationResponse::Accept)
            .await
            .context("vendor confirms finalization")?,
    );

    let record = service.record(&bid_id).await.context("reload finalized bid")?;
    Ok(SimulationReport {
        store: store_name,
        bid_id,
        bid_status: record.bid.status,
        negotiation_status: record.negotiation.status(),
        version: record.version,
        confirmation: record.confirmation(),
        steps,
        audit_events: audit.events().len(),
    })
}

fn submitted_offer(outcome: &TransitionOutcome) -> anyhow::Result<OfferId> {
    match &outcome.event {
        TransitionEvent::OfferSubmitted { offer_id, .. } => Ok(offer_id.clone()),
        other => bail!("expected an offer submission, got {}", other.name()),
    }
}
