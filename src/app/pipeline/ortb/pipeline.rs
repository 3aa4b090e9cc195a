use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::ortb::{AuctionContext, tasks};
use crate::child_span_info;
use crate::core::demand::client::{Dispatch, HttpDispatcher};
use crate::core::pipeline::{AsyncTask, Pipeline, PipelineBuilder};
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::Instrument;

/// Build the pipeline which handles RTB auctions. A vast or other
/// upstream handler may wrap this by adapting its input into a
/// bidrequest first.
fn build_rtb_pipeline(context: &StartupContext) -> Result<Pipeline<AuctionContext, Error>, Error> {
    let config = context
        .config
        .get()
        .ok_or_else(|| anyhow!("Config not set when building rtb pipeline"))?;

    let publishers = context
        .publishers
        .get()
        .ok_or_else(|| anyhow!("No publisher manager?! Cant build rtb pipeline"))?;

    let registry = match context.registry.get() {
        Some(registry) => registry,
        None => bail!("No adapter registry?! Cant build rtb pipeline"),
    };

    let breakers = context
        .breakers
        .get()
        .ok_or_else(|| anyhow!("No breaker board on context"))?;

    let device_lookup = context
        .device_lookup
        .get()
        .ok_or_else(|| anyhow!("Device lookup not set"))?;

    let sync_store = context
        .sync_store
        .get()
        .ok_or_else(|| anyhow!("No sync store created on context!"))?;

    let ivt_filter = context
        .ivt_filter
        .lock()
        .take()
        .ok_or_else(|| anyhow!("IVT filter not set"))?;

    let dispatch: Arc<dyn Dispatch> = Arc::new(HttpDispatcher::new(
        config.server.max_body_bytes,
        128,
    )?);

    let mut builder = PipelineBuilder::new()
        .with_blocking(Box::new(tasks::PubLookupTask::new(publishers.clone())))
        .with_blocking(Box::new(tasks::ValidateRequestTask))
        .with_blocking(Box::new(tasks::DeadlineTask::new(
            config.auction.tmax_default,
            config.auction.max_tmax,
        )))
        .with_blocking(Box::new(tasks::IvtFilterTask::new(
            ivt_filter,
            device_lookup.clone(),
        )))
        .with_blocking(Box::new(tasks::NormalizeRequestTask))
        .with_blocking(Box::new(tasks::DeviceLookupTask::new(
            device_lookup.clone(),
        )));

    if let Some(Some(geo)) = context.geo_lookup.get() {
        builder = builder.with_blocking(Box::new(tasks::GeoLookupTask::new(geo.clone())));
    }

    let rtb_pipeline = builder
        .with_blocking(Box::new(tasks::PrivacyGateTask::new(
            config.privacy.clone(),
        )))
        .with_async(Box::new(tasks::IdentityDemandTask::new(sync_store.clone())))
        .with_blocking(Box::new(tasks::FloorsMarkupTask::new(
            config.auction.bid_multiplier,
            config.auction.min_floor,
        )))
        .with_async(Box::new(tasks::BidderMatchingTask::new(
            registry.clone(),
            breakers.clone(),
            config.auction.max_bidders,
        )))
        .with_async(Box::new(tasks::BidderCalloutsTask::new(
            dispatch,
            breakers.clone(),
            config.auction.safety_margin,
        )))
        .with_async(Box::new(tasks::BidValidationTask))
        .with_async(Box::new(tasks::BidMarginTask::new(
            config.auction.bid_multiplier,
        )))
        .with_async(Box::new(tasks::BidSettlementTask))
        .with_async(Box::new(tasks::VastMarkupTask::new(config.events.clone())))
        .with_async(Box::new(tasks::NoticeInjectTask::new(
            config.events.clone(),
        )))
        .with_async(Box::new(tasks::ComposeResponseTask))
        .build()
        .expect("Auction pipeline should have tasks");

    Ok(rtb_pipeline)
}

/// Builds the finalizer pipeline which must always run regardless of
/// whether the rtb pipeline completed - even a blocked auction leaves
/// an analytics record
fn build_finalizers_pipeline(
    context: &StartupContext,
) -> Result<Option<Pipeline<AuctionContext, Error>>, Error> {
    let recorder = context
        .recorder
        .get()
        .ok_or_else(|| anyhow!("No event recorder on context"))?;

    let mut builder = PipelineBuilder::new();
    builder.add_async(Box::new(tasks::RecordAuctionTask::new(recorder.clone())));

    Ok(builder.build())
}

/// The RTB pipeline plus the finalizer tasks which always run
pub struct AuctionAndFinalizersPipelineTask {
    rtb_pipeline: Pipeline<AuctionContext, Error>,
    finalizers_pipeline: Option<Pipeline<AuctionContext, Error>>,
}

impl AuctionAndFinalizersPipelineTask {
    pub fn new(
        rtb_pipeline: Pipeline<AuctionContext, Error>,
        finalizers_pipeline: Option<Pipeline<AuctionContext, Error>>,
    ) -> Self {
        AuctionAndFinalizersPipelineTask {
            rtb_pipeline,
            finalizers_pipeline,
        }
    }

    async fn run0(&self, context: &AuctionContext) -> Result<(), Error> {
        // may abort early, e.g. auction blocked for bad request values
        let auction_pipeline_res = self.rtb_pipeline.run(context).await;

        if let Some(finalizers_pipeline) = &self.finalizers_pipeline {
            // a finalizer failure means we could not record activity,
            // which is not negotiable
            finalizers_pipeline.run(context).await?;
        }

        auction_pipeline_res
    }
}

#[async_trait]
impl AsyncTask<AuctionContext, Error> for AuctionAndFinalizersPipelineTask {
    async fn run(&self, context: &AuctionContext) -> Result<(), Error> {
        let span = child_span_info!("auction_pipeline");

        self.run0(context).instrument(span).await
    }
}

/// Builds the pipeline an openrtb request flows through for auction
/// handling.
///
/// # Behavior
/// * BidResponseState - a ['crate::core::ortb::BidResponseState'] is
/// attached to the context for every completed run, detailed no-bid
/// or valid bid response alike
/// * Flow - on early exit (blocked request, no bidders, budget gone)
/// the pipeline attaches the response state and returns an error,
/// aborting the remaining stages but not the finalizers
pub fn build_auction_pipeline(
    context: &StartupContext,
) -> Result<Pipeline<AuctionContext, Error>, Error> {
    let rtb_pipeline = build_rtb_pipeline(context)?;
    let finalizers_pipeline = build_finalizers_pipeline(context)?;

    let auction_pipeline = PipelineBuilder::new()
        .with_async(Box::new(AuctionAndFinalizersPipelineTask::new(
            rtb_pipeline,
            finalizers_pipeline,
        )))
        .build()
        .expect("Auction pipeline should have had RTB tasks");

    Ok(auction_pipeline)
}
