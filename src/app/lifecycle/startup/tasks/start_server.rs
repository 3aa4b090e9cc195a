use crate::app::config::{ArxConfig, EventsConfig};
use crate::app::lifecycle::context::StartupContext;
use crate::app::pipeline::events::win::context::WinEventContext;
use crate::app::pipeline::ortb::AuctionContext;
use crate::app::pipeline::syncing::out::context::{ConsentParams, SyncOutContext};
use crate::app::pipeline::syncing::r#in::context::SyncInContext;
use crate::core::auth::{API_KEY_HEADER, AuthGuard};
use crate::core::metrics;
use crate::core::ortb::{
    BidRequest, BidRequestBuilder, BidResponseState, ImpBuilder, MediaType, Site, Video,
};
use crate::core::pipeline::{AsyncTask, Pipeline};
use crate::core::ratelimit::AdmissionLimiters;
use crate::core::usersync::constants;
use crate::sample_or_attach_root_span;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, Responder, web};
use anyhow::{Error, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

/// 1x1 transparent GIF served for event pixels
const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Everything the handlers need, cloned into the actix data slot
struct AppState {
    auction_pipeline: Arc<Pipeline<AuctionContext, Error>>,
    sync_out_pipeline: Arc<Pipeline<SyncOutContext, Error>>,
    sync_in_pipeline: Arc<Pipeline<SyncInContext, Error>>,
    win_event_pipeline: Arc<Pipeline<WinEventContext, Error>>,
    auth: Arc<AuthGuard>,
    limiters: Arc<AdmissionLimiters>,
    span_sample_rate: f32,
    events: EventsConfig,
    user_ttl_secs: i64,
}

fn json_error(status: actix_web::http::StatusCode, message: &str) -> HttpResponse {
    // always through the encoder, never string-built
    HttpResponse::build(status)
        .content_type(header::ContentType::json())
        .body(json!({"error": message}).to_string())
}

/// Auth check for paths outside the bypass list. Returns the refusal
/// response when the caller may not proceed.
fn check_auth(state: &AppState, req: &HttpRequest) -> Option<HttpResponse> {
    let key = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());

    if state.auth.allow(req.path(), key) {
        return None;
    }

    Some(json_error(
        actix_web::http::StatusCode::UNAUTHORIZED,
        "invalid or missing api key",
    ))
}

fn check_general_admission(state: &AppState) -> Option<HttpResponse> {
    if state.limiters.admit_general() {
        return None;
    }

    Some(
        HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, "1"))
            .content_type(header::ContentType::json())
            .body(json!({"error": "rate limited"}).to_string()),
    )
}

/// A declared-but-invalid Content-Length (e.g. -1) is refused before
/// any body handling
fn content_length_invalid(req: &HttpRequest) -> bool {
    match req.headers().get(header::CONTENT_LENGTH) {
        Some(value) => match value.to_str().ok().and_then(|v| v.parse::<i64>().ok()) {
            Some(len) => len < 0,
            None => true,
        },
        None => false,
    }
}

fn cookie_map(req: &HttpRequest) -> HashMap<String, String> {
    req.cookies()
        .map(|cookies| {
            cookies
                .iter()
                .map(|c| (c.name().to_string(), c.value().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

fn fpid_cookie(fpid: &str, max_age_secs: i64) -> Cookie<'static> {
    Cookie::build(constants::CONST_ARX_FPID_COOKIE, fpid.to_string())
        .path("/")
        .max_age(actix_web::cookie::time::Duration::seconds(max_age_secs))
        .same_site(SameSite::None)
        .secure(true)
        .http_only(true)
        .finish()
}

async fn run_auction(
    state: &AppState,
    source: String,
    pubid: String,
    req: BidRequest,
    fpid: Option<String>,
) -> AuctionContext {
    let span = sample_or_attach_root_span!(state.span_sample_rate, "handle_bid_request");

    let ctx = AuctionContext::new(source, pubid, req).with_fpid(fpid);

    let pipeline_result = state
        .auction_pipeline
        .run(&ctx)
        .instrument(span)
        .await;

    match &pipeline_result {
        Ok(_) => debug!("Request pipeline success"),
        Err(e) => debug!("Request pipeline aborted: {}", e),
    }

    ctx
}

fn take_response_state(ctx: &mut AuctionContext) -> BidResponseState {
    ctx.res.take().unwrap_or(BidResponseState::NoBid {
        desc: Some("Failed processing req"),
    })
}

async fn auction_handler(
    http_req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let timer = metrics::REQUEST_DURATION
        .with_label_values(&["auction"])
        .start_timer();

    if content_length_invalid(&http_req) {
        return json_error(
            actix_web::http::StatusCode::BAD_REQUEST,
            "invalid content-length",
        );
    }

    if !state.limiters.admit_auction() {
        return HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, "1"))
            .content_type(header::ContentType::json())
            .body(json!({"error": "rate limited"}).to_string());
    }

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return json_error(
                actix_web::http::StatusCode::BAD_REQUEST,
                &format!("malformed bid request: {}", e),
            );
        }
    };

    let pubid = req
        .site
        .as_ref()
        .and_then(|s| s.publisher.as_ref())
        .or_else(|| req.app.as_ref().and_then(|a| a.publisher.as_ref()))
        .map(|p| p.id.clone())
        .unwrap_or_default();

    let fpid = cookie_map(&http_req)
        .remove(constants::CONST_ARX_FPID_COOKIE);

    let mut ctx = run_auction(&state, "auction".to_string(), pubid, req, fpid).await;

    timer.observe_duration();

    if ctx.privacy_blocked.get().is_some() {
        return json_error(
            actix_web::http::StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            "request blocked by privacy rules",
        );
    }

    take_response_state(&mut ctx).respond_to(&http_req)
}

#[derive(Debug, Deserialize)]
struct ConsentQuery {
    gdpr: Option<String>,
    gdpr_consent: Option<String>,
    us_privacy: Option<String>,
    gpp: Option<String>,
    gpp_sid: Option<String>,
}

impl From<ConsentQuery> for ConsentParams {
    fn from(q: ConsentQuery) -> Self {
        ConsentParams {
            gdpr: q.gdpr,
            gdpr_consent: q.gdpr_consent,
            us_privacy: q.us_privacy,
            gpp: q.gpp,
            gpp_sid: q.gpp_sid,
        }
    }
}

async fn cookie_sync_handler(
    http_req: HttpRequest,
    query: web::Query<ConsentQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Some(refused) = check_general_admission(&state) {
        return refused;
    }

    let ctx = SyncOutContext::new(query.into_inner().into(), cookie_map(&http_req));

    if let Err(e) = state.sync_out_pipeline.run(&ctx).await {
        debug!("Cookie sync pipeline aborted: {}", e);
    }

    let response = match ctx.response.get() {
        Some(response) => response,
        None => {
            return json_error(
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "sync selection failed",
            );
        }
    };

    let mut builder = HttpResponse::Ok();

    if ctx.minted.get().is_some() {
        if let Some(fpid) = ctx.fpid.get() {
            builder.cookie(fpid_cookie(fpid, state.user_ttl_secs));
        }
    }

    match serde_json::to_string(response) {
        Ok(body) => builder.content_type(header::ContentType::json()).body(body),
        Err(_) => json_error(
            actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
            "encoding failure",
        ),
    }
}

#[derive(Debug, Deserialize)]
struct SetuidQuery {
    bidder: Option<String>,
    uid: Option<String>,
    gdpr: Option<String>,
    gdpr_consent: Option<String>,
}

async fn setuid_handler(
    http_req: HttpRequest,
    query: web::Query<SetuidQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if let Some(refused) = check_general_admission(&state) {
        return refused;
    }

    let query = query.into_inner();

    let ctx = SyncInContext::new(
        query.bidder.unwrap_or_default(),
        query.uid.unwrap_or_default(),
        ConsentParams {
            gdpr: query.gdpr,
            gdpr_consent: query.gdpr_consent,
            ..Default::default()
        },
        cookie_map(&http_req),
    );

    if let Err(e) = state.sync_in_pipeline.run(&ctx).await {
        debug!("Setuid refused: {}", e);
        return json_error(actix_web::http::StatusCode::BAD_REQUEST, "setuid refused");
    }

    let mut builder = HttpResponse::NoContent();

    if ctx.minted.get().is_some() {
        if let Some(fpid) = ctx.fpid.get() {
            builder.cookie(fpid_cookie(fpid, state.user_ttl_secs));
        }
    }

    builder.finish()
}

async fn optout_handler() -> HttpResponse {
    let cookie = Cookie::build(constants::CONST_ARX_OPTOUT_COOKIE, "1")
        .path("/")
        .max_age(actix_web::cookie::time::Duration::days(365 * 5))
        .same_site(SameSite::None)
        .secure(true)
        .http_only(true)
        .finish();

    HttpResponse::NoContent().cookie(cookie).finish()
}

fn pixel_response() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("image/gif")
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(PIXEL_GIF)
}

async fn win_event_handler(http_req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let ctx = WinEventContext::new(http_req.full_url().to_string());

    match state.win_event_pipeline.run(&ctx).await {
        Ok(_) => pixel_response(),
        Err(e) => {
            warn!("Failed to record win event: {}", e);
            json_error(actix_web::http::StatusCode::BAD_REQUEST, "bad event url")
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoEventQuery {
    event: Option<String>,
    bid_id: Option<String>,
    account_id: Option<String>,
}

async fn video_event_handler(query: web::Query<VideoEventQuery>) -> HttpResponse {
    let query = query.into_inner();

    debug!(
        "Video event {} for bid {} (account {})",
        query.event.as_deref().unwrap_or("unknown"),
        query.bid_id.as_deref().unwrap_or("unknown"),
        query.account_id.as_deref().unwrap_or("unknown"),
    );

    pixel_response()
}

#[derive(Debug, Deserialize)]
struct VastQuery {
    w: Option<u32>,
    h: Option<u32>,
    mindur: Option<u32>,
    maxdur: Option<u32>,
    mimes: Option<String>,
    bidfloor: Option<f64>,
    account_id: Option<String>,
    tmax: Option<u64>,
    page: Option<String>,
}

/// Adapts the vast tag's query params into a one-imp video
/// bidrequest so it can ride the normal auction pipeline
fn vast_query_to_request(query: &VastQuery) -> BidRequest {
    let mimes = query
        .mimes
        .as_deref()
        .unwrap_or("video/mp4")
        .split(',')
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .collect();

    let video = Video {
        mimes,
        minduration: query.mindur.unwrap_or(0),
        maxduration: query.maxdur.unwrap_or(0),
        w: query.w,
        h: query.h,
        ..Default::default()
    };

    let page = query.page.clone().unwrap_or_default();
    let domain = url::Url::parse(&page)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_string()))
        .unwrap_or_else(|| "unknown".to_string());

    BidRequestBuilder::default()
        .id(uuid::Uuid::new_v4().to_string())
        .imp(vec![
            ImpBuilder::default()
                .id("1".to_string())
                .video(Some(video))
                .bidfloor(query.bidfloor.unwrap_or(0.0))
                .build()
                .expect("imp builds"),
        ])
        .site(Some(Site {
            domain,
            page,
            publisher: query.account_id.as_ref().map(|id| {
                crate::core::ortb::Publisher {
                    id: id.clone(),
                    ..Default::default()
                }
            }),
            ..Default::default()
        }))
        .tmax(query.tmax.unwrap_or(0))
        .build()
        .expect("request builds")
}

/// Pulls the winning video markup out of a finished auction context
fn video_winner_xml(ctx: &AuctionContext) -> Option<String> {
    ctx.winners
        .lock()
        .iter()
        .find(|w| w.media == MediaType::Video)
        .map(|w| w.bid.adm.clone())
}

async fn vast_tag_handler(
    http_req: HttpRequest,
    query: web::Query<VastQuery>,
    state: web::Data<AppState>,
) -> HttpResponse {
    if !state.limiters.admit_auction() {
        return HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, "1"))
            .finish();
    }

    let query = query.into_inner();
    let req = vast_query_to_request(&query);
    let pubid = query.account_id.unwrap_or_default();

    let fpid = cookie_map(&http_req).remove(constants::CONST_ARX_FPID_COOKIE);

    let ctx = run_auction(&state, "video".to_string(), pubid, req, fpid).await;

    if ctx.privacy_blocked.get().is_some() {
        return json_error(
            actix_web::http::StatusCode::UNAVAILABLE_FOR_LEGAL_REASONS,
            "request blocked by privacy rules",
        );
    }

    match video_winner_xml(&ctx) {
        Some(xml) => HttpResponse::Ok().content_type("application/xml").body(xml),
        None => HttpResponse::NoContent().finish(),
    }
}

async fn video_openrtb_handler(
    http_req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    if content_length_invalid(&http_req) {
        return json_error(
            actix_web::http::StatusCode::BAD_REQUEST,
            "invalid content-length",
        );
    }

    if !state.limiters.admit_auction() {
        return HttpResponse::TooManyRequests()
            .insert_header((header::RETRY_AFTER, "1"))
            .finish();
    }

    let req: BidRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(e) => {
            return json_error(
                actix_web::http::StatusCode::BAD_REQUEST,
                &format!("malformed bid request: {}", e),
            );
        }
    };

    let pubid = req
        .site
        .as_ref()
        .and_then(|s| s.publisher.as_ref())
        .or_else(|| req.app.as_ref().and_then(|a| a.publisher.as_ref()))
        .map(|p| p.id.clone())
        .unwrap_or_default();

    let ctx = run_auction(&state, "video".to_string(), pubid, req, None).await;

    match video_winner_xml(&ctx) {
        Some(xml) => HttpResponse::Ok().content_type("application/xml").body(xml),
        None => HttpResponse::NoContent().finish(),
    }
}

fn tcf_disclosure() -> serde_json::Value {
    json!({
        "disclosures": [
            {
                "identifier": constants::CONST_ARX_FPID_COOKIE,
                "type": "cookie",
                "maxAgeSeconds": 7 * 24 * 3600,
                "domain": "*",
                "purposes": [1]
            },
            {
                "identifier": constants::CONST_ARX_OPTOUT_COOKIE,
                "type": "cookie",
                "maxAgeSeconds": 5 * 365 * 24 * 3600,
                "domain": "*",
                "purposes": [1]
            }
        ]
    })
}

async fn tcf_disclosure_handler() -> HttpResponse {
    HttpResponse::Ok().json(tcf_disclosure())
}

async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn status_handler(http_req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    if let Some(refused) = check_auth(&state, &http_req) {
        return refused;
    }

    HttpResponse::Ok().json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "pixel_domain": state.events.domain,
    }))
}

async fn metrics_handler(http_req: HttpRequest, state: web::Data<AppState>) -> impl Responder {
    if let Some(refused) = check_auth(&state, &http_req) {
        return refused;
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics::render())
}

fn build_state(context: &StartupContext, config: &ArxConfig) -> Result<AppState, Error> {
    Ok(AppState {
        auction_pipeline: context
            .auction_pipeline
            .get()
            .ok_or_else(|| anyhow!("Auction pipeline not built"))?
            .clone(),
        sync_out_pipeline: context
            .sync_out_pipeline
            .get()
            .ok_or_else(|| anyhow!("Sync out pipeline not built"))?
            .clone(),
        sync_in_pipeline: context
            .sync_in_pipeline
            .get()
            .ok_or_else(|| anyhow!("Sync in pipeline not built"))?
            .clone(),
        win_event_pipeline: context
            .win_event_pipeline
            .get()
            .ok_or_else(|| anyhow!("Win event pipeline not built"))?
            .clone(),
        auth: context
            .auth
            .get()
            .ok_or_else(|| anyhow!("Auth guard not built"))?
            .clone(),
        limiters: context
            .limiters
            .get()
            .ok_or_else(|| anyhow!("Limiters not built"))?
            .clone(),
        span_sample_rate: config.logging.span_sample_rate,
        events: config.events.clone(),
        user_ttl_secs: config.sync.user_ttl.as_secs() as i64,
    })
}

pub struct StartServerTask;

#[async_trait]
impl AsyncTask<StartupContext, Error> for StartServerTask {
    async fn run(&self, context: &StartupContext) -> Result<(), Error> {
        let config = match context.config.get() {
            Some(config) => config,
            None => bail!("Config missing during start server task"),
        };

        let state = web::Data::new(build_state(context, config)?);
        let max_body = config.server.max_body_bytes;
        let win_path = config.events.win_path.clone();
        let video_event_path = config.events.video_event_path.clone();

        let mut server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .app_data(web::PayloadConfig::new(max_body))
                .route("/openrtb2/auction", web::post().to(auction_handler))
                .route("/cookie_sync", web::get().to(cookie_sync_handler))
                .route("/setuid", web::get().to(setuid_handler))
                .route("/optout", web::get().to(optout_handler))
                .route(win_path.as_str(), web::get().to(win_event_handler))
                .route("/video/vast", web::get().to(vast_tag_handler))
                .route("/video/openrtb", web::post().to(video_openrtb_handler))
                .route(
                    video_event_path.as_str(),
                    web::get().to(video_event_handler),
                )
                .route(
                    "/.well-known/tcf-disclosure.json",
                    web::get().to(tcf_disclosure_handler),
                )
                .route(
                    "/tcf-disclosure.json",
                    web::get().to(tcf_disclosure_handler),
                )
                .route("/health", web::get().to(health_handler))
                .route("/status", web::get().to(status_handler))
                .route("/metrics", web::get().to(metrics_handler))
        })
        .bind(("0.0.0.0", config.server.http_port))
        .map_err(|e| anyhow!("Failed binding port {}: {}", config.server.http_port, e))?;

        if let Some(workers) = config.server.workers {
            server = server.workers(workers);
        }

        let server = server.run();
        let handle = server.handle();

        *context.server_task.lock() = Some(tokio::spawn(server));

        context
            .server_handle
            .set(handle)
            .map_err(|_| anyhow!("Could not set server handle"))?;

        info!(
            "Started http server on :{}, ready for requests",
            config.server.http_port
        );

        Ok(())
    }
}
