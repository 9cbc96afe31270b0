use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use quagmire_admin::TarpitMetrics;
use quagmire_bot_detect::TagCounter;
use quagmire_common::{AppConfig, QuagmireError, QuagmireResult};
use quagmire_pages::{robots_txt, sitemap_xml, TarpitPage};
use quagmire_session::{SessionTracker, VisitOutcome};
use quagmire_stream::{stream_words, ChannelSink, ChunkSink, Pacing, StreamOutcome};
use quagmire_text_model::TextModel;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::context::RequestInfo;

/// Frames buffered between the page writer and the HTTP body.
const BODY_CHANNEL_CAPACITY: usize = 16;

/// Everything a request handler needs, built once at startup.
pub struct TarpitService {
    pub config: AppConfig,
    pub model: Arc<TextModel>,
    pub tracker: Arc<SessionTracker>,
    pub metrics: Arc<TarpitMetrics>,
    pub tags: Arc<TagCounter>,
    pub pacing: Pacing,
    /// Parent of every stream's cancellation token.
    pub shutdown: CancellationToken,
}

pub type SharedService = Arc<TarpitService>;

impl TarpitService {
    pub fn new(
        config: AppConfig,
        model: Arc<TextModel>,
        tracker: Arc<SessionTracker>,
        metrics: Arc<TarpitMetrics>,
        tags: Arc<TagCounter>,
        shutdown: CancellationToken,
    ) -> Self {
        let pacing = Pacing::from_config(&config.stream);
        Self {
            config,
            model,
            tracker,
            metrics,
            tags,
            pacing,
            shutdown,
        }
    }

    /// Record the visit on its own task; the response never waits for it.
    fn spawn_visit(&self, client_ip: String) {
        let tracker = self.tracker.clone();
        let metrics = self.metrics.clone();
        tokio::spawn(async move {
            match tracker.record_visit(&client_ip).await {
                Ok(VisitOutcome::Started {
                    previous: Some(ended),
                }) => metrics.session_dwell.observe(ended.dwell_secs as f64),
                Ok(_) => {}
                Err(QuagmireError::InvalidIp(_)) => metrics.invalid_ip.inc(),
                Err(_) => metrics.store_errors.inc(),
            }
        });
    }
}

/// Tarpit router: `robots.txt`, `sitemap.xml`, and a streamed page for
/// every other path.
pub fn build_router(service: SharedService) -> Router {
    Router::new()
        .route("/robots.txt", get(robots))
        .route("/sitemap.xml", get(sitemap))
        .fallback(tarpit)
        .with_state(service)
}

fn base_url(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .filter(|s| *s == "https" || *s == "http")
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .filter(|h| !h.is_empty() && !h.contains(|c: char| c.is_whitespace() || c == '/'))
        .unwrap_or("localhost");
    format!("{}://{}", scheme, host)
}

async fn robots(headers: HeaderMap) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        robots_txt(&base_url(&headers)),
    )
}

async fn sitemap(State(service): State<SharedService>, headers: HeaderMap) -> impl IntoResponse {
    let mut rng = StdRng::from_entropy();
    let today = chrono::Utc::now().date_naive();
    (
        [(header::CONTENT_TYPE, "application/xml; charset=utf-8")],
        sitemap_xml(&service.model, &mut rng, &base_url(&headers), today),
    )
}

async fn tarpit(State(service): State<SharedService>, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let info = RequestInfo::new(
        request.method(),
        request.uri(),
        request.version(),
        request.headers(),
        peer,
        &service.config.server.client_ip_header,
        &service.tags,
    );
    info.log();
    service.metrics.requests_total.inc();
    service.spawn_visit(info.client_ip.clone());

    let (tx, rx) = mpsc::channel::<Result<Bytes, Infallible>>(BODY_CHANNEL_CAPACITY);
    let sink = ChannelSink::new(tx, Duration::from_secs(service.config.server.write_timeout_secs));

    let mut rng = StdRng::from_entropy();
    let page = TarpitPage::generate(
        &service.model,
        &mut rng,
        &info.path,
        &service.config.page,
        chrono::Utc::now().date_naive(),
    );
    let cancel = service.shutdown.child_token();
    tokio::spawn(write_page(service.clone(), sink, cancel, page, rng, info));

    (
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, max-age=0"),
            (header::PRAGMA, "no-cache"),
            (header::EXPIRES, "0"),
            (header::HeaderName::from_static("x-accel-buffering"), "no"),
            (header::CONNECTION, "keep-alive"),
        ],
        Body::from_stream(ReceiverStream::new(rx)),
    )
        .into_response()
}

/// Drive one page into `sink` and account for it.
async fn write_page(
    service: SharedService,
    mut sink: ChannelSink,
    cancel: CancellationToken,
    page: TarpitPage,
    mut rng: StdRng,
    info: RequestInfo,
) {
    service.metrics.streams_active.inc();
    let started = Instant::now();

    // Cancel as soon as the client drops the body instead of at the next write.
    let watcher = sink.sender();
    let watch_token = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = watcher.closed() => watch_token.cancel(),
            _ = watch_token.cancelled() => {}
        }
    });

    let result = deliver_page(&mut sink, &cancel, &page, &service.pacing, &mut rng).await;
    // Releases the watcher's sender so the body can end.
    cancel.cancel();
    service.metrics.streams_active.dec();

    match result {
        Ok(outcome) => {
            service.metrics.words_streamed.inc_by(outcome.words_written as u64);
            if outcome.cancelled {
                service.metrics.streams_cancelled.inc();
            } else {
                service.metrics.streams_completed.inc();
            }
            info!(
                request_id = %info.request_id,
                client_ip = %info.client_ip,
                words = outcome.words_written,
                flushes = outcome.flushes,
                cancelled = outcome.cancelled,
                duration_ms = started.elapsed().as_millis() as u64,
                "stream finished"
            );
        }
        Err(e) => {
            error!(request_id = %info.request_id, client_ip = %info.client_ip, error = %e, "stream failed");
        }
    }
}

/// Opening markup, the paced paragraph, then each closing fragment with
/// its own flush. Stops writing as soon as `cancel` fires or the sink
/// reports a disconnect.
pub async fn deliver_page<S, R>(
    sink: &mut S,
    cancel: &CancellationToken,
    page: &TarpitPage,
    pacing: &Pacing,
    rng: &mut R,
) -> QuagmireResult<StreamOutcome>
where
    S: ChunkSink + ?Sized,
    R: Rng + Send + ?Sized,
{
    if !sink.supports_flush() {
        return Err(QuagmireError::TransportUnsupported);
    }

    let cancelled = StreamOutcome {
        cancelled: true,
        ..StreamOutcome::default()
    };
    if cancel.is_cancelled() {
        return Ok(cancelled);
    }
    match sink.send(page.opening.as_bytes()).await {
        Ok(()) => {}
        Err(e) if e.is_disconnect() => return Ok(cancelled),
        Err(e) => return Err(e),
    }

    let mut outcome = stream_words(sink, cancel, &page.words, pacing, rng).await?;
    outcome.flushes += 1;
    if outcome.cancelled {
        return Ok(outcome);
    }

    for fragment in &page.closing {
        if cancel.is_cancelled() {
            outcome.cancelled = true;
            break;
        }
        match sink.send(fragment.as_bytes()).await {
            Ok(()) => outcome.flushes += 1,
            Err(e) if e.is_disconnect() => {
                outcome.cancelled = true;
                break;
            }
            Err(e) => return Err(e),
        }
    }
    debug!(flushes = outcome.flushes, "page delivered");
    Ok(outcome)
}
