//! Headless Chromium session over the DevTools protocol (chromiumoxide).
//!
//! A pump task turns Network domain events into [`TrafficEvent`]s. Requests are
//! remembered by id so every response carries the URL of the request that
//! produced it; bodies are fetched only for responses matching the strategy's
//! body marker, once loading has finished.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
    EventResponseReceived, GetResponseBodyParams, RequestId,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::BrowserSettings;
use crate::traffic::TrafficEvent;

use super::idle::{wait_for_network_idle, IdleRule};
use super::session::BrowserSession;
use super::{NavigationError, SessionError};

pub struct CdpSession {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    pump: JoinHandle<()>,
    events: Option<mpsc::UnboundedReceiver<TrafficEvent>>,
    inflight: watch::Receiver<usize>,
    idle: IdleRule,
}

impl CdpSession {
    /// Launch an isolated headless browser with one blank page, already
    /// listening to network traffic.
    pub async fn launch(
        settings: &BrowserSettings,
        body_marker: Option<String>,
        idle: IdleRule,
        command_timeout: Duration,
    ) -> Result<Self, SessionError> {
        let config = browser_config(settings, command_timeout)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SessionError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::trace!("devtools handler: {}", err);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(SessionError::Launch(e.to_string()));
            }
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let (inflight_tx, inflight_rx) = watch::channel(0usize);
        let pump = match spawn_pump(&page, tx, inflight_tx, body_marker).await {
            Ok(pump) => pump,
            Err(e) => {
                handler.abort();
                return Err(e);
            }
        };

        tracing::debug!("headless browser launched");
        Ok(Self {
            browser,
            page,
            handler,
            pump,
            events: Some(rx),
            inflight: inflight_rx,
            idle,
        })
    }
}

fn browser_config(
    settings: &BrowserSettings,
    command_timeout: Duration,
) -> Result<BrowserConfig, SessionError> {
    let mut builder = BrowserConfig::builder().request_timeout(command_timeout);
    if !settings.headless {
        builder = builder.with_head();
    }
    if settings.no_sandbox {
        builder = builder.no_sandbox().arg("--disable-setuid-sandbox");
    }
    if let Some(path) = &settings.executable {
        builder = builder.chrome_executable(path);
    }
    for arg in &settings.extra_args {
        builder = builder.arg(arg.as_str());
    }
    builder.build().map_err(SessionError::Launch)
}

async fn spawn_pump(
    page: &Page,
    tx: mpsc::UnboundedSender<TrafficEvent>,
    inflight_tx: watch::Sender<usize>,
    body_marker: Option<String>,
) -> Result<JoinHandle<()>, SessionError> {
    let listen = |e: chromiumoxide::error::CdpError| SessionError::Listen(e.to_string());
    let mut requests = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .map_err(listen)?;
    let mut responses = page
        .event_listener::<EventResponseReceived>()
        .await
        .map_err(listen)?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .map_err(listen)?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .map_err(listen)?;
    page.execute(EnableParams::default()).await.map_err(listen)?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        let mut pump = Pump::new(tx, inflight_tx, body_marker);
        loop {
            tokio::select! {
                Some(ev) = requests.next() => {
                    pump.on_request(ev.request_id.clone(), ev.request.url.clone());
                }
                Some(ev) = responses.next() => {
                    let status = u16::try_from(ev.response.status).unwrap_or(0);
                    pump.on_response(ev.request_id.clone(), ev.response.url.clone(), status);
                }
                Some(ev) = finished.next() => {
                    if let Some(pending) = pump.on_finished(&ev.request_id) {
                        spawn_body_fetch(&page, ev.request_id.clone(), pending, pump.tx.clone());
                    }
                }
                Some(ev) = failed.next() => pump.on_failed(&ev.request_id),
                else => break,
            }
        }
    }))
}

/// Fetch a held response's body off the pump loop, then emit the response.
fn spawn_body_fetch(
    page: &Page,
    id: RequestId,
    pending: PendingBody,
    tx: mpsc::UnboundedSender<TrafficEvent>,
) {
    let page = page.clone();
    tokio::spawn(async move {
        let fetch = page.execute(GetResponseBodyParams::new(id));
        let body = match tokio::time::timeout(BODY_FETCH_TIMEOUT, fetch).await {
            Ok(Ok(resp)) if resp.result.base64_encoded => {
                tracing::warn!(url = %pending.url, "response body is binary, skipping");
                None
            }
            Ok(Ok(resp)) => Some(resp.result.body.clone()),
            Ok(Err(err)) => {
                tracing::warn!(url = %pending.url, "could not read response body: {}", err);
                None
            }
            Err(_) => {
                tracing::warn!(url = %pending.url, "timed out reading response body");
                None
            }
        };
        let _ = tx.send(pending.into_event(body));
    });
}

const BODY_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Response waiting for its body (fetched once loading finishes).
#[derive(Debug)]
struct PendingBody {
    url: String,
    status: u16,
    request_url: String,
}

impl PendingBody {
    fn into_event(self, body: Option<String>) -> TrafficEvent {
        TrafficEvent::Response {
            url: self.url,
            status: self.status,
            body,
            request_url: self.request_url,
        }
    }
}

struct Pump {
    tx: mpsc::UnboundedSender<TrafficEvent>,
    inflight_tx: watch::Sender<usize>,
    body_marker: Option<String>,
    request_urls: HashMap<RequestId, String>,
    inflight: HashSet<RequestId>,
    awaiting_body: HashMap<RequestId, PendingBody>,
}

impl Pump {
    fn new(
        tx: mpsc::UnboundedSender<TrafficEvent>,
        inflight_tx: watch::Sender<usize>,
        body_marker: Option<String>,
    ) -> Self {
        Self {
            tx,
            inflight_tx,
            body_marker,
            request_urls: HashMap::new(),
            inflight: HashSet::new(),
            awaiting_body: HashMap::new(),
        }
    }

    fn emit(&self, event: TrafficEvent) {
        // Receiver gone means the detector is done; keep draining quietly.
        let _ = self.tx.send(event);
    }

    fn publish_inflight(&self) {
        let _ = self.inflight_tx.send(self.inflight.len());
    }

    fn on_request(&mut self, id: RequestId, url: String) {
        self.request_urls.insert(id.clone(), url.clone());
        self.inflight.insert(id);
        self.publish_inflight();
        self.emit(TrafficEvent::Request { url });
    }

    /// Pair the response with its request URL. Responses matching the body
    /// marker are held until loading finishes.
    fn on_response(&mut self, id: RequestId, url: String, status: u16) {
        let request_url = self
            .request_urls
            .get(&id)
            .cloned()
            .unwrap_or_else(|| url.clone());
        let pending = PendingBody {
            url,
            status,
            request_url,
        };
        let wants_body = self
            .body_marker
            .as_deref()
            .is_some_and(|marker| pending.url.contains(marker));
        if wants_body {
            self.awaiting_body.insert(id, pending);
        } else {
            self.emit(pending.into_event(None));
        }
    }

    /// Returns the held response whose body should now be fetched, if any.
    fn on_finished(&mut self, id: &RequestId) -> Option<PendingBody> {
        self.settle(id);
        self.awaiting_body.remove(id)
    }

    fn on_failed(&mut self, id: &RequestId) {
        self.settle(id);
        if let Some(pending) = self.awaiting_body.remove(id) {
            self.emit(pending.into_event(None));
        }
    }

    fn settle(&mut self, id: &RequestId) {
        self.request_urls.remove(id);
        if self.inflight.remove(id) {
            self.publish_inflight();
        }
    }
}

#[async_trait]
impl BrowserSession for CdpSession {
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TrafficEvent>> {
        self.events.take()
    }

    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), NavigationError> {
        let page = &self.page;
        let inflight = self.inflight.clone();
        let idle = self.idle;
        let load = async move {
            page.goto(url)
                .await
                .map_err(|e| NavigationError::Browser(e.to_string()))?;
            wait_for_network_idle(inflight, idle).await;
            Ok::<(), NavigationError>(())
        };
        tokio::time::timeout(timeout, load)
            .await
            .map_err(|_| NavigationError::Timeout(timeout))?
    }

    async fn teardown(&mut self) -> Result<(), SessionError> {
        let closed = self.browser.close().await;
        let waited = self.browser.wait().await;
        self.pump.abort();
        self.handler.abort();
        closed.map_err(|e| SessionError::Close(e.to_string()))?;
        waited.map_err(|e| SessionError::Close(e.to_string()))?;
        tracing::debug!("headless browser closed");
        Ok(())
    }
}
