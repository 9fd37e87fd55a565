//! In-memory stand-ins for the browser session, lookup and launcher.

use async_trait::async_trait;
use roomrelay_core::detector::{BrowserSession, NavigationError, SessionError};
use roomrelay_core::relay::{
    Launcher, RelayCanceller, RelayError, RelayExit, RelayHandle,
};
use roomrelay_core::resolver::{Lookup, PlaybackDescriptor, ResolveError, Resolution};
use roomrelay_core::traffic::{IdentifierPair, TrafficEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn user_info_request(room: &str, aid: &str) -> TrafficEvent {
    TrafficEvent::Request {
        url: format!("https://www.example.com/webcast/user/?aid={aid}&current_room_id={room}"),
    }
}

pub fn check_alive_response(room: &str, aid: &str, alive: bool) -> TrafficEvent {
    let url = format!("https://webcast.example.com/webcast/room/check_alive/?aid={aid}&room_ids={room}");
    TrafficEvent::Response {
        url: url.clone(),
        status: 200,
        body: Some(format!(
            r#"{{"data":[{{"alive":{alive},"room_id_str":"{room}"}}]}}"#
        )),
        request_url: url,
    }
}

/// Browser session replaying scripted events.
pub struct FakeSession {
    events: Option<mpsc::UnboundedReceiver<TrafficEvent>>,
    /// Kept so the stream stays open; send more events through it mid-test.
    pub sender: mpsc::UnboundedSender<TrafficEvent>,
    nav_result: Result<(), NavigationError>,
    nav_delay: Duration,
    pub navigations: usize,
    pub teardowns: usize,
    fail_teardown: bool,
}

impl FakeSession {
    pub fn new(events: Vec<TrafficEvent>) -> Self {
        let (sender, rx) = mpsc::unbounded_channel();
        for ev in events {
            sender.send(ev).unwrap();
        }
        Self {
            events: Some(rx),
            sender,
            nav_result: Ok(()),
            nav_delay: Duration::ZERO,
            navigations: 0,
            teardowns: 0,
            fail_teardown: false,
        }
    }

    pub fn failing_navigation(err: NavigationError) -> Self {
        let mut s = Self::new(Vec::new());
        s.nav_result = Err(err);
        s
    }

    pub fn with_nav_delay(mut self, delay: Duration) -> Self {
        self.nav_delay = delay;
        self
    }

    pub fn with_failing_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }
}

#[async_trait]
impl BrowserSession for FakeSession {
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TrafficEvent>> {
        self.events.take()
    }

    async fn navigate(&mut self, _url: &str, _timeout: Duration) -> Result<(), NavigationError> {
        self.navigations += 1;
        if !self.nav_delay.is_zero() {
            tokio::time::sleep(self.nav_delay).await;
        }
        self.nav_result.clone()
    }

    async fn teardown(&mut self) -> Result<(), SessionError> {
        self.teardowns += 1;
        if self.fail_teardown {
            return Err(SessionError::Close("browser already gone".to_string()));
        }
        Ok(())
    }
}

pub enum LookupAnswer {
    Found(String),
    NotFound,
    Http(u32),
}

pub struct FakeLookup {
    answer: LookupAnswer,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<IdentifierPair>>,
}

impl FakeLookup {
    pub fn new(answer: LookupAnswer) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Lookup for FakeLookup {
    async fn resolve(&self, pair: &IdentifierPair) -> Result<Resolution, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(pair.clone());
        match &self.answer {
            LookupAnswer::Found(url) => Ok(Resolution::Found(PlaybackDescriptor {
                url: url.clone(),
            })),
            LookupAnswer::NotFound => Ok(Resolution::NotFound),
            LookupAnswer::Http(code) => Err(ResolveError::Http(*code)),
        }
    }
}

#[derive(Default)]
pub struct FakeLauncher {
    pub launches: Mutex<Vec<(String, String)>>,
}

impl FakeLauncher {
    pub fn count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

impl Launcher for FakeLauncher {
    fn launch(
        &self,
        playback: &PlaybackDescriptor,
        destination: &str,
    ) -> Result<RelayHandle, RelayError> {
        self.launches
            .lock()
            .unwrap()
            .push((playback.url.clone(), destination.to_string()));
        let exit = RelayExit {
            success: true,
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            cancelled: false,
        };
        Ok(RelayHandle::new(
            destination.to_string(),
            RelayCanceller::new(),
            tokio::spawn(async move { Ok(exit) }),
        ))
    }
}
