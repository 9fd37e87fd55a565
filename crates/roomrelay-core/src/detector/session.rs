//! Browser session seam. The detector drives any implementation of
//! [`BrowserSession`]; production uses the DevTools session in `cdp`.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::traffic::TrafficEvent;

use super::{NavigationError, SessionError};

#[async_trait]
pub trait BrowserSession: Send {
    /// Hand over the traffic stream for this page load. Yields `Some` once.
    fn take_events(&mut self) -> Option<mpsc::UnboundedReceiver<TrafficEvent>>;

    /// Navigate to `url` and wait for the network to settle, bounded by `timeout`.
    async fn navigate(&mut self, url: &str, timeout: Duration) -> Result<(), NavigationError>;

    /// Close the browser and release everything the session owns.
    async fn teardown(&mut self) -> Result<(), SessionError>;
}
