// src/reload/broadcaster.rs

use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::reload::notice::ReloadNotice;

const CHANNEL_CAPACITY: usize = 256;

/// Process-scoped fan-out of [`ReloadNotice`]s.
///
/// Tasks publish after their write phase; every live-reload connection holds
/// its own subscription. Publishing with nobody listening is not an error.
#[derive(Debug, Clone)]
pub struct ReloadBroadcaster {
    tx: broadcast::Sender<ReloadNotice>,
    css_injection: bool,
}

impl ReloadBroadcaster {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            css_injection: true,
        }
    }

    /// Broadcaster whose clients always reload the full page.
    pub fn without_css_injection() -> Self {
        Self {
            css_injection: false,
            ..Self::new()
        }
    }

    /// Whether stylesheet notices may be applied without a page reload.
    ///
    /// The injected client honours this; clients are free to reload anyway.
    pub fn supports_css_injection(&self) -> bool {
        self.css_injection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReloadNotice> {
        self.tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Send a notice to every subscriber. Returns how many received it.
    pub fn publish(&self, notice: ReloadNotice) -> usize {
        match self.tx.send(notice) {
            Ok(n) => {
                debug!(receivers = n, "published reload notice");
                n
            }
            Err(broadcast::error::SendError(notice)) => {
                trace!(path = %notice.path, "no reload clients connected");
                0
            }
        }
    }
}

impl Default for ReloadBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
