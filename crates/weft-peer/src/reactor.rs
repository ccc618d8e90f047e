use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use weft_net::SessionManager;

use crate::discovery::DiscoveryCoordinator;

/// Best-effort reaction to reliable-messaging retransmissions.
///
/// When a peer stops acknowledging, its address may have changed (DHCP
/// lease, network hop). A short cache-bypassing rediscovery refreshes the
/// scanner's answer so a later reconnect lands on the fresh address. The
/// sender is never blocked and never sees an error from this path.
pub struct ResubmissionWatcher {
    task: JoinHandle<()>,
}

impl ResubmissionWatcher {
    pub(crate) fn spawn(
        sessions: Arc<dyn SessionManager>,
        discovery: DiscoveryCoordinator,
    ) -> Self {
        let mut events = sessions.resubmissions();
        let task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        if !event.secure {
                            continue;
                        }
                        let Some(peer) = event.peer else {
                            continue;
                        };
                        if discovery.has_running(peer) {
                            continue;
                        }
                        tracing::debug!("reactor: resubmission started for {peer}, rediscovering");
                        discovery.trigger_retransmission_discovery(peer).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("reactor: lagged, missed {skipped} resubmission events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        Self { task }
    }

    /// Stop reacting to resubmission events.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for ResubmissionWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
