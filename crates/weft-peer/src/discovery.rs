use std::future::pending;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use weft_net::{
    DiscoveryData, Fabric, MessageChannel, OperationalScanner, PeerAddress, PeerAddressMap,
    ServerAddressIp, SessionManager,
};

use crate::error::WeftPeerError;
use crate::pairing::CaseInitiator;

/// How aggressively to locate a peer, totally ordered: a strictly higher
/// kind supersedes a running lower one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeDiscoveryKind {
    /// Try only cached addresses; fail immediately otherwise.
    None = 0,
    /// Short cache-bypassing broadcast fired by the resubmission watcher.
    /// Not requestable by callers.
    Retransmission = 1,
    /// Scan bounded by a caller-provided timeout; cached addresses used.
    Timed = 2,
    /// Scan until found, with the cached address polled in parallel.
    Full = 3,
}

/// What a successful discovery hands to every waiter.
#[derive(Debug, Clone)]
pub struct PeerChannel {
    pub channel: MessageChannel,
    /// Endpoint the connection actually succeeded against.
    pub operational_address: ServerAddressIp,
    pub discovery_data: Option<DiscoveryData>,
}

/// What the coordinator knows about the peer going in: the persisted
/// operational address and discovery hints, if any.
#[derive(Debug, Clone, Default)]
pub struct KnownPeer {
    pub operational_address: Option<ServerAddressIp>,
    pub discovery_data: Option<DiscoveryData>,
}

type DiscoveryOutcome = Result<PeerChannel, WeftPeerError>;

struct RunningDiscovery {
    id: u64,
    kind: NodeDiscoveryKind,
    outcome_tx: broadcast::Sender<DiscoveryOutcome>,
    cancel: CancellationToken,
}

struct DiscoveryShared {
    scanner: Arc<dyn OperationalScanner>,
    sessions: Arc<dyn SessionManager>,
    pairer: Arc<CaseInitiator>,
    running: Mutex<PeerAddressMap<RunningDiscovery>>,
    next_id: AtomicU64,
    poll_interval: Duration,
    retransmission_window: Duration,
}

/// Coordinates operational discovery per peer address.
///
/// At most one discovery runs per address at any time. Callers asking
/// while one is in flight either join its waiter set (same or lower kind)
/// or supersede it (strictly higher kind). The first strategy to yield a
/// usable channel wins; whatever the others produce afterwards is
/// discarded because the running entry is already gone.
#[derive(Clone)]
pub struct DiscoveryCoordinator {
    shared: Arc<DiscoveryShared>,
}

impl DiscoveryCoordinator {
    pub fn new(
        scanner: Arc<dyn OperationalScanner>,
        sessions: Arc<dyn SessionManager>,
        pairer: Arc<CaseInitiator>,
        poll_interval: Duration,
        retransmission_window: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(DiscoveryShared {
                scanner,
                sessions,
                pairer,
                running: Mutex::new(PeerAddressMap::new()),
                next_id: AtomicU64::new(1),
                poll_interval,
                retransmission_window,
            }),
        }
    }

    /// Locate `address` and return a live secure channel to it.
    ///
    /// `timeout` is only meaningful (and only allowed) with
    /// [`NodeDiscoveryKind::Timed`]. [`NodeDiscoveryKind::Retransmission`]
    /// is reserved for the resubmission watcher and rejected here.
    pub async fn acquire_channel(
        &self,
        address: PeerAddress,
        known: KnownPeer,
        kind: NodeDiscoveryKind,
        timeout: Option<Duration>,
    ) -> Result<PeerChannel, WeftPeerError> {
        if kind == NodeDiscoveryKind::Retransmission {
            return Err(WeftPeerError::Implementation(
                "retransmission discovery is reserved for the resubmission path".into(),
            ));
        }
        if timeout.is_some() && kind != NodeDiscoveryKind::Timed {
            return Err(WeftPeerError::Implementation(
                "a discovery timeout is only valid with timed discovery".into(),
            ));
        }

        let shared = &self.shared;
        let fabric = shared.sessions.fabric_for(address).ok_or_else(|| {
            WeftPeerError::Implementation(format!("no fabric known for {address}"))
        })?;

        // Supplement what we know from the scanner's cache
        let mut known = known;
        if known.discovery_data.is_none() || known.operational_address.is_none() {
            if let Some(cached) = shared
                .scanner
                .get_discovered_operational_device(&fabric, address.node_id)
            {
                if known.discovery_data.is_none() {
                    known.discovery_data = cached.discovery_data;
                }
                if known.operational_address.is_none() {
                    known.operational_address = cached.addresses.first().copied();
                }
            }
        }

        // Cached addresses only: one direct attempt, no running entry
        if kind == NodeDiscoveryKind::None {
            return shared.reconnect_only(address, &known).await;
        }

        let mut superseded = None;
        let mut rx = {
            let mut running = shared.running.lock();
            let joined = match running.get(&address) {
                Some(existing) if kind <= existing.kind => Some(existing.outcome_tx.subscribe()),
                _ => None,
            };
            match joined {
                Some(rx) => rx,
                None => {
                    // Strictly higher kind takes over; the old discovery
                    // is cancelled and its waiters are abandoned to their
                    // own error paths.
                    if let Some(old) = running.remove(&address) {
                        old.cancel.cancel();
                        superseded = Some(old.kind);
                    }
                    let (entry, rx) = shared.new_entry(kind);
                    let token = entry.cancel.clone();
                    let id = entry.id;
                    running.insert(address, entry);
                    tokio::spawn(DiscoveryShared::run_discovery(
                        shared.clone(),
                        id,
                        address,
                        fabric,
                        known.clone(),
                        kind,
                        timeout,
                        token,
                    ));
                    rx
                }
            }
        };

        if let Some(old_kind) = superseded {
            tracing::info!(
                "discovery: {address} upgraded from {old_kind:?} to {kind:?}, cancelling prior scan"
            );
            shared
                .scanner
                .cancel_operational_device_discovery(&fabric, address.node_id, false)
                .await;
        }

        match rx.recv().await {
            Ok(outcome) => outcome,
            Err(_) => Err(WeftPeerError::Discovery {
                address,
                message: "discovery superseded or cancelled".into(),
            }),
        }
    }

    /// Fire the short cache-bypassing scan the resubmission watcher uses.
    /// Inserts the placeholder entry, scans, and removes the placeholder
    /// whatever the outcome. No-op when a discovery is already running.
    pub(crate) async fn trigger_retransmission_discovery(&self, address: PeerAddress) {
        let shared = &self.shared;
        let Some(fabric) = shared.sessions.fabric_for(address) else {
            tracing::debug!("discovery: no fabric for {address}, skipping retransmission scan");
            return;
        };

        let (id, token) = {
            let mut running = shared.running.lock();
            if running.contains(&address) {
                return;
            }
            let (entry, _rx) = shared.new_entry(NodeDiscoveryKind::Retransmission);
            let token = entry.cancel.clone();
            let id = entry.id;
            running.insert(address, entry);
            (id, token)
        };

        let shared = shared.clone();
        let window = shared.retransmission_window;
        tokio::spawn(async move {
            tracing::debug!("discovery: retransmission scan for {address} ({window:?})");
            tokio::select! {
                _ = token.cancelled() => return,
                result = shared
                    .scanner
                    .find_operational_device(&fabric, address.node_id, Some(window), true) =>
                {
                    if let Err(e) = result {
                        tracing::debug!("discovery: retransmission scan for {address} failed: {e}");
                    }
                }
            }
            // Placeholder self-removes regardless of outcome
            shared.take_entry(address, id);
        });
    }

    /// Whether a discovery is currently running for the address.
    pub fn has_running(&self, address: PeerAddress) -> bool {
        self.shared.running.lock().contains(&address)
    }

    /// Cancel every running discovery: stop timers and in-flight scans,
    /// tell the scanner to stand down, and drop the waiter channels
    /// without resolving them with success.
    pub async fn close(&self) {
        let entries: Vec<(PeerAddress, RunningDiscovery)> =
            self.shared.running.lock().drain().collect();
        for (address, entry) in entries {
            tracing::debug!("discovery: cancelling {:?} discovery for {address}", entry.kind);
            entry.cancel.cancel();
            if let Some(fabric) = self.shared.sessions.fabric_for(address) {
                self.shared
                    .scanner
                    .cancel_operational_device_discovery(&fabric, address.node_id, false)
                    .await;
            }
        }
    }
}

impl DiscoveryShared {
    fn new_entry(
        &self,
        kind: NodeDiscoveryKind,
    ) -> (RunningDiscovery, broadcast::Receiver<DiscoveryOutcome>) {
        let (outcome_tx, rx) = broadcast::channel(1);
        let entry = RunningDiscovery {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            kind,
            outcome_tx,
            cancel: CancellationToken::new(),
        };
        (entry, rx)
    }

    fn take_entry(&self, address: PeerAddress, id: u64) -> Option<RunningDiscovery> {
        let mut running = self.running.lock();
        match running.get(&address) {
            Some(entry) if entry.id == id => running.remove(&address),
            _ => None,
        }
    }

    /// Direct reconnect without a running entry: the `None` mode.
    async fn reconnect_only(
        &self,
        address: PeerAddress,
        known: &KnownPeer,
    ) -> Result<PeerChannel, WeftPeerError> {
        let Some(operational) = known.operational_address else {
            return Err(WeftPeerError::Discovery {
                address,
                message: "no cached operational address".into(),
            });
        };
        match self
            .pairer
            .pair(address, operational, known.discovery_data.as_ref(), None)
            .await
        {
            Ok(channel) => Ok(PeerChannel {
                channel,
                operational_address: operational,
                discovery_data: known.discovery_data,
            }),
            Err(e) if e.is_transient() => Err(WeftPeerError::Discovery {
                address,
                message: format!("cached address {operational} unreachable: {e}"),
            }),
            Err(e) => Err(e),
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_discovery(
        self: Arc<Self>,
        id: u64,
        address: PeerAddress,
        fabric: Fabric,
        known: KnownPeer,
        kind: NodeDiscoveryKind,
        timeout: Option<Duration>,
        token: CancellationToken,
    ) {
        let outcome = tokio::select! {
            _ = token.cancelled() => return,
            outcome = self.locate(address, &fabric, &known, timeout) => outcome,
            outcome = self.poll_known_address(address, &fabric, &known, kind) => outcome,
        };

        // Whoever completes first owns the entry; late finishers find it
        // gone and their results are discarded.
        let Some(entry) = self.take_entry(address, id) else {
            return;
        };
        entry.cancel.cancel();
        match &outcome {
            Ok(channel) => tracing::info!(
                "discovery: {address} located at {}",
                channel.operational_address
            ),
            Err(e) => tracing::info!("discovery: {address} failed: {e}"),
        }
        let _ = entry.outcome_tx.send(outcome);
    }

    /// Primary strategy: direct reconnect against the cached address
    /// first, then the mDNS scan.
    async fn locate(
        &self,
        address: PeerAddress,
        fabric: &Fabric,
        known: &KnownPeer,
        timeout: Option<Duration>,
    ) -> DiscoveryOutcome {
        if let Some(operational) = known.operational_address {
            match self
                .pairer
                .pair(address, operational, known.discovery_data.as_ref(), None)
                .await
            {
                Ok(channel) => {
                    return Ok(PeerChannel {
                        channel,
                        operational_address: operational,
                        discovery_data: known.discovery_data,
                    });
                }
                Err(e) if e.is_transient() => {
                    tracing::info!(
                        "discovery: direct reconnect of {address} via {operational} failed, scanning: {e}"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        let found = self
            .scanner
            .find_operational_device(fabric, address.node_id, timeout, false)
            .await?;
        let Some(device) = found else {
            return Err(WeftPeerError::Discovery {
                address,
                message: "operational device not found".into(),
            });
        };
        if device.addresses.is_empty() {
            return Err(WeftPeerError::Discovery {
                address,
                message: "discovery produced no usable addresses".into(),
            });
        }

        let discovery_data = device.discovery_data.or(known.discovery_data);
        let mut last_error = None;
        for operational in device.addresses {
            match self
                .pairer
                .pair(address, operational, discovery_data.as_ref(), None)
                .await
            {
                Ok(channel) => {
                    return Ok(PeerChannel {
                        channel,
                        operational_address: operational,
                        discovery_data,
                    });
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!("discovery: pairing {address} at {operational} failed: {e}");
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or(WeftPeerError::Discovery {
            address,
            message: "all discovered addresses failed".into(),
        }))
    }

    /// Secondary strategy during full discovery: periodically re-try the
    /// cached address. Success cancels the scan and resolves the overall
    /// operation; an unexpected failure rejects it.
    async fn poll_known_address(
        &self,
        address: PeerAddress,
        fabric: &Fabric,
        known: &KnownPeer,
        kind: NodeDiscoveryKind,
    ) -> DiscoveryOutcome {
        let operational = match (kind, known.operational_address) {
            (NodeDiscoveryKind::Full, Some(operational)) => operational,
            _ => return pending().await,
        };

        let mut interval = tokio::time::interval(self.poll_interval);
        interval.tick().await; // the immediate tick; locate() already tried

        loop {
            interval.tick().await;
            match self
                .pairer
                .pair(address, operational, known.discovery_data.as_ref(), None)
                .await
            {
                Ok(channel) => {
                    self.scanner
                        .cancel_operational_device_discovery(fabric, address.node_id, false)
                        .await;
                    return Ok(PeerChannel {
                        channel,
                        operational_address: operational,
                        discovery_data: known.discovery_data,
                    });
                }
                Err(e) if e.is_transient() => {
                    tracing::debug!("discovery: known-address poll of {address} failed: {e}");
                }
                Err(e) => return Err(e),
            }
        }
    }
}
