use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use weft_net::{
    CaseClient, ChannelManager, ExchangeManager, MessageChannel, NetInterfaceSet,
    OperationalScanner, PeerAddress, PeerAddressMap, SessionManager,
};

use crate::cache::NodeCache;
use crate::client::{ExchangeProvider, InteractionClient, Reconnector};
use crate::config::PeerSetConfig;
use crate::discovery::{DiscoveryCoordinator, KnownPeer, NodeDiscoveryKind, PeerChannel};
use crate::error::WeftPeerError;
use crate::lifecycle::Construction;
use crate::pairing::CaseInitiator;
use crate::queue::InteractionQueue;
use crate::reactor::ResubmissionWatcher;
use crate::store::{OperationalPeer, PeerStore};

/// Stable references to the singletons the peer subsystem collaborates
/// with. None of them own each other; they are wired together here at
/// construction.
#[derive(Clone)]
pub struct PeerContext {
    pub sessions: Arc<dyn SessionManager>,
    pub channels: Arc<ChannelManager>,
    pub exchanges: Arc<dyn ExchangeManager>,
    pub scanner: Arc<dyn OperationalScanner>,
    pub interfaces: NetInterfaceSet,
    pub case: Arc<dyn CaseClient>,
    pub store: Arc<dyn PeerStore>,
}

/// Peer set change notification, fired after the index update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerSetEvent {
    Added(PeerAddress),
    Deleted(PeerAddress),
}

/// Options for [`PeerSet::connect`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectOptions {
    pub discovery: NodeDiscoveryKind,
    /// Only valid with [`NodeDiscoveryKind::Timed`].
    pub timeout: Option<Duration>,
}

impl ConnectOptions {
    pub fn new() -> Self {
        Self {
            discovery: NodeDiscoveryKind::Full,
            timeout: None,
        }
    }

    pub fn discovery(mut self, kind: NodeDiscoveryKind) -> Self {
        self.discovery = kind;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self::new()
    }
}

struct PeerSetInner {
    context: PeerContext,
    config: PeerSetConfig,
    construction: Construction,
    peers: RwLock<PeerAddressMap<OperationalPeer>>,
    discovery: DiscoveryCoordinator,
    pairer: Arc<CaseInitiator>,
    queue: Arc<InteractionQueue>,
    cache: Arc<NodeCache>,
    events: broadcast::Sender<PeerSetEvent>,
}

/// The set of known operational peers and the way to reach them.
///
/// Owns the discovery coordinator, the pairing driver, the interaction
/// queue, the node cache and the resubmission watcher. Constructed
/// eagerly; the persisted peer list loads asynchronously, and every
/// operation asserts that load has completed.
pub struct PeerSet {
    inner: Arc<PeerSetInner>,
    watcher: ResubmissionWatcher,
}

impl PeerSet {
    pub fn new(context: PeerContext, config: PeerSetConfig) -> Self {
        let cache = Arc::new(NodeCache::new());
        let pairer = Arc::new(CaseInitiator::new(
            context.interfaces.clone(),
            context.sessions.clone(),
            context.exchanges.clone(),
            context.channels.clone(),
            context.case.clone(),
            cache.clone(),
        ));
        let discovery = DiscoveryCoordinator::new(
            context.scanner.clone(),
            context.sessions.clone(),
            pairer.clone(),
            config.known_address_poll_interval,
            config.retransmission_scan_window,
        );
        let queue = Arc::new(InteractionQueue::new(
            config.interaction_concurrency,
            config.interaction_spacing,
        ));
        let (events, _) = broadcast::channel(config.event_capacity);
        let watcher = ResubmissionWatcher::spawn(context.sessions.clone(), discovery.clone());

        let inner = Arc::new(PeerSetInner {
            context,
            config,
            construction: Construction::deferred("peer set"),
            peers: RwLock::new(PeerAddressMap::new()),
            discovery,
            pairer,
            queue,
            cache,
            events,
        });

        let load = {
            let inner = inner.clone();
            async move {
                let peers = inner.context.store.load_peers().await?;
                let mut map = inner.peers.write();
                let count = peers.len();
                for peer in peers {
                    map.insert(peer.address, peer);
                }
                drop(map);
                tracing::info!("peers: loaded {count} peers from store");
                Ok(())
            }
        };
        // First start on a fresh construction; cannot be refused.
        let _ = inner.construction.start(load);

        Self { inner, watcher }
    }

    /// Construction handle: await it to know the persisted peers are in.
    pub fn construction(&self) -> &Construction {
        &self.inner.construction
    }

    /// Observe peer additions and deletions.
    pub fn events(&self) -> broadcast::Receiver<PeerSetEvent> {
        self.inner.events.subscribe()
    }

    /// The per-peer cached cluster state.
    pub fn node_cache(&self) -> &Arc<NodeCache> {
        &self.inner.cache
    }

    /// Connect to a peer, discovering it as `options` allow, and return an
    /// interaction client bound to a live channel.
    ///
    /// Parallel calls for one address share a single in-flight discovery.
    pub async fn connect(
        &self,
        address: PeerAddress,
        options: ConnectOptions,
    ) -> Result<InteractionClient, WeftPeerError> {
        self.inner.construction.assert()?;
        let address = address.canonical();

        if !self.inner.context.channels.has_channel(address) {
            let known = self.inner.known_peer(address);
            let connected = self
                .inner
                .discovery
                .acquire_channel(address, known, options.discovery, options.timeout)
                .await?;
            self.inner.record_connection(address, &connected).await;
        }

        Ok(self.inner.interaction_client(address))
    }

    /// Synchronous lookup; `None` if unknown.
    pub fn get(&self, address: PeerAddress) -> Option<OperationalPeer> {
        self.inner.peers.read().get(&address.canonical()).cloned()
    }

    pub fn has(&self, address: PeerAddress) -> bool {
        self.inner.peers.read().contains(&address.canonical())
    }

    pub fn len(&self) -> usize {
        self.inner.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.peers.read().is_empty()
    }

    /// Snapshot of the peer set at the call instant.
    pub fn peers(&self) -> Vec<OperationalPeer> {
        self.inner.peers.read().values().cloned().collect()
    }

    pub fn find(
        &self,
        mut predicate: impl FnMut(&OperationalPeer) -> bool,
    ) -> Option<OperationalPeer> {
        self.inner
            .peers
            .read()
            .values()
            .find(|peer| predicate(peer))
            .cloned()
    }

    pub fn filter(
        &self,
        mut predicate: impl FnMut(&OperationalPeer) -> bool,
    ) -> Vec<OperationalPeer> {
        self.inner
            .peers
            .read()
            .values()
            .filter(|peer| predicate(peer))
            .cloned()
            .collect()
    }

    pub fn map<T>(&self, mut f: impl FnMut(&OperationalPeer) -> T) -> Vec<T> {
        self.inner.peers.read().values().map(|peer| f(peer)).collect()
    }

    /// Drop every session and channel for the peer. The peer record stays.
    pub async fn disconnect(&self, address: PeerAddress) -> Result<(), WeftPeerError> {
        self.inner.construction.assert()?;
        let address = address.canonical();
        self.inner
            .context
            .sessions
            .remove_all_sessions_for_node(address, true)
            .await?;
        self.inner.context.channels.remove_all_node_channels(address);
        Ok(())
    }

    /// Forget the peer entirely: record, store entry, sessions, channels
    /// and resumption record. Unknown peers are a silent no-op.
    pub async fn delete(&self, address: PeerAddress) -> Result<(), WeftPeerError> {
        self.inner.construction.assert()?;
        let address = address.canonical();

        let removed = self.inner.peers.write().remove(&address);
        if removed.is_none() {
            return Ok(());
        }
        let _ = self.inner.events.send(PeerSetEvent::Deleted(address));
        tracing::info!("peers: deleting {address}");

        self.inner.context.store.delete_peer(address).await?;
        self.inner
            .context
            .sessions
            .remove_all_sessions_for_node(address, true)
            .await?;
        self.inner.context.channels.remove_all_node_channels(address);
        self.inner
            .context
            .sessions
            .delete_resumption_record(address)
            .await?;
        self.inner.cache.wipe(address);
        Ok(())
    }

    /// Shut the subsystem down: cancel every running discovery without
    /// resolving its waiters, stop the resubmission watcher and close the
    /// interaction queue.
    pub async fn close(&self) {
        self.watcher.shutdown();
        self.inner.discovery.close().await;
        self.inner.queue.close();
    }
}

impl PeerSetInner {
    fn known_peer(&self, address: PeerAddress) -> KnownPeer {
        let peers = self.peers.read();
        match peers.get(&address) {
            Some(peer) => KnownPeer {
                operational_address: peer.operational_address,
                discovery_data: peer.discovery_data,
            },
            None => KnownPeer::default(),
        }
    }

    fn interaction_client(self: &Arc<Self>, address: PeerAddress) -> InteractionClient {
        let provider = ExchangeProvider::new(
            address,
            self.context.channels.clone(),
            self.context.exchanges.clone(),
            self.context.sessions.clone(),
            self.clone() as Arc<dyn Reconnector>,
            self.config.reconnect_processing_time,
        );
        InteractionClient::new(provider, self.queue.clone())
    }

    /// Fold a successful connection into the peer record and persist it.
    /// Store failures do not disturb the live connection.
    async fn record_connection(&self, address: PeerAddress, connected: &PeerChannel) {
        let (added, snapshot) = {
            let mut peers = self.peers.write();
            match peers.get_mut(&address) {
                Some(peer) => {
                    peer.operational_address = Some(connected.operational_address);
                    if connected.discovery_data.is_some() {
                        peer.discovery_data = connected.discovery_data;
                    }
                    (false, peer.clone())
                }
                None => {
                    let peer = OperationalPeer {
                        address,
                        operational_address: Some(connected.operational_address),
                        discovery_data: connected.discovery_data,
                    };
                    peers.insert(address, peer.clone());
                    (true, peer)
                }
            }
        };
        if added {
            let _ = self.events.send(PeerSetEvent::Added(address));
        }
        if let Err(e) = self.context.store.update_peer(&snapshot).await {
            tracing::warn!("peers: persisting {address} failed: {e}");
        }
    }
}

#[async_trait::async_trait]
impl Reconnector for PeerSetInner {
    async fn reconnect_known_address(
        &self,
        address: PeerAddress,
        expected_processing_time: Option<Duration>,
    ) -> Result<Option<MessageChannel>, WeftPeerError> {
        let known = self.known_peer(address);
        let Some(operational) = known.operational_address else {
            return Ok(None);
        };
        match self
            .pairer
            .pair(
                address,
                operational,
                known.discovery_data.as_ref(),
                expected_processing_time,
            )
            .await
        {
            Ok(channel) => Ok(Some(channel)),
            Err(e) if e.is_transient() => {
                tracing::info!("peers: reconnect of {address} via {operational} failed: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
