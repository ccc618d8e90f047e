#![allow(dead_code)]

//! Mock collaborators for peer-core integration tests.
//!
//! Every seam of the subsystem gets a mock that records its calls for
//! verification: scanner, session manager, exchange manager, CASE client
//! and transport interfaces. The harness wires them into a live `PeerSet`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use weft_net::{
    CaseClient, CaseResult, ChannelManager, ChannelType, DiscoveredNode, Exchange,
    ExchangeManager, Fabric, InsecureSession, MessageChannel, NetInterface, NetInterfaceSet,
    NodeId, OperationalScanner, PeerAddress, ResubmissionEvent, ResumptionRecord, SecureSession,
    ServerAddressIp, Session, SessionManager, SessionParameters, TransportChannel, WeftNetError,
};
use weft_peer::{MemoryPeerStore, OperationalPeer, PeerContext, PeerSet, PeerSetConfig, PeerStore};

pub const FABRIC_INDEX: u8 = 1;

pub fn addr(node_id: u64) -> PeerAddress {
    PeerAddress::new(FABRIC_INDEX, node_id)
}

pub fn endpoint(ip: &str, port: u16) -> ServerAddressIp {
    ServerAddressIp::new(ip.parse().expect("test ip literal"), port)
}

pub fn seeded_peer(node_id: u64, ip: &str) -> OperationalPeer {
    OperationalPeer {
        address: addr(node_id),
        operational_address: Some(endpoint(ip, 5540)),
        discovery_data: None,
    }
}

/// Poll a condition until it holds or the test gives up.
pub async fn wait_until(what: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..400 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("timed out waiting for {what}");
}

// ── MockScanner ──────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FindCall {
    pub node_id: NodeId,
    pub timeout: Option<Duration>,
    pub ignore_cache: bool,
}

#[derive(Debug, Clone)]
pub struct CancelCall {
    pub node_id: NodeId,
    pub resolve_waiters: bool,
}

/// Fake mDNS scanner. Queries block until a device is published or the
/// query times out, like the real one.
pub struct MockScanner {
    devices: Mutex<HashMap<NodeId, DiscoveredNode>>,
    cached: Mutex<HashMap<NodeId, DiscoveredNode>>,
    version: watch::Sender<u64>,
    pub find_calls: Mutex<Vec<FindCall>>,
    pub cancels: Mutex<Vec<CancelCall>>,
}

impl MockScanner {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            devices: Mutex::new(HashMap::new()),
            cached: Mutex::new(HashMap::new()),
            version,
            find_calls: Mutex::new(Vec::new()),
            cancels: Mutex::new(Vec::new()),
        }
    }

    /// Publish a device: active queries see it immediately.
    pub fn set_device(&self, node_id: NodeId, device: DiscoveredNode) {
        self.devices.lock().insert(node_id, device);
        self.version.send_modify(|v| *v += 1);
    }

    /// Seed the passive cache consulted by `get_discovered_operational_device`.
    pub fn set_cached(&self, node_id: NodeId, device: DiscoveredNode) {
        self.cached.lock().insert(node_id, device);
    }

    pub fn find_count(&self) -> usize {
        self.find_calls.lock().len()
    }
}

#[async_trait::async_trait]
impl OperationalScanner for MockScanner {
    async fn find_operational_device(
        &self,
        _fabric: &Fabric,
        node_id: NodeId,
        timeout: Option<Duration>,
        ignore_cache: bool,
    ) -> Result<Option<DiscoveredNode>, WeftNetError> {
        self.find_calls.lock().push(FindCall {
            node_id,
            timeout,
            ignore_cache,
        });

        let mut rx = self.version.subscribe();
        let deadline = timeout.map(|t| tokio::time::Instant::now() + t);
        loop {
            if let Some(device) = self.devices.lock().get(&node_id).cloned() {
                return Ok(Some(device));
            }
            match deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, rx.changed()).await {
                        Err(_) => return Ok(None),
                        Ok(Err(_)) => return Ok(None),
                        Ok(Ok(())) => {}
                    }
                }
                None => {
                    if rx.changed().await.is_err() {
                        std::future::pending::<()>().await;
                    }
                }
            }
        }
    }

    fn get_discovered_operational_device(
        &self,
        _fabric: &Fabric,
        node_id: NodeId,
    ) -> Option<DiscoveredNode> {
        self.cached.lock().get(&node_id).cloned()
    }

    async fn cancel_operational_device_discovery(
        &self,
        _fabric: &Fabric,
        node_id: NodeId,
        resolve_waiters: bool,
    ) {
        self.cancels.lock().push(CancelCall {
            node_id,
            resolve_waiters,
        });
    }
}

// ── MockSessionManager ───────────────────────────────────────────────

pub struct MockSessionManager {
    fabric: Fabric,
    next_session: AtomicU16,
    pub resumption_records: Mutex<HashMap<PeerAddress, ResumptionRecord>>,
    pub created_insecure: Mutex<Vec<InsecureSession>>,
    pub destroyed_insecure: Mutex<Vec<u16>>,
    pub removed_sessions: Mutex<Vec<(PeerAddress, bool)>>,
    pub deleted_resumptions: Mutex<Vec<PeerAddress>>,
    resubmission_tx: broadcast::Sender<ResubmissionEvent>,
}

impl MockSessionManager {
    pub fn new(fabric_index: u8) -> Self {
        let (resubmission_tx, _) = broadcast::channel(16);
        Self {
            fabric: Fabric {
                index: fabric_index,
                fabric_id: 0xF00D,
            },
            next_session: AtomicU16::new(1),
            resumption_records: Mutex::new(HashMap::new()),
            created_insecure: Mutex::new(Vec::new()),
            destroyed_insecure: Mutex::new(Vec::new()),
            removed_sessions: Mutex::new(Vec::new()),
            deleted_resumptions: Mutex::new(Vec::new()),
            resubmission_tx,
        }
    }

    pub fn emit_resubmission(&self, event: ResubmissionEvent) {
        let _ = self.resubmission_tx.send(event);
    }

    pub fn set_resumption_record(&self, record: ResumptionRecord) {
        self.resumption_records.lock().insert(record.peer, record);
    }
}

#[async_trait::async_trait]
impl SessionManager for MockSessionManager {
    async fn create_insecure_session(
        &self,
        peer: PeerAddress,
        parameters: SessionParameters,
    ) -> Result<InsecureSession, WeftNetError> {
        let session = InsecureSession {
            id: self.next_session.fetch_add(1, Ordering::Relaxed),
            peer,
            parameters,
        };
        self.created_insecure.lock().push(session.clone());
        Ok(session)
    }

    async fn destroy_insecure_session(
        &self,
        session: InsecureSession,
    ) -> Result<(), WeftNetError> {
        self.destroyed_insecure.lock().push(session.id);
        Ok(())
    }

    fn find_resumption_record(&self, peer: PeerAddress) -> Option<ResumptionRecord> {
        self.resumption_records.lock().get(&peer).cloned()
    }

    async fn delete_resumption_record(&self, peer: PeerAddress) -> Result<(), WeftNetError> {
        self.resumption_records.lock().remove(&peer);
        self.deleted_resumptions.lock().push(peer);
        Ok(())
    }

    async fn remove_all_sessions_for_node(
        &self,
        peer: PeerAddress,
        send_close: bool,
    ) -> Result<(), WeftNetError> {
        self.removed_sessions.lock().push((peer, send_close));
        Ok(())
    }

    fn fabric_for(&self, peer: PeerAddress) -> Option<Fabric> {
        (peer.fabric_index == self.fabric.index).then_some(self.fabric)
    }

    fn resubmissions(&self) -> broadcast::Receiver<ResubmissionEvent> {
        self.resubmission_tx.subscribe()
    }
}

// ── MockExchangeManager ──────────────────────────────────────────────

pub struct MockExchangeManager {
    next_exchange: AtomicU16,
    pub initiated: Mutex<Vec<(u32, bool)>>,
    pub closed: Mutex<Vec<u16>>,
}

impl MockExchangeManager {
    pub fn new() -> Self {
        Self {
            next_exchange: AtomicU16::new(1),
            initiated: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait::async_trait]
impl ExchangeManager for MockExchangeManager {
    async fn initiate_exchange_with_channel(
        &self,
        channel: &MessageChannel,
        protocol_id: u32,
    ) -> Result<Exchange, WeftNetError> {
        self.initiated.lock().push((protocol_id, channel.is_secure()));
        Ok(Exchange {
            id: self.next_exchange.fetch_add(1, Ordering::Relaxed),
            protocol_id,
            channel: channel.clone(),
        })
    }

    async fn close_exchange(&self, exchange: Exchange) -> Result<(), WeftNetError> {
        self.closed.lock().push(exchange.id);
        Ok(())
    }
}

// ── MockCase ─────────────────────────────────────────────────────────

pub struct MockCase {
    next_session: AtomicU16,
    resumed: AtomicBool,
    fail_next: Mutex<Option<WeftNetError>>,
    pub established: Mutex<Vec<(PeerAddress, Option<Duration>)>>,
}

impl MockCase {
    pub fn new() -> Self {
        Self {
            next_session: AtomicU16::new(100),
            resumed: AtomicBool::new(false),
            fail_next: Mutex::new(None),
            established: Mutex::new(Vec::new()),
        }
    }

    /// Whether the next establishments report the resumption path.
    pub fn set_resumed(&self, resumed: bool) {
        self.resumed.store(resumed, Ordering::SeqCst);
    }

    pub fn fail_next(&self, error: WeftNetError) {
        *self.fail_next.lock() = Some(error);
    }

    pub fn established_count(&self) -> usize {
        self.established.lock().len()
    }
}

#[async_trait::async_trait]
impl CaseClient for MockCase {
    async fn establish(
        &self,
        exchange: &Exchange,
        _fabric: &Fabric,
        peer: PeerAddress,
        expected_processing_time: Option<Duration>,
    ) -> Result<CaseResult, WeftNetError> {
        self.established
            .lock()
            .push((peer, expected_processing_time));
        if let Some(error) = self.fail_next.lock().take() {
            return Err(error);
        }
        Ok(CaseResult {
            session: SecureSession {
                id: self.next_session.fetch_add(1, Ordering::Relaxed),
                peer,
                parameters: exchange.channel.session.parameters(),
            },
            resumed: self.resumed.load(Ordering::SeqCst),
        })
    }
}

// ── MockInterface / MockTransportChannel ─────────────────────────────

pub struct MockTransportChannel {
    remote: ServerAddressIp,
}

#[async_trait::async_trait]
impl TransportChannel for MockTransportChannel {
    async fn send(&self, _data: &[u8]) -> Result<(), WeftNetError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), WeftNetError> {
        Ok(())
    }

    fn remote_address(&self) -> ServerAddressIp {
        self.remote
    }
}

/// Fake UDP interface: opens no sockets, optionally fails per endpoint.
pub struct MockInterface {
    pub opened: Mutex<Vec<ServerAddressIp>>,
    fail_counts: Mutex<HashMap<ServerAddressIp, u32>>,
}

impl MockInterface {
    pub fn new() -> Self {
        Self {
            opened: Mutex::new(Vec::new()),
            fail_counts: Mutex::new(HashMap::new()),
        }
    }

    /// Fail the next `times` opens of `address` with a response timeout.
    pub fn fail_next(&self, address: ServerAddressIp, times: u32) {
        self.fail_counts.lock().insert(address, times);
    }

    /// Fail every open of `address` until `clear_failures`.
    pub fn fail_always(&self, address: ServerAddressIp) {
        self.fail_counts.lock().insert(address, u32::MAX);
    }

    pub fn clear_failures(&self) {
        self.fail_counts.lock().clear();
    }

    pub fn opened_count(&self) -> usize {
        self.opened.lock().len()
    }
}

#[async_trait::async_trait]
impl NetInterface for MockInterface {
    async fn open_channel(
        &self,
        address: &ServerAddressIp,
    ) -> Result<Arc<dyn TransportChannel>, WeftNetError> {
        self.opened.lock().push(*address);
        {
            let mut failures = self.fail_counts.lock();
            if let Some(remaining) = failures.get_mut(address) {
                if *remaining > 0 {
                    if *remaining != u32::MAX {
                        *remaining -= 1;
                        if *remaining == 0 {
                            failures.remove(address);
                        }
                    }
                    return Err(WeftNetError::NoResponseTimeout {
                        message: format!("no response from {address}"),
                    });
                }
            }
        }
        Ok(Arc::new(MockTransportChannel { remote: *address }))
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub struct Harness {
    pub peers: Arc<PeerSet>,
    pub scanner: Arc<MockScanner>,
    pub sessions: Arc<MockSessionManager>,
    pub exchanges: Arc<MockExchangeManager>,
    pub case: Arc<MockCase>,
    pub channels: Arc<ChannelManager>,
    pub store: Arc<MemoryPeerStore>,
    pub interface_v6: Arc<MockInterface>,
    pub interface_v4: Arc<MockInterface>,
}

impl Harness {
    /// A secure channel as the pairing driver would register it, for
    /// seeding the channel manager directly.
    pub fn seed_channel(&self, address: PeerAddress, session_id: u16) -> MessageChannel {
        let channel = MessageChannel::new(
            Arc::new(MockTransportChannel {
                remote: endpoint("fe80::99", 5540),
            }),
            Session::Secure(SecureSession {
                id: session_id,
                peer: address,
                parameters: SessionParameters::default(),
            }),
        );
        self.channels.set_channel(address, channel.clone());
        channel
    }
}

pub async fn harness() -> Harness {
    harness_with(PeerSetConfig::new(), Vec::new()).await
}

pub async fn harness_with(config: PeerSetConfig, seeded: Vec<OperationalPeer>) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .try_init();

    let scanner = Arc::new(MockScanner::new());
    let sessions = Arc::new(MockSessionManager::new(FABRIC_INDEX));
    let exchanges = Arc::new(MockExchangeManager::new());
    let case = Arc::new(MockCase::new());
    let channels = Arc::new(ChannelManager::new());
    let store = Arc::new(MemoryPeerStore::new());
    for peer in &seeded {
        store.update_peer(peer).await.expect("seed store");
    }

    let interface_v6 = Arc::new(MockInterface::new());
    let interface_v4 = Arc::new(MockInterface::new());
    let mut interfaces = NetInterfaceSet::new();
    interfaces.add(
        ChannelType::Udp,
        "::".parse().expect("v6 unspecified"),
        interface_v6.clone(),
    );
    interfaces.add(
        ChannelType::Udp,
        "0.0.0.0".parse().expect("v4 unspecified"),
        interface_v4.clone(),
    );

    let context = PeerContext {
        sessions: sessions.clone(),
        channels: channels.clone(),
        exchanges: exchanges.clone(),
        scanner: scanner.clone(),
        interfaces,
        case: case.clone(),
        store: store.clone(),
    };

    let peers = Arc::new(PeerSet::new(context, config));
    peers
        .construction()
        .wait()
        .await
        .expect("peer set construction");

    Harness {
        peers,
        scanner,
        sessions,
        exchanges,
        case,
        channels,
        store,
        interface_v6,
        interface_v4,
    }
}
