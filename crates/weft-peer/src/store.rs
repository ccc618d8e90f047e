use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use weft_net::{DiscoveryData, PeerAddress, ServerAddressIp, WeftNetError};

/// Durable record of a known operational peer.
///
/// One entry per logical address. The operational address is the last
/// endpoint a connection succeeded against; discovery data carries the
/// session timing hints seen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalPeer {
    pub address: PeerAddress,
    pub operational_address: Option<ServerAddressIp>,
    pub discovery_data: Option<DiscoveryData>,
}

impl OperationalPeer {
    pub fn new(address: PeerAddress) -> Self {
        Self {
            address,
            operational_address: None,
            discovery_data: None,
        }
    }
}

/// Seam to peer persistence.
///
/// Every write is durable before the call returns. The peer set treats
/// load/update failures on the connect path as non-fatal for running
/// connections and propagates failures of explicit mutations.
#[async_trait::async_trait]
pub trait PeerStore: Send + Sync {
    async fn load_peers(&self) -> Result<Vec<OperationalPeer>, WeftNetError>;

    async fn update_peer(&self, peer: &OperationalPeer) -> Result<(), WeftNetError>;

    async fn delete_peer(&self, address: PeerAddress) -> Result<(), WeftNetError>;
}

/// In-memory store keeping records in their durable encoding.
///
/// Records are keyed by the canonical address string and held as
/// MessagePack bytes, the same shape a file- or KV-backed store persists,
/// so the encoding path is exercised even in tests.
pub struct MemoryPeerStore {
    records: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryPeerStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Whether a record exists for the address.
    pub fn contains(&self, address: PeerAddress) -> bool {
        self.records.lock().contains_key(&address.to_string())
    }
}

impl Default for MemoryPeerStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PeerStore for MemoryPeerStore {
    async fn load_peers(&self) -> Result<Vec<OperationalPeer>, WeftNetError> {
        let records = self.records.lock();
        records
            .values()
            .map(|bytes| {
                rmp_serde::from_slice(bytes).map_err(|e| WeftNetError::Codec(e.to_string()))
            })
            .collect()
    }

    async fn update_peer(&self, peer: &OperationalPeer) -> Result<(), WeftNetError> {
        let bytes = rmp_serde::to_vec(peer).map_err(|e| WeftNetError::Codec(e.to_string()))?;
        let mut records = self.records.lock();
        records.insert(peer.address.to_string(), bytes);
        Ok(())
    }

    async fn delete_peer(&self, address: PeerAddress) -> Result<(), WeftNetError> {
        let mut records = self.records.lock();
        records.remove(&address.to_string());
        Ok(())
    }
}
