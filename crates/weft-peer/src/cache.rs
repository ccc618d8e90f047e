use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use weft_net::{PeerAddress, PeerAddressMap};

/// One cached attribute value, addressed by endpoint/cluster/attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAttribute {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub attribute_id: u32,
    pub name: String,
    pub value: serde_json::Value,
}

/// Data version of one cluster instance, addressed by endpoint/cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDataVersion {
    pub endpoint_id: u16,
    pub cluster_id: u32,
    pub data_version: u32,
}

#[derive(Default)]
struct PeerEntry {
    attributes: HashMap<(u16, u32, u32), CachedAttribute>,
    versions: HashMap<(u16, u32), ClusterDataVersion>,
    max_event_number: Option<u64>,
}

/// Per-peer cached cluster state.
///
/// Survives reconnects to the same device instance. A CASE establishment
/// that did NOT take the resumption path means the device likely rebooted
/// or upgraded, so the pairing driver wipes the peer's entry before any
/// read can return stale state.
pub struct NodeCache {
    peers: Mutex<PeerAddressMap<PeerEntry>>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self {
            peers: Mutex::new(PeerAddressMap::new()),
        }
    }

    pub fn set_attribute(&self, address: PeerAddress, attribute: CachedAttribute) {
        let mut peers = self.peers.lock();
        let entry = peers.entry(address).or_default();
        let key = (
            attribute.endpoint_id,
            attribute.cluster_id,
            attribute.attribute_id,
        );
        entry.attributes.insert(key, attribute);
    }

    pub fn attribute(
        &self,
        address: PeerAddress,
        endpoint_id: u16,
        cluster_id: u32,
        attribute_id: u32,
    ) -> Option<CachedAttribute> {
        let peers = self.peers.lock();
        peers
            .get(&address)?
            .attributes
            .get(&(endpoint_id, cluster_id, attribute_id))
            .cloned()
    }

    pub fn set_data_version(&self, address: PeerAddress, version: ClusterDataVersion) {
        let mut peers = self.peers.lock();
        let entry = peers.entry(address).or_default();
        entry
            .versions
            .insert((version.endpoint_id, version.cluster_id), version);
    }

    pub fn data_version(
        &self,
        address: PeerAddress,
        endpoint_id: u16,
        cluster_id: u32,
    ) -> Option<ClusterDataVersion> {
        let peers = self.peers.lock();
        peers
            .get(&address)?
            .versions
            .get(&(endpoint_id, cluster_id))
            .copied()
    }

    /// Record an observed event number. Monotone: lower numbers are kept
    /// out so event replay cannot move the watermark backwards.
    pub fn note_event_number(&self, address: PeerAddress, number: u64) {
        let mut peers = self.peers.lock();
        let entry = peers.entry(address).or_default();
        match entry.max_event_number {
            Some(current) if current >= number => {}
            _ => entry.max_event_number = Some(number),
        }
    }

    pub fn max_event_number(&self, address: PeerAddress) -> Option<u64> {
        let peers = self.peers.lock();
        peers.get(&address)?.max_event_number
    }

    /// Drop everything cached for the peer.
    pub fn wipe(&self, address: PeerAddress) {
        let mut peers = self.peers.lock();
        peers.remove(&address);
    }

    /// Whether anything is cached for the peer.
    pub fn has_data(&self, address: PeerAddress) -> bool {
        let peers = self.peers.lock();
        peers.get(&address).is_some_and(|entry| {
            !entry.attributes.is_empty()
                || !entry.versions.is_empty()
                || entry.max_event_number.is_some()
        })
    }
}

impl Default for NodeCache {
    fn default() -> Self {
        Self::new()
    }
}
