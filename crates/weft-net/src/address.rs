use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::WeftNetError;

/// Index of a fabric within the local fabric table.
pub type FabricIndex = u8;

/// 64-bit identifier of a node within a fabric.
pub type NodeId = u64;

/// Logical identity of an operational peer: fabric index + node id.
///
/// A plain value type: two addresses with equal fields are the same
/// address, everywhere, with no lookup table in between. Maps key on it
/// directly and comparisons are field comparisons.
///
/// Rendered as `peer@<fabric>:<node>`, with the node id in `0x` hex when
/// it does not fit 16 bits and decimal otherwise. [`FromStr`] accepts both
/// renderings; this is also the durable store key format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerAddress {
    pub fabric_index: FabricIndex,
    pub node_id: NodeId,
}

impl PeerAddress {
    pub fn new(fabric_index: FabricIndex, node_id: NodeId) -> Self {
        Self {
            fabric_index,
            node_id,
        }
    }

    /// The canonical representative for this address.
    ///
    /// Idempotent. With value-typed addresses every copy already is the
    /// representative, so this is the identity function; callers that
    /// accept addresses from outside the crate still route through it so
    /// the canonicalization point stays in one place.
    pub fn canonical(self) -> Self {
        self
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.node_id > 0xFFFF {
            write!(f, "peer@{}:0x{:x}", self.fabric_index, self.node_id)
        } else {
            write!(f, "peer@{}:{}", self.fabric_index, self.node_id)
        }
    }
}

// Display already carries everything Debug would; reuse it.
impl fmt::Debug for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for PeerAddress {
    type Err = WeftNetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || WeftNetError::InvalidAddress(s.to_string());
        let rest = s.strip_prefix("peer@").ok_or_else(invalid)?;
        let (fabric, node) = rest.split_once(':').ok_or_else(invalid)?;
        let fabric_index: FabricIndex = fabric.parse().map_err(|_| invalid())?;
        let node_id = if let Some(hex) = node.strip_prefix("0x").or_else(|| node.strip_prefix("0X"))
        {
            NodeId::from_str_radix(hex, 16).map_err(|_| invalid())?
        } else {
            node.parse().map_err(|_| invalid())?
        };
        Ok(Self::new(fabric_index, node_id))
    }
}

/// Map keyed by peer address.
///
/// Lookup, insertion and removal canonicalize their keys, so callers may
/// pass any structurally equal address.
pub struct PeerAddressMap<T> {
    inner: HashMap<PeerAddress, T>,
}

impl<T> PeerAddressMap<T> {
    pub fn new() -> Self {
        Self {
            inner: HashMap::new(),
        }
    }

    pub fn get(&self, address: &PeerAddress) -> Option<&T> {
        self.inner.get(&address.canonical())
    }

    pub fn get_mut(&mut self, address: &PeerAddress) -> Option<&mut T> {
        self.inner.get_mut(&address.canonical())
    }

    pub fn insert(&mut self, address: PeerAddress, value: T) -> Option<T> {
        self.inner.insert(address.canonical(), value)
    }

    pub fn remove(&mut self, address: &PeerAddress) -> Option<T> {
        self.inner.remove(&address.canonical())
    }

    pub fn contains(&self, address: &PeerAddress) -> bool {
        self.inner.contains_key(&address.canonical())
    }

    pub fn entry(&mut self, address: PeerAddress) -> hash_map::Entry<'_, PeerAddress, T> {
        self.inner.entry(address.canonical())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn addresses(&self) -> impl Iterator<Item = PeerAddress> + '_ {
        self.inner.keys().copied()
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.inner.values()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PeerAddress, &T)> {
        self.inner.iter().map(|(k, v)| (*k, v))
    }

    pub fn drain(&mut self) -> impl Iterator<Item = (PeerAddress, T)> + '_ {
        self.inner.drain()
    }
}

impl<T> Default for PeerAddressMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for PeerAddressMap<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PeerAddressMap<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.inner.iter()).finish()
    }
}
