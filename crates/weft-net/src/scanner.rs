use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::NodeId;
use crate::error::WeftNetError;
use crate::session::{Fabric, SessionParameters};
use crate::transport::ServerAddressIp;

/// Session timing hints from the DNS-SD TXT record of an operational
/// service instance. All values in milliseconds; absent keys leave the
/// corresponding parameter at its previous value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryData {
    /// SII: session idle interval.
    pub sii: Option<u32>,
    /// SAI: session active interval.
    pub sai: Option<u32>,
    /// SAT: session active threshold.
    pub sat: Option<u16>,
}

impl DiscoveryData {
    /// Overlay these hints onto `base`, keeping base values where a hint
    /// is absent.
    pub fn apply_to(&self, mut base: SessionParameters) -> SessionParameters {
        if let Some(sii) = self.sii {
            base.idle_interval_ms = sii;
        }
        if let Some(sai) = self.sai {
            base.active_interval_ms = sai;
        }
        if let Some(sat) = self.sat {
            base.active_threshold_ms = sat;
        }
        base
    }

    pub fn is_empty(&self) -> bool {
        self.sii.is_none() && self.sai.is_none() && self.sat.is_none()
    }
}

/// A commissioned device surfaced by operational discovery.
#[derive(Debug, Clone)]
pub struct DiscoveredNode {
    /// Resolved endpoints, best candidate first.
    pub addresses: Vec<ServerAddressIp>,
    pub discovery_data: Option<DiscoveryData>,
}

/// Seam to the mDNS/DNS-SD scanner.
#[async_trait::async_trait]
pub trait OperationalScanner: Send + Sync {
    /// Actively query for the operational service instance of
    /// `fabric`/`node_id`. With `timeout = None` the query runs until the
    /// device is found or the discovery is cancelled. `ignore_cache`
    /// forces a fresh network query even when a cached answer exists.
    async fn find_operational_device(
        &self,
        fabric: &Fabric,
        node_id: NodeId,
        timeout: Option<Duration>,
        ignore_cache: bool,
    ) -> Result<Option<DiscoveredNode>, WeftNetError>;

    /// Cached answer from an earlier query, if any. Never touches the
    /// network.
    fn get_discovered_operational_device(
        &self,
        fabric: &Fabric,
        node_id: NodeId,
    ) -> Option<DiscoveredNode>;

    /// Stop an active query for `fabric`/`node_id`. When `resolve_waiters`
    /// is false, pending `find_operational_device` callers are abandoned
    /// to their own cancellation paths instead of being resolved empty.
    async fn cancel_operational_device_discovery(
        &self,
        fabric: &Fabric,
        node_id: NodeId,
        resolve_waiters: bool,
    );
}
