//! Weft operational networking surface.
//!
//! The stable boundary between the peer connection core (`weft-peer`) and
//! the machinery underneath it: UDP/BLE transports, the mDNS scanner, the
//! session and exchange managers, and CASE itself. Everything below this
//! crate is swappable; everything above it depends only on the types and
//! traits defined here.
//!
//! # Quick tour
//!
//! - [`PeerAddress`] identifies a peer logically (fabric index + node id).
//! - [`ServerAddressIp`] locates its operational endpoint on the network.
//! - [`MessageChannel`] binds a transport channel to a session; the
//!   [`ChannelManager`] keeps one per peer.
//! - [`SessionManager`], [`ExchangeManager`], [`OperationalScanner`] and
//!   [`CaseClient`] are the seams to the lower layers. In production they
//!   are implemented over the real stack; tests substitute mocks.

mod address;
mod case;
mod channel;
mod error;
mod exchange;
mod scanner;
mod session;
mod transport;

pub use address::{FabricIndex, NodeId, PeerAddress, PeerAddressMap};
pub use case::{CaseClient, CaseResult};
pub use channel::{ChannelManager, MessageChannel};
pub use error::WeftNetError;
pub use exchange::{Exchange, ExchangeManager};
pub use scanner::{DiscoveredNode, DiscoveryData, OperationalScanner};
pub use session::{
    Fabric, InsecureSession, ResubmissionEvent, ResumptionRecord, SecureSession, Session,
    SessionManager, SessionParameters,
};
pub use transport::{ChannelType, NetInterface, NetInterfaceSet, ServerAddressIp, TransportChannel};

/// Protocol id of the Matter Secure Channel protocol (CASE, MRP control).
pub const SECURE_CHANNEL_PROTOCOL_ID: u32 = 0x0000_0000;

/// Protocol id of the Matter Interaction Model protocol.
pub const INTERACTION_PROTOCOL_ID: u32 = 0x0000_0001;

/// Matter service UUID used for BLE discovery. Passed through to the BLE
/// scanner untouched; this crate never interprets it.
pub const MATTER_BLE_SERVICE_UUID: u16 = 0xFFF6;
