//! Weft operational peer connection core.
//!
//! Takes a logical peer identity (fabric index + node id) and produces an
//! authenticated, encrypted, session-multiplexed message channel suitable
//! for interaction requests. Five concerns meet here and have to agree on
//! state: operational mDNS discovery, CASE establishment and resumption,
//! reliable-messaging bookkeeping, per-peer cached cluster state, and the
//! asynchronous-construction lifecycle that orders initialization across
//! all of it.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use weft_net::PeerAddress;
//! use weft_peer::{ConnectOptions, PeerSet, PeerSetConfig};
//!
//! # async fn example(context: weft_peer::PeerContext) -> Result<(), weft_peer::WeftPeerError> {
//! let peers = PeerSet::new(context, PeerSetConfig::new());
//! peers.construction().wait().await?;
//!
//! let client = peers
//!     .connect(PeerAddress::new(1, 0x12345), ConnectOptions::new())
//!     .await?;
//! let interaction = client.interaction().await?;
//! # drop(interaction);
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod config;
mod discovery;
mod error;
mod lifecycle;
mod pairing;
mod peers;
mod queue;
mod reactor;
mod store;

pub use cache::{CachedAttribute, ClusterDataVersion, NodeCache};
pub use client::{ExchangeProvider, Interaction, InteractionClient};
pub use config::PeerSetConfig;
pub use discovery::{DiscoveryCoordinator, KnownPeer, NodeDiscoveryKind, PeerChannel};
pub use error::WeftPeerError;
pub use lifecycle::{Construction, LifecycleStatus};
pub use pairing::CaseInitiator;
pub use peers::{ConnectOptions, PeerContext, PeerSet, PeerSetEvent};
pub use queue::{InteractionPermit, InteractionQueue};
pub use reactor::ResubmissionWatcher;
pub use store::{MemoryPeerStore, OperationalPeer, PeerStore};
