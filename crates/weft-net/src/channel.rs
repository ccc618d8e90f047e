use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::address::{PeerAddress, PeerAddressMap};
use crate::error::WeftNetError;
use crate::session::Session;
use crate::transport::TransportChannel;

/// A transport endpoint bound to a session: the unit higher layers send on.
#[derive(Clone)]
pub struct MessageChannel {
    pub transport: Arc<dyn TransportChannel>,
    pub session: Session,
}

impl MessageChannel {
    pub fn new(transport: Arc<dyn TransportChannel>, session: Session) -> Self {
        Self { transport, session }
    }

    pub fn is_secure(&self) -> bool {
        self.session.is_secure()
    }

    pub fn peer(&self) -> PeerAddress {
        self.session.peer()
    }
}

impl fmt::Debug for MessageChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageChannel")
            .field("peer", &self.peer())
            .field("remote", &self.transport.remote_address())
            .field("session", &self.session.id())
            .field("secure", &self.is_secure())
            .finish()
    }
}

/// Registered channels per peer address.
///
/// A pure map, mutated only from the controller task. Later registrations
/// win: `get_channel` hands out the most recently set channel so a
/// reconnect transparently supersedes the stale one.
pub struct ChannelManager {
    channels: Mutex<PeerAddressMap<Vec<MessageChannel>>>,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(PeerAddressMap::new()),
        }
    }

    /// The current channel for the peer, or [`WeftNetError::NoChannel`].
    pub fn get_channel(&self, address: PeerAddress) -> Result<MessageChannel, WeftNetError> {
        let channels = self.channels.lock();
        channels
            .get(&address)
            .and_then(|list| list.last())
            .cloned()
            .ok_or(WeftNetError::NoChannel { address })
    }

    pub fn has_channel(&self, address: PeerAddress) -> bool {
        let channels = self.channels.lock();
        channels.get(&address).is_some_and(|list| !list.is_empty())
    }

    pub fn set_channel(&self, address: PeerAddress, channel: MessageChannel) {
        tracing::debug!(
            "channels: registering session {} for {address}",
            channel.session.id()
        );
        let mut channels = self.channels.lock();
        channels.entry(address).or_default().push(channel);
    }

    pub fn remove_all_node_channels(&self, address: PeerAddress) {
        let mut channels = self.channels.lock();
        if channels.remove(&address).is_some() {
            tracing::debug!("channels: dropped all channels for {address}");
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
