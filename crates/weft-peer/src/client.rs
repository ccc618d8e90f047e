use std::sync::Arc;
use std::time::Duration;

use weft_net::{
    ChannelManager, Exchange, ExchangeManager, MessageChannel, PeerAddress, SessionManager,
    WeftNetError, INTERACTION_PROTOCOL_ID,
};

use crate::error::WeftPeerError;
use crate::queue::{InteractionPermit, InteractionQueue};

/// One rediscovery attempt against a peer's known operational address.
///
/// Implemented by the peer set, which owns the persisted address and the
/// pairing driver. `Ok(None)` means the peer stayed unreachable; hard
/// failures propagate.
#[async_trait::async_trait]
pub(crate) trait Reconnector: Send + Sync {
    async fn reconnect_known_address(
        &self,
        address: PeerAddress,
        expected_processing_time: Option<Duration>,
    ) -> Result<Option<MessageChannel>, WeftPeerError>;
}

/// Hands out exchanges over a peer's current secure channel and carries
/// the reconnection path higher layers invoke when the reliable-messaging
/// layer gives up on that channel.
pub struct ExchangeProvider {
    address: PeerAddress,
    channels: Arc<ChannelManager>,
    exchanges: Arc<dyn ExchangeManager>,
    sessions: Arc<dyn SessionManager>,
    reconnector: Arc<dyn Reconnector>,
    reconnect_processing_time: Duration,
}

impl ExchangeProvider {
    pub(crate) fn new(
        address: PeerAddress,
        channels: Arc<ChannelManager>,
        exchanges: Arc<dyn ExchangeManager>,
        sessions: Arc<dyn SessionManager>,
        reconnector: Arc<dyn Reconnector>,
        reconnect_processing_time: Duration,
    ) -> Self {
        Self {
            address,
            channels,
            exchanges,
            sessions,
            reconnector,
            reconnect_processing_time,
        }
    }

    pub fn address(&self) -> PeerAddress {
        self.address
    }

    /// The peer's current channel, or retransmission-limit-reached when
    /// none is registered.
    pub fn channel(&self) -> Result<MessageChannel, WeftPeerError> {
        self.channels
            .get_channel(self.address)
            .map_err(|e| self.map_missing(e))
    }

    /// Open a new exchange on the current channel.
    pub async fn initiate_exchange(&self, protocol_id: u32) -> Result<Exchange, WeftPeerError> {
        let channel = self.channel()?;
        self.exchanges
            .initiate_exchange_with_channel(&channel, protocol_id)
            .await
            .map_err(Into::into)
    }

    /// Re-establish the peer's channel after retransmission exhaustion.
    ///
    /// Requires a currently-registered channel (a peer we never reached
    /// fails fast). Wipes every channel for the address, then makes one
    /// rediscovery attempt against the known operational address with a
    /// widened processing-time hint. If the peer stays unreachable, all of
    /// its sessions are removed so upper layers learn the peer is gone,
    /// and retransmission-limit-reached is raised.
    pub async fn reconnect_channel(&self) -> Result<MessageChannel, WeftPeerError> {
        if !self.channels.has_channel(self.address) {
            return Err(WeftPeerError::RetransmissionLimitReached {
                address: self.address,
                message: "no channel to reconnect".into(),
            });
        }
        self.channels.remove_all_node_channels(self.address);

        let fresh = self
            .reconnector
            .reconnect_known_address(self.address, Some(self.reconnect_processing_time))
            .await?;

        match fresh {
            Some(channel) => Ok(channel),
            None => {
                self.sessions
                    .remove_all_sessions_for_node(self.address, true)
                    .await?;
                Err(WeftPeerError::RetransmissionLimitReached {
                    address: self.address,
                    message: "reconnect to known operational address failed".into(),
                })
            }
        }
    }

    fn map_missing(&self, e: WeftNetError) -> WeftPeerError {
        match e {
            WeftNetError::NoChannel { address } => WeftPeerError::RetransmissionLimitReached {
                address,
                message: "no channel to peer".into(),
            },
            other => other.into(),
        }
    }
}

/// An admitted interaction: an exchange plus the queue slot backing it.
/// Dropping it frees the slot.
pub struct Interaction {
    pub exchange: Exchange,
    _permit: InteractionPermit,
}

/// Client handle for interaction requests against one peer.
///
/// Returned by a successful connect. Every interaction goes through the
/// bounded queue; when the cached channel has died underneath us, one
/// reconnect is attempted before giving up.
pub struct InteractionClient {
    provider: ExchangeProvider,
    queue: Arc<InteractionQueue>,
}

impl InteractionClient {
    pub(crate) fn new(provider: ExchangeProvider, queue: Arc<InteractionQueue>) -> Self {
        Self { provider, queue }
    }

    pub fn address(&self) -> PeerAddress {
        self.provider.address()
    }

    /// The channel interactions currently run over.
    pub fn channel(&self) -> Result<MessageChannel, WeftPeerError> {
        self.provider.channel()
    }

    pub fn exchange_provider(&self) -> &ExchangeProvider {
        &self.provider
    }

    /// Wait for queue admission and open an interaction exchange.
    pub async fn interaction(&self) -> Result<Interaction, WeftPeerError> {
        let permit = self.queue.admit().await?;
        let exchange = match self.provider.initiate_exchange(INTERACTION_PROTOCOL_ID).await {
            Ok(exchange) => exchange,
            Err(e) if e.is_transient() => {
                tracing::debug!(
                    "client: exchange on cached channel of {} failed, reconnecting: {e}",
                    self.address()
                );
                self.provider.reconnect_channel().await?;
                self.provider.initiate_exchange(INTERACTION_PROTOCOL_ID).await?
            }
            Err(e) => return Err(e),
        };
        Ok(Interaction {
            exchange,
            _permit: permit,
        })
    }
}
