use std::sync::Arc;
use std::time::Duration;

use weft_net::{
    CaseClient, ChannelManager, ChannelType, DiscoveryData, ExchangeManager, MessageChannel,
    NetInterfaceSet, PeerAddress, ServerAddressIp, Session, SessionManager, WeftNetError,
    SECURE_CHANNEL_PROTOCOL_ID,
};

use crate::cache::NodeCache;
use crate::error::WeftPeerError;

/// Runs CASE against one operational address and registers the resulting
/// secure channel.
///
/// Owns nothing: every collaborator comes in by reference at construction
/// (the managers are singletons per fabric context). The unsecure session
/// and the exchange are scoped acquisitions, released on every exit path.
pub struct CaseInitiator {
    interfaces: NetInterfaceSet,
    sessions: Arc<dyn SessionManager>,
    exchanges: Arc<dyn ExchangeManager>,
    channels: Arc<ChannelManager>,
    case: Arc<dyn CaseClient>,
    cache: Arc<NodeCache>,
}

impl CaseInitiator {
    pub fn new(
        interfaces: NetInterfaceSet,
        sessions: Arc<dyn SessionManager>,
        exchanges: Arc<dyn ExchangeManager>,
        channels: Arc<ChannelManager>,
        case: Arc<dyn CaseClient>,
        cache: Arc<NodeCache>,
    ) -> Self {
        Self {
            interfaces,
            sessions,
            exchanges,
            channels,
            case,
            cache,
        }
    }

    /// Establish a secure channel to `address` at `operational`.
    ///
    /// Session parameters cascade: scanner hints override the resumption
    /// record, which overrides the session manager defaults.
    pub async fn pair(
        &self,
        address: PeerAddress,
        operational: ServerAddressIp,
        discovery_data: Option<&DiscoveryData>,
        expected_processing_time: Option<Duration>,
    ) -> Result<MessageChannel, WeftPeerError> {
        let fabric = self.sessions.fabric_for(address).ok_or_else(|| {
            WeftPeerError::Implementation(format!("no fabric known for {address}"))
        })?;

        let bind = operational.bind_address();
        let Some(interface) = self.interfaces.interface_for(ChannelType::Udp, bind) else {
            return Err(WeftPeerError::PairRetransmissionLimitReached(format!(
                "no UDP interface bound to {bind} for {address}"
            )));
        };

        let transport = interface
            .open_channel(&operational)
            .await
            .map_err(|e| convert_timeout(e.into()))?;

        let mut parameters = self.sessions.default_session_parameters();
        if let Some(record) = self.sessions.find_resumption_record(address) {
            if let Some(stored) = record.session_parameters {
                parameters = stored;
            }
        }
        if let Some(hints) = discovery_data {
            parameters = hints.apply_to(parameters);
        }

        let unsecure = self
            .sessions
            .create_insecure_session(address, parameters)
            .await?;
        let setup_channel =
            MessageChannel::new(transport.clone(), Session::Insecure(unsecure.clone()));

        let exchange = match self
            .exchanges
            .initiate_exchange_with_channel(&setup_channel, SECURE_CHANNEL_PROTOCOL_ID)
            .await
        {
            Ok(exchange) => exchange,
            Err(e) => {
                self.release_unsecure(address, unsecure).await;
                return Err(convert_timeout(e.into()));
            }
        };

        let outcome = self
            .case
            .establish(&exchange, &fabric, address, expected_processing_time)
            .await;
        if let Err(e) = self.exchanges.close_exchange(exchange).await {
            tracing::debug!("pairing: closing CASE exchange for {address} failed: {e}");
        }

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                self.release_unsecure(address, unsecure).await;
                return Err(convert_timeout(e.into()));
            }
        };

        if !result.resumed {
            // Full establishment: the device lost its session state, so
            // whatever we cached about it is suspect.
            tracing::info!("pairing: {address} did not resume, dropping cached node state");
            self.cache.wipe(address);
        }

        self.sessions.destroy_insecure_session(unsecure).await?;

        tracing::debug!(
            "pairing: secure session {} established with {address} at {operational} (resumed: {})",
            result.session.id,
            result.resumed
        );

        let channel = MessageChannel::new(transport, Session::Secure(result.session));
        self.channels.set_channel(address, channel.clone());
        Ok(channel)
    }

    async fn release_unsecure(&self, address: PeerAddress, unsecure: weft_net::InsecureSession) {
        if let Err(e) = self.sessions.destroy_insecure_session(unsecure).await {
            tracing::debug!("pairing: destroying unsecure session for {address} failed: {e}");
        }
    }
}

/// The transport's retry budget running out during pairing surfaces as
/// pair-retransmission-limit-reached, message preserved.
fn convert_timeout(e: WeftPeerError) -> WeftPeerError {
    match e {
        WeftPeerError::Net(WeftNetError::NoResponseTimeout { message }) => {
            WeftPeerError::PairRetransmissionLimitReached(message)
        }
        other => other,
    }
}
