use crate::channel::MessageChannel;
use crate::error::WeftNetError;

/// A bidirectional logical conversation over a channel, scoped to one
/// protocol id.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub id: u16,
    pub protocol_id: u32,
    pub channel: MessageChannel,
}

/// Seam to the exchange layer.
#[async_trait::async_trait]
pub trait ExchangeManager: Send + Sync {
    /// Open a new initiator exchange on `channel` for `protocol_id`.
    async fn initiate_exchange_with_channel(
        &self,
        channel: &MessageChannel,
        protocol_id: u32,
    ) -> Result<Exchange, WeftNetError>;

    /// Close an exchange, releasing its reliable-messaging state.
    async fn close_exchange(&self, exchange: Exchange) -> Result<(), WeftNetError>;
}
