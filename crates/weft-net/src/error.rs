use crate::address::PeerAddress;

/// Errors surfaced by the weft networking boundary.
///
/// Payloads are plain strings so the enum stays `Clone`; discovery
/// multiplexes one outcome to several waiters and each gets its own copy.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WeftNetError {
    /// No channel is registered for the peer. Expected on first contact;
    /// callers decide whether it is fatal.
    #[error("no channel known for {address}")]
    NoChannel { address: PeerAddress },

    /// The peer did not answer within the reliable-messaging retry budget.
    #[error("no response from peer: {message}")]
    NoResponseTimeout { message: String },

    /// Opening a transport channel to the peer failed.
    #[error("connection to {address} failed: {message}")]
    Connect {
        address: PeerAddress,
        message: String,
    },

    /// The transport reported a failure on an established channel.
    #[error("transport failure: {0}")]
    Transport(String),

    /// CASE could not establish a secure session.
    #[error("CASE establishment failed: {0}")]
    Case(String),

    /// The peer store could not be read or written.
    #[error("peer store failure: {0}")]
    Store(String),

    /// A peer address string did not parse.
    #[error("invalid peer address: {0}")]
    InvalidAddress(String),

    /// A persisted record could not be encoded or decoded.
    #[error("codec failure: {0}")]
    Codec(String),
}
