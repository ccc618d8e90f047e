use weft_net::{PeerAddress, WeftNetError};

/// Errors surfaced by the peer connection core.
///
/// Wraps networking-boundary errors and adds the peer-level taxonomy:
/// caller mistakes, discovery outcomes, retransmission exhaustion and
/// lifecycle violations. `Clone` so one discovery outcome can be handed to
/// every coalesced waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WeftPeerError {
    #[error(transparent)]
    Net(#[from] WeftNetError),

    /// Programming error on the caller's side, such as requesting a
    /// reserved discovery mode or a timeout where none is allowed.
    #[error("implementation error: {0}")]
    Implementation(String),

    /// Discovery produced nothing usable for the peer.
    #[error("discovery for {address} failed: {message}")]
    Discovery {
        address: PeerAddress,
        message: String,
    },

    /// CASE or its transport exhausted the retry budget while pairing.
    #[error("pair retransmission limit reached: {0}")]
    PairRetransmissionLimitReached(String),

    /// Higher-level exhaustion: the peer's channel is gone and could not
    /// be re-established.
    #[error("retransmission limit reached for {address}: {message}")]
    RetransmissionLimitReached {
        address: PeerAddress,
        message: String,
    },

    /// A component was used before its construction finished, or after it
    /// was cancelled.
    #[error("{what} is not initialized: {message}")]
    UninitializedDependency { what: String, message: String },

    /// A component's construction failed; the original cause rides along.
    #[error("{what} is incapacitated: {cause}")]
    IncapacitatedDependency { what: String, cause: String },

    /// The interaction queue was closed while waiting for admission.
    #[error("interaction queue closed")]
    QueueClosed,
}

impl WeftPeerError {
    /// Whether the error reflects a transient connectivity problem worth
    /// retrying against another address, rather than a hard failure.
    pub(crate) fn is_transient(&self) -> bool {
        matches!(
            self,
            WeftPeerError::Net(
                WeftNetError::NoResponseTimeout { .. }
                    | WeftNetError::Connect { .. }
                    | WeftNetError::Transport(_)
            ) | WeftPeerError::PairRetransmissionLimitReached(_)
        )
    }
}
