use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::address::{FabricIndex, PeerAddress};
use crate::error::WeftNetError;

/// Message Reliability Protocol timing parameters of a session.
///
/// All intervals in milliseconds. Defaults are the Matter baseline values
/// used when neither discovery hints nor a resumption record say better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionParameters {
    /// Retry interval while the peer is idle.
    pub idle_interval_ms: u32,
    /// Retry interval while the peer is actively responding.
    pub active_interval_ms: u32,
    /// How long the peer stays "active" after its last message.
    pub active_threshold_ms: u16,
}

impl Default for SessionParameters {
    fn default() -> Self {
        Self {
            idle_interval_ms: 500,
            active_interval_ms: 300,
            active_threshold_ms: 4000,
        }
    }
}

/// An unauthenticated initiator session used to carry the CASE exchange.
#[derive(Debug, Clone)]
pub struct InsecureSession {
    pub id: u16,
    pub peer: PeerAddress,
    pub parameters: SessionParameters,
}

/// An authenticated, encrypted session produced by CASE.
#[derive(Debug, Clone)]
pub struct SecureSession {
    pub id: u16,
    pub peer: PeerAddress,
    pub parameters: SessionParameters,
}

/// Either session kind, as carried by a [`MessageChannel`](crate::MessageChannel).
#[derive(Debug, Clone)]
pub enum Session {
    Insecure(InsecureSession),
    Secure(SecureSession),
}

impl Session {
    pub fn is_secure(&self) -> bool {
        matches!(self, Session::Secure(_))
    }

    pub fn peer(&self) -> PeerAddress {
        match self {
            Session::Insecure(s) => s.peer,
            Session::Secure(s) => s.peer,
        }
    }

    pub fn id(&self) -> u16 {
        match self {
            Session::Insecure(s) => s.id,
            Session::Secure(s) => s.id,
        }
    }

    pub fn parameters(&self) -> SessionParameters {
        match self {
            Session::Insecure(s) => s.parameters,
            Session::Secure(s) => s.parameters,
        }
    }
}

/// State retained from an earlier CASE session that allows the next
/// establishment to take the abbreviated resumption path.
#[derive(Debug, Clone)]
pub struct ResumptionRecord {
    pub peer: PeerAddress,
    pub resumption_id: Vec<u8>,
    pub session_parameters: Option<SessionParameters>,
}

/// A fabric the controller is commissioned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fabric {
    pub index: FabricIndex,
    pub fabric_id: u64,
}

/// Emitted by the session manager when the reliable-messaging layer starts
/// retransmitting an unacknowledged message on a session.
#[derive(Debug, Clone)]
pub struct ResubmissionEvent {
    /// Peer the session belongs to, if it has one.
    pub peer: Option<PeerAddress>,
    /// Whether the session is a secure (CASE) session.
    pub secure: bool,
}

/// Seam to the session layer.
///
/// In production backed by the controller's session table and resumption
/// storage; in tests by a mock that records every call.
#[async_trait::async_trait]
pub trait SessionManager: Send + Sync {
    /// Allocate an unauthenticated initiator session toward `peer`.
    async fn create_insecure_session(
        &self,
        peer: PeerAddress,
        parameters: SessionParameters,
    ) -> Result<InsecureSession, WeftNetError>;

    /// Tear down an insecure session once CASE has finished with it.
    async fn destroy_insecure_session(&self, session: InsecureSession)
        -> Result<(), WeftNetError>;

    fn find_resumption_record(&self, peer: PeerAddress) -> Option<ResumptionRecord>;

    async fn delete_resumption_record(&self, peer: PeerAddress) -> Result<(), WeftNetError>;

    /// Remove every session for the peer. `send_close` controls whether
    /// session-close notifications go out to subscribers and the peer.
    async fn remove_all_sessions_for_node(
        &self,
        peer: PeerAddress,
        send_close: bool,
    ) -> Result<(), WeftNetError>;

    /// Resolve the fabric a peer address belongs to.
    fn fabric_for(&self, peer: PeerAddress) -> Option<Fabric>;

    fn default_session_parameters(&self) -> SessionParameters {
        SessionParameters::default()
    }

    /// Subscribe to retransmission-start events.
    fn resubmissions(&self) -> broadcast::Receiver<ResubmissionEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_enum_dispatch() {
        let peer = PeerAddress::new(1, 2);
        let insecure = Session::Insecure(InsecureSession {
            id: 1,
            peer,
            parameters: SessionParameters::default(),
        });
        let secure = Session::Secure(SecureSession {
            id: 2,
            peer,
            parameters: SessionParameters::default(),
        });

        assert!(!insecure.is_secure());
        assert!(secure.is_secure());
        assert_eq!(insecure.peer(), peer);
        assert_eq!(secure.id(), 2);
    }

    #[test]
    fn default_parameters_are_matter_baseline() {
        let params = SessionParameters::default();
        assert_eq!(params.idle_interval_ms, 500);
        assert_eq!(params.active_interval_ms, 300);
        assert_eq!(params.active_threshold_ms, 4000);
    }
}
