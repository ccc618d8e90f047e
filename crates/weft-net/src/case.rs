use std::time::Duration;

use crate::address::PeerAddress;
use crate::error::WeftNetError;
use crate::exchange::Exchange;
use crate::session::{Fabric, SecureSession};

/// Outcome of a CASE exchange.
#[derive(Debug, Clone)]
pub struct CaseResult {
    pub session: SecureSession,
    /// Whether the abbreviated resumption path was taken. A full
    /// (non-resumed) establishment means the peer lost its session state,
    /// typically because it rebooted or upgraded.
    pub resumed: bool,
}

/// Seam to the CASE implementation.
#[async_trait::async_trait]
pub trait CaseClient: Send + Sync {
    /// Run CASE as initiator over `exchange` and report the secure
    /// session. `expected_processing_time` widens the peer's response
    /// budget for the sigma messages when given.
    async fn establish(
        &self,
        exchange: &Exchange,
        fabric: &Fabric,
        peer: PeerAddress,
        expected_processing_time: Option<Duration>,
    ) -> Result<CaseResult, WeftNetError>;
}
