use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::WeftNetError;

/// Routable operational endpoint of a peer.
///
/// The address family of `ip` decides which local interface serves the
/// connection: IPv6 peers go through the `::` bind, IPv4 peers through
/// `0.0.0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServerAddressIp {
    pub ip: IpAddr,
    pub port: u16,
}

impl ServerAddressIp {
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// The unspecified bind address matching this endpoint's family.
    pub fn bind_address(&self) -> IpAddr {
        match self.ip {
            IpAddr::V6(_) => Ipv6Addr::UNSPECIFIED.into(),
            IpAddr::V4(_) => Ipv4Addr::UNSPECIFIED.into(),
        }
    }
}

impl fmt::Display for ServerAddressIp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        SocketAddr::new(self.ip, self.port).fmt(f)
    }
}

/// Transport family of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelType {
    Udp,
    Ble,
}

/// A raw datagram channel to one remote endpoint.
#[async_trait::async_trait]
pub trait TransportChannel: Send + Sync {
    async fn send(&self, data: &[u8]) -> Result<(), WeftNetError>;

    async fn close(&self) -> Result<(), WeftNetError>;

    fn remote_address(&self) -> ServerAddressIp;
}

/// A pre-opened local network interface able to open channels to peers.
#[async_trait::async_trait]
pub trait NetInterface: Send + Sync {
    async fn open_channel(
        &self,
        address: &ServerAddressIp,
    ) -> Result<Arc<dyn TransportChannel>, WeftNetError>;
}

/// The set of local interfaces, keyed by channel type and bind address.
///
/// Built once at controller startup and shared read-only afterwards.
#[derive(Clone, Default)]
pub struct NetInterfaceSet {
    interfaces: HashMap<(ChannelType, IpAddr), Arc<dyn NetInterface>>,
}

impl NetInterfaceSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        channel_type: ChannelType,
        bind: IpAddr,
        interface: Arc<dyn NetInterface>,
    ) {
        self.interfaces.insert((channel_type, bind), interface);
    }

    pub fn interface_for(
        &self,
        channel_type: ChannelType,
        bind: IpAddr,
    ) -> Option<Arc<dyn NetInterface>> {
        self.interfaces.get(&(channel_type, bind)).cloned()
    }
}

impl fmt::Debug for NetInterfaceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.interfaces.keys()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_address_follows_family() {
        let v6 = ServerAddressIp::new("::1".parse().unwrap(), 5540);
        assert_eq!(v6.bind_address(), "::".parse::<IpAddr>().unwrap());

        let v4 = ServerAddressIp::new("127.0.0.1".parse().unwrap(), 5540);
        assert_eq!(v4.bind_address(), "0.0.0.0".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn display_uses_socket_addr_form() {
        let v6 = ServerAddressIp::new("2001:db8::2".parse().unwrap(), 5540);
        assert_eq!(v6.to_string(), "[2001:db8::2]:5540");

        let v4 = ServerAddressIp::new("192.0.2.1".parse().unwrap(), 5550);
        assert_eq!(v4.to_string(), "192.0.2.1:5550");
    }
}
