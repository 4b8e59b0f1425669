//! UDP endpoints and interface selection for outbound media sockets.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::net::{UdpSocket, lookup_host};
use tracing::debug;

use crate::error::{Result, StrandError};

/// A remote host and port, resolved lazily.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    host: String,
    port: u16,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// First address the host resolves to.
    pub async fn resolve(&self) -> Result<SocketAddr> {
        lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| StrandError::Other(format!("{self} did not resolve to any address")))
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl From<SocketAddr> for Endpoint {
    fn from(addr: SocketAddr) -> Self {
        Self::new(addr.ip().to_string(), addr.port())
    }
}

/// Bind a UDP socket on the local interface the OS would route `remote`
/// through. `local_port == 0` picks an ephemeral port.
///
/// Failures come back as [`StrandError::SessionInit`].
pub async fn bind_for_remote(remote: SocketAddr, local_port: u16) -> Result<UdpSocket> {
    let local_ip = route_local_ip(remote).map_err(StrandError::SessionInit)?;
    let socket = UdpSocket::bind((local_ip, local_port))
        .await
        .map_err(StrandError::SessionInit)?;
    debug!(%remote, local = ?socket.local_addr().ok(), "bound media socket");
    Ok(socket)
}

/// Connecting a UDP socket sends nothing but makes the OS pick a route.
fn route_local_ip(remote: SocketAddr) -> std::io::Result<IpAddr> {
    let unspecified = match remote {
        SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };
    let route = std::net::UdpSocket::bind((unspecified, 0))?;
    route.connect(remote)?;
    Ok(route.local_addr()?.ip())
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::new("127.0.0.1", 5004).to_string(), "127.0.0.1:5004");
        assert_eq!(Endpoint::new("::1", 5005).to_string(), "[::1]:5005");
    }

    #[tokio::test]
    async fn resolves_literal_address() {
        let addr = Endpoint::new("127.0.0.1", 5004).resolve().await.unwrap();
        assert_eq!(addr, "127.0.0.1:5004".parse().unwrap());
    }

    #[tokio::test]
    async fn loopback_remote_binds_loopback() {
        let socket = bind_for_remote("127.0.0.1:9".parse().unwrap(), 0).await.unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.ip().is_loopback());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn port_in_use_is_session_init_error() {
        let held = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = held.local_addr().unwrap().port();
        let err = bind_for_remote("127.0.0.1:9".parse().unwrap(), port).await.unwrap_err();
        assert!(matches!(err, StrandError::SessionInit(_)));
    }
}
