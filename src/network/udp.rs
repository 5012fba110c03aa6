//! UDP socket setup
//!
//! Sockets are built with socket2 so address reuse and multicast membership
//! can be configured before binding, then handed to tokio.

use socket2::{Domain, Protocol, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6};

use crate::config::ReceiverConfig;
use crate::error::{Error, NetworkError};
use crate::protocol;

/// Kernel receive buffer requested for each socket
const RECV_BUFFER_SIZE: usize = 1 << 20;

/// IP family of a receive socket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

/// A bound, non-blocking receive socket
pub struct UdpSocket {
    pub socket: tokio::net::UdpSocket,
    pub family: IpFamily,
    /// Human-readable description used in logs and errors
    pub label: String,
}

impl UdpSocket {
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Create one socket per IP family selected in `config`
///
/// Must be called from within a tokio runtime.
pub fn create_sockets(config: &ReceiverConfig) -> Result<Vec<UdpSocket>, Error> {
    let mut sockets = Vec::new();
    if config.ip_mode.uses_ipv4() {
        sockets.push(create_socket(config, IpFamily::V4)?);
    }
    if config.ip_mode.uses_ipv6() {
        sockets.push(create_socket(config, IpFamily::V6)?);
    }
    Ok(sockets)
}

/// Create and bind a receive socket for the configured universe
pub fn create_socket(config: &ReceiverConfig, family: IpFamily) -> Result<UdpSocket, Error> {
    let domain = match family {
        IpFamily::V4 => Domain::IPV4,
        IpFamily::V6 => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))
        .map_err(|e| NetworkError::BindFailed(format!("socket creation: {}", e)))?;

    // Several receivers (one per universe) share the sACN port
    socket
        .set_reuse_address(true)
        .map_err(|e| NetworkError::BindFailed(format!("SO_REUSEADDR: {}", e)))?;
    #[cfg(all(unix, not(target_os = "linux")))]
    socket
        .set_reuse_port(true)
        .map_err(|e| NetworkError::BindFailed(format!("SO_REUSEPORT: {}", e)))?;

    if let Err(e) = socket.set_recv_buffer_size(RECV_BUFFER_SIZE) {
        tracing::debug!("Could not enlarge receive buffer: {}", e);
    }
    socket
        .set_nonblocking(true)
        .map_err(|e| NetworkError::BindFailed(format!("non-blocking mode: {}", e)))?;

    let bind_addr = match family {
        IpFamily::V4 => SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, config.port)),
        IpFamily::V6 => {
            socket
                .set_only_v6(true)
                .map_err(|e| NetworkError::BindFailed(format!("IPV6_V6ONLY: {}", e)))?;
            SocketAddr::V6(SocketAddrV6::new(Ipv6Addr::UNSPECIFIED, config.port, 0, 0))
        }
    };
    socket
        .bind(&bind_addr.into())
        .map_err(|e| NetworkError::BindFailed(format!("{}: {}", bind_addr, e)))?;

    let label = if config.join_multicast {
        match join_multicast(&socket, config, family) {
            Ok(group) => format!("{} ({})", bind_addr, group),
            Err(e) => {
                // Unicast still works without group membership
                tracing::warn!("{}; receiving unicast only on {}", e, bind_addr);
                bind_addr.to_string()
            }
        }
    } else {
        bind_addr.to_string()
    };

    let std_socket: std::net::UdpSocket = socket.into();
    let socket = tokio::net::UdpSocket::from_std(std_socket)?;

    tracing::debug!("Bound sACN socket {}", label);

    Ok(UdpSocket {
        socket,
        family,
        label,
    })
}

fn join_multicast(
    socket: &Socket,
    config: &ReceiverConfig,
    family: IpFamily,
) -> Result<String, Error> {
    match family {
        IpFamily::V4 => {
            let group = protocol::universe_to_ipv4_multicast(config.universe)?;
            let interface = config.interface.unwrap_or(Ipv4Addr::UNSPECIFIED);
            socket
                .join_multicast_v4(&group, &interface)
                .map_err(|e| NetworkError::MulticastJoinFailed(format!("{} on {}: {}", group, interface, e)))?;
            Ok(group.to_string())
        }
        IpFamily::V6 => {
            let group = protocol::universe_to_ipv6_multicast(config.universe)?;
            socket
                .join_multicast_v6(&group, config.ipv6_interface)
                .map_err(|e| {
                    NetworkError::MulticastJoinFailed(format!(
                        "{} on interface {}: {}",
                        group, config.ipv6_interface, e
                    ))
                })?;
            Ok(group.to_string())
        }
    }
}
