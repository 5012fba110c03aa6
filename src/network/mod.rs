//! Network subsystem for sACN reception

pub mod receiver;
pub mod udp;

pub use receiver::{Datagram, ReceiverState, SacnReceiver};
pub use udp::{create_socket, create_sockets, IpFamily, UdpSocket};
