//! Shared helpers for receiver integration tests

#![allow(dead_code)]

use crossbeam_channel::Receiver;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, Instant};

use sacn_receiver::codec::test_packets::PacketBuilder;
use sacn_receiver::{Cid, ReceiverConfig, ReceiverEvent, TimingConfig};

pub fn cid(id: u8) -> Cid {
    Cid::from_bytes([id; 16])
}

/// Unicast-only config on an ephemeral port with shortened timers
pub fn loopback_config(universe: u16) -> ReceiverConfig {
    ReceiverConfig {
        port: 0,
        join_multicast: false,
        timing: TimingConfig {
            sampling_period_ms: 200,
            source_loss_timeout_ms: 400,
            expiry_interval_ms: 50,
        },
        ..ReceiverConfig::for_universe(universe)
    }
}

/// Encode an E1.31 data packet
pub fn data_packet(
    cid: Cid,
    universe: u16,
    priority: u8,
    sequence: u8,
    options: u8,
    levels: &[u8],
) -> Vec<u8> {
    PacketBuilder::new(cid, universe)
        .source_name("Loopback")
        .priority(priority)
        .sequence(sequence)
        .options(options)
        .levels(levels)
        .build()
}

/// Sends packets to a receiver over loopback
pub struct Sender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl Sender {
    pub fn new(receiver_addr: SocketAddr) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        let target = SocketAddr::from(([127, 0, 0, 1], receiver_addr.port()));
        Self { socket, target }
    }

    pub fn send(&self, packet: &[u8]) {
        self.socket.send_to(packet, self.target).unwrap();
    }
}

/// Wait for the first event matching `pred`, collecting everything before it
pub fn wait_for<F>(events: &Receiver<ReceiverEvent>, timeout: Duration, pred: F) -> Vec<ReceiverEvent>
where
    F: Fn(&ReceiverEvent) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut seen = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match events.recv_timeout(remaining) {
            Ok(event) => {
                let done = pred(&event);
                seen.push(event);
                if done {
                    return seen;
                }
            }
            Err(_) => panic!("timed out waiting for event; saw {:?}", seen),
        }
    }
}
