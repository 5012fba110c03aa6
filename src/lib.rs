//! # sACN Receiver
//!
//! Streaming ACN (ANSI E1.31) reception for a single DMX universe, merging
//! concurrent sources with Highest-Takes-Precedence.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SacnReceiver (network::receiver)                 │
//! │                                                                         │
//! │   ┌─────────────┐   ┌─────────────┐                                     │
//! │   │ IPv4 socket │   │ IPv6 socket │   one read task per socket          │
//! │   └──────┬──────┘   └──────┬──────┘                                     │
//! │          └────────┬────────┘                                            │
//! │                   ▼  bounded datagram queue                             │
//! │  ┌───────────────────────────────────────────────────────────────────┐  │
//! │  │              Dispatch task (engine::ReceiverEngine)               │  │
//! │  │                                                                   │  │
//! │  │  PacketDecoder ─► filters ─► SourceTable ─► merge ─► events       │  │
//! │  │                                ▲      ▲                           │  │
//! │  │             SamplingController ┘      └ ExpiryMonitor             │  │
//! │  │               (deadline timer)          (periodic sweep)          │  │
//! │  └───────────────────────────────┬───────────────────────────────────┘  │
//! └──────────────────────────────────┼──────────────────────────────────────┘
//!                                    ▼  unbounded event queue (crossbeam)
//!                     ┌──────────────────────────────┐
//!                     │ Consumer / EventDispatcher   │
//!                     │  socket_closed  merged_data  │
//!                     │  started/ended_sampling      │
//!                     │  lost_sources  exceeded      │
//!                     └──────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use sacn_receiver::{ReceiverConfig, ReceiverEvent, SacnReceiver};
//!
//! # async fn run() -> sacn_receiver::Result<()> {
//! let mut receiver = SacnReceiver::new();
//! let events = receiver.subscribe();
//! receiver.start(ReceiverConfig::for_universe(1)).await?;
//!
//! while let Ok(event) = events.recv() {
//!     if let ReceiverEvent::MergedData(merged) = event {
//!         println!("{} sources, address 1 = {}", merged.source_count, merged.channel_value(1));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod expiry;
pub mod merge;
pub mod network;
pub mod protocol;
pub mod sampling;
pub mod sources;
pub mod stats;

pub use config::{AppConfig, IpMode, ReceiverConfig, TimingConfig};
pub use error::{Error, Result};
pub use events::{EventDispatcher, EventHandler, ReceiverEvent};
pub use merge::{AddressRange, MergedResult};
pub use network::{ReceiverState, SacnReceiver};
pub use protocol::Cid;

/// Application-wide constants
pub mod constants {
    /// Maximum UDP payload read per datagram
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers

    /// Datagrams buffered between the read tasks and the dispatch task
    pub const DATAGRAM_QUEUE_CAPACITY: usize = 1024;

    /// Default number of sources tracked per universe
    pub const DEFAULT_SOURCE_LIMIT: usize = 8;
}
