//! sACN packet codec
//!
//! Parses and validates the three nested E1.31 layers (root, framing, DMP)
//! into structured packets for a single universe.

pub mod decoder;

#[doc(hidden)]
pub mod test_packets;

pub use decoder::{parse_data_packet, DataPacket, Decoded, IgnoreReason, PacketDecoder};
