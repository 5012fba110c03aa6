//! E1.31 protocol definitions
//!
//! Wire constants, field offsets and the universe-to-address mapping shared
//! by the decoder and the network layer. Offsets are absolute positions in a
//! data packet datagram.

use std::net::{Ipv4Addr, Ipv6Addr};

use uuid::Uuid;

use crate::error::ReceiverError;

/// Component identifier of a sender (128-bit UUID)
pub type Cid = Uuid;

/// Well-known sACN UDP port
pub const ACN_SDT_MULTICAST_PORT: u16 = 5568;

/// Number of DMX slots in a universe
pub const DMX_SLOTS: usize = 512;

/// Lowest valid data universe
pub const UNIVERSE_MIN: u16 = 1;

/// Highest valid data universe
pub const UNIVERSE_MAX: u16 = 63999;

/// Highest priority a source may claim
pub const PRIORITY_MAX: u8 = 200;

/// Priority assumed for a source before its first framing layer is seen
pub const PRIORITY_DEFAULT: u8 = 100;

/// Null start code carrying level data
pub const NULL_START_CODE: u8 = 0x00;

// Root layer
pub const PREAMBLE_SIZE: u16 = 0x0010;
pub const POSTAMBLE_SIZE: u16 = 0x0000;
pub const ACN_PACKET_IDENTIFIER: [u8; 12] = *b"ASC-E1.17\0\0\0";
pub const VECTOR_ROOT_E131_DATA: u32 = 0x0000_0004;
pub const VECTOR_ROOT_E131_EXTENDED: u32 = 0x0000_0008;

// Framing layer
pub const VECTOR_E131_DATA_PACKET: u32 = 0x0000_0002;

// DMP layer
pub const VECTOR_DMP_SET_PROPERTY: u8 = 0x02;
pub const DMP_ADDRESS_AND_DATA_TYPE: u8 = 0xa1;
pub const DMP_FIRST_PROPERTY_ADDRESS: u16 = 0x0000;
pub const DMP_ADDRESS_INCREMENT: u16 = 0x0001;

// Options field bits
pub const OPTION_PREVIEW_DATA: u8 = 0b1000_0000;
pub const OPTION_STREAM_TERMINATED: u8 = 0b0100_0000;
pub const OPTION_FORCE_SYNCHRONIZATION: u8 = 0b0010_0000;

/// Flags nibble every PDU length field must carry
pub const PDU_FLAGS: u8 = 0x70;

/// Absolute offsets into a data packet
pub mod offsets {
    pub const PREAMBLE: usize = 0;
    pub const POSTAMBLE: usize = 2;
    pub const ACN_IDENTIFIER: usize = 4;
    pub const ROOT_FLAGS_LENGTH: usize = 16;
    pub const ROOT_VECTOR: usize = 18;
    pub const CID: usize = 22;
    pub const FRAMING_FLAGS_LENGTH: usize = 38;
    pub const FRAMING_VECTOR: usize = 40;
    pub const SOURCE_NAME: usize = 44;
    pub const PRIORITY: usize = 108;
    pub const SYNC_ADDRESS: usize = 109;
    pub const SEQUENCE: usize = 111;
    pub const OPTIONS: usize = 112;
    pub const UNIVERSE: usize = 113;
    pub const DMP_FLAGS_LENGTH: usize = 115;
    pub const DMP_VECTOR: usize = 117;
    pub const DMP_ADDRESS_TYPE: usize = 118;
    pub const DMP_FIRST_ADDRESS: usize = 119;
    pub const DMP_ADDRESS_INCREMENT: usize = 121;
    pub const DMP_PROPERTY_COUNT: usize = 123;
    pub const START_CODE: usize = 125;
    pub const LEVELS: usize = 126;
}

/// Length of the source name field
pub const SOURCE_NAME_LENGTH: usize = 64;

/// Smallest datagram that can carry a start code
pub const MIN_DATA_PACKET_SIZE: usize = offsets::LEVELS;

/// Largest well-formed data packet
pub const MAX_DATA_PACKET_SIZE: usize = offsets::LEVELS + DMX_SLOTS;

/// Check that a universe number addresses data (1-63999)
pub fn validate_universe(universe: u16) -> Result<u16, ReceiverError> {
    if (UNIVERSE_MIN..=UNIVERSE_MAX).contains(&universe) {
        Ok(universe)
    } else {
        Err(ReceiverError::InvalidUniverse(universe))
    }
}

/// IPv4 multicast group for a universe: 239.255.{hi}.{lo}
pub fn universe_to_ipv4_multicast(universe: u16) -> Result<Ipv4Addr, ReceiverError> {
    let universe = validate_universe(universe)?;
    let [hi, lo] = universe.to_be_bytes();
    Ok(Ipv4Addr::new(239, 255, hi, lo))
}

/// IPv6 multicast group for a universe: ff18::83:00:{hi}:{lo}
pub fn universe_to_ipv6_multicast(universe: u16) -> Result<Ipv6Addr, ReceiverError> {
    let universe = validate_universe(universe)?;
    Ok(Ipv6Addr::new(0xff18, 0, 0, 0, 0, 0, 0x8300, universe))
}
