//! sACN data packet decoder
//!
//! Validates the root, framing and DMP layers of an E1.31 datagram and
//! produces a [`DataPacket`]. Decoding is a pure function of the input bytes.

use crate::error::CodecError;
use crate::protocol::{self, offsets, Cid};

/// A decoded E1.31 data packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub cid: Cid,
    pub source_name: String,
    /// Framing priority, clamped to 0-200
    pub priority: u8,
    pub sync_address: u16,
    pub sequence: u8,
    pub is_preview: bool,
    pub is_terminated: bool,
    pub force_sync: bool,
    pub universe: u16,
    pub start_code: u8,
    /// Slot values following the start code (at most 512)
    pub levels: Vec<u8>,
}

/// Why a well-formed packet was not passed on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Alternate start code (e.g. per-address priority, RDM)
    NonNullStartCode(u8),
    /// Packet addressed to a different universe
    UniverseMismatch(u16),
}

/// Outcome of decoding a datagram for a specific universe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Data(DataPacket),
    Ignored(IgnoreReason),
}

/// Decoder bound to the universe a receiver listens on
#[derive(Debug, Clone, Copy)]
pub struct PacketDecoder {
    universe: u16,
}

impl PacketDecoder {
    /// Create a decoder for the given universe
    pub fn new(universe: u16) -> Self {
        Self { universe }
    }

    /// Get the universe this decoder accepts
    pub fn universe(&self) -> u16 {
        self.universe
    }

    /// Decode a datagram, dropping null-start-code mismatches and foreign universes
    pub fn decode(&self, buf: &[u8]) -> Result<Decoded, CodecError> {
        let packet = parse_data_packet(buf)?;

        if packet.start_code != protocol::NULL_START_CODE {
            return Ok(Decoded::Ignored(IgnoreReason::NonNullStartCode(
                packet.start_code,
            )));
        }

        if packet.universe != self.universe {
            return Ok(Decoded::Ignored(IgnoreReason::UniverseMismatch(
                packet.universe,
            )));
        }

        Ok(Decoded::Data(packet))
    }
}

/// Parse and validate an E1.31 data packet regardless of universe or start code
pub fn parse_data_packet(buf: &[u8]) -> Result<DataPacket, CodecError> {
    // Root layer identification
    if buf.len() < offsets::CID {
        return Err(CodecError::NotSacn);
    }
    if read_u16(buf, offsets::PREAMBLE) != protocol::PREAMBLE_SIZE
        || read_u16(buf, offsets::POSTAMBLE) != protocol::POSTAMBLE_SIZE
        || buf[offsets::ACN_IDENTIFIER..offsets::ACN_IDENTIFIER + 12]
            != protocol::ACN_PACKET_IDENTIFIER
    {
        return Err(CodecError::NotSacn);
    }
    let root_vector = read_u32(buf, offsets::ROOT_VECTOR);
    if root_vector != protocol::VECTOR_ROOT_E131_DATA
        && root_vector != protocol::VECTOR_ROOT_E131_EXTENDED
    {
        return Err(CodecError::NotSacn);
    }

    // Root PDU must at least reach the framing vector
    let root_length = pdu_length(buf, offsets::ROOT_FLAGS_LENGTH, "root")?;
    let root_available = buf.len() - offsets::ROOT_FLAGS_LENGTH;
    let root_min = offsets::FRAMING_VECTOR + 4 - offsets::ROOT_FLAGS_LENGTH;
    if root_length > root_available || root_length < root_min {
        return Err(CodecError::MalformedLength {
            layer: "root",
            declared: root_length,
            available: root_available,
        });
    }

    let framing_length = pdu_length(buf, offsets::FRAMING_FLAGS_LENGTH, "framing")?;
    let framing_available = root_length - (offsets::FRAMING_FLAGS_LENGTH - offsets::ROOT_FLAGS_LENGTH);
    if framing_length > framing_available {
        return Err(CodecError::MalformedLength {
            layer: "framing",
            declared: framing_length,
            available: framing_available,
        });
    }

    let framing_vector = read_u32(buf, offsets::FRAMING_VECTOR);
    if root_vector != protocol::VECTOR_ROOT_E131_DATA
        || framing_vector != protocol::VECTOR_E131_DATA_PACKET
    {
        return Err(CodecError::UnsupportedFrameType {
            root_vector,
            framing_vector,
        });
    }

    // A data framing layer carries at least a DMP header and start code
    let framing_min = protocol::MIN_DATA_PACKET_SIZE - offsets::FRAMING_FLAGS_LENGTH;
    if framing_length < framing_min || buf.len() < protocol::MIN_DATA_PACKET_SIZE {
        return Err(CodecError::MalformedLength {
            layer: "framing",
            declared: framing_length,
            available: buf.len().saturating_sub(offsets::FRAMING_FLAGS_LENGTH),
        });
    }

    let dmp_length = pdu_length(buf, offsets::DMP_FLAGS_LENGTH, "dmp")?;
    let dmp_available = framing_length - (offsets::DMP_FLAGS_LENGTH - offsets::FRAMING_FLAGS_LENGTH);
    let property_count = read_u16(buf, offsets::DMP_PROPERTY_COUNT) as usize;
    let dmp_header = offsets::START_CODE - offsets::DMP_FLAGS_LENGTH;
    if dmp_length > dmp_available
        || dmp_length != dmp_header + property_count
        || property_count == 0
        || property_count > protocol::DMX_SLOTS + 1
        || offsets::DMP_FLAGS_LENGTH + dmp_length > buf.len()
    {
        return Err(CodecError::MalformedLength {
            layer: "dmp",
            declared: dmp_length,
            available: dmp_available,
        });
    }

    if buf[offsets::DMP_VECTOR] != protocol::VECTOR_DMP_SET_PROPERTY {
        return Err(CodecError::InvalidDmpLayer(format!(
            "vector {:#04x}",
            buf[offsets::DMP_VECTOR]
        )));
    }
    if buf[offsets::DMP_ADDRESS_TYPE] != protocol::DMP_ADDRESS_AND_DATA_TYPE {
        return Err(CodecError::InvalidDmpLayer(format!(
            "address/data type {:#04x}",
            buf[offsets::DMP_ADDRESS_TYPE]
        )));
    }
    if read_u16(buf, offsets::DMP_FIRST_ADDRESS) != protocol::DMP_FIRST_PROPERTY_ADDRESS
        || read_u16(buf, offsets::DMP_ADDRESS_INCREMENT) != protocol::DMP_ADDRESS_INCREMENT
    {
        return Err(CodecError::InvalidDmpLayer(
            "unexpected property addressing".to_string(),
        ));
    }

    let mut cid_bytes = [0u8; 16];
    cid_bytes.copy_from_slice(&buf[offsets::CID..offsets::CID + 16]);
    let options = buf[offsets::OPTIONS];
    let levels_end = offsets::START_CODE + property_count;

    Ok(DataPacket {
        cid: Cid::from_bytes(cid_bytes),
        source_name: parse_source_name(
            &buf[offsets::SOURCE_NAME..offsets::SOURCE_NAME + protocol::SOURCE_NAME_LENGTH],
        ),
        priority: buf[offsets::PRIORITY].min(protocol::PRIORITY_MAX),
        sync_address: read_u16(buf, offsets::SYNC_ADDRESS),
        sequence: buf[offsets::SEQUENCE],
        is_preview: options & protocol::OPTION_PREVIEW_DATA != 0,
        is_terminated: options & protocol::OPTION_STREAM_TERMINATED != 0,
        force_sync: options & protocol::OPTION_FORCE_SYNCHRONIZATION != 0,
        universe: read_u16(buf, offsets::UNIVERSE),
        start_code: buf[offsets::START_CODE],
        levels: buf[offsets::LEVELS..levels_end].to_vec(),
    })
}

/// Read the 12-bit length of a PDU, requiring the 0x7 flags nibble
fn pdu_length(buf: &[u8], offset: usize, layer: &'static str) -> Result<usize, CodecError> {
    let raw = read_u16(buf, offset);
    if (raw >> 8) as u8 & 0xf0 != protocol::PDU_FLAGS {
        return Err(CodecError::MalformedLength {
            layer,
            declared: (raw & 0x0fff) as usize,
            available: buf.len().saturating_sub(offset),
        });
    }
    Ok((raw & 0x0fff) as usize)
}

fn read_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn read_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        buf[offset],
        buf[offset + 1],
        buf[offset + 2],
        buf[offset + 3],
    ])
}

fn parse_source_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}
