//! Data packet fixtures for tests and benchmarks

use crate::protocol::{self, offsets, Cid};

/// Assembles well-formed E1.31 data packets
pub struct PacketBuilder {
    cid: Cid,
    universe: u16,
    source_name: String,
    priority: u8,
    sequence: u8,
    options: u8,
    start_code: u8,
    levels: Vec<u8>,
}

impl PacketBuilder {
    pub fn new(cid: Cid, universe: u16) -> Self {
        Self {
            cid,
            universe,
            source_name: "Test Source".to_string(),
            priority: protocol::PRIORITY_DEFAULT,
            sequence: 0,
            options: 0,
            start_code: protocol::NULL_START_CODE,
            levels: vec![0; protocol::DMX_SLOTS],
        }
    }

    pub fn source_name(mut self, name: &str) -> Self {
        self.source_name = name.to_string();
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn sequence(mut self, sequence: u8) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn options(mut self, options: u8) -> Self {
        self.options = options;
        self
    }

    pub fn start_code(mut self, start_code: u8) -> Self {
        self.start_code = start_code;
        self
    }

    pub fn levels(mut self, levels: &[u8]) -> Self {
        self.levels = levels.to_vec();
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let total = offsets::LEVELS + self.levels.len();
        let mut buf = vec![0u8; total];

        buf[offsets::PREAMBLE..offsets::PREAMBLE + 2]
            .copy_from_slice(&protocol::PREAMBLE_SIZE.to_be_bytes());
        buf[offsets::ACN_IDENTIFIER..offsets::ACN_IDENTIFIER + 12]
            .copy_from_slice(&protocol::ACN_PACKET_IDENTIFIER);
        put_flags_length(&mut buf, offsets::ROOT_FLAGS_LENGTH, total);
        buf[offsets::ROOT_VECTOR..offsets::ROOT_VECTOR + 4]
            .copy_from_slice(&protocol::VECTOR_ROOT_E131_DATA.to_be_bytes());
        buf[offsets::CID..offsets::CID + 16].copy_from_slice(self.cid.as_bytes());

        put_flags_length(&mut buf, offsets::FRAMING_FLAGS_LENGTH, total);
        buf[offsets::FRAMING_VECTOR..offsets::FRAMING_VECTOR + 4]
            .copy_from_slice(&protocol::VECTOR_E131_DATA_PACKET.to_be_bytes());
        let name = self.source_name.as_bytes();
        let name_len = name.len().min(protocol::SOURCE_NAME_LENGTH - 1);
        buf[offsets::SOURCE_NAME..offsets::SOURCE_NAME + name_len]
            .copy_from_slice(&name[..name_len]);
        buf[offsets::PRIORITY] = self.priority;
        buf[offsets::SEQUENCE] = self.sequence;
        buf[offsets::OPTIONS] = self.options;
        buf[offsets::UNIVERSE..offsets::UNIVERSE + 2].copy_from_slice(&self.universe.to_be_bytes());

        put_flags_length(&mut buf, offsets::DMP_FLAGS_LENGTH, total);
        buf[offsets::DMP_VECTOR] = protocol::VECTOR_DMP_SET_PROPERTY;
        buf[offsets::DMP_ADDRESS_TYPE] = protocol::DMP_ADDRESS_AND_DATA_TYPE;
        buf[offsets::DMP_ADDRESS_INCREMENT..offsets::DMP_ADDRESS_INCREMENT + 2]
            .copy_from_slice(&protocol::DMP_ADDRESS_INCREMENT.to_be_bytes());
        let count = (self.levels.len() + 1) as u16;
        buf[offsets::DMP_PROPERTY_COUNT..offsets::DMP_PROPERTY_COUNT + 2]
            .copy_from_slice(&count.to_be_bytes());
        buf[offsets::START_CODE] = self.start_code;
        buf[offsets::LEVELS..].copy_from_slice(&self.levels);

        buf
    }
}

fn put_flags_length(buf: &mut [u8], offset: usize, total: usize) {
    let length = (total - offset) as u16;
    buf[offset..offset + 2].copy_from_slice(&(0x7000 | length).to_be_bytes());
}
