//! Error types for the sACN receiver

use thiserror::Error;

/// Main error type for the receiver
#[derive(Error, Debug)]
pub enum Error {
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Receiver error: {0}")]
    Receiver(#[from] ReceiverError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Packet decoding errors
///
/// Each variant is a distinct rejection reason, checked in declaration order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Datagram is not an sACN packet")]
    NotSacn,

    #[error("Malformed {layer} layer length: declared {declared}, available {available}")]
    MalformedLength {
        layer: &'static str,
        declared: usize,
        available: usize,
    },

    #[error("Unsupported frame type (root vector {root_vector:#x}, framing vector {framing_vector:#x})")]
    UnsupportedFrameType { root_vector: u32, framing_vector: u32 },

    #[error("Invalid DMP layer: {0}")]
    InvalidDmpLayer(String),
}

/// Source table errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("Source limit reached: {0}")]
    LimitReached(usize),
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Socket bind failed: {0}")]
    BindFailed(String),

    #[error("Multicast join failed: {0}")]
    MulticastJoinFailed(String),

    #[error("Receive failed: {0}")]
    ReceiveFailed(String),
}

/// Receiver lifecycle and configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReceiverError {
    #[error("Receiver is already running")]
    AlreadyRunning,

    #[error("Invalid universe: {0} (must be 1-63999)")]
    InvalidUniverse(u16),

    #[error("Invalid source limit: {0} (must be at least 1)")]
    InvalidSourceLimit(usize),

    #[error("Invalid timing: {0}")]
    InvalidTiming(String),

    #[error("Invalid sequence window: {0} (must be 1-128)")]
    InvalidSequenceWindow(u8),

    #[error("Invalid address range: {start}-{end}")]
    InvalidAddressRange { start: u16, end: u16 },
}

/// Result type alias for the receiver
pub type Result<T> = std::result::Result<T, Error>;
