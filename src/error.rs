use thiserror::Error;
use crate::channel::packet_type::GroupPacketType;

/// Failures of the announce codec and the announce store. None of these is fatal: a unit that
///  fails to decode is discarded as a whole, never partially applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AnnounceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("buffer too small: {needed} bytes needed, {available} available")]
    BufferTooSmall { needed: usize, available: usize },
    #[error("truncated input: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("relay count {0} exceeds the maximum")]
    RelayCountExceeded(usize),
    #[error("malformed announce: {0}")]
    Malformed(&'static str),
}

/// Failures of a reliable channel. All of them are recoverable by the caller: back off, drop,
///  or treat as already resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
    #[error("send window is full")]
    WindowFull,
    #[error("sequence {0} is not outstanding")]
    UnknownSequence(u64),
    #[error("sequence {sequence} is outside the receive window starting at {next_expected}")]
    SequenceOutOfWindow { sequence: u64, next_expected: u64 },
}

/// Failures of a peer link: framing problems of incoming packets, or channel failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LinkError {
    #[error("truncated packet: {needed} bytes needed, {available} available")]
    Truncated { needed: usize, available: usize },
    #[error("unknown packet type {0}")]
    UnknownPacketType(u8),
    #[error("packet type {0:?} does not go through the reliable channel")]
    NotLossless(GroupPacketType),
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
