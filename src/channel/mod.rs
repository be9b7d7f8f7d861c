//! Per-peer reliable delivery on top of an unreliable datagram transport.

pub mod packet_type;
pub mod reliable_channel;
pub mod sequence;
pub mod window;
