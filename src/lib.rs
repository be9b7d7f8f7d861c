//! Building blocks for peer discovery and reliable messaging inside a decentralized group chat.
//!
//! * [announce] holds peers' announced contact information per group, and encodes / decodes it
//!   for the wire
//! * [channel] provides sequenced, acknowledged delivery between two peers
//! * [link] connects a channel to the network
//!
//! Lossless packets and their acknowledgements are framed as follows:
//!
//! ```ascii
//! 0: packet type (u8)
//! 1: sequence number (u64 BE)
//! 9: payload (lossless packets only, non-empty)
//! ```

pub mod announce;
pub mod buf_ext;
pub mod channel;
pub mod config;
pub mod error;
pub mod link;
pub mod mono_time;
pub mod safe_converter;
