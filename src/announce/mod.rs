//! Announces are the way peers who share a group find each other's network location without a
//!  central server: each peer publishes its contact information for a chat id, and nodes keep a
//!  short history of them per group to answer discovery queries.

pub mod codec;
pub mod discovery;
pub mod ip_port;
pub mod store;
pub mod types;
