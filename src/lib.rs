//! Kademlia bootstrap node.
//!
//! Reads its settings from the environment, resolves a libp2p identity
//! (generated from a seed, or decoded from `PRIVATE_KEY`), then runs a libp2p
//! host with a Kademlia DHT that other peers bootstrap against.

pub mod announce;
pub mod config;
pub mod error;
pub mod identity;
pub mod logger;
pub mod network;

pub use config::Config;
pub use error::AppError;
pub use identity::Launch;
pub use network::BootstrapNode;
