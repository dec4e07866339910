//! Operator-facing stdout lines.
//!
//! These strings are scraped by deployment scripts, so their wording is fixed.

use std::{fmt::Display, net::IpAddr};

use libp2p::Multiaddr;

use crate::{config::Config, identity::Launch};

pub const SEED_NOT_SET: &str =
    "[*]: Seed is not set, using default seed 0. Please set a seed for production.";

pub const GENERATING_KEY: &str = "[*] Private key is not set, generating a new one.";

pub fn listening(host: IpAddr, port: u16) -> String {
    format!("[*] Listening on: {host} with port: {port}")
}

pub fn save_key(encoded_key: &str) -> String {
    format!("[*] Save your new private key to env PRIVATE_KEY: {encoded_key}")
}

pub fn bootstrap_id(bootstrap_address: &str) -> String {
    format!("[*] Your Bootstrap ID Is: {bootstrap_address}")
}

/// Dialable address other nodes bootstrap from: `<listen-addr>/p2p/<node-id>`.
pub fn bootstrap_address(listen_addr: &Multiaddr, node_id: impl Display) -> String {
    format!("{listen_addr}/p2p/{node_id}")
}

/// Lines printed before the identity is resolved.
pub fn preamble_lines(config: &Config) -> Vec<String> {
    let mut lines = Vec::with_capacity(3);
    if config.seed_is_default() {
        lines.push(SEED_NOT_SET.to_string());
    }
    lines.push(listening(config.host, config.port));
    if !config.has_private_key() {
        lines.push(GENERATING_KEY.to_string());
    }
    lines
}

/// Lines printed once the identity is resolved. `bootstrap_address` is the
/// announced address of a started host; it is ignored for [`Launch::Exit`].
pub fn launch_lines(launch: &Launch, bootstrap_address: Option<&str>) -> Vec<String> {
    match launch {
        Launch::Exit { encoded_key } => vec![save_key(encoded_key)],
        Launch::Start { generated_key, .. } => generated_key
            .as_deref()
            .map(save_key)
            .into_iter()
            .chain(bootstrap_address.map(bootstrap_id))
            .collect(),
    }
}
