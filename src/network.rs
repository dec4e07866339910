//! libp2p host and Kademlia DHT for the bootstrap node.
//!
//! The host speaks TCP + Noise + Yamux and carries three behaviours:
//! Kademlia in server mode (so joining peers can query it), Identify (so
//! peers learn each other's listen addresses) and Ping. All connection and
//! routing work happens inside the swarm; [`BootstrapNode::run`] only polls it
//! and logs what it sees.

use std::{net::IpAddr, time::Duration};

use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder,
    futures::StreamExt,
    identify,
    identity::Keypair,
    kad::{self, store::MemoryStore},
    multiaddr::Protocol,
    noise, ping,
    swarm::{NetworkBehaviour, SwarmEvent},
    tcp, yamux,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{announce, error::AppError};

pub const IDENTIFY_PROTOCOL: &str = "/ipfs/id/1.0.0";

const IDLE_CONNECTION_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(NetworkBehaviour)]
pub struct BootstrapBehaviour {
    kademlia: kad::Behaviour<MemoryStore>,
    identify: identify::Behaviour,
    ping: ping::Behaviour,
}

/// `/ip4/<host>/tcp/<port>` (or `/ip6/...`).
pub fn listen_address(host: IpAddr, port: u16) -> Multiaddr {
    Multiaddr::empty()
        .with(Protocol::from(host))
        .with(Protocol::Tcp(port))
}

pub fn agent_version() -> String {
    format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
}

/// Kademlia behaviour answering DHT queries for `peer_id`.
fn attach_dht(peer_id: PeerId) -> kad::Behaviour<MemoryStore> {
    let mut config = kad::Config::new(kad::PROTOCOL_NAME);
    // Peers bootstrap against this node, never the other way round.
    config.set_periodic_bootstrap_interval(None);
    let mut kademlia = kad::Behaviour::with_config(peer_id, MemoryStore::new(peer_id), config);
    // Without a confirmed external address kad would stay in client mode.
    kademlia.set_mode(Some(kad::Mode::Server));
    kademlia
}

pub struct BootstrapNode {
    swarm: Swarm<BootstrapBehaviour>,
    listen_addr: Multiaddr,
}

impl BootstrapNode {
    /// Build the host for `keypair` and attach the DHT. Does not listen yet.
    pub fn new(keypair: Keypair, listen_addr: Multiaddr) -> Result<Self, AppError> {
        let swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(
                tcp::Config::default(),
                noise::Config::new,
                yamux::Config::default,
            )
            .map_err(|e| AppError::Network(format!("cannot build TCP transport: {e}")))?
            .with_behaviour(|key| BootstrapBehaviour {
                kademlia: attach_dht(key.public().to_peer_id()),
                identify: identify::Behaviour::new(
                    identify::Config::new(IDENTIFY_PROTOCOL.to_string(), key.public())
                        .with_agent_version(agent_version()),
                ),
                ping: ping::Behaviour::default(),
            })
            .map_err(|e| AppError::Network(format!("cannot attach DHT: {e}")))?
            .with_swarm_config(|c| c.with_idle_connection_timeout(IDLE_CONNECTION_TIMEOUT))
            .build();

        Ok(Self { swarm, listen_addr })
    }

    pub fn peer_id(&self) -> PeerId {
        *self.swarm.local_peer_id()
    }

    pub fn listen_addr(&self) -> &Multiaddr {
        &self.listen_addr
    }

    /// The address other nodes dial to bootstrap: listen address plus `/p2p/<peer-id>`.
    pub fn bootstrap_address(&self) -> String {
        announce::bootstrap_address(&self.listen_addr, self.peer_id())
    }

    /// Bind the listen address.
    pub fn start(&mut self) -> Result<(), AppError> {
        self.swarm
            .listen_on(self.listen_addr.clone())
            .map_err(|e| AppError::Network(format!("cannot listen on {}: {e}", self.listen_addr)))?;
        info!(peer_id = %self.peer_id(), listen_addr = %self.listen_addr, "bootstrap node started");
        Ok(())
    }

    /// Drive the swarm until `shutdown` is cancelled.
    pub async fn run(mut self, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, stopping bootstrap node");
                    break;
                }
                event = self.swarm.select_next_some() => self.handle_event(event),
            }
        }
    }

    fn handle_event(&mut self, event: SwarmEvent<BootstrapBehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "listening");
            }
            SwarmEvent::ConnectionEstablished {
                peer_id, endpoint, ..
            } => {
                debug!(%peer_id, outbound = endpoint.is_dialer(), "connection established");
            }
            SwarmEvent::ConnectionClosed { peer_id, cause, .. } => {
                debug!(%peer_id, ?cause, "connection closed");
            }
            SwarmEvent::IncomingConnectionError {
                send_back_addr,
                error,
                ..
            } => {
                debug!(%send_back_addr, %error, "incoming connection failed");
            }
            SwarmEvent::ListenerError { error, .. } => {
                warn!(%error, "listener error");
            }
            SwarmEvent::ListenerClosed {
                addresses, reason, ..
            } => {
                warn!(?addresses, ?reason, "listener closed");
            }
            SwarmEvent::Behaviour(BootstrapBehaviourEvent::Identify(
                identify::Event::Received { peer_id, info, .. },
            )) => {
                debug!(%peer_id, agent = %info.agent_version, "identify received");
                // Only DHT-speaking peers belong in the routing table.
                if info.protocols.contains(&kad::PROTOCOL_NAME) {
                    let kademlia = &mut self.swarm.behaviour_mut().kademlia;
                    for addr in info.listen_addrs {
                        kademlia.add_address(&peer_id, addr);
                    }
                }
            }
            SwarmEvent::Behaviour(BootstrapBehaviourEvent::Kademlia(
                kad::Event::RoutingUpdated {
                    peer, is_new_peer, ..
                },
            )) => {
                if is_new_peer {
                    info!(%peer, "peer added to routing table");
                }
            }
            SwarmEvent::Behaviour(BootstrapBehaviourEvent::Kademlia(
                kad::Event::InboundRequest { request },
            )) => {
                debug!(?request, "dht request");
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        io,
        net::{Ipv4Addr, Ipv6Addr},
        sync::{Arc, Mutex},
    };

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn ipv4_listen_address() {
        let addr = listen_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 4001);
        assert_eq!(addr.to_string(), "/ip4/0.0.0.0/tcp/4001");
    }

    #[test]
    fn ipv6_listen_address() {
        let addr = listen_address(IpAddr::V6(Ipv6Addr::LOCALHOST), 4001);
        assert_eq!(addr.to_string(), "/ip6/::1/tcp/4001");
    }

    #[test]
    fn agent_version_names_the_crate() {
        assert!(agent_version().starts_with("kad-bootstrap/"));
    }

    #[tokio::test]
    async fn bootstrap_address_carries_peer_id() {
        let keypair = Keypair::generate_ed25519();
        let peer_id = keypair.public().to_peer_id();
        let node = BootstrapNode::new(
            keypair,
            listen_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 4001),
        )
        .unwrap();
        assert_eq!(node.peer_id(), peer_id);
        assert_eq!(
            node.bootstrap_address(),
            format!("/ip4/127.0.0.1/tcp/4001/p2p/{peer_id}")
        );
    }

    #[tokio::test]
    async fn lone_node_does_not_try_to_bootstrap_itself() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut node = BootstrapNode::new(
            Keypair::generate_ed25519(),
            listen_address(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        )
        .unwrap();
        node.start().unwrap();

        let shutdown = CancellationToken::new();
        let stopper = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            stopper.cancel();
        });
        node.run(shutdown).await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("bootstrap node started"), "{output}");
        assert!(!output.contains("Failed to trigger bootstrap"), "{output}");
    }
}
