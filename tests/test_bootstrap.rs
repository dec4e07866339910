//! Host startup, shutdown and configuration from a `.env` file.

use std::{
    collections::HashMap,
    io::Write,
    net::{IpAddr, Ipv4Addr, TcpListener},
    time::Duration,
};

use kad_bootstrap::{
    AppError, BootstrapNode, announce, config,
    network::listen_address,
};
use libp2p::identity::Keypair;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

#[tokio::test]
async fn node_listens_and_stops_on_shutdown() {
    let keypair = Keypair::generate_ed25519();
    let peer_id = keypair.public().to_peer_id();

    let mut node = BootstrapNode::new(keypair, listen_address(LOCALHOST, 0)).unwrap();
    node.start().unwrap();
    assert_eq!(
        announce::bootstrap_id(&node.bootstrap_address()),
        format!("[*] Your Bootstrap ID Is: /ip4/127.0.0.1/tcp/0/p2p/{peer_id}")
    );

    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(node.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished());

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("node did not stop after shutdown")
        .unwrap();
}

#[tokio::test]
async fn occupied_port_is_a_network_error() {
    let taken = TcpListener::bind((LOCALHOST, 0)).unwrap();
    let port = taken.local_addr().unwrap().port();

    let mut node =
        BootstrapNode::new(Keypair::generate_ed25519(), listen_address(LOCALHOST, port)).unwrap();
    let err = node.start().unwrap_err();
    assert!(matches!(err, AppError::Network(_)), "{err}");
    assert!(err.to_string().contains(&format!("/ip4/127.0.0.1/tcp/{port}")));
}

#[test]
fn dotenv_file_feeds_the_loader() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "HOST=127.0.0.1").unwrap();
    writeln!(file, "PORT=4101").unwrap();
    writeln!(file, "SEED=1234").unwrap();
    writeln!(file, "# PRIVATE_KEY=").unwrap();

    let vars: HashMap<String, String> = dotenvy::from_path_iter(file.path())
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    let cfg = config::load_from(|name| vars.get(name).cloned());

    assert_eq!(cfg.host, LOCALHOST);
    assert_eq!(cfg.port, 4101);
    assert_eq!(cfg.seed, 1234);
    assert!(!cfg.seed_is_default());
    assert!(!cfg.has_private_key());
}
