use std::time::{Duration, Instant};

use kru::net::PeerState;
use kru::{ConnectionParameters, PacketLossSimulation, Transport, TransportEvent, UdpHost};

fn connected_pair(loss_percent: f32) -> (UdpHost, UdpHost) {
    let params = ConnectionParameters::default();
    let mut server = UdpHost::listen("127.0.0.1:0", &params).unwrap();
    let port = server.local_addr().unwrap().port();
    let mut client =
        UdpHost::connect(&ConnectionParameters::with_endpoint("127.0.0.1", port)).unwrap();

    server.set_packet_loss(PacketLossSimulation::lossy(loss_percent));
    client.set_packet_loss(PacketLossSimulation::lossy(loss_percent));

    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(5) {
        server.service(Duration::from_millis(2)).unwrap();
        client.service(Duration::from_millis(2)).unwrap();
        if client.state() == PeerState::Connected && server.state() == PeerState::Connected {
            break;
        }
    }
    assert_eq!(client.state(), PeerState::Connected);
    assert_eq!(server.state(), PeerState::Connected);

    (client, server)
}

#[test]
fn test_in_order_delivery_under_loss() {
    let (mut client, mut server) = connected_pair(30.0);

    let expected: Vec<Vec<u8>> = (0u8..50).map(|i| vec![i; 1 + i as usize]).collect();
    for payload in &expected {
        client.send(0, payload).unwrap();
    }

    let mut delivered = Vec::new();
    let start = Instant::now();
    while delivered.len() < expected.len() && start.elapsed() < Duration::from_secs(15) {
        client.service(Duration::from_millis(2)).unwrap();
        while let Some(event) = server.service(Duration::from_millis(2)).unwrap() {
            if let TransportEvent::Receive { channel, data } = event {
                assert_eq!(channel, 0);
                delivered.push(data);
            }
        }
    }

    assert_eq!(delivered, expected);
    assert!(client.stats().retransmissions > 0);
    assert!(client.stats().packets_dropped > 0);
}

#[test]
fn test_disconnect_reaches_peer() {
    let (mut client, mut server) = connected_pair(0.0);

    client.close();
    client.close();

    let mut disconnected = false;
    let start = Instant::now();
    while !disconnected && start.elapsed() < Duration::from_secs(2) {
        if let Some(TransportEvent::Disconnect) = server.service(Duration::from_millis(5)).unwrap() {
            disconnected = true;
        }
    }
    assert!(disconnected);
    assert_eq!(client.state(), PeerState::Disconnected);
    assert!(matches!(
        client.send(0, b"late"),
        Err(kru::TransportError::NotConnected)
    ));
}
