//! Socket-based test: a client on a real UDP channel, with the test acting
//! as the server end.

use std::net::SocketAddr;
use std::time::Duration;

use engine_client::client::{ClientState, GameClient};
use engine_shared::config::EngineConfig;
use engine_shared::net::{parse_move, ClcOp, UdpChannel};
use engine_tests::{init_tracing, FRAME_MS, FRAME_SECS};
use tokio::net::UdpSocket;
use tracing::info;

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn move_packets_arrive_over_udp() -> anyhow::Result<()> {
    init_tracing();

    let server = UdpSocket::bind("127.0.0.1:0").await?;
    let server_addr = server.local_addr()?;
    let bind: SocketAddr = "127.0.0.1:0".parse()?;
    let channel = UdpChannel::connect(bind, server_addr).await?;
    info!(local = %channel.local_addr()?, server = %server_addr, "client channel open");

    let cfg = EngineConfig {
        server_addr: server_addr.to_string(),
        player_name: "Udp".to_string(),
        ..Default::default()
    };
    let mut client = GameClient::new(&cfg, channel);
    client.set_state(ClientState::Active);
    client.exec_console("name Courier", 0)?;

    let mut now = 1000;
    client.tick(now, FRAME_SECS);
    client.exec_console(&format!("+moveleft 3 {now}"), now)?;
    for _ in 0..3 {
        now += FRAME_MS;
        client.tick(now, FRAME_SECS);
    }

    let mut buf = [0u8; 1500];
    let mut received = Vec::new();
    for _ in 0..4 {
        let (n, _) = tokio::time::timeout(Duration::from_secs(2), server.recv_from(&mut buf)).await??;
        received.push(UdpChannel::decode_datagram(&buf[..n])?);
    }

    // Userinfo rides along with the first packet only.
    assert_eq!(received[0].reliable[0], ClcOp::UserInfo as u8);
    assert!(received[1..].iter().all(|d| d.reliable.is_empty()));

    for (i, d) in received.iter().enumerate() {
        assert_eq!(d.sequence, i as u32);
        parse_move(&d.data, d.sequence)?;
    }

    let last = received.last().expect("four datagrams");
    let packet = parse_move(&last.data, last.sequence)?;
    assert_eq!(packet.cmds.map(|c| c.side_move), [-200, -200, -200]);
    assert_eq!(client.last_cmd().side_move, -200);
    Ok(())
}
