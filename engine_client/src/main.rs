//! Standalone client binary.
//!
//! Usage:
//!   cargo run -p engine_client -- [--addr 127.0.0.1:40000] [--tick-hz 64] [--name Player] [--config client.json]
//!
//! Runs the input tick loop and sends move packets over UDP. The connection
//! handshake belongs to the server side, so the phase is driven by hand.
//!
//! Console commands (besides every cvar and button command):
//!   connect        - Enter the connected phase (keepalives only)
//!   begin          - Enter the game (move packets every tick)
//!   disconnect     - Stop sending
//!   mouse <dx> <dy> - Feed mouse motion into the next command
//!   quit           - Exit client

use std::env;
use std::io::{BufRead, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Context;
use engine_client::client::{ClientState, GameClient};
use engine_client::movement::Clock;
use engine_shared::config::EngineConfig;
use engine_shared::net::UdpChannel;
use tokio::sync::mpsc;
use tracing::{debug, info};

fn parse_args() -> anyhow::Result<EngineConfig> {
    let args: Vec<String> = env::args().collect();

    // The config file is the base; flags override it.
    let mut cfg = match args.iter().position(|a| a == "--config") {
        Some(i) if i + 1 < args.len() => EngineConfig::load(&PathBuf::from(&args[i + 1]))?,
        _ => EngineConfig::default(),
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(64);
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.player_name = args[i + 1].clone();
                i += 2;
            }
            _ => i += 1,
        }
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args()?;
    info!(server = %cfg.server_addr, tick_hz = cfg.tick_hz, "Starting client");

    let server_addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
    let bind = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0);
    let channel = UdpChannel::connect(bind, server_addr).await?;
    info!(local = %channel.local_addr()?, peer = %channel.peer_addr(), "UDP channel open");

    let mut client = GameClient::new(&cfg, channel);

    // Set up console input channel.
    let (console_tx, mut console_rx) = mpsc::channel::<String>(32);

    // Spawn stdin reader thread.
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut stdout = std::io::stdout();
        loop {
            print!("] ");
            let _ = stdout.flush();
            let mut line = String::new();
            if stdin.lock().read_line(&mut line).is_err() {
                break;
            }
            let line = line.trim().to_string();
            if !line.is_empty() && console_tx.blocking_send(line).is_err() {
                break;
            }
        }
    });

    println!("Client ready. Type 'connect' then 'begin' to start sending, 'quit' to exit.");
    println!();

    let clock = Clock::new();
    let tick_hz = cfg.tick_hz.max(1);
    let mut interval = tokio::time::interval(Duration::from_secs_f32(1.0 / tick_hz as f32));
    let mut last_frame = Instant::now();

    loop {
        interval.tick().await;
        let frame_time = last_frame.elapsed().as_secs_f32();
        last_frame = Instant::now();
        let now = clock.now_ms();

        // Console input is applied before the tick samples it.
        while let Ok(line) = console_rx.try_recv() {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                ["quit"] | ["exit"] => return Ok(()),
                ["connect"] => client.set_state(ClientState::Connected),
                ["begin"] => client.set_state(ClientState::Active),
                ["disconnect"] => client.set_state(ClientState::Disconnected),
                ["mouse", dx, dy] => match (dx.parse::<f32>(), dy.parse::<f32>()) {
                    (Ok(dx), Ok(dy)) => client.mouse_moved(dx, dy),
                    _ => println!("Usage: mouse <dx> <dy>"),
                },
                _ => match client.exec_console(&line, now) {
                    Ok(output) => {
                        for line in output {
                            println!("{}", line);
                        }
                    }
                    Err(e) => {
                        println!("Error: {:#}", e);
                    }
                },
            }
        }

        let (cmd, outcome) = client.tick(now, frame_time);
        debug!(?cmd, ?outcome, "tick");
    }
}
