//! Shared helpers for the integration tests.

use engine_client::client::{ClientState, GameClient};
use engine_shared::prelude::*;

/// Frame time used by the tests, matching a 16 ms input tick.
pub const FRAME_SECS: f32 = 0.016;
pub const FRAME_MS: u32 = 16;

/// Installs a test-friendly subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// A client on a loopback channel that is already in game.
pub fn active_client() -> GameClient<LoopbackChannel> {
    let mut client = GameClient::new(&EngineConfig::default(), LoopbackChannel::new());
    client.set_state(ClientState::Active);
    client
}

/// Parses the most recent move packet the client sent.
pub fn last_move(client: &GameClient<LoopbackChannel>) -> anyhow::Result<MovePacket> {
    let sent = client
        .channel()
        .last()
        .ok_or_else(|| anyhow::anyhow!("nothing sent"))?;
    parse_move(&sent.data, sent.sequence)
}
