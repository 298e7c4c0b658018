//! Command transmission.
//!
//! Once in game every tick sends a move packet:
//!
//! ```text
//! ┌──────┬──────────┬────────────────┬──────────┬──────────┬──────────┐
//! │ Move │ checksum │ last frame i32 │ cmd N-2  │ cmd N-1  │ cmd N    │
//! └──────┴──────────┴────────────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! The three commands are delta chained from an all-zero command, so a
//! single dropped packet never loses a command. The checksum covers
//! everything after itself and is salted by the outgoing sequence.

use bytes::{BufMut, BytesMut};
use engine_shared::{
    checksum::sequence_crc_byte,
    net::{ClcOp, NetChannel, NO_DELTA_FRAME},
    usercmd::{write_delta, MoveCmd, MAX_DELTA_SIZE},
};
use tracing::trace;

use crate::{client::ClientState, history::CommandRing};

/// Idle time after which a connected client sends a heartbeat.
pub const KEEPALIVE_INTERVAL_MS: u32 = 100;

/// Upper bound on the size of a move packet.
pub const MAX_MOVE_PACKET: usize = 1 + 1 + 4 + 3 * MAX_DELTA_SIZE;

/// What `send_cmd` did this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Not connected.
    Skipped,
    /// Connected, nothing due.
    Idle,
    /// Connected, sent a one byte heartbeat.
    Keepalive,
    /// In game, sent a move packet of this many bytes.
    Move(usize),
}

/// Baseline frame to request: the last frame received, or
/// [`NO_DELTA_FRAME`] when delta compression must not be used.
pub fn baseline_frame(no_delta: bool, frame_valid: bool, demo_waiting: bool, server_frame: i32) -> i32 {
    if no_delta || !frame_valid || demo_waiting {
        NO_DELTA_FRAME
    } else {
        server_frame
    }
}

/// Builds the move packet for `sequence` from the ring.
pub fn build_move_packet(ring: &CommandRing, sequence: u32, last_frame: i32) -> BytesMut {
    let mut buf = BytesMut::with_capacity(MAX_MOVE_PACKET);
    buf.put_u8(ClcOp::Move as u8);

    let checksum_index = buf.len();
    buf.put_u8(0);

    buf.put_i32_le(last_frame);

    let mut base = MoveCmd::default();
    for cmd in ring.last_three(sequence) {
        write_delta(&base, cmd, &mut buf);
        base = *cmd;
    }

    buf[checksum_index] = sequence_crc_byte(&buf[checksum_index + 1..], sequence);
    buf
}

/// Queues a userinfo update on the reliable stream.
pub fn queue_userinfo<C: NetChannel>(chan: &mut C, info: &str) {
    let mut msg = BytesMut::with_capacity(info.len() + 2);
    msg.put_u8(ClcOp::UserInfo as u8);
    msg.extend_from_slice(info.as_bytes());
    msg.put_u8(0);
    chan.queue_reliable(&msg);
}

/// Sends whatever the connection phase calls for this tick. The command
/// for the channel's outgoing sequence must already be in `ring`.
pub fn send_cmd<C: NetChannel>(
    chan: &mut C,
    state: ClientState,
    ring: &CommandRing,
    last_frame: i32,
    now: u32,
) -> SendOutcome {
    match state {
        ClientState::Disconnected | ClientState::Connecting => SendOutcome::Skipped,
        ClientState::Connected => {
            if chan.has_pending_reliable()
                || now.wrapping_sub(chan.last_sent()) > KEEPALIVE_INTERVAL_MS
            {
                chan.transmit(&[0], now);
                SendOutcome::Keepalive
            } else {
                SendOutcome::Idle
            }
        }
        ClientState::Active => {
            let sequence = chan.outgoing_sequence();
            let packet = build_move_packet(ring, sequence, last_frame);
            trace!(sequence, last_frame, bytes = packet.len(), "move packet");
            chan.transmit(&packet, now);
            SendOutcome::Move(packet.len())
        }
    }
}
