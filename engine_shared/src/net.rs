//! Networking primitives.
//!
//! Goals:
//! - Give the client a small channel abstraction it can hand datagrams to.
//! - Define the client -> server message tags and the move packet layout.
//! - Keep serialization explicit and versionable.
//!
//! Packet sequencing and retransmission belong to the channel; the command
//! pipeline only reads `outgoing_sequence` and `last_sent` and calls
//! `transmit` once per tick.

use std::net::SocketAddr;

use anyhow::{bail, ensure, Context};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::net::UdpSocket;
use tracing::{trace, warn};

use crate::{
    checksum::sequence_crc_byte,
    usercmd::{read_delta, MoveCmd},
};

/// Baseline frame value meaning "no delta compression".
pub const NO_DELTA_FRAME: i32 = -1;

/// Client -> server message tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClcOp {
    Bad = 0,
    Nop = 1,
    Move = 2,
    UserInfo = 3,
    StringCmd = 4,
}

impl ClcOp {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ClcOp::Bad),
            1 => Some(ClcOp::Nop),
            2 => Some(ClcOp::Move),
            3 => Some(ClcOp::UserInfo),
            4 => Some(ClcOp::StringCmd),
            _ => None,
        }
    }
}

/// The transport the command pipeline sends through.
pub trait NetChannel {
    /// Sequence number the next transmitted datagram will carry.
    fn outgoing_sequence(&self) -> u32;

    /// Realtime (ms) of the last transmit.
    fn last_sent(&self) -> u32;

    /// Whether reliable data is queued but not yet sent.
    fn has_pending_reliable(&self) -> bool;

    /// Queues reliable bytes to go out with the next datagram.
    fn queue_reliable(&mut self, data: &[u8]);

    /// Sends one datagram. Failures are the channel's concern.
    fn transmit(&mut self, data: &[u8], now: u32);
}

/// A datagram captured by [`LoopbackChannel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentDatagram {
    pub sequence: u32,
    pub sent_at: u32,
    pub reliable: Vec<u8>,
    pub data: Vec<u8>,
}

/// In-process channel that records what would have been sent.
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    outgoing_sequence: u32,
    last_sent: u32,
    reliable: Vec<u8>,
    pub sent: Vec<SentDatagram>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recently sent datagram.
    pub fn last(&self) -> Option<&SentDatagram> {
        self.sent.last()
    }
}

impl NetChannel for LoopbackChannel {
    fn outgoing_sequence(&self) -> u32 {
        self.outgoing_sequence
    }

    fn last_sent(&self) -> u32 {
        self.last_sent
    }

    fn has_pending_reliable(&self) -> bool {
        !self.reliable.is_empty()
    }

    fn queue_reliable(&mut self, data: &[u8]) {
        self.reliable.extend_from_slice(data);
    }

    fn transmit(&mut self, data: &[u8], now: u32) {
        self.sent.push(SentDatagram {
            sequence: self.outgoing_sequence,
            sent_at: now,
            reliable: std::mem::take(&mut self.reliable),
            data: data.to_vec(),
        });
        self.outgoing_sequence = self.outgoing_sequence.wrapping_add(1);
        self.last_sent = now;
    }
}

/// Decoded UDP datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub sequence: u32,
    pub reliable: Bytes,
    pub data: Bytes,
}

/// Channel over a connected UDP socket.
///
/// Datagrams are `[sequence u32][reliable len u16][reliable][data]`, all
/// little endian. Reliable bytes go out once with the next datagram;
/// acknowledgement and resend are not handled here.
#[derive(Debug)]
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
    outgoing_sequence: u32,
    last_sent: u32,
    reliable: BytesMut,
}

impl UdpChannel {
    pub async fn connect(bind_addr: SocketAddr, peer: SocketAddr) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
        socket.connect(peer).await.context("udp connect")?;
        Ok(Self {
            socket,
            peer,
            outgoing_sequence: 0,
            last_sent: 0,
            reliable: BytesMut::new(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Frames a datagram the way [`UdpChannel`] puts it on the wire.
    pub fn encode_datagram(sequence: u32, reliable: &[u8], data: &[u8]) -> anyhow::Result<Bytes> {
        let reliable_len = u16::try_from(reliable.len()).context("reliable data too long")?;
        let mut buf = BytesMut::with_capacity(6 + reliable.len() + data.len());
        buf.put_u32_le(sequence);
        buf.put_u16_le(reliable_len);
        buf.extend_from_slice(reliable);
        buf.extend_from_slice(data);
        Ok(buf.freeze())
    }

    /// Splits a received datagram into its parts.
    pub fn decode_datagram(raw: &[u8]) -> anyhow::Result<Datagram> {
        let mut buf = Bytes::copy_from_slice(raw);
        ensure!(buf.remaining() >= 6, "datagram header truncated");
        let sequence = buf.get_u32_le();
        let reliable_len = buf.get_u16_le() as usize;
        ensure!(buf.remaining() >= reliable_len, "reliable block truncated");
        let reliable = buf.split_to(reliable_len);
        Ok(Datagram {
            sequence,
            reliable,
            data: buf,
        })
    }
}

impl NetChannel for UdpChannel {
    fn outgoing_sequence(&self) -> u32 {
        self.outgoing_sequence
    }

    fn last_sent(&self) -> u32 {
        self.last_sent
    }

    fn has_pending_reliable(&self) -> bool {
        !self.reliable.is_empty()
    }

    fn queue_reliable(&mut self, data: &[u8]) {
        self.reliable.extend_from_slice(data);
    }

    fn transmit(&mut self, data: &[u8], now: u32) {
        let reliable = self.reliable.split().freeze();
        match Self::encode_datagram(self.outgoing_sequence, &reliable, data) {
            Ok(frame) => match self.socket.try_send(&frame) {
                Ok(n) => trace!(sequence = self.outgoing_sequence, bytes = n, "udp send"),
                Err(e) => warn!(error = %e, sequence = self.outgoing_sequence, "udp send failed"),
            },
            Err(e) => warn!(error = %e, "dropping datagram"),
        }
        self.outgoing_sequence = self.outgoing_sequence.wrapping_add(1);
        self.last_sent = now;
    }
}

/// A move packet as the server reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePacket {
    /// Last server frame the client fully received, or [`NO_DELTA_FRAME`].
    pub last_frame: i32,
    /// Commands for sequences `N-2`, `N-1`, `N`.
    pub cmds: [MoveCmd; 3],
}

/// Parses and verifies a move packet that arrived under `sequence`.
pub fn parse_move(data: &[u8], sequence: u32) -> anyhow::Result<MovePacket> {
    let mut buf = data;
    ensure!(buf.remaining() >= 2, "move packet truncated");

    let op = buf.get_u8();
    match ClcOp::from_u8(op) {
        Some(ClcOp::Move) => {}
        Some(other) => bail!("expected move, got {other:?}"),
        None => bail!("unknown client op {op}"),
    }

    let checksum = buf.get_u8();
    let covered = buf;

    ensure!(buf.remaining() >= 4, "baseline frame truncated");
    let last_frame = buf.get_i32_le();

    let mut cmds = [MoveCmd::default(); 3];
    let mut base = MoveCmd::default();
    for (i, slot) in cmds.iter_mut().enumerate() {
        *slot = read_delta(&base, &mut buf).with_context(|| format!("command {i}"))?;
        base = *slot;
    }

    let consumed = covered.len() - buf.remaining();
    let expected = sequence_crc_byte(&covered[..consumed], sequence);
    ensure!(
        checksum == expected,
        "checksum mismatch: got {checksum:#04x}, expected {expected:#04x}"
    );

    Ok(MovePacket { last_frame, cmds })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loopback_advances_sequence_and_flushes_reliable() {
        let mut chan = LoopbackChannel::new();
        chan.queue_reliable(b"hello");
        assert!(chan.has_pending_reliable());

        chan.transmit(&[0], 40);
        chan.transmit(&[1, 2], 90);

        assert_eq!(chan.outgoing_sequence(), 2);
        assert_eq!(chan.last_sent(), 90);
        assert!(!chan.has_pending_reliable());
        assert_eq!(chan.sent[0].reliable, b"hello");
        assert!(chan.sent[1].reliable.is_empty());
        assert_eq!(chan.last().map(|d| d.sequence), Some(1));
    }

    #[test]
    fn datagram_framing_splits_back() {
        let raw = UdpChannel::encode_datagram(9, b"rel", &[2, 0, 1]).unwrap();
        let d = UdpChannel::decode_datagram(&raw).unwrap();
        assert_eq!(d.sequence, 9);
        assert_eq!(&d.reliable[..], b"rel");
        assert_eq!(&d.data[..], &[2, 0, 1]);
    }

    #[tokio::test]
    async fn udp_channel_frames_and_sequences() -> anyhow::Result<()> {
        let server = UdpSocket::bind("127.0.0.1:0").await?;
        let mut chan = UdpChannel::connect("127.0.0.1:0".parse()?, server.local_addr()?).await?;

        chan.queue_reliable(&[ClcOp::StringCmd as u8, b'h', b'i', 0]);
        chan.transmit(&[ClcOp::Nop as u8], 250);
        assert_eq!(chan.outgoing_sequence(), 1);
        assert_eq!(chan.last_sent(), 250);
        assert!(!chan.has_pending_reliable());

        let mut buf = [0u8; 1500];
        let (n, from) = server.recv_from(&mut buf).await?;
        assert_eq!(from, chan.local_addr()?);
        let d = UdpChannel::decode_datagram(&buf[..n])?;
        assert_eq!(d.sequence, 0);
        assert_eq!(&d.reliable[..], &[4, b'h', b'i', 0]);
        assert_eq!(&d.data[..], &[ClcOp::Nop as u8]);
        Ok(())
    }

    #[test]
    fn rejects_non_move_packets() {
        let err = parse_move(&[ClcOp::Nop as u8, 0, 0, 0, 0, 0], 0).unwrap_err();
        assert!(err.to_string().contains("expected move"));
        assert!(parse_move(&[99, 0], 0).is_err());
    }
}
