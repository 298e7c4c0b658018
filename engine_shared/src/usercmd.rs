//! Movement commands and their delta encoding.
//!
//! A `MoveCmd` is the per-tick record of player intent. On the wire a
//! command is always sent relative to a base command:
//!
//! ```text
//! ┌──────────┬───────────────────────────────────┬──────┬───────┐
//! │ bits (1) │ changed fields, in bit order      │ msec │ light │
//! └──────────┴───────────────────────────────────┴──────┴───────┘
//! ```
//!
//! Angles and moves are little-endian `i16`, buttons and impulse are bytes.
//! `msec` and `light_level` are fresh measurements every tick and are
//! always written.

use anyhow::{ensure, Context};
use bytes::{Buf, BufMut};

bitflags::bitflags! {
    /// Button bits carried by a command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CmdButtons: u8 {
        const ATTACK = 1 << 0;
        const USE = 1 << 1;
        const ANY = 1 << 7; // Any key down while the game has focus
    }
}

bitflags::bitflags! {
    /// Presence bits for delta-encoded fields.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeltaBits: u8 {
        const ANGLE1 = 1 << 0;
        const ANGLE2 = 1 << 1;
        const ANGLE3 = 1 << 2;
        const FORWARD = 1 << 3;
        const SIDE = 1 << 4;
        const UP = 1 << 5;
        const BUTTONS = 1 << 6;
        const IMPULSE = 1 << 7;
    }
}

const ANGLE_BITS: [DeltaBits; 3] = [DeltaBits::ANGLE1, DeltaBits::ANGLE2, DeltaBits::ANGLE3];

/// Largest encoded size of one command.
pub const MAX_DELTA_SIZE: usize = 1 + 3 * 2 + 3 * 2 + 1 + 1 + 1 + 1;

/// One tick of player intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MoveCmd {
    /// Milliseconds of simulation this command covers.
    pub msec: u8,
    pub buttons: CmdButtons,
    /// Pitch/yaw/roll as short angles.
    pub angles: [i16; 3],
    pub forward_move: i16,
    pub side_move: i16,
    pub up_move: i16,
    /// One-shot event (weapon switch etc).
    pub impulse: u8,
    /// Ambient light at the player position.
    pub light_level: u8,
}

impl MoveCmd {
    /// Computes which fields of `self` differ from `base`.
    pub fn delta_bits(&self, base: &MoveCmd) -> DeltaBits {
        let mut bits = DeltaBits::empty();
        for (i, bit) in ANGLE_BITS.iter().enumerate() {
            if self.angles[i] != base.angles[i] {
                bits |= *bit;
            }
        }
        bits.set(DeltaBits::FORWARD, self.forward_move != base.forward_move);
        bits.set(DeltaBits::SIDE, self.side_move != base.side_move);
        bits.set(DeltaBits::UP, self.up_move != base.up_move);
        bits.set(DeltaBits::BUTTONS, self.buttons != base.buttons);
        bits.set(DeltaBits::IMPULSE, self.impulse != base.impulse);
        bits
    }
}

/// Writes `cmd` relative to `base`.
pub fn write_delta(base: &MoveCmd, cmd: &MoveCmd, buf: &mut impl BufMut) {
    let bits = cmd.delta_bits(base);
    buf.put_u8(bits.bits());

    for (i, bit) in ANGLE_BITS.iter().enumerate() {
        if bits.contains(*bit) {
            buf.put_i16_le(cmd.angles[i]);
        }
    }
    if bits.contains(DeltaBits::FORWARD) {
        buf.put_i16_le(cmd.forward_move);
    }
    if bits.contains(DeltaBits::SIDE) {
        buf.put_i16_le(cmd.side_move);
    }
    if bits.contains(DeltaBits::UP) {
        buf.put_i16_le(cmd.up_move);
    }
    if bits.contains(DeltaBits::BUTTONS) {
        buf.put_u8(cmd.buttons.bits());
    }
    if bits.contains(DeltaBits::IMPULSE) {
        buf.put_u8(cmd.impulse);
    }

    buf.put_u8(cmd.msec);
    buf.put_u8(cmd.light_level);
}

/// Reads a command written by [`write_delta`] against the same `base`.
pub fn read_delta(base: &MoveCmd, buf: &mut impl Buf) -> anyhow::Result<MoveCmd> {
    let bits = DeltaBits::from_bits_retain(read_u8(buf).context("delta bits")?);
    let mut cmd = *base;

    for (i, bit) in ANGLE_BITS.iter().enumerate() {
        if bits.contains(*bit) {
            cmd.angles[i] = read_i16(buf).with_context(|| format!("angle {i}"))?;
        }
    }
    if bits.contains(DeltaBits::FORWARD) {
        cmd.forward_move = read_i16(buf).context("forward move")?;
    }
    if bits.contains(DeltaBits::SIDE) {
        cmd.side_move = read_i16(buf).context("side move")?;
    }
    if bits.contains(DeltaBits::UP) {
        cmd.up_move = read_i16(buf).context("up move")?;
    }
    if bits.contains(DeltaBits::BUTTONS) {
        cmd.buttons = CmdButtons::from_bits_retain(read_u8(buf).context("buttons")?);
    }
    if bits.contains(DeltaBits::IMPULSE) {
        cmd.impulse = read_u8(buf).context("impulse")?;
    }

    cmd.msec = read_u8(buf).context("msec")?;
    cmd.light_level = read_u8(buf).context("light level")?;
    Ok(cmd)
}

fn read_u8(buf: &mut impl Buf) -> anyhow::Result<u8> {
    ensure!(buf.remaining() >= 1, "truncated command");
    Ok(buf.get_u8())
}

fn read_i16(buf: &mut impl Buf) -> anyhow::Result<i16> {
    ensure!(buf.remaining() >= 2, "truncated command");
    Ok(buf.get_i16_le())
}
