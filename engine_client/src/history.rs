//! Command history.
//!
//! The last `CMD_BACKUP` commands, indexed by the outgoing sequence they
//! were created under. The transmitter reads the last three for
//! redundancy; prediction replays whatever the server has not acked yet.

use engine_shared::usercmd::MoveCmd;

/// Ring capacity. Must be a power of two.
pub const CMD_BACKUP: usize = 64;
const CMD_MASK: u32 = CMD_BACKUP as u32 - 1;

const _: () = assert!(CMD_BACKUP.is_power_of_two());

#[derive(Debug, Clone)]
pub struct CommandRing {
    cmds: [MoveCmd; CMD_BACKUP],
    /// Realtime each command was created, for ping estimates.
    times: [u32; CMD_BACKUP],
}

impl Default for CommandRing {
    fn default() -> Self {
        Self {
            cmds: [MoveCmd::default(); CMD_BACKUP],
            times: [0; CMD_BACKUP],
        }
    }
}

impl CommandRing {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(sequence: u32) -> usize {
        (sequence & CMD_MASK) as usize
    }

    /// Stores the command for `sequence`, replacing the one from
    /// `sequence - CMD_BACKUP`.
    pub fn store(&mut self, sequence: u32, cmd: MoveCmd, realtime: u32) {
        let i = Self::slot(sequence);
        self.cmds[i] = cmd;
        self.times[i] = realtime;
    }

    pub fn get(&self, sequence: u32) -> &MoveCmd {
        &self.cmds[Self::slot(sequence)]
    }

    /// Realtime at which the command for `sequence` was created.
    pub fn created_at(&self, sequence: u32) -> u32 {
        self.times[Self::slot(sequence)]
    }

    /// Commands for `sequence - 2`, `sequence - 1` and `sequence`.
    pub fn last_three(&self, sequence: u32) -> [&MoveCmd; 3] {
        [
            self.get(sequence.wrapping_sub(2)),
            self.get(sequence.wrapping_sub(1)),
            self.get(sequence),
        ]
    }
}
