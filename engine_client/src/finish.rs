//! Command finishing.
//!
//! Takes the sampled movement intent and produces the immutable `MoveCmd`
//! that goes into the command ring: button bits, pitch clamp, quantized
//! angles, frame duration, pending impulse and light level.

use engine_shared::{
    math::{angle_to_short, short_to_angle, short_to_angle_unsigned, Angles, PITCH, PITCH_LIMIT},
    usercmd::{CmdButtons, MoveCmd},
};

use crate::{
    input::{Action, ButtonTable},
    movement::{base_move, MouseState, MoveIntent, MoveSettings, TickContext},
};

/// Longest frame a command may claim.
pub const MAX_CMD_MSEC: i32 = 250;
/// Substituted when the measured frame length is not believable.
pub const FALLBACK_CMD_MSEC: u8 = 100;

/// Per-tick values the finisher needs from outside the input system.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FinishEnv {
    /// Server view angle correction from the last received frame.
    pub delta_angles: [i16; 3],
    /// A key is held and the game (not a menu or the console) has focus.
    pub any_key_down: bool,
    /// Ambient light at the player position, from the renderer.
    pub light_level: f32,
}

/// Milliseconds for a command covering `frame_time` seconds.
///
/// Out of range measurements become [`FALLBACK_CMD_MSEC`] rather than
/// being clamped to the nearest bound.
pub fn frame_msec(frame_time: f32) -> u8 {
    let ms = (frame_time * 1000.0) as i32;
    if (0..=MAX_CMD_MSEC).contains(&ms) {
        ms as u8
    } else {
        FALLBACK_CMD_MSEC
    }
}

/// Keeps `pitch + server delta` within the look limits by moving the
/// local pitch.
pub fn clamp_pitch(view: &mut Angles, delta_pitch: i16) {
    let mut delta = short_to_angle_unsigned(delta_pitch);
    if delta > 180.0 {
        delta -= 360.0;
    }

    let mut pitch = view[PITCH];
    if pitch + delta < -360.0 {
        pitch += 360.0;
    }
    if pitch + delta > 360.0 {
        pitch -= 360.0;
    }
    if pitch + delta > PITCH_LIMIT {
        pitch = PITCH_LIMIT - delta;
    }
    if pitch + delta < -PITCH_LIMIT {
        pitch = -PITCH_LIMIT - delta;
    }
    view[PITCH] = pitch;
}

/// Pitch that looks straight ahead once the server delta is applied.
pub fn center_pitch(delta_pitch: i16) -> f32 {
    -short_to_angle(delta_pitch)
}

/// Builds the final command from a sampled intent.
pub fn finish_move(
    intent: MoveIntent,
    buttons: &mut ButtonTable,
    view: &mut Angles,
    pending_impulse: &mut u8,
    frame_time: f32,
    env: &FinishEnv,
) -> MoveCmd {
    let mut cmd_buttons = CmdButtons::empty();
    if buttons.get_mut(Action::Attack).take_active() {
        cmd_buttons |= CmdButtons::ATTACK;
    }
    if buttons.get_mut(Action::Use).take_active() {
        cmd_buttons |= CmdButtons::USE;
    }
    if env.any_key_down {
        cmd_buttons |= CmdButtons::ANY;
    }

    clamp_pitch(view, env.delta_angles[PITCH]);

    MoveCmd {
        msec: frame_msec(frame_time),
        buttons: cmd_buttons,
        angles: view.map(angle_to_short),
        forward_move: intent.forward as i16,
        side_move: intent.side as i16,
        up_move: intent.up as i16,
        impulse: std::mem::take(pending_impulse),
        light_level: env.light_level.clamp(0.0, 255.0) as u8,
    }
}

/// Everything the client samples input into between commands.
#[derive(Debug, Clone, Default)]
pub struct CmdBuilder {
    pub buttons: ButtonTable,
    pub mouse: MouseState,
    /// Local view angles in degrees.
    pub view_angles: Angles,
    /// Impulse waiting for the next command.
    pub pending_impulse: u8,
    last_sample: u32,
}

impl CmdBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Input clock value of the previous command.
    pub fn last_sample(&self) -> u32 {
        self.last_sample
    }

    /// Samples input at `now` and produces this tick's command.
    pub fn create_cmd(
        &mut self,
        now: u32,
        frame_time: f32,
        settings: &MoveSettings,
        env: &FinishEnv,
    ) -> MoveCmd {
        let ctx = TickContext {
            now,
            previous: self.last_sample,
            frame_time,
        };

        let mut intent = base_move(&mut self.buttons, settings, &ctx, &mut self.view_angles);
        self.mouse
            .apply(&self.buttons, settings, &mut intent, &mut self.view_angles);
        let cmd = finish_move(
            intent,
            &mut self.buttons,
            &mut self.view_angles,
            &mut self.pending_impulse,
            frame_time,
            env,
        );

        self.last_sample = now;
        cmd
    }
}
