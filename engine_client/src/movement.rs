//! Frame movement sampling.
//!
//! Turns held buttons and mouse motion into view angle changes and a
//! forward/side/up movement intent for one tick.

use std::time::Instant;

use engine_shared::{
    console::Console,
    math::{Angles, PITCH, YAW},
};

use crate::input::{Action, ButtonTable};

/// Frame lengths outside this range are clamped before sampling buttons.
pub const MIN_FRAME_MS: u32 = 1;
pub const MAX_FRAME_MS: u32 = 200;

/// Monotonic millisecond clock starting at zero when created.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Milliseconds since the clock was created, wrapping at `u32::MAX`.
    pub fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

/// Timing for one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickContext {
    /// Input clock at this sample (ms).
    pub now: u32,
    /// Input clock at the previous sample (ms).
    pub previous: u32,
    /// Length of the client frame in seconds.
    pub frame_time: f32,
}

impl TickContext {
    /// Time since the previous sample, clamped to `[1, 200]` ms.
    pub fn frame_ms(&self) -> u32 {
        self.now
            .wrapping_sub(self.previous)
            .clamp(MIN_FRAME_MS, MAX_FRAME_MS)
    }
}

/// Movement cvars, read fresh each tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MoveSettings {
    pub forward_speed: f32,
    pub side_speed: f32,
    pub up_speed: f32,
    pub yaw_speed: f32,
    pub pitch_speed: f32,
    pub angle_speed_key: f32,
    pub run: bool,
    pub sensitivity: f32,
    pub m_yaw: f32,
    pub m_pitch: f32,
    pub m_forward: f32,
    pub m_side: f32,
    pub freelook: bool,
    pub lookstrafe: bool,
}

impl MoveSettings {
    pub fn from_console(console: &Console) -> Self {
        Self {
            forward_speed: console.cvar_f32("cl_forwardspeed"),
            side_speed: console.cvar_f32("cl_sidespeed"),
            up_speed: console.cvar_f32("cl_upspeed"),
            yaw_speed: console.cvar_f32("cl_yawspeed"),
            pitch_speed: console.cvar_f32("cl_pitchspeed"),
            angle_speed_key: console.cvar_f32("cl_anglespeedkey"),
            run: console.cvar_bool("cl_run"),
            sensitivity: console.cvar_f32("sensitivity"),
            m_yaw: console.cvar_f32("m_yaw"),
            m_pitch: console.cvar_f32("m_pitch"),
            m_forward: console.cvar_f32("m_forward"),
            m_side: console.cvar_f32("m_side"),
            freelook: console.cvar_bool("freelook"),
            lookstrafe: console.cvar_bool("lookstrafe"),
        }
    }
}

impl From<&engine_shared::config::MoveTuning> for MoveSettings {
    fn from(t: &engine_shared::config::MoveTuning) -> Self {
        Self {
            forward_speed: t.forward_speed,
            side_speed: t.side_speed,
            up_speed: t.up_speed,
            yaw_speed: t.yaw_speed,
            pitch_speed: t.pitch_speed,
            angle_speed_key: t.angle_speed_key,
            run: t.run,
            sensitivity: t.sensitivity,
            m_yaw: t.m_yaw,
            m_pitch: t.m_pitch,
            m_forward: t.m_forward,
            m_side: t.m_side,
            freelook: t.freelook,
            lookstrafe: t.lookstrafe,
        }
    }
}

/// Unquantized movement for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoveIntent {
    pub forward: f32,
    pub side: f32,
    pub up: f32,
}

/// Turns the view with the keyboard.
pub fn adjust_angles(
    buttons: &mut ButtonTable,
    settings: &MoveSettings,
    ctx: &TickContext,
    view: &mut Angles,
) {
    let now = ctx.now;
    let frame_ms = ctx.frame_ms();

    let mut speed = ctx.frame_time;
    if buttons.is_down(Action::Speed) {
        speed *= settings.angle_speed_key;
    }

    if !buttons.is_down(Action::Strafe) {
        let turn = speed * settings.yaw_speed;
        view[YAW] -= turn * buttons.sample(Action::Right, now, frame_ms);
        view[YAW] += turn * buttons.sample(Action::Left, now, frame_ms);
    }

    let look = speed * settings.pitch_speed;
    if buttons.is_down(Action::KeyLook) {
        view[PITCH] -= look * buttons.sample(Action::Forward, now, frame_ms);
        view[PITCH] += look * buttons.sample(Action::Back, now, frame_ms);
    }
    view[PITCH] -= look * buttons.sample(Action::LookUp, now, frame_ms);
    view[PITCH] += look * buttons.sample(Action::LookDown, now, frame_ms);
}

/// Samples the keyboard into a movement intent. Turns the view first.
pub fn base_move(
    buttons: &mut ButtonTable,
    settings: &MoveSettings,
    ctx: &TickContext,
    view: &mut Angles,
) -> MoveIntent {
    adjust_angles(buttons, settings, ctx, view);

    let now = ctx.now;
    let frame_ms = ctx.frame_ms();
    let mut intent = MoveIntent::default();

    if buttons.is_down(Action::Strafe) {
        intent.side += settings.side_speed * buttons.sample(Action::Right, now, frame_ms);
        intent.side -= settings.side_speed * buttons.sample(Action::Left, now, frame_ms);
    }

    intent.side += settings.side_speed * buttons.sample(Action::MoveRight, now, frame_ms);
    intent.side -= settings.side_speed * buttons.sample(Action::MoveLeft, now, frame_ms);

    intent.up += settings.up_speed * buttons.sample(Action::Up, now, frame_ms);
    intent.up -= settings.up_speed * buttons.sample(Action::Down, now, frame_ms);

    if !buttons.is_down(Action::KeyLook) {
        intent.forward += settings.forward_speed * buttons.sample(Action::Forward, now, frame_ms);
        intent.forward -= settings.forward_speed * buttons.sample(Action::Back, now, frame_ms);
    }

    // Speed key and always-run cancel each other out.
    if buttons.is_down(Action::Speed) != settings.run {
        intent.forward *= 2.0;
        intent.side *= 2.0;
        intent.up *= 2.0;
    }

    intent
}

/// Mouse motion accumulated since the last tick.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MouseState {
    pub dx: f32,
    pub dy: f32,
}

impl MouseState {
    pub fn add(&mut self, dx: f32, dy: f32) {
        self.dx += dx;
        self.dy += dy;
    }

    /// Adds the accumulated motion to the view and intent, then clears it.
    pub fn apply(
        &mut self,
        buttons: &ButtonTable,
        settings: &MoveSettings,
        intent: &mut MoveIntent,
        view: &mut Angles,
    ) {
        let MouseState { dx, dy } = std::mem::take(self);
        if dx == 0.0 && dy == 0.0 {
            return;
        }
        let mx = dx * settings.sensitivity;
        let my = dy * settings.sensitivity;

        let strafe = buttons.is_down(Action::Strafe);
        let mouse_look = buttons.is_down(Action::MouseLook) || settings.freelook;

        if strafe || (settings.lookstrafe && mouse_look) {
            intent.side += settings.m_side * mx;
        } else {
            view[YAW] -= settings.m_yaw * mx;
        }

        if mouse_look && !strafe {
            view[PITCH] += settings.m_pitch * my;
        } else {
            intent.forward -= settings.m_forward * my;
        }
    }
}
