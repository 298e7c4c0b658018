//! Client implementation.
//!
//! The client owns, per tick:
//! - Console and cvars (movement tuning is read from cvars every tick)
//! - Key bindings feeding the button commands
//! - The command builder (buttons, mouse, view angles, pending impulse)
//! - The command ring
//! - The net channel commands are handed to
//!
//! Everything runs on the tick loop; input events for a tick must be fed
//! in before `tick` is called.

use engine_shared::{
    config::EngineConfig,
    console::{parse_command_line, Console, CvarFlags, CvarValue},
    math::PITCH,
    net::NetChannel,
    usercmd::MoveCmd,
};
use tracing::{debug, info};

use crate::{
    bindings::{KeyBindings, KeyCode},
    finish::{center_pitch, CmdBuilder, FinishEnv},
    history::CommandRing,
    input::{Action, ButtonCommand},
    movement::MoveSettings,
    transmit::{baseline_frame, queue_userinfo, send_cmd, SendOutcome},
};

/// Client connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Not connected to any server.
    Disconnected,
    /// Handshake in progress.
    Connecting,
    /// Handshake done, no gameplay stream yet.
    Connected,
    /// In game, sending move commands.
    Active,
}

/// Where key input currently goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFocus {
    Game,
    Console,
    Menu,
}

/// What the client knows about the last server frame it received.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServerView {
    /// A frame was received and can be used as a delta baseline.
    pub valid: bool,
    pub server_frame: i32,
    /// Server view angle correction, as short angles.
    pub delta_angles: [i16; 3],
}

/// High-level game client.
pub struct GameClient<C: NetChannel> {
    pub state: ClientState,
    pub console: Console,
    pub bindings: KeyBindings,
    pub input: CmdBuilder,
    pub ring: CommandRing,
    pub server: ServerView,
    pub key_focus: KeyFocus,
    /// Waiting for a full frame to start demo recording.
    pub demo_waiting: bool,
    channel: C,
    /// Last command built, for local prediction.
    last_cmd: MoveCmd,
}

impl<C: NetChannel> GameClient<C> {
    pub fn new(cfg: &EngineConfig, channel: C) -> Self {
        let mut console = Console::new();
        Self::register_cvars(&mut console, cfg);

        Self {
            state: ClientState::Disconnected,
            console,
            bindings: KeyBindings::new(),
            input: CmdBuilder::new(),
            ring: CommandRing::new(),
            server: ServerView::default(),
            key_focus: KeyFocus::Game,
            demo_waiting: false,
            channel,
            last_cmd: MoveCmd::default(),
        }
    }

    fn register_cvars(console: &mut Console, cfg: &EngineConfig) {
        let m = &cfg.movement;
        let floats = [
            ("cl_forwardspeed", m.forward_speed, "Forward move speed"),
            ("cl_sidespeed", m.side_speed, "Strafe speed"),
            ("cl_upspeed", m.up_speed, "Jump/crouch move speed"),
            ("cl_yawspeed", m.yaw_speed, "Keyboard turn rate (deg/s)"),
            ("cl_pitchspeed", m.pitch_speed, "Keyboard look rate (deg/s)"),
            ("cl_anglespeedkey", m.angle_speed_key, "Turn rate multiplier with +speed"),
            ("sensitivity", m.sensitivity, "Mouse sensitivity"),
            ("m_yaw", m.m_yaw, "Mouse yaw scale"),
            ("m_pitch", m.m_pitch, "Mouse pitch scale"),
            ("m_forward", m.m_forward, "Mouse forward scale"),
            ("m_side", m.m_side, "Mouse strafe scale"),
        ];
        for (name, value, description) in floats {
            console.register_cvar(name, CvarValue::Float(value as f64), description, CvarFlags::ARCHIVE);
        }

        let bools = [
            ("cl_run", m.run, "Always run"),
            ("cl_nodelta", m.no_delta, "Disable delta compression"),
            ("freelook", m.freelook, "Mouse always looks"),
            ("lookstrafe", m.lookstrafe, "Mouse strafes while looking"),
        ];
        for (name, value, description) in bools {
            console.register_cvar(name, CvarValue::Bool(value), description, CvarFlags::ARCHIVE);
        }

        console.register_cvar(
            "cl_lightlevel",
            CvarValue::Float(0.0),
            "Light level at the player, set by the renderer",
            CvarFlags::NONE,
        );
        console.register_cvar(
            "name",
            CvarValue::String(cfg.player_name.clone()),
            "Player name",
            CvarFlags::USERINFO | CvarFlags::ARCHIVE,
        );
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Last command built by `tick`.
    pub fn last_cmd(&self) -> &MoveCmd {
        &self.last_cmd
    }

    pub fn set_state(&mut self, state: ClientState) {
        if self.state != state {
            info!(from = ?self.state, to = ?state, "Client state change");
            self.state = state;
        }
    }

    /// Records a frame received from the server.
    pub fn on_server_frame(&mut self, server_frame: i32, delta_angles: [i16; 3]) {
        self.server = ServerView {
            valid: true,
            server_frame,
            delta_angles,
        };
        self.demo_waiting = false;
    }

    /// Adds raw mouse motion for the next command.
    pub fn mouse_moved(&mut self, dx: f32, dy: f32) {
        self.input.mouse.add(dx, dy);
    }

    /// Routes a key transition through the bindings.
    pub fn key_event(&mut self, key: KeyCode, down: bool, time: u32) -> anyhow::Result<Vec<String>> {
        let line = self.bindings.key_event(key, down, time);
        // Presses belong to the menu or console; releases still go through
        // so nothing stays stuck down.
        if down && self.key_focus != KeyFocus::Game {
            return Ok(Vec::new());
        }
        match line {
            Some(line) => self.exec_console(&line, time),
            None => Ok(Vec::new()),
        }
    }

    /// Executes a console line. `now` is the input clock, used for button
    /// presses typed without a timestamp.
    pub fn exec_console(&mut self, line: &str, now: u32) -> anyhow::Result<Vec<String>> {
        let tokens = parse_command_line(line.trim());
        let Some((command, rest)) = tokens.split_first() else {
            return Ok(Vec::new());
        };
        let args: Vec<&str> = rest.iter().map(String::as_str).collect();

        if let Some(button) = ButtonCommand::parse(command) {
            self.input.buttons.apply(button, &args, now);
            if button == ButtonCommand::Release(Action::MouseLook) {
                self.center_view();
            }
            return Ok(Vec::new());
        }

        match command.as_str() {
            "impulse" => {
                let Some(value) = args.first().and_then(|a| a.parse::<i64>().ok()) else {
                    return Ok(vec!["Usage: impulse <n>".to_string()]);
                };
                // Only the low byte goes on the wire.
                self.input.pending_impulse = value as u8;
                debug!(impulse = self.input.pending_impulse, "impulse queued");
                Ok(Vec::new())
            }
            "centerview" => {
                self.center_view();
                Ok(Vec::new())
            }
            "force_centerview" => {
                self.input.view_angles[PITCH] = 0.0;
                Ok(Vec::new())
            }
            "bind" => match args.as_slice() {
                [key] => {
                    let key = parse_key(key)?;
                    Ok(vec![match self.bindings.binding(key) {
                        Some(cmd) => format!("{} = \"{}\"", key, cmd),
                        None => format!("{} is not bound", key),
                    }])
                }
                [key, command @ ..] if !command.is_empty() => {
                    let key = parse_key(key)?;
                    self.bindings.bind(key, command.join(" "));
                    Ok(Vec::new())
                }
                _ => Ok(vec!["Usage: bind <key> [command]".to_string()]),
            },
            "unbind" => {
                let Some(key) = args.first() else {
                    return Ok(vec!["Usage: unbind <key>".to_string()]);
                };
                self.bindings.unbind(parse_key(key)?);
                Ok(Vec::new())
            }
            "bindlist" => Ok(self
                .bindings
                .iter()
                .map(|(key, cmd)| format!("{} \"{}\"", key, cmd))
                .collect()),
            "status" => {
                let seq = self.channel.outgoing_sequence();
                Ok(vec![
                    format!("State: {:?}", self.state),
                    format!("Outgoing sequence: {}", seq),
                    format!("Server frame: {} (valid: {})", self.server.server_frame, self.server.valid),
                    format!("View angles: {:?}", self.input.view_angles),
                ])
            }
            _ => self.console.exec(line),
        }
    }

    /// Points the view straight ahead, accounting for the server delta.
    pub fn center_view(&mut self) {
        self.input.view_angles[PITCH] = center_pitch(self.server.delta_angles[PITCH]);
    }

    /// Runs one tick: builds the command for the current outgoing sequence
    /// and sends whatever the connection phase calls for.
    ///
    /// `now` is the input clock in ms, `frame_time` the length of the
    /// client frame in seconds.
    pub fn tick(&mut self, now: u32, frame_time: f32) -> (MoveCmd, SendOutcome) {
        let settings = MoveSettings::from_console(&self.console);
        let env = FinishEnv {
            delta_angles: self.server.delta_angles,
            any_key_down: self.bindings.any_key_down() && self.key_focus == KeyFocus::Game,
            light_level: self.console.cvar_f32("cl_lightlevel"),
        };

        // Built even when not connected, so input state keeps draining.
        let cmd = self.input.create_cmd(now, frame_time, &settings, &env);
        let sequence = self.channel.outgoing_sequence();
        self.ring.store(sequence, cmd, now);
        self.last_cmd = cmd;

        if self.state == ClientState::Active && self.console.take_modified(CvarFlags::USERINFO) {
            let info = self.console.info_string(CvarFlags::USERINFO);
            debug!(%info, "sending userinfo");
            queue_userinfo(&mut self.channel, &info);
        }

        let last_frame = baseline_frame(
            self.console.cvar_bool("cl_nodelta"),
            self.server.valid,
            self.demo_waiting,
            self.server.server_frame,
        );
        let outcome = send_cmd(&mut self.channel, self.state, &self.ring, last_frame, now);
        (cmd, outcome)
    }
}

fn parse_key(text: &str) -> anyhow::Result<KeyCode> {
    text.parse::<KeyCode>()
        .map_err(|_| anyhow::anyhow!("bad key code: {}", text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine_shared::{math::angle_to_short, net::LoopbackChannel};

    fn client() -> GameClient<LoopbackChannel> {
        GameClient::new(&EngineConfig::default(), LoopbackChannel::new())
    }

    #[test]
    fn impulse_keeps_low_byte() {
        let mut c = client();
        c.exec_console("impulse 300", 0).unwrap();
        assert_eq!(c.input.pending_impulse, 44);
        let out = c.exec_console("impulse", 0).unwrap();
        assert_eq!(out, vec!["Usage: impulse <n>".to_string()]);
    }

    #[test]
    fn centerview_accounts_for_server_delta() {
        let mut c = client();
        c.on_server_frame(5, [angle_to_short(-10.0), 0, 0]);
        c.input.view_angles[PITCH] = 40.0;
        c.exec_console("centerview", 0).unwrap();
        assert!((c.input.view_angles[PITCH] - 10.0).abs() < 1e-2);

        c.exec_console("force_centerview", 0).unwrap();
        assert_eq!(c.input.view_angles[PITCH], 0.0);
    }

    #[test]
    fn releasing_mouse_look_recenters() {
        let mut c = client();
        c.input.view_angles[PITCH] = 30.0;
        c.exec_console("+mlook", 0).unwrap();
        assert_eq!(c.input.view_angles[PITCH], 30.0);
        c.exec_console("-mlook", 10).unwrap();
        assert_eq!(c.input.view_angles[PITCH], 0.0);
    }

    #[test]
    fn bind_commands() {
        let mut c = client();
        c.exec_console("bind 97 +moveleft", 0).unwrap();
        c.exec_console("bind 13 \"impulse 4\"", 0).unwrap();
        assert_eq!(
            c.exec_console("bind 97", 0).unwrap(),
            vec!["97 = \"+moveleft\"".to_string()]
        );
        assert_eq!(c.exec_console("bindlist", 0).unwrap().len(), 2);

        c.key_event(13, true, 5).unwrap();
        assert_eq!(c.input.pending_impulse, 4);

        c.exec_console("unbind 97", 0).unwrap();
        assert_eq!(
            c.exec_console("bind 97", 0).unwrap(),
            vec!["97 is not bound".to_string()]
        );
        assert!(c.exec_console("bind enter +use", 0).is_err());
    }

    #[test]
    fn cvars_seeded_from_config() {
        let mut cfg = EngineConfig::default();
        cfg.movement.forward_speed = 320.0;
        cfg.movement.run = true;
        cfg.player_name = "Scout".to_string();
        let c = GameClient::new(&cfg, LoopbackChannel::new());

        assert_eq!(c.console.cvar_f32("cl_forwardspeed"), 320.0);
        assert!(c.console.cvar_bool("cl_run"));
        assert_eq!(c.console.info_string(CvarFlags::USERINFO), "\\name\\Scout");
        assert!(!c.console.take_modified(CvarFlags::USERINFO));
    }

    #[test]
    fn status_and_fallthrough() {
        let mut c = client();
        let status = c.exec_console("status", 0).unwrap();
        assert_eq!(status[0], "State: Disconnected");
        c.exec_console("sensitivity 6", 0).unwrap();
        assert_eq!(c.console.cvar_f32("sensitivity"), 6.0);
    }
}
