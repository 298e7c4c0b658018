//! Button state tracking.
//!
//! Two different input sources (say mouse button 1 and the control key) can
//! both hold the same logical button. The button only goes up once every
//! source holding it has been released. Key events carry their key number
//! and timestamp as console arguments (`+forward 87 10234`) so presses and
//! releases can be matched up and the held time measured precisely.
//!
//! Flag bits:
//! - `DOWN` is the current state
//! - `PRESSED` is edge triggered on the up to down transition
//! - `RELEASED` is edge triggered on the down to up transition

use tracing::{debug, warn};

bitflags::bitflags! {
    /// Current state and edge pulses of a button.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ButtonFlags: u8 {
        const DOWN = 1 << 0;
        const PRESSED = 1 << 1;
        const RELEASED = 1 << 2;
    }
}

/// Held time assumed when a press carries no timestamp.
pub const DEFAULT_PRESS_LEAD_MS: u32 = 100;
/// Held time credited when a release carries no timestamp.
pub const DEFAULT_RELEASE_MS: i32 = 10;

/// Identifies the physical input holding a button (usually a key code).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceId(pub i32);

impl SourceId {
    /// Press typed at the console without a key argument.
    pub const CONSOLE: SourceId = SourceId(-1);
}

/// Logical player actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Forward,
    Back,
    Left,
    Right,
    MoveLeft,
    MoveRight,
    Strafe,
    Speed,
    Attack,
    Use,
    Up,
    Down,
    LookUp,
    LookDown,
    MouseLook,
    KeyLook,
}

impl Action {
    pub const COUNT: usize = 16;

    pub const ALL: [Action; Action::COUNT] = [
        Action::Forward,
        Action::Back,
        Action::Left,
        Action::Right,
        Action::MoveLeft,
        Action::MoveRight,
        Action::Strafe,
        Action::Speed,
        Action::Attack,
        Action::Use,
        Action::Up,
        Action::Down,
        Action::LookUp,
        Action::LookDown,
        Action::MouseLook,
        Action::KeyLook,
    ];

    /// Console name without the `+`/`-` prefix.
    pub fn command_name(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Back => "back",
            Action::Left => "left",
            Action::Right => "right",
            Action::MoveLeft => "moveleft",
            Action::MoveRight => "moveright",
            Action::Strafe => "strafe",
            Action::Speed => "speed",
            Action::Attack => "attack",
            Action::Use => "use",
            Action::Up => "moveup",
            Action::Down => "movedown",
            Action::LookUp => "lookup",
            Action::LookDown => "lookdown",
            Action::MouseLook => "mlook",
            Action::KeyLook => "klook",
        }
    }

    pub fn from_command_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.command_name() == name)
    }
}

/// What a button console command does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonCommand {
    Press(Action),
    Release(Action),
    /// `+toggledown`: press crouch if up, release it if down.
    ToggleDown,
    /// `-toggledown`: ignored, the toggle already happened on press.
    ToggleDownRelease,
}

impl ButtonCommand {
    /// Recognizes `+name`/`-name` button commands.
    pub fn parse(command: &str) -> Option<Self> {
        match command {
            "+toggledown" => return Some(ButtonCommand::ToggleDown),
            "-toggledown" => return Some(ButtonCommand::ToggleDownRelease),
            _ => {}
        }
        if let Some(name) = command.strip_prefix('+') {
            Action::from_command_name(name).map(ButtonCommand::Press)
        } else if let Some(name) = command.strip_prefix('-') {
            Action::from_command_name(name).map(ButtonCommand::Release)
        } else {
            None
        }
    }
}

/// Parses `<source> <timestamp>` button arguments. Missing, malformed or
/// zero values read as absent.
pub fn parse_button_args(args: &[&str]) -> (Option<SourceId>, Option<u32>) {
    let source = args.first().and_then(|s| s.parse::<i32>().ok()).map(SourceId);
    let timestamp = args
        .get(1)
        .and_then(|s| s.parse::<u32>().ok())
        .filter(|t| *t != 0);
    (source, timestamp)
}

/// Result of a press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    /// Button went from up to down.
    Pressed,
    /// Another source already holds the button down.
    AlreadyDown,
    /// The source already holds the button (key repeat).
    Repeat,
    /// Both slots are taken; the press was ignored.
    Rejected,
}

/// Result of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Button went from down to up.
    Released,
    /// The other source still holds the button.
    StillHeld,
    /// The source held nothing (e.g. the press went to a menu).
    Unmatched,
    /// Console release without a source: everything cleared.
    Forced,
}

/// Press/release state of one logical button.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    held: [Option<SourceId>; 2],
    flags: ButtonFlags,
    /// Time (ms) the button went down, or the last sample while held.
    press_time: u32,
    /// Held time not yet reported by `sample_fraction`.
    accumulated_ms: i32,
}

impl ButtonState {
    pub fn is_down(&self) -> bool {
        self.flags.contains(ButtonFlags::DOWN)
    }

    pub fn flags(&self) -> ButtonFlags {
        self.flags
    }

    /// Sources currently holding the button.
    pub fn holders(&self) -> impl Iterator<Item = SourceId> + '_ {
        self.held.iter().flatten().copied()
    }

    pub fn press(&mut self, source: SourceId, timestamp: Option<u32>, now: u32) -> PressOutcome {
        if self.held.contains(&Some(source)) {
            return PressOutcome::Repeat;
        }

        match self.held.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(source),
            None => {
                warn!(source = source.0, "three sources down for a button");
                return PressOutcome::Rejected;
            }
        }

        if self.is_down() {
            return PressOutcome::AlreadyDown;
        }

        self.press_time = timestamp.unwrap_or_else(|| now.wrapping_sub(DEFAULT_PRESS_LEAD_MS));
        self.flags |= ButtonFlags::DOWN | ButtonFlags::PRESSED;
        PressOutcome::Pressed
    }

    /// Releases `source`, or every source when `None`.
    pub fn release(&mut self, source: Option<SourceId>, timestamp: Option<u32>) -> ReleaseOutcome {
        let Some(source) = source else {
            // Typed at the console, assume it is for unsticking.
            self.held = [None; 2];
            self.flags = ButtonFlags::RELEASED;
            return ReleaseOutcome::Forced;
        };

        match self.held.iter_mut().find(|slot| **slot == Some(source)) {
            Some(slot) => *slot = None,
            None => {
                debug!(source = source.0, "release without matching press");
                return ReleaseOutcome::Unmatched;
            }
        }

        if self.held.iter().any(Option::is_some) {
            return ReleaseOutcome::StillHeld;
        }
        if !self.is_down() {
            return ReleaseOutcome::Unmatched;
        }

        let held = match timestamp {
            Some(t) => t.wrapping_sub(self.press_time) as i32,
            None => DEFAULT_RELEASE_MS,
        };
        // Timestamps come from console arguments and can be anything.
        self.accumulated_ms = self.accumulated_ms.saturating_add(held);
        self.flags.remove(ButtonFlags::DOWN);
        self.flags.insert(ButtonFlags::RELEASED);
        ReleaseOutcome::Released
    }

    /// Fraction of the frame the button was down, in `[0, 1]`.
    ///
    /// Clears the edge flags and resets the accumulator, so every call
    /// reports only time not reported before.
    pub fn sample_fraction(&mut self, now: u32, frame_ms: u32) -> f32 {
        self.flags &= ButtonFlags::DOWN;

        let mut msec = std::mem::take(&mut self.accumulated_ms);
        if self.is_down() {
            msec = msec.saturating_add(now.wrapping_sub(self.press_time) as i32);
            self.press_time = now;
        }

        (msec as f32 / frame_ms.max(1) as f32).clamp(0.0, 1.0)
    }

    /// Whether the button counts as held for this command's button bits;
    /// consumes the release edge.
    pub fn take_active(&mut self) -> bool {
        let active = self.flags.intersects(ButtonFlags::DOWN | ButtonFlags::RELEASED);
        self.flags.remove(ButtonFlags::RELEASED);
        active
    }
}

/// One `ButtonState` per `Action`.
#[derive(Debug, Clone, Default)]
pub struct ButtonTable {
    buttons: [ButtonState; Action::COUNT],
}

impl ButtonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, action: Action) -> &ButtonState {
        &self.buttons[action as usize]
    }

    pub fn get_mut(&mut self, action: Action) -> &mut ButtonState {
        &mut self.buttons[action as usize]
    }

    pub fn is_down(&self, action: Action) -> bool {
        self.get(action).is_down()
    }

    pub fn sample(&mut self, action: Action, now: u32, frame_ms: u32) -> f32 {
        self.get_mut(action).sample_fraction(now, frame_ms)
    }

    /// Applies a parsed button command with its `<source> <timestamp>`
    /// arguments.
    pub fn apply(&mut self, command: ButtonCommand, args: &[&str], now: u32) {
        let (source, timestamp) = parse_button_args(args);
        match command {
            ButtonCommand::Press(action) => {
                let outcome = self
                    .get_mut(action)
                    .press(source.unwrap_or(SourceId::CONSOLE), timestamp, now);
                debug!(action = action.command_name(), ?outcome, "button press");
            }
            ButtonCommand::Release(action) => {
                let outcome = self.get_mut(action).release(source, timestamp);
                debug!(action = action.command_name(), ?outcome, "button release");
            }
            ButtonCommand::ToggleDown => {
                let button = self.get_mut(Action::Down);
                let source = source.unwrap_or(SourceId::CONSOLE);
                if button.is_down() {
                    // Whoever pressed last time is let go of, so the toggle
                    // works no matter which key triggers it.
                    for holder in [button.held[0], button.held[1]].into_iter().flatten() {
                        button.release(Some(holder), timestamp);
                    }
                } else {
                    button.press(source, timestamp, now);
                }
            }
            ButtonCommand::ToggleDownRelease => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: SourceId = SourceId(87);
    const B: SourceId = SourceId(200);
    const C: SourceId = SourceId(13);

    #[test]
    fn huge_spans_in_one_frame_saturate() {
        let mut table = ButtonTable::new();
        for _ in 0..2 {
            table.apply(ButtonCommand::Press(Action::Forward), &["5", "1"], 0);
            table.apply(ButtonCommand::Release(Action::Forward), &["5", "2000000001"], 0);
        }
        assert_eq!(table.sample(Action::Forward, 16, 16), 1.0);

        // Held across the same span while sampling.
        table.apply(ButtonCommand::Press(Action::Forward), &["5", "1"], 0);
        table.apply(ButtonCommand::Release(Action::Forward), &["5", "2000000001"], 0);
        table.apply(ButtonCommand::Press(Action::Forward), &["5", "2000000001"], 0);
        assert_eq!(table.sample(Action::Forward, 4_000_000_001, 16), 1.0);
        assert_eq!(table.sample(Action::Forward, 4_000_000_017, 16), 1.0);
    }

    #[test]
    fn stays_down_until_both_sources_release() {
        for release_order in [[A, B], [B, A]] {
            let mut b = ButtonState::default();
            assert_eq!(b.press(A, Some(1000), 1000), PressOutcome::Pressed);
            assert_eq!(b.press(B, Some(1010), 1010), PressOutcome::AlreadyDown);

            assert_eq!(b.release(Some(release_order[0]), Some(1050)), ReleaseOutcome::StillHeld);
            assert!(b.is_down());
            assert_eq!(b.release(Some(release_order[1]), Some(1100)), ReleaseOutcome::Released);
            assert!(!b.is_down());
            assert_eq!(b.holders().count(), 0);
        }
    }

    #[test]
    fn third_source_is_rejected() {
        let mut b = ButtonState::default();
        b.press(A, Some(5), 5);
        b.press(B, Some(6), 6);
        assert_eq!(b.press(C, Some(7), 7), PressOutcome::Rejected);
        assert_eq!(b.holders().collect::<Vec<_>>(), vec![A, B]);
        assert!(b.is_down());

        // The rejected source never registered, so its release is ignored.
        assert_eq!(b.release(Some(C), Some(8)), ReleaseOutcome::Unmatched);
        assert!(b.is_down());
    }

    #[test]
    fn repeat_press_does_not_reraise_edge() {
        let mut b = ButtonState::default();
        b.press(A, Some(100), 100);
        b.sample_fraction(116, 16);
        assert_eq!(b.press(A, Some(120), 120), PressOutcome::Repeat);
        assert_eq!(b.flags(), ButtonFlags::DOWN);
    }

    #[test]
    fn press_without_timestamp_backdates() {
        let mut b = ButtonState::default();
        b.press(A, None, 1000);
        // 100ms lead clamps to the whole frame.
        assert_eq!(b.sample_fraction(1000, 50), 1.0);
    }

    #[test]
    fn release_without_timestamp_credits_default() {
        let mut b = ButtonState::default();
        b.press(A, Some(1000), 1000);
        b.release(Some(A), None);
        assert_eq!(b.sample_fraction(1020, 20), 0.5);
    }

    #[test]
    fn unmatched_release_is_a_noop() {
        let mut b = ButtonState::default();
        assert_eq!(b.release(Some(A), Some(10)), ReleaseOutcome::Unmatched);
        assert_eq!(b, ButtonState::default());
    }

    #[test]
    fn console_release_unsticks_everything() {
        let mut b = ButtonState::default();
        b.press(A, Some(10), 10);
        b.press(B, Some(11), 11);
        assert_eq!(b.release(None, None), ReleaseOutcome::Forced);
        assert!(!b.is_down());
        assert_eq!(b.flags(), ButtonFlags::RELEASED);
        assert_eq!(b.holders().count(), 0);
    }

    #[test]
    fn sampled_fractions_sum_to_held_time() {
        let mut b = ButtonState::default();
        let frame = 16;
        let mut now = 1000;
        b.press(A, Some(1005), 1005);

        let mut held_ms = 0.0;
        for _ in 0..10 {
            now += frame;
            held_ms += b.sample_fraction(now, frame) * frame as f32;
        }
        b.release(Some(A), Some(now + 7));
        now += frame;
        held_ms += b.sample_fraction(now, frame) * frame as f32;
        now += frame;
        held_ms += b.sample_fraction(now, frame) * frame as f32;

        // Held from 1005 to 1167.
        assert!((held_ms - 162.0).abs() < 1e-3, "held {held_ms}");
    }

    #[test]
    fn edges_are_cleared_by_sampling() {
        let mut b = ButtonState::default();
        b.press(A, Some(10), 10);
        assert!(b.flags().contains(ButtonFlags::PRESSED));
        b.sample_fraction(20, 10);
        assert_eq!(b.flags(), ButtonFlags::DOWN);
        b.release(Some(A), Some(25));
        assert!(b.flags().contains(ButtonFlags::RELEASED));
        assert_eq!(b.sample_fraction(30, 10), 0.5);
        assert_eq!(b.flags(), ButtonFlags::empty());
    }

    #[test]
    fn tap_within_one_tick_is_active_once() {
        let mut b = ButtonState::default();
        b.press(A, Some(10), 10);
        b.release(Some(A), Some(12));
        assert!(b.take_active());
        assert!(!b.take_active());
    }

    #[test]
    fn parses_button_commands() {
        assert_eq!(ButtonCommand::parse("+forward"), Some(ButtonCommand::Press(Action::Forward)));
        assert_eq!(ButtonCommand::parse("-mlook"), Some(ButtonCommand::Release(Action::MouseLook)));
        assert_eq!(ButtonCommand::parse("+moveup"), Some(ButtonCommand::Press(Action::Up)));
        assert_eq!(ButtonCommand::parse("+toggledown"), Some(ButtonCommand::ToggleDown));
        assert_eq!(ButtonCommand::parse("+jump"), None);
        assert_eq!(ButtonCommand::parse("forward"), None);
    }

    #[test]
    fn button_args_treat_zero_time_as_absent() {
        assert_eq!(parse_button_args(&["87", "0"]), (Some(A), None));
        assert_eq!(parse_button_args(&["87", "1234"]), (Some(A), Some(1234)));
        assert_eq!(parse_button_args(&[]), (None, None));
    }

    #[test]
    fn toggle_down_flips_crouch() {
        let mut table = ButtonTable::new();
        table.apply(ButtonCommand::ToggleDown, &["46", "100"], 100);
        assert!(table.is_down(Action::Down));
        table.apply(ButtonCommand::ToggleDownRelease, &["46", "150"], 150);
        assert!(table.is_down(Action::Down));
        table.apply(ButtonCommand::ToggleDown, &["46", "300"], 300);
        assert!(!table.is_down(Action::Down));
    }
}
