//! Configuration system.
//!
//! Loads client configuration from JSON strings/files. Movement tuning here
//! only seeds the console variables; the tick pipeline reads the cvars.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// Root client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Server address, e.g. `127.0.0.1:40000`.
    pub server_addr: String,
    /// Client tick rate.
    pub tick_hz: u32,
    /// Player name, sent as userinfo.
    #[serde(default = "default_player_name")]
    pub player_name: String,
    /// Initial movement tuning.
    #[serde(default)]
    pub movement: MoveTuning,
}

/// Initial values for the movement cvars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MoveTuning {
    pub forward_speed: f32,
    pub side_speed: f32,
    pub up_speed: f32,
    /// Keyboard turn rate, degrees per second.
    pub yaw_speed: f32,
    /// Keyboard look rate, degrees per second.
    pub pitch_speed: f32,
    /// Turn rate multiplier while the speed key is held.
    pub angle_speed_key: f32,
    /// Always run; the speed key then walks.
    pub run: bool,
    /// Ask the server for uncompressed frames.
    pub no_delta: bool,
    pub sensitivity: f32,
    pub m_yaw: f32,
    pub m_pitch: f32,
    pub m_forward: f32,
    pub m_side: f32,
    /// Mouse always looks up/down.
    pub freelook: bool,
    /// Mouse strafes instead of turning while looking.
    pub lookstrafe: bool,
}

impl Default for MoveTuning {
    fn default() -> Self {
        Self {
            forward_speed: 200.0,
            side_speed: 200.0,
            up_speed: 200.0,
            yaw_speed: 140.0,
            pitch_speed: 150.0,
            angle_speed_key: 1.5,
            run: false,
            no_delta: false,
            sensitivity: 3.0,
            m_yaw: 0.022,
            m_pitch: 0.022,
            m_forward: 1.0,
            m_side: 1.0,
            freelook: true,
            lookstrafe: false,
        }
    }
}

fn default_player_name() -> String {
    "Player".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:40000".to_string(),
            tick_hz: 64,
            player_name: default_player_name(),
            movement: MoveTuning::default(),
        }
    }
}

impl EngineConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Reads and parses a JSON config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        Self::from_json_str(&text).with_context(|| format!("parse config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_movement_block_keeps_defaults() {
        let cfg = EngineConfig::from_json_str(
            r#"{ "server_addr": "10.0.0.1:27910", "tick_hz": 30,
                 "movement": { "run": true, "forward_speed": 300 } }"#,
        )
        .unwrap();
        assert_eq!(cfg.tick_hz, 30);
        assert_eq!(cfg.player_name, "Player");
        assert!(cfg.movement.run);
        assert_eq!(cfg.movement.forward_speed, 300.0);
        assert_eq!(cfg.movement.side_speed, 200.0);
        assert_eq!(cfg.movement.angle_speed_key, 1.5);
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("engine_shared_{}_{}", std::process::id(), name))
    }

    #[test]
    fn load_reads_file() -> anyhow::Result<()> {
        let path = temp_path("client.json");
        std::fs::write(
            &path,
            r#"{ "server_addr": "127.0.0.1:27910", "tick_hz": 20, "player_name": "Scout" }"#,
        )?;
        let cfg = EngineConfig::load(&path);
        std::fs::remove_file(&path)?;

        let cfg = cfg?;
        assert_eq!(cfg.server_addr, "127.0.0.1:27910");
        assert_eq!(cfg.tick_hz, 20);
        assert_eq!(cfg.player_name, "Scout");
        assert_eq!(cfg.movement, MoveTuning::default());
        Ok(())
    }

    #[test]
    fn load_reports_missing_and_malformed_files() -> anyhow::Result<()> {
        let missing = temp_path("missing.json");
        let err = EngineConfig::load(&missing).unwrap_err();
        assert!(format!("{err:#}").contains("read config"));
        assert!(format!("{err:#}").contains("missing.json"));

        let bad = temp_path("bad.json");
        std::fs::write(&bad, "{ not json")?;
        let err = EngineConfig::load(&bad).unwrap_err();
        std::fs::remove_file(&bad)?;
        assert!(format!("{err:#}").contains("parse config"));
        Ok(())
    }
}
