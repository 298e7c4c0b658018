//! Key bindings.
//!
//! Maps physical keys to console commands. Button commands (`+forward`)
//! get the key number and event time appended, and a matching `-forward`
//! is generated when the key goes up.

use std::collections::{HashMap, HashSet};

/// Key code as delivered by the platform layer.
pub type KeyCode = u32;

#[derive(Debug, Default)]
pub struct KeyBindings {
    binds: HashMap<KeyCode, String>,
    down: HashSet<KeyCode>,
}

impl KeyBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, key: KeyCode, command: impl Into<String>) {
        self.binds.insert(key, command.into());
    }

    pub fn unbind(&mut self, key: KeyCode) -> Option<String> {
        self.binds.remove(&key)
    }

    pub fn binding(&self, key: KeyCode) -> Option<&str> {
        self.binds.get(&key).map(String::as_str)
    }

    /// Bindings sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (KeyCode, &str)> {
        let mut all: Vec<_> = self.binds.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.sort_by_key(|(k, _)| *k);
        all.into_iter()
    }

    /// Whether any key at all is held.
    pub fn any_key_down(&self) -> bool {
        !self.down.is_empty()
    }

    /// Records a key transition and returns the console line it triggers.
    pub fn key_event(&mut self, key: KeyCode, down: bool, time: u32) -> Option<String> {
        let was_down = if down {
            !self.down.insert(key)
        } else {
            self.down.remove(&key)
        };

        let command = self.binds.get(&key)?;
        match (command.strip_prefix('+'), down) {
            (Some(_), true) if was_down => None, // auto-repeat
            (Some(_), true) => Some(format!("{command} {key} {time}")),
            // Releases are sent even without a recorded press so a key that
            // went down before focus changed cannot stick.
            (Some(name), false) => Some(format!("-{name} {key} {time}")),
            (None, true) => Some(command.clone()),
            (None, false) => None,
        }
    }
}
