//! Console system.
//!
//! Provides:
//! - Console variables (cvars) with typed values, read fresh every tick
//! - Command registration and execution
//! - Input parsing
//!
//! # Usage
//! ```ignore
//! let mut console = Console::new();
//! console.register_cvar("cl_forwardspeed", CvarValue::Float(200.0), "Forward speed", CvarFlags::ARCHIVE);
//! console.exec("cl_forwardspeed 400")?;
//! assert_eq!(console.cvar_f32("cl_forwardspeed"), 400.0);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, bail, Context};

/// Console variable value.
#[derive(Debug, Clone, PartialEq)]
pub enum CvarValue {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
}

impl CvarValue {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            CvarValue::Float(v) => Some(*v),
            CvarValue::Int(v) => Some(*v as f64),
            CvarValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
            CvarValue::String(s) => s.parse().ok(),
        }
    }

    pub fn as_bool(&self) -> bool {
        match self {
            CvarValue::Bool(v) => *v,
            CvarValue::Int(v) => *v != 0,
            CvarValue::Float(v) => *v != 0.0,
            CvarValue::String(s) => !s.is_empty() && s != "0" && s.to_lowercase() != "false",
        }
    }

    pub fn as_string(&self) -> String {
        match self {
            CvarValue::String(s) => s.clone(),
            CvarValue::Int(v) => v.to_string(),
            CvarValue::Float(v) => v.to_string(),
            CvarValue::Bool(v) => v.to_string(),
        }
    }

    /// Parses console input: int, then float, then bool, then string.
    pub fn parse(text: &str) -> Self {
        if let Ok(v) = text.parse::<i64>() {
            CvarValue::Int(v)
        } else if let Ok(v) = text.parse::<f64>() {
            CvarValue::Float(v)
        } else if text == "true" {
            CvarValue::Bool(true)
        } else if text == "false" {
            CvarValue::Bool(false)
        } else {
            CvarValue::String(text.trim_matches('"').to_string())
        }
    }
}

impl std::fmt::Display for CvarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CvarValue::Int(v) => write!(f, "{}", v),
            CvarValue::Float(v) => write!(f, "{}", v),
            CvarValue::String(v) => write!(f, "\"{}\"", v),
            CvarValue::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// Console variable metadata.
#[derive(Debug, Clone)]
pub struct Cvar {
    pub name: String,
    pub value: CvarValue,
    pub default: CvarValue,
    pub description: String,
    pub flags: CvarFlags,
    /// Set on every write, cleared by [`Console::take_modified`].
    pub modified: bool,
}

bitflags::bitflags! {
    /// Cvar flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CvarFlags: u32 {
        const NONE = 0;
        const ARCHIVE = 1 << 0;      // Saved to config
        const USERINFO = 1 << 1;     // Sent to the server on change
    }
}

impl Default for CvarFlags {
    fn default() -> Self {
        Self::NONE
    }
}

/// Command handler function type.
pub type CommandHandler = Box<dyn Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync>;

type CvarMap = Arc<RwLock<HashMap<String, Cvar>>>;

/// Context passed to command handlers.
pub struct ConsoleContext {
    /// Output buffer for command responses.
    pub output: Vec<String>,
    /// Reference to cvars (for commands that need to read/write them).
    pub cvars: CvarMap,
}

impl ConsoleContext {
    pub fn print(&mut self, msg: impl Into<String>) {
        self.output.push(msg.into());
    }

    pub fn get_cvar(&self, name: &str) -> Option<CvarValue> {
        self.cvars.read().ok()?.get(name).map(|c| c.value.clone())
    }

    pub fn set_cvar(&self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        write_cvar(&self.cvars, name, value)
    }
}

fn write_cvar(cvars: &CvarMap, name: &str, value: CvarValue) -> anyhow::Result<()> {
    let mut cvars = cvars.write().map_err(|_| anyhow!("cvar lock poisoned"))?;
    match cvars.get_mut(name) {
        Some(cvar) => {
            cvar.value = value;
            cvar.modified = true;
            Ok(())
        }
        None => bail!("unknown cvar: {}", name),
    }
}

/// The console.
pub struct Console {
    cvars: CvarMap,
    commands: HashMap<String, CommandHandler>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        let mut console = Self {
            cvars: Arc::new(RwLock::new(HashMap::new())),
            commands: HashMap::new(),
        };

        console.register_builtin_commands();
        console
    }

    fn register_builtin_commands(&mut self) {
        // echo <text>
        self.register_command("echo", |args, ctx| {
            ctx.print(args.join(" "));
            Ok(())
        });

        // cvarlist
        self.register_command("cvarlist", |_args, ctx| {
            let mut lines: Vec<String> = {
                let cvars = ctx.cvars.read().map_err(|_| anyhow!("cvar lock poisoned"))?;
                cvars
                    .values()
                    .map(|cvar| {
                        format!("  {} = {} (default: {}) {}", cvar.name, cvar.value, cvar.default, cvar.description)
                    })
                    .collect()
            };
            lines.sort();
            for line in lines {
                ctx.print(line);
            }
            Ok(())
        });

        // set <cvar> <value>
        self.register_command("set", |args, ctx| {
            if args.len() < 2 {
                bail!("usage: set <cvar> <value>");
            }
            let name = args[0];
            let value = CvarValue::parse(&args[1..].join(" "));
            let shown = value.to_string();
            ctx.set_cvar(name, value)?;
            ctx.print(format!("{} = {}", name, shown));
            Ok(())
        });

        // reset <cvar>
        self.register_command("reset", |args, ctx| {
            let Some(name) = args.first() else {
                bail!("usage: reset <cvar>");
            };
            let default = {
                let cvars = ctx.cvars.read().map_err(|_| anyhow!("cvar lock poisoned"))?;
                cvars.get(*name).map(|c| c.default.clone())
            };
            match default {
                Some(default) => ctx.set_cvar(name, default),
                None => bail!("unknown cvar: {}", name),
            }
        });
    }

    /// Registers a console variable. Re-registering keeps the current value.
    pub fn register_cvar(&mut self, name: &str, default: CvarValue, description: &str, flags: CvarFlags) {
        let Ok(mut cvars) = self.cvars.write() else {
            return;
        };
        cvars
            .entry(name.to_string())
            .and_modify(|cvar| {
                cvar.default = default.clone();
                cvar.flags |= flags;
            })
            .or_insert_with(|| Cvar {
                name: name.to_string(),
                value: default.clone(),
                default: default.clone(),
                description: description.to_string(),
                flags,
                modified: false,
            });
    }

    /// Registers a command.
    pub fn register_command<F>(&mut self, name: &str, handler: F)
    where
        F: Fn(&[&str], &mut ConsoleContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.commands.insert(name.to_string(), Box::new(handler));
    }

    /// Executes a console command line.
    pub fn exec(&mut self, line: &str) -> anyhow::Result<Vec<String>> {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            return Ok(Vec::new());
        }

        let tokens = parse_command_line(line);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }

        let cmd_name = &tokens[0];
        let args: Vec<&str> = tokens[1..].iter().map(|s| s.as_str()).collect();

        let mut ctx = ConsoleContext {
            output: Vec::new(),
            cvars: Arc::clone(&self.cvars),
        };

        if let Some(handler) = self.commands.get(cmd_name.as_str()) {
            handler(&args, &mut ctx).with_context(|| format!("command '{}'", cmd_name))?;
            return Ok(ctx.output);
        }

        // Bare cvar name queries it, name plus value sets it.
        let current = self
            .cvars
            .read()
            .ok()
            .and_then(|cvars| cvars.get(cmd_name.as_str()).map(|c| (c.value.clone(), c.default.clone())));
        match current {
            Some((value, default)) if args.is_empty() => {
                ctx.print(format!("{} = {} (default: {})", cmd_name, value, default));
            }
            Some(_) => {
                ctx.set_cvar(cmd_name, CvarValue::parse(&args.join(" ")))?;
            }
            None => ctx.print(format!("Unknown command: {}", cmd_name)),
        }

        Ok(ctx.output)
    }

    /// Gets a cvar value.
    pub fn get_cvar(&self, name: &str) -> Option<CvarValue> {
        self.cvars.read().ok()?.get(name).map(|c| c.value.clone())
    }

    /// Reads a numeric cvar; unknown or non-numeric reads as 0.
    pub fn cvar_f32(&self, name: &str) -> f32 {
        self.get_cvar(name).and_then(|v| v.as_float()).unwrap_or(0.0) as f32
    }

    /// Reads a boolean cvar; unknown reads as false.
    pub fn cvar_bool(&self, name: &str) -> bool {
        self.get_cvar(name).is_some_and(|v| v.as_bool())
    }

    /// Sets a cvar value.
    pub fn set_cvar(&self, name: &str, value: CvarValue) -> anyhow::Result<()> {
        write_cvar(&self.cvars, name, value)
    }

    /// Clears the modified mark on every cvar carrying `flags` and reports
    /// whether any of them had been written.
    pub fn take_modified(&self, flags: CvarFlags) -> bool {
        let Ok(mut cvars) = self.cvars.write() else {
            return false;
        };
        let mut any = false;
        for cvar in cvars.values_mut().filter(|c| c.flags.intersects(flags)) {
            any |= std::mem::take(&mut cvar.modified);
        }
        any
    }

    /// Builds a `\key\value` string from every cvar carrying `flags`,
    /// sorted by name.
    pub fn info_string(&self, flags: CvarFlags) -> String {
        let Ok(cvars) = self.cvars.read() else {
            return String::new();
        };
        let mut pairs: Vec<(&str, String)> = cvars
            .values()
            .filter(|c| c.flags.intersects(flags))
            .map(|c| (c.name.as_str(), c.value.as_string()))
            .collect();
        pairs.sort();
        pairs
            .into_iter()
            .map(|(k, v)| format!("\\{}\\{}", k, v))
            .collect()
    }
}

/// Parses a command line into tokens, respecting quotes.
pub fn parse_command_line(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            ' ' | '\t' if !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            _ => {
                current.push(c);
            }
        }
    }

    if !current.is_empty() {
        tokens.push(current);
    }

    tokens
}
