//! `engine_client`
//!
//! Client-side systems:
//! - Button state tracking and key bindings
//! - Per-tick movement sampling (keyboard + mouse)
//! - Command finishing and the command history ring
//! - Move packet transmission through a `NetChannel`

pub mod bindings;
pub mod client;
pub mod finish;
pub mod history;
pub mod input;
pub mod movement;
pub mod transmit;

pub use client::GameClient;
