//! `engine_shared`
//!
//! Shared libraries used by the client and by anything that reads what the
//! client sends.
//!
//! Design goals:
//! - Deterministic, byte-exact wire encoding.
//! - Clear separation of concerns (commands, checksums, net, console, config).
//! - Traits at the transport seam so the client can run headless.
//! - No `unsafe`.

pub mod checksum;
pub mod config;
pub mod console;
pub mod math;
pub mod net;
pub mod usercmd;

pub mod prelude {
    //! Commonly used exports.

    pub use crate::config::*;
    pub use crate::math::*;
    pub use crate::net::*;
    pub use crate::usercmd::*;
}
