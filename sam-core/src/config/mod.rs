//! Runtime configuration types for Sam.
//!
//! These are the validated values the core works with. Reading and checking
//! the TOML file and environment happens in the server crate.

mod discord;
mod display;
mod polling;
mod source;

pub use discord::DiscordConfig;
pub use display::{DisplayConfig, Tz};
pub use polling::PollingConfig;
pub use source::SourceConfig;
