//! Processors driving the announcer.
//!
//! - `TickScheduler`: emits `PollTick` on a fixed interval
//! - `PollDiffLoop`: receives `PollTick`, runs fetch → diff → notify → persist
//! - `EventSource` / `PeoplyEventSource`: fetches the listing
//! - `Notifier` / `DiscordNotifier`: announces events

pub mod event_source;
pub mod notifier;
pub mod poll_loop;
pub mod tick_scheduler;

pub use event_source::{EventSource, PeoplyEventSource, SourceError};
pub use notifier::{DeliveryError, DiscordNotifier, Notifier};
pub use poll_loop::{PollDiffLoop, TickError, TickReport};
pub use tick_scheduler::TickScheduler;
