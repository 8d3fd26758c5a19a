pub mod discord;
pub mod peoply;
pub mod status;

pub use discord::{AllowedMentions, CreateMessage, Embed, EmbedMedia, Message};
pub use peoply::{EventsPayload, PeoplyEvent};
pub use status::{ListEventsQuery, LoopState, SeenEventResponse, StatusResponse, TickSummary};
