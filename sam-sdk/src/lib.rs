//! Shared wire types and clients for Sam the Scraper.
//!
//! The [`objects`] module is always available and only depends on `serde`.
//! The [`client`] module (feature `client`) carries the Peoply HTTP client,
//! the Discord REST client and the Discord gateway connection.

pub mod objects;

#[cfg(feature = "client")]
pub mod client;
