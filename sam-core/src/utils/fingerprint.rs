//! Content fingerprints.
//!
//! SHA-256 over the display fields, each one length-prefixed so that moving
//! text between adjacent fields changes the hash. Optional fields carry a
//! presence tag, so `None` and `Some("")` differ.

use ring::digest::{Context, SHA256};
use sam_sdk::objects::discord::MAX_NONCE_CHARS;
use std::fmt::Write;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::listing::{Event, Fingerprint};

pub fn fingerprint_event(event: &Event) -> Fingerprint {
    let mut ctx = Context::new(&SHA256);

    push_field(&mut ctx, &event.title);
    push_field(&mut ctx, &event.description);
    push_optional(&mut ctx, event.start.map(format_instant).as_deref());
    push_optional(&mut ctx, event.end.map(format_instant).as_deref());
    push_field(&mut ctx, &event.location);
    push_optional(&mut ctx, event.image.as_deref());
    push_field(&mut ctx, &event.url);

    Fingerprint::from(to_hex(ctx.finish().as_ref()))
}

/// Nonce tying a chat message to one event at one fingerprint.
///
/// The first 25 hex digits of SHA-256 over the event id and fingerprint, so
/// re-sending the same announcement reuses the nonce and a changed event
/// gets a fresh one.
pub fn delivery_nonce(event_id: &str, fingerprint: &Fingerprint) -> String {
    let mut ctx = Context::new(&SHA256);
    push_field(&mut ctx, event_id);
    push_field(&mut ctx, fingerprint.as_str());
    let mut hex = to_hex(ctx.finish().as_ref());
    hex.truncate(MAX_NONCE_CHARS);
    hex
}

fn to_hex(bytes: &[u8]) -> String {
    let mut hex = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

fn push_field(ctx: &mut Context, value: &str) {
    ctx.update(&(value.len() as u64).to_be_bytes());
    ctx.update(value.as_bytes());
}

fn push_optional(ctx: &mut Context, value: Option<&str>) {
    match value {
        Some(v) => {
            ctx.update(&[1]);
            push_field(ctx, v);
        }
        None => ctx.update(&[0]),
    }
}

/// Instants are hashed in UTC so the same moment in another offset is equal.
fn format_instant(at: OffsetDateTime) -> String {
    at.to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_default()
}
