//! Announcement rendering.
//!
//! ```text
//! ## 🔔 {title}
//! {description}
//! __**Når?**__ {dd.mm.yyyy | kl. HH:MM}
//! __**Hvor?**__ {location}
//! __**Påmelding:**__ {url}
//! ```

use sam_sdk::objects::discord::{
    AllowedMentions, CreateMessage, Embed, EmbedMedia, MAX_CONTENT_CHARS,
};
use time::macros::format_description;
use time::OffsetDateTime;

use crate::config::DisplayConfig;
use crate::listing::{ChangeKind, Event};

const UNKNOWN_TIME: &str = "Ikke oppgitt";
const ELLIPSIS: char = '…';

/// Render the chat message announcing `event`.
///
/// The description is shortened when the whole message would exceed the
/// Discord content limit. Mentions in the text never notify anyone.
pub fn render_message(event: &Event, kind: &ChangeKind, display: &DisplayConfig) -> CreateMessage {
    let heading = if kind.is_update() {
        format!("## 🔔 (Oppdatert) {}\n", event.title)
    } else {
        format!("## 🔔 {}\n", event.title)
    };
    let when = event
        .start
        .map(|start| format_start(start, display))
        .unwrap_or_else(|| UNKNOWN_TIME.to_string());
    let footer = format!(
        "__**Når?**__ {when}\n__**Hvor?**__ {}\n__**Påmelding:**__ {}\n",
        event.location, event.url
    );

    let fixed = heading.chars().count() + footer.chars().count() + 1;
    let budget = MAX_CONTENT_CHARS.saturating_sub(fixed);
    let description = shorten(&event.description, budget);

    let mut content = format!("{heading}{description}\n{footer}");
    if content.chars().count() > MAX_CONTENT_CHARS {
        // Title or location alone blow the limit.
        content = shorten(&content, MAX_CONTENT_CHARS);
    }

    let embeds = event
        .image
        .iter()
        .filter(|url| !url.trim().is_empty())
        .map(|url| Embed {
            url: Some(event.url.clone()),
            image: Some(EmbedMedia { url: url.clone() }),
        })
        .collect();

    CreateMessage {
        content,
        embeds,
        allowed_mentions: AllowedMentions::none(),
        ..Default::default()
    }
}

/// `16.10.2025 | kl. 18:15`, in the display zone's offset at `start`.
pub fn format_start(start: OffsetDateTime, display: &DisplayConfig) -> String {
    let format = format_description!("[day].[month].[year] | kl. [hour]:[minute]");
    start
        .to_offset(display.offset_at(start))
        .format(format)
        .unwrap_or_else(|_| UNKNOWN_TIME.to_string())
}

fn shorten(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    if max_chars == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(max_chars - 1).collect();
    out.push(ELLIPSIS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Tz;
    use time::macros::datetime;

    fn oslo() -> DisplayConfig {
        DisplayConfig::new(Tz::Europe__Oslo)
    }

    fn event() -> Event {
        Event {
            id: "hackathon".to_string(),
            title: "Hackathon".to_string(),
            description: "24 timer med koding".to_string(),
            start: Some(datetime!(2025-10-16 16:15 UTC)),
            end: None,
            location: "Ole-Johan Dahls hus".to_string(),
            image: None,
            url: "https://peoply.app/events/hackathon".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn test_render_new_event() {
        let msg = render_message(&event(), &ChangeKind::New, &oslo());
        assert_eq!(
            msg.content,
            "## 🔔 Hackathon\n24 timer med koding\n__**Når?**__ 16.10.2025 | kl. 18:15\n\
             __**Hvor?**__ Ole-Johan Dahls hus\n__**Påmelding:**__ https://peoply.app/events/hackathon\n"
        );
        assert!(msg.embeds.is_empty());
    }

    #[test]
    fn test_render_updated_event_with_image() {
        let mut e = event();
        e.image = Some("https://cdn.peoply.app/hackathon.png".to_string());
        let kind = ChangeKind::Updated {
            previous_message: Some("1".to_string()),
        };
        let msg = render_message(&e, &kind, &DisplayConfig::default());
        assert!(msg.content.starts_with("## 🔔 (Oppdatert) Hackathon\n"));
        assert!(msg.content.contains("16.10.2025 | kl. 16:15"));
        assert_eq!(msg.embeds.len(), 1);
        assert_eq!(
            msg.embeds[0].image.as_ref().map(|i| i.url.as_str()),
            Some("https://cdn.peoply.app/hackathon.png")
        );
    }

    #[test]
    fn test_start_time_follows_summer_and_winter_time() {
        assert_eq!(
            format_start(datetime!(2025-10-16 16:15 UTC), &oslo()),
            "16.10.2025 | kl. 18:15"
        );
        assert_eq!(
            format_start(datetime!(2025-11-16 16:15 UTC), &oslo()),
            "16.11.2025 | kl. 17:15"
        );
    }

    #[test]
    fn test_render_never_allows_mentions() {
        let mut e = event();
        e.title = "@everyone gratis pizza".to_string();
        e.description = "<@&123>".to_string();
        let msg = render_message(&e, &ChangeKind::New, &oslo());
        assert!(msg.content.starts_with("## 🔔 @everyone gratis pizza\n<@&123>\n"));
        assert!(msg.allowed_mentions.parse.is_empty());
        assert!(msg.nonce.is_none());
    }

    #[test]
    fn test_render_without_start_time() {
        let mut e = event();
        e.start = None;
        let msg = render_message(&e, &ChangeKind::New, &DisplayConfig::default());
        assert!(msg.content.contains("__**Når?**__ Ikke oppgitt\n"));
    }

    #[test]
    fn test_render_long_description_fits_limit() {
        let mut e = event();
        e.description = "æ".repeat(5000);
        let msg = render_message(&e, &ChangeKind::New, &DisplayConfig::default());
        assert_eq!(msg.content.chars().count(), MAX_CONTENT_CHARS);
        assert!(msg.content.ends_with("__**Påmelding:**__ https://peoply.app/events/hackathon\n"));
        assert!(msg.content.contains('…'));
    }
}
