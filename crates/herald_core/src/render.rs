//! Message presentation boundary.
//!
//! Rendering chat lines for display is platform work. Herald hands the host a
//! [`ChatMessageEvent`] together with the channel's format template and takes
//! back an opaque [`RenderedMessage`]; it never builds presentation output on
//! its own.

use herald_events::ChatMessageEvent;

/// A fully rendered chat line, ready for the host to deliver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    /// Final display text.
    pub text: String,
}

/// Host-provided rendering of chat events.
pub trait MessageRenderer: Send + Sync {
    /// Renders a chat event against a channel's format template.
    fn render(&self, event: &ChatMessageEvent, template: &str) -> RenderedMessage;
}

/// Plain-text renderer that substitutes `<sender>` and `<message>` in the
/// template. Ships as a working default for tests and the standalone server;
/// real deployments replace it with their platform's text pipeline.
pub struct BasicRenderer;

impl MessageRenderer for BasicRenderer {
    fn render(&self, event: &ChatMessageEvent, template: &str) -> RenderedMessage {
        let text = template
            .replace("<sender>", &event.sender_name)
            .replace("<message>", &event.content);
        RenderedMessage { text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_events::{ChannelName, MessageId, PlayerId};

    #[test]
    fn basic_renderer_substitutes_placeholders() {
        let event = ChatMessageEvent::local(
            MessageId::new(),
            PlayerId::new(),
            "Steve".to_string(),
            ChannelName::from("global"),
            "hello there".to_string(),
        );

        let rendered = BasicRenderer.render(&event, "[G] <sender>: <message>");

        assert_eq!(rendered.text, "[G] Steve: hello there");
    }

    #[test]
    fn unknown_placeholders_pass_through() {
        let event = ChatMessageEvent::local(
            MessageId::new(),
            PlayerId::new(),
            "Alex".to_string(),
            ChannelName::from("staff"),
            "ping".to_string(),
        );

        let rendered = BasicRenderer.render(&event, "<prefix> <sender>: <message>");

        assert_eq!(rendered.text, "<prefix> Alex: ping");
    }
}
