//! Inbound webhook payloads.
//!
//! Only the fields the router acts on are modelled; anything else in the
//! payload is ignored, and unknown event or message types deserialize to
//! catch-all variants. Events are decoded one at a time, so a malformed
//! event is dropped on its own while the rest of the delivery still runs.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::warn;

/// Body of one webhook delivery.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    /// Bot user id the events were sent to.
    #[serde(default)]
    pub destination: Option<String>,
    /// Raw events in delivery order.
    #[serde(default)]
    pub events: Vec<JsonValue>,
}

impl WebhookPayload {
    /// Decodes every event independently, logging and dropping the ones
    /// that do not fit the event model.
    #[must_use]
    pub fn into_events(self) -> Vec<Event> {
        self.events
            .into_iter()
            .enumerate()
            .filter_map(|(index, raw)| match serde_json::from_value::<Event>(raw) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "skipping undecodable webhook event");
                    None
                }
            })
            .collect()
    }
}

/// A webhook event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Event {
    /// A user sent a message.
    Message {
        reply_token: Option<String>,
        source: Option<Source>,
        message: MessageContent,
    },
    /// A user tapped a postback action.
    Postback {
        reply_token: Option<String>,
        source: Option<Source>,
        postback: Postback,
    },
    /// A user added the bot as a friend.
    Follow {
        reply_token: Option<String>,
        source: Option<Source>,
    },
    /// A user entered the range of a beacon.
    Beacon {
        reply_token: Option<String>,
        source: Option<Source>,
        beacon: Beacon,
    },
    /// Any event type not handled above.
    #[serde(other)]
    Unknown,
}

impl Event {
    /// Short event type name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message { .. } => "message",
            Self::Postback { .. } => "postback",
            Self::Follow { .. } => "follow",
            Self::Beacon { .. } => "beacon",
            Self::Unknown => "unknown",
        }
    }

    /// The sender, when the event carries one.
    #[must_use]
    pub fn source(&self) -> Option<&Source> {
        match self {
            Self::Message { source, .. }
            | Self::Postback { source, .. }
            | Self::Follow { source, .. }
            | Self::Beacon { source, .. } => source.as_ref(),
            Self::Unknown => None,
        }
    }
}

/// Where an event came from.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum Source {
    /// One-to-one chat.
    User { user_id: Option<String> },
    /// Group chat.
    Group {
        group_id: String,
        user_id: Option<String>,
    },
    /// Multi-person chat.
    Room {
        room_id: String,
        user_id: Option<String>,
    },
}

impl Source {
    /// The sending user's id. Group and room events may omit it.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Self::User { user_id } | Self::Group { user_id, .. } | Self::Room { user_id, .. } => {
                user_id.as_deref()
            }
        }
    }
}

/// Content of a message event.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MessageContent {
    /// Plain text.
    Text { id: String, text: String },
    /// A sticker.
    Sticker {
        id: String,
        package_id: String,
        sticker_id: String,
        #[serde(default)]
        keywords: Vec<String>,
        #[serde(default)]
        text: Option<String>,
    },
    /// An image; content must be fetched separately.
    Image { id: String },
    /// A video; content must be fetched separately.
    Video { id: String },
    /// Audio, file, location and anything newer.
    #[serde(other)]
    Other,
}

/// Postback action payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Postback {
    /// Query-string encoded data attached to the action.
    pub data: String,
}

/// Beacon detection payload.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Beacon {
    /// Hardware id of the beacon.
    pub hwid: String,
    /// `enter`, `banner` or `stay`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_text_message_from_group() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "mode": "active",
                "timestamp": 1713340800000_i64,
                "replyToken": "r-1",
                "source": {"type": "group", "groupId": "G1", "userId": "U1"},
                "message": {"type": "text", "id": "m-1", "text": "lunch 50", "quoteToken": "q"}
            }]
        }))
        .unwrap();

        let events = payload.into_events();
        let event = &events[0];
        assert_eq!(event.kind(), "message");
        assert_eq!(event.source().and_then(Source::user_id), Some("U1"));
        let Event::Message {
            reply_token,
            message,
            ..
        } = event
        else {
            panic!("expected message event");
        };
        assert_eq!(reply_token.as_deref(), Some("r-1"));
        assert_eq!(
            message,
            &MessageContent::Text {
                id: "m-1".into(),
                text: "lunch 50".into()
            }
        );
    }

    #[test]
    fn parses_sticker_without_keywords() {
        let content: MessageContent = serde_json::from_value(json!({
            "type": "sticker",
            "id": "m-2",
            "packageId": "446",
            "stickerId": "1988",
            "stickerResourceType": "STATIC"
        }))
        .unwrap();

        let MessageContent::Sticker {
            sticker_id,
            keywords,
            text,
            ..
        } = content
        else {
            panic!("expected sticker");
        };
        assert_eq!(sticker_id, "1988");
        assert!(keywords.is_empty());
        assert!(text.is_none());
    }

    #[test]
    fn unknown_types_are_tolerated() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "events": [
                {"type": "unsend", "source": {"type": "user", "userId": "U1"}, "unsend": {"messageId": "m"}},
                {"type": "message", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "location", "id": "m-3", "latitude": 25.0, "longitude": 121.5}}
            ]
        }))
        .unwrap();

        let events = payload.into_events();
        assert_eq!(events[0], Event::Unknown);
        assert!(matches!(
            &events[1],
            Event::Message {
                message: MessageContent::Other,
                ..
            }
        ));
    }

    #[test]
    fn parses_postback_and_beacon() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "events": [
                {"type": "postback", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                 "postback": {"data": "action=calc&m_id=42"}},
                {"type": "beacon", "replyToken": "r", "source": {"type": "user", "userId": "U1"},
                 "beacon": {"hwid": "d41d8cd98f", "type": "enter"}},
                {"type": "follow", "replyToken": "r", "source": {"type": "user", "userId": "U1"}}
            ]
        }))
        .unwrap();

        let kinds: Vec<_> = payload.into_events().iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["postback", "beacon", "follow"]);
    }

    #[test]
    fn malformed_event_does_not_sink_the_batch() {
        let payload: WebhookPayload = serde_json::from_value(json!({
            "events": [
                {"type": "message", "replyToken": "r-1", "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "text", "id": "m-1", "text": "lunch 50"}},
                {"type": "message", "replyToken": "r-2", "source": {"type": "user", "userId": "U1"},
                 "message": {"type": "sticker", "id": "m-2", "packageId": "446"}},
                {"type": "follow", "source": {"type": "user", "userId": "U2"}}
            ]
        }))
        .unwrap();
        assert_eq!(payload.events.len(), 3);

        let kinds: Vec<_> = payload.into_events().iter().map(Event::kind).collect();
        assert_eq!(kinds, vec!["message", "follow"]);
    }

    #[test]
    fn empty_body_has_no_events() {
        let payload: WebhookPayload = serde_json::from_str("{}").unwrap();
        assert!(payload.events.is_empty());
    }
}
