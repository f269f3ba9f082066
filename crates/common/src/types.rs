use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque identifier for a source or destination channel.
///
/// Stable for the process lifetime and unique within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelRef(pub u64);

impl fmt::Display for ChannelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque identifier for a message.
///
/// Unique per channel-message pair; the platform guarantees ids from
/// different channels never collide, so this is usable as a join key on
/// its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageIdent(pub u64);

impl fmt::Display for MessageIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One concrete posted message (an original or a relayed copy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub channel: ChannelRef,
    pub id: MessageIdent,
}

impl MessageRef {
    #[must_use]
    pub fn new(channel: ChannelRef, id: MessageIdent) -> Self {
        Self { channel, id }
    }
}

/// Addressable target capable of posting into one specific channel.
///
/// Wraps the destination channel identity plus the webhook credentials the
/// delivery transport needs. The webhook token is excluded from `Debug`
/// output.
#[derive(Clone)]
pub struct Endpoint {
    pub channel: ChannelRef,
    pub guild: u64,
    pub webhook_id: u64,
    pub webhook_token: String,
}

impl Endpoint {
    /// Link to a concrete message in this endpoint's channel, rendered the
    /// way the platform expects (guild/channel/message).
    #[must_use]
    pub fn message_url(&self, id: MessageIdent) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.guild, self.channel, id
        )
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("channel", &self.channel)
            .field("guild", &self.guild)
            .field("webhook_id", &self.webhook_id)
            .finish_non_exhaustive()
    }
}

/// Message author as seen by the gateway.
#[derive(Debug, Clone)]
pub struct Author {
    pub name: String,
    pub avatar_url: Option<String>,
    pub is_bot: bool,
}

/// A relayed attachment, re-uploaded by URL at delivery time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub url: String,
}

/// The message a new inbound message replies to, when the platform
/// delivered one. The quoted author's name is carried for header synthesis
/// and may be absent when the platform did not hydrate the reference.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    pub message: MessageRef,
    pub author_name: Option<String>,
}

/// Inbound "new message" event.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub message: MessageRef,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub reply_target: Option<ReplyTarget>,
}

/// Inbound edit event.
#[derive(Debug, Clone)]
pub struct EditEvent {
    pub message: MessageRef,
    pub author_is_bot: bool,
    pub content: String,
    pub attachments: Vec<Attachment>,
}

/// Inbound delete event.
///
/// The bot flag reflects the last known author of the deleted message; the
/// wire event itself carries no author, so the gateway fills this from its
/// cache when it can.
#[derive(Debug, Clone)]
pub struct DeleteEvent {
    pub message: MessageRef,
    pub author_is_bot: bool,
}

/// Payload handed to the delivery transport for one outbound copy.
///
/// The relay impersonates the original author through the webhook display
/// name and avatar.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub content: String,
    pub attachments: Vec<Attachment>,
    pub username: String,
    pub avatar_url: Option<String>,
}
