//! Conversion from serenity gateway payloads to engine events.

use serenity::all::{Message, MessageUpdateEvent, User};

use portal_common::{
    Attachment, Author, ChannelRef, EditEvent, MessageEvent, MessageIdent, MessageRef, ReplyTarget,
};

pub(crate) fn message_event(msg: &Message) -> MessageEvent {
    MessageEvent {
        message: MessageRef::new(
            ChannelRef(msg.channel_id.get()),
            MessageIdent(msg.id.get()),
        ),
        author: Author {
            name: display_name(&msg.author),
            avatar_url: msg.author.avatar_url(),
            is_bot: msg.author.bot,
        },
        content: msg.content.to_string(),
        attachments: msg
            .attachments
            .iter()
            .map(|a| Attachment {
                filename: a.filename.to_string(),
                url: a.url.to_string(),
            })
            .collect(),
        reply_target: reply_target(msg),
    }
}

/// A partial update without content carries nothing the relay can
/// propagate (embed refresh, pin change), so it maps to `None`. An update
/// without an author is skipped too: user edits always hydrate the author,
/// and treating an authorless update as human would let the relay's own
/// webhook copies re-enter edit propagation.
pub(crate) fn edit_event(event: &MessageUpdateEvent) -> Option<EditEvent> {
    let content = event.content.as_ref()?;
    let author = event.author.as_ref()?;
    Some(EditEvent {
        message: MessageRef::new(
            ChannelRef(event.channel_id.get()),
            MessageIdent(event.id.get()),
        ),
        author_is_bot: author.bot,
        content: content.to_string(),
        attachments: event
            .attachments
            .iter()
            .flatten()
            .map(|a| Attachment {
                filename: a.filename.to_string(),
                url: a.url.to_string(),
            })
            .collect(),
    })
}

fn reply_target(msg: &Message) -> Option<ReplyTarget> {
    let reference = msg.message_reference.as_ref()?;
    let id = reference.message_id?;
    Some(ReplyTarget {
        message: MessageRef::new(
            ChannelRef(reference.channel_id.get()),
            MessageIdent(id.get()),
        ),
        author_name: msg
            .referenced_message
            .as_ref()
            .map(|quoted| display_name(&quoted.author)),
    })
}

fn display_name(user: &User) -> String {
    match user.global_name.as_deref() {
        Some(name) => name.to_string(),
        None => user.name.to_string(),
    }
}
