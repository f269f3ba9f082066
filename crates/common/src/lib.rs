//! Shared identity types, message payloads, and error definitions used
//! across all portalbot crates.

pub mod error;
pub mod types;

pub use {
    error::{DeliveryError, ResolveError},
    types::{
        Attachment, Author, ChannelRef, DeleteEvent, EditEvent, Endpoint, MessageEvent,
        MessageIdent, MessageRef, OutboundMessage, ReplyTarget,
    },
};
