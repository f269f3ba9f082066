//! Discord collaborators for the portal relay engine.
//!
//! Wires the engine's two trait seams to Discord: `ChannelWebhookResolver`
//! turns configured channel ids into webhook endpoints at startup, and
//! `WebhookTransport` performs the outbound send/edit/delete calls. The
//! serenity gateway handler maps inbound events onto the engine.

pub mod events;
pub mod handler;
pub mod resolver;
pub mod transport;

pub use {handler::PortalHandler, resolver::ChannelWebhookResolver, transport::WebhookTransport};
