//! Discord event handler for serenity.
//!
//! Builds the portal registry on `ready` (channel and webhook resolution
//! needs a live HTTP client) and forwards message events to the relay
//! engine. Events arriving before the registry is up are dropped.

use std::sync::Arc;

use {
    serenity::{
        all::{ChannelId, Context, EventHandler, GatewayIntents, Message, MessageId,
            MessageUpdateEvent, Ready},
        async_trait,
    },
    tokio::sync::OnceCell,
    tracing::info,
};

use {
    portal_common::{ChannelRef, DeleteEvent, MessageIdent, MessageRef},
    portal_config::PortalbotConfig,
    portal_core::{PortalDefinition, PortalRegistry, RelayEngine},
};

use crate::{
    events::{edit_event, message_event},
    resolver::ChannelWebhookResolver,
    transport::WebhookTransport,
};

/// Handler for Discord gateway events.
pub struct PortalHandler {
    config: PortalbotConfig,
    engine: OnceCell<RelayEngine>,
}

impl PortalHandler {
    #[must_use]
    pub fn new(config: PortalbotConfig) -> Self {
        Self {
            config,
            engine: OnceCell::new(),
        }
    }

    /// Required gateway intents for the bot.
    #[must_use]
    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS | GatewayIntents::GUILD_MESSAGES | GatewayIntents::MESSAGE_CONTENT
    }

    fn definitions(&self) -> Vec<PortalDefinition> {
        self.config
            .portals
            .iter()
            .map(|p| PortalDefinition {
                name: p.name.clone(),
                channels: p.channels.iter().map(|&c| ChannelRef(c)).collect(),
            })
            .collect()
    }
}

#[async_trait]
impl EventHandler for PortalHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            bot_name = %ready.user.name,
            guilds = ready.guilds.len(),
            "discord gateway ready"
        );

        let engine = self
            .engine
            .get_or_init(|| async {
                let resolver = ChannelWebhookResolver::new(
                    Arc::clone(&ctx.http),
                    self.config.relay.webhook_name.clone(),
                );
                let registry = PortalRegistry::build(
                    &self.definitions(),
                    &resolver,
                    self.config.relay.correlation_capacity,
                )
                .await;
                let transport = Arc::new(WebhookTransport::new(Arc::clone(&ctx.http)));
                RelayEngine::new(registry, transport)
            })
            .await;

        for portal in engine.registry().portals() {
            info!(
                portal = %portal.name(),
                members = portal.members().len(),
                "portal active"
            );
        }
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        if let Some(engine) = self.engine.get() {
            engine.on_message(message_event(&msg)).await;
        }
    }

    async fn message_update(
        &self,
        _ctx: Context,
        _old_if_available: Option<Message>,
        _new: Option<Message>,
        event: MessageUpdateEvent,
    ) {
        let Some(engine) = self.engine.get() else {
            return;
        };
        if let Some(edit) = edit_event(&event) {
            engine.on_edit(edit).await;
        }
    }

    async fn message_delete(
        &self,
        ctx: Context,
        channel_id: ChannelId,
        deleted_message_id: MessageId,
        _guild_id: Option<serenity::all::GuildId>,
    ) {
        let Some(engine) = self.engine.get() else {
            return;
        };

        // The wire event carries no author; the cache supplies the last
        // known one when the message is still held. A copy the engine
        // deleted itself resolves as a lookup miss either way, because its
        // group was already removed.
        let author_is_bot = ctx
            .cache
            .message(channel_id, deleted_message_id)
            .is_some_and(|m| m.author.bot);

        engine
            .on_delete(DeleteEvent {
                message: MessageRef::new(
                    ChannelRef(channel_id.get()),
                    MessageIdent(deleted_message_id.get()),
                ),
                author_is_bot,
            })
            .await;
    }
}
