//! Channel and webhook resolution at portal construction time.

use std::sync::Arc;

use {
    secrecy::ExposeSecret,
    serenity::{
        all::{Channel, ChannelId, ChannelType, CreateWebhook, GuildChannel, Webhook},
        async_trait,
        http::Http,
    },
    tracing::{debug, info},
};

use {
    portal_common::{ChannelRef, Endpoint, ResolveError},
    portal_core::EndpointResolver,
};

/// Resolves a configured channel id to a webhook endpoint.
///
/// Only guild text and announcement channels qualify; threads and DMs are
/// rejected as the wrong kind. An existing webhook with the configured name
/// is reused, otherwise one is created, so repeated startups never pile up
/// duplicate webhooks.
pub struct ChannelWebhookResolver {
    http: Arc<Http>,
    webhook_name: String,
}

impl ChannelWebhookResolver {
    #[must_use]
    pub fn new(http: Arc<Http>, webhook_name: impl Into<String>) -> Self {
        Self {
            http,
            webhook_name: webhook_name.into(),
        }
    }

    async fn find_or_create_webhook(
        &self,
        channel: &GuildChannel,
    ) -> Result<Webhook, ResolveError> {
        let existing = channel
            .webhooks(Arc::clone(&self.http))
            .await
            .map_err(|e| resolve_error("list webhooks", e))?;

        if let Some(webhook) = existing
            .into_iter()
            .find(|w| w.name.as_deref() == Some(self.webhook_name.as_str()))
        {
            debug!(channel = %channel.id, "reusing existing webhook");
            return Ok(webhook);
        }

        let created = channel
            .create_webhook(
                Arc::clone(&self.http),
                CreateWebhook::new(self.webhook_name.clone()),
            )
            .await
            .map_err(|e| resolve_error("create webhook", e))?;
        info!(channel = %channel.id, "created relay webhook");
        Ok(created)
    }
}

#[async_trait]
impl EndpointResolver for ChannelWebhookResolver {
    async fn resolve(&self, channel: ChannelRef) -> Result<Endpoint, ResolveError> {
        let fetched = self
            .http
            .get_channel(ChannelId::new(channel.0))
            .await
            .map_err(|e| resolve_error("fetch channel", e))?;

        let guild_channel = match fetched {
            Channel::Guild(c) => c,
            Channel::Private(_) => return Err(ResolveError::wrong_kind("direct message")),
            _ => return Err(ResolveError::wrong_kind("unsupported channel")),
        };

        match guild_channel.kind {
            ChannelType::Text | ChannelType::News => {},
            ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread => {
                return Err(ResolveError::wrong_kind("thread"));
            },
            other => return Err(ResolveError::wrong_kind(format!("{other:?}"))),
        }

        let webhook = self.find_or_create_webhook(&guild_channel).await?;
        // A webhook without a token cannot be executed by this process.
        let Some(token) = webhook.token else {
            return Err(ResolveError::Forbidden);
        };

        Ok(Endpoint {
            channel,
            guild: guild_channel.guild_id.get(),
            webhook_id: webhook.id.get(),
            webhook_token: token.expose_secret().to_string(),
        })
    }
}

fn status_of(e: &serenity::Error) -> Option<u16> {
    match e {
        serenity::Error::Http(serenity::http::HttpError::UnsuccessfulRequest(resp)) => {
            Some(resp.status_code.as_u16())
        },
        _ => None,
    }
}

fn resolve_error(context: &'static str, e: serenity::Error) -> ResolveError {
    match status_of(&e) {
        Some(403) => ResolveError::Forbidden,
        Some(404) => ResolveError::NotFound,
        _ => ResolveError::transport(context, e),
    }
}
