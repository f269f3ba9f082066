//! Webhook-based delivery transport.

use std::sync::Arc;

use {
    serenity::{
        all::{
            CreateAttachment, EditAttachments, EditWebhookMessage, ExecuteWebhook, MessageId,
            Webhook, WebhookId,
        },
        async_trait,
        http::Http,
    },
    tracing::warn,
};

use {
    portal_common::{
        Attachment, DeliveryError, Endpoint, MessageIdent, MessageRef, OutboundMessage,
    },
    portal_core::DeliveryTransport,
};

/// Executes send/edit/delete calls through each endpoint's channel webhook.
///
/// Sends impersonate the original author via the webhook display name and
/// avatar. Attachments are re-uploaded from their source URLs; one that
/// fails to download is skipped without failing the whole call.
pub struct WebhookTransport {
    http: Arc<Http>,
}

impl WebhookTransport {
    #[must_use]
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    async fn webhook(&self, endpoint: &Endpoint) -> Result<Webhook, DeliveryError> {
        Webhook::from_id_with_token(
            &self.http,
            WebhookId::new(endpoint.webhook_id),
            &endpoint.webhook_token,
        )
        .await
        .map_err(|e| delivery_error("fetch webhook", e))
    }

    async fn download_attachments(&self, attachments: &[Attachment]) -> Vec<CreateAttachment> {
        let mut files = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            match CreateAttachment::url(&self.http, attachment.url.as_str()).await {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!(
                        filename = %attachment.filename,
                        error = %e,
                        "skipping attachment that failed to download"
                    );
                },
            }
        }
        files
    }
}

#[async_trait]
impl DeliveryTransport for WebhookTransport {
    async fn send(
        &self,
        endpoint: &Endpoint,
        message: &OutboundMessage,
    ) -> Result<MessageRef, DeliveryError> {
        let webhook = self.webhook(endpoint).await?;

        let mut builder = ExecuteWebhook::new()
            .content(message.content.clone())
            .username(message.username.clone());
        if let Some(avatar) = &message.avatar_url {
            builder = builder.avatar_url(avatar.clone());
        }
        for file in self.download_attachments(&message.attachments).await {
            builder = builder.add_file(file);
        }

        // wait=true so the platform returns the created message and its id
        // can join the correlation group.
        let created = webhook
            .execute(Arc::clone(&self.http), true, builder)
            .await
            .map_err(|e| delivery_error("execute webhook", e))?
            .ok_or(DeliveryError::NoMessageReturned)?;

        Ok(MessageRef::new(
            endpoint.channel,
            MessageIdent(created.id.get()),
        ))
    }

    async fn edit(
        &self,
        endpoint: &Endpoint,
        message: MessageIdent,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), DeliveryError> {
        let webhook = self.webhook(endpoint).await?;

        // The attachment set is replaced wholesale, so removals on the
        // source message propagate to the copies as well.
        let mut files = EditAttachments::new();
        for file in self.download_attachments(attachments).await {
            files = files.add(file);
        }

        webhook
            .edit_message(
                Arc::clone(&self.http),
                MessageId::new(message.0),
                EditWebhookMessage::new()
                    .content(content.to_string())
                    .attachments(files),
            )
            .await
            .map_err(|e| delivery_error("edit webhook message", e))?;
        Ok(())
    }

    async fn delete(
        &self,
        endpoint: &Endpoint,
        message: MessageIdent,
    ) -> Result<(), DeliveryError> {
        let webhook = self.webhook(endpoint).await?;
        webhook
            .delete_message(Arc::clone(&self.http), None, MessageId::new(message.0))
            .await
            .map_err(|e| delivery_error("delete webhook message", e))?;
        Ok(())
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

fn delivery_error(context: &'static str, e: serenity::Error) -> DeliveryError {
    match status_of(&e) {
        Some(403) => DeliveryError::Forbidden,
        Some(404) => DeliveryError::Gone,
        _ => DeliveryError::transport(context, e),
    }
}
