use {
    async_trait::async_trait,
    portal_common::{Attachment, DeliveryError, Endpoint, MessageIdent, MessageRef, OutboundMessage},
};

/// Outbound delivery calls against one endpoint.
///
/// All three calls are fallible and must come back as values; the relay
/// engine inspects and absorbs failures per destination. Implementations
/// never panic on a failed call.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// Post a new copy, returning the reference of the created message.
    async fn send(
        &self,
        endpoint: &Endpoint,
        message: &OutboundMessage,
    ) -> Result<MessageRef, DeliveryError>;

    /// Replace the content and attachments of a previously posted copy.
    async fn edit(
        &self,
        endpoint: &Endpoint,
        message: MessageIdent,
        content: &str,
        attachments: &[Attachment],
    ) -> Result<(), DeliveryError>;

    /// Delete a previously posted copy.
    async fn delete(
        &self,
        endpoint: &Endpoint,
        message: MessageIdent,
    ) -> Result<(), DeliveryError>;
}
