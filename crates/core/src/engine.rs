use std::sync::Arc;

use {
    futures::future::join_all,
    portal_common::{DeleteEvent, EditEvent, Endpoint, MessageEvent, MessageRef, OutboundMessage},
    tracing::{debug, info, warn},
};

use crate::{
    correlations::CorrelationGroup, portal::Portal, registry::PortalRegistry,
    transport::DeliveryTransport,
};

/// Orchestrates the three event flows (new message, edit, delete) against
/// the owning portal.
///
/// Events are processed one at a time to completion; within one event the
/// per-destination delivery calls run concurrently, and the correlation
/// group is committed only after all of them have settled. Every failure is
/// absorbed locally: a bad destination is skipped, never fatal.
pub struct RelayEngine {
    registry: PortalRegistry,
    transport: Arc<dyn DeliveryTransport>,
}

impl RelayEngine {
    #[must_use]
    pub fn new(registry: PortalRegistry, transport: Arc<dyn DeliveryTransport>) -> Self {
        Self {
            registry,
            transport,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &PortalRegistry {
        &self.registry
    }

    /// Relay a new message to every other member of its portal and record
    /// the resulting correlation group.
    pub async fn on_message(&self, event: MessageEvent) {
        if event.author.is_bot {
            return;
        }
        let Some(portal) = self.registry.resolve(event.message.channel) else {
            return;
        };

        let targets = self.message_targets(portal, &event).await;

        let sends = targets.into_iter().map(|(endpoint, content)| {
            let transport = Arc::clone(&self.transport);
            let outbound = OutboundMessage {
                content,
                attachments: event.attachments.clone(),
                username: event.author.name.clone(),
                avatar_url: event.author.avatar_url.clone(),
            };
            let portal_name = portal.name().to_owned();
            async move {
                match transport.send(&endpoint, &outbound).await {
                    Ok(copy) => Some(copy),
                    Err(e) => {
                        warn!(
                            portal = %portal_name,
                            channel = %endpoint.channel,
                            error = %e,
                            "delivery failed, destination skipped"
                        );
                        None
                    },
                }
            }
        });
        let destinations: Vec<MessageRef> = join_all(sends).await.into_iter().flatten().collect();

        info!(
            portal = %portal.name(),
            source = %event.message.id,
            copies = destinations.len(),
            "message relayed"
        );

        // Recorded even with zero copies so later edits and deletes of this
        // message resolve cleanly instead of missing.
        let mut store = portal.correlations.lock().await;
        store.insert(CorrelationGroup {
            source: event.message,
            destinations,
        });
    }

    /// Propagate an edit to every recorded copy of the edited message.
    pub async fn on_edit(&self, event: EditEvent) {
        if event.author_is_bot {
            return;
        }
        let Some(portal) = self.registry.resolve(event.message.channel) else {
            return;
        };

        let group = {
            let store = portal.correlations.lock().await;
            store.lookup(event.message.id).cloned()
        };
        let Some(group) = group else {
            debug!(
                portal = %portal.name(),
                message = %event.message.id,
                "edit of uncorrelated message, nothing to propagate"
            );
            return;
        };

        let edits: Vec<_> = group
            .destinations
            .iter()
            .filter(|dest| **dest != event.message)
            .filter_map(|dest| {
                let endpoint = self.copy_endpoint(portal, *dest)?;
                let transport = Arc::clone(&self.transport);
                let dest = *dest;
                let content = event.content.clone();
                let attachments = event.attachments.clone();
                Some(async move {
                    if let Err(e) = transport
                        .edit(&endpoint, dest.id, &content, &attachments)
                        .await
                    {
                        warn!(
                            channel = %dest.channel,
                            message = %dest.id,
                            error = %e,
                            "edit propagation failed, copy left stale"
                        );
                    }
                })
            })
            .collect();
        let copies = edits.len();
        join_all(edits).await;

        info!(
            portal = %portal.name(),
            source = %event.message.id,
            copies,
            "edit propagated"
        );
    }

    /// Delete every recorded copy of the deleted message, then forget the
    /// whole correlation group.
    pub async fn on_delete(&self, event: DeleteEvent) {
        if event.author_is_bot {
            return;
        }
        let Some(portal) = self.registry.resolve(event.message.channel) else {
            return;
        };

        let group = {
            let store = portal.correlations.lock().await;
            store.lookup(event.message.id).cloned()
        };
        let Some(group) = group else {
            debug!(
                portal = %portal.name(),
                message = %event.message.id,
                "delete of uncorrelated message, nothing to propagate"
            );
            return;
        };

        let deletes: Vec<_> = group
            .destinations
            .iter()
            .filter(|dest| **dest != event.message)
            .filter_map(|dest| {
                let endpoint = self.copy_endpoint(portal, *dest)?;
                let transport = Arc::clone(&self.transport);
                let dest = *dest;
                Some(async move {
                    if let Err(e) = transport.delete(&endpoint, dest.id).await {
                        warn!(
                            channel = %dest.channel,
                            message = %dest.id,
                            error = %e,
                            "delete propagation failed, copy left behind"
                        );
                    }
                })
            })
            .collect();
        let copies = deletes.len();
        join_all(deletes).await;

        // The only removal path besides FIFO eviction: the group is
        // forgotten exactly, source and every copy id at once.
        let mut store = portal.correlations.lock().await;
        store.remove(event.message.id);

        info!(
            portal = %portal.name(),
            source = %event.message.id,
            copies,
            "delete propagated"
        );
    }

    // Per-destination (endpoint, content) pairs for a new message. A reply
    // resolves the quoted message's correlation group so each channel gets a
    // header linking to its own local copy; an unknown or evicted target
    // falls back to plain fan-out with no header.
    async fn message_targets(
        &self,
        portal: &Portal,
        event: &MessageEvent,
    ) -> Vec<(Endpoint, String)> {
        if let Some(reply) = &event.reply_target {
            let copies = {
                let store = portal.correlations.lock().await;
                store.lookup(reply.message.id).map(group_members)
            };
            if let Some(copies) = copies {
                return copies
                    .into_iter()
                    .filter(|copy| copy.channel != reply.message.channel)
                    .filter_map(|copy| {
                        let endpoint = self.copy_endpoint(portal, copy)?;
                        let url = endpoint.message_url(copy.id);
                        let header = reply_header(reply.author_name.as_deref(), &url);
                        Some((endpoint, format!("{header}\n{}", event.content)))
                    })
                    .collect();
            }
            debug!(
                portal = %portal.name(),
                target = %reply.message.id,
                "reply target unknown or evicted, relaying plain"
            );
        }

        portal
            .fanout(event.message.channel)
            .iter()
            .map(|endpoint| (endpoint.clone(), event.content.clone()))
            .collect()
    }

    fn copy_endpoint(&self, portal: &Portal, copy: MessageRef) -> Option<Endpoint> {
        match portal.endpoint(copy.channel) {
            Some(endpoint) => Some(endpoint.clone()),
            None => {
                warn!(
                    portal = %portal.name(),
                    channel = %copy.channel,
                    "no endpoint for correlated copy, skipping"
                );
                None
            },
        }
    }
}

/// Every message in a group: the source followed by its copies.
fn group_members(group: &CorrelationGroup) -> Vec<MessageRef> {
    let mut members = Vec::with_capacity(group.destinations.len() + 1);
    members.push(group.source);
    members.extend(group.destinations.iter().copied());
    members
}

fn reply_header(author: Option<&str>, url: &str) -> String {
    match author {
        Some(name) => format!("> replying to **{name}**: {url}"),
        None => format!("> replying to {url}"),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::{
            Mutex,
            atomic::{AtomicU64, Ordering},
        },
    };

    use {
        async_trait::async_trait,
        portal_common::{
            Attachment, Author, ChannelRef, DeliveryError, MessageIdent, ReplyTarget, ResolveError,
        },
    };

    use {
        super::*,
        crate::registry::{EndpointResolver, PortalDefinition},
    };

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Send {
            channel: ChannelRef,
            content: String,
            username: String,
        },
        Edit {
            channel: ChannelRef,
            message: MessageIdent,
            content: String,
            attachments: Vec<Attachment>,
        },
        Delete {
            channel: ChannelRef,
            message: MessageIdent,
        },
    }

    /// Records every delivery call; channels in `failing` reject all calls.
    /// Created message ids count up from 1000.
    struct MockTransport {
        calls: Mutex<Vec<Call>>,
        failing: HashSet<ChannelRef>,
        next_id: AtomicU64,
    }

    impl MockTransport {
        fn new() -> Arc<Self> {
            Self::failing(&[])
        }

        fn failing(channels: &[u64]) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                failing: channels.iter().map(|&c| ChannelRef(c)).collect(),
                next_id: AtomicU64::new(1000),
            })
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl DeliveryTransport for MockTransport {
        async fn send(
            &self,
            endpoint: &Endpoint,
            message: &OutboundMessage,
        ) -> Result<MessageRef, DeliveryError> {
            if self.failing.contains(&endpoint.channel) {
                return Err(DeliveryError::Forbidden);
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().unwrap().push(Call::Send {
                channel: endpoint.channel,
                content: message.content.clone(),
                username: message.username.clone(),
            });
            Ok(MessageRef::new(endpoint.channel, MessageIdent(id)))
        }

        async fn edit(
            &self,
            endpoint: &Endpoint,
            message: MessageIdent,
            content: &str,
            attachments: &[Attachment],
        ) -> Result<(), DeliveryError> {
            if self.failing.contains(&endpoint.channel) {
                return Err(DeliveryError::Forbidden);
            }
            self.calls.lock().unwrap().push(Call::Edit {
                channel: endpoint.channel,
                message,
                content: content.into(),
                attachments: attachments.to_vec(),
            });
            Ok(())
        }

        async fn delete(
            &self,
            endpoint: &Endpoint,
            message: MessageIdent,
        ) -> Result<(), DeliveryError> {
            if self.failing.contains(&endpoint.channel) {
                return Err(DeliveryError::Forbidden);
            }
            self.calls.lock().unwrap().push(Call::Delete {
                channel: endpoint.channel,
                message,
            });
            Ok(())
        }
    }

    struct StaticResolver;

    #[async_trait]
    impl EndpointResolver for StaticResolver {
        async fn resolve(&self, channel: ChannelRef) -> Result<Endpoint, ResolveError> {
            Ok(Endpoint {
                channel,
                guild: 7,
                webhook_id: channel.0,
                webhook_token: "t".into(),
            })
        }
    }

    async fn engine(
        channels: &[u64],
        capacity: usize,
        transport: Arc<MockTransport>,
    ) -> RelayEngine {
        let defs = [PortalDefinition {
            name: "test".into(),
            channels: channels.iter().map(|&c| ChannelRef(c)).collect(),
        }];
        let registry = PortalRegistry::build(&defs, &StaticResolver, capacity).await;
        RelayEngine::new(registry, transport)
    }

    fn author(name: &str, is_bot: bool) -> Author {
        Author {
            name: name.into(),
            avatar_url: None,
            is_bot,
        }
    }

    fn message(channel: u64, id: u64, content: &str) -> MessageEvent {
        MessageEvent {
            message: MessageRef::new(ChannelRef(channel), MessageIdent(id)),
            author: author("alice", false),
            content: content.into(),
            attachments: Vec::new(),
            reply_target: None,
        }
    }

    fn reply(
        channel: u64,
        id: u64,
        content: &str,
        target: MessageRef,
        quoted_author: &str,
    ) -> MessageEvent {
        MessageEvent {
            reply_target: Some(ReplyTarget {
                message: target,
                author_name: Some(quoted_author.into()),
            }),
            ..message(channel, id, content)
        }
    }

    fn edit(channel: u64, id: u64, content: &str) -> EditEvent {
        EditEvent {
            message: MessageRef::new(ChannelRef(channel), MessageIdent(id)),
            author_is_bot: false,
            content: content.into(),
            attachments: Vec::new(),
        }
    }

    fn delete(channel: u64, id: u64) -> DeleteEvent {
        DeleteEvent {
            message: MessageRef::new(ChannelRef(channel), MessageIdent(id)),
            author_is_bot: false,
        }
    }

    async fn recorded_group(engine: &RelayEngine, channel: u64, id: u64) -> Option<CorrelationGroup> {
        let portal = engine.registry().resolve(ChannelRef(channel))?;
        let store = portal.correlations.lock().await;
        store.lookup(MessageIdent(id)).cloned()
    }

    #[tokio::test]
    async fn relays_one_copy_to_every_other_member_in_order() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(2, 100, "hello")).await;

        let sends: Vec<ChannelRef> = transport
            .calls()
            .into_iter()
            .map(|c| match c {
                Call::Send { channel, content, username } => {
                    assert_eq!(content, "hello");
                    assert_eq!(username, "alice");
                    channel
                },
                other => panic!("unexpected call: {other:?}"),
            })
            .collect();
        assert_eq!(sends, vec![ChannelRef(1), ChannelRef(3)]);

        let group = recorded_group(&engine, 2, 100).await.unwrap();
        assert_eq!(group.destinations.len(), 2);
        assert_eq!(group.destinations[0].channel, ChannelRef(1));
        assert_eq!(group.destinations[1].channel, ChannelRef(3));
    }

    #[tokio::test]
    async fn bot_messages_are_not_relayed() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2], 10, Arc::clone(&transport)).await;

        let mut event = message(1, 100, "beep");
        event.author = author("botty", true);
        engine.on_message(event).await;

        assert!(transport.calls().is_empty());
        assert!(recorded_group(&engine, 1, 100).await.is_none());
    }

    #[tokio::test]
    async fn messages_from_unknown_channels_are_ignored() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2], 10, Arc::clone(&transport)).await;

        engine.on_message(message(9, 100, "hi")).await;

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn delivery_failure_skips_destination_and_records_the_rest() {
        let transport = MockTransport::failing(&[3]);
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "hi")).await;

        let group = recorded_group(&engine, 1, 100).await.unwrap();
        assert_eq!(group.destinations.len(), 1);
        assert_eq!(group.destinations[0].channel, ChannelRef(2));

        // A later delete removes exactly the successful copy.
        transport.clear();
        engine.on_delete(delete(1, 100)).await;
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            calls[0],
            Call::Delete { channel: ChannelRef(2), .. }
        ));
        assert!(recorded_group(&engine, 1, 100).await.is_none());
    }

    #[tokio::test]
    async fn group_is_recorded_even_when_every_delivery_fails() {
        let transport = MockTransport::failing(&[1, 3]);
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(2, 100, "hi")).await;

        let group = recorded_group(&engine, 2, 100).await.unwrap();
        assert!(group.destinations.is_empty());

        // Delete of a message with zero copies is a clean no-op that still
        // forgets the group.
        engine.on_delete(delete(2, 100)).await;
        assert!(transport.calls().is_empty());
        assert!(recorded_group(&engine, 2, 100).await.is_none());
    }

    #[tokio::test]
    async fn edit_propagates_to_every_recorded_copy() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "draft")).await;
        let group = recorded_group(&engine, 1, 100).await.unwrap();
        transport.clear();

        engine.on_edit(edit(1, 100, "final")).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        for (call, dest) in calls.iter().zip(&group.destinations) {
            assert_eq!(
                *call,
                Call::Edit {
                    channel: dest.channel,
                    message: dest.id,
                    content: "final".into(),
                    attachments: Vec::new(),
                }
            );
        }
    }

    #[tokio::test]
    async fn edit_propagates_replacement_attachments() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "look")).await;
        let group = recorded_group(&engine, 1, 100).await.unwrap();
        transport.clear();

        let replacement = vec![Attachment {
            filename: "after.png".into(),
            url: "https://cdn.example/after.png".into(),
        }];
        engine
            .on_edit(EditEvent {
                attachments: replacement.clone(),
                ..edit(1, 100, "look again")
            })
            .await;

        let calls = transport.calls();
        assert_eq!(
            calls,
            vec![Call::Edit {
                channel: group.destinations[0].channel,
                message: group.destinations[0].id,
                content: "look again".into(),
                attachments: replacement,
            }]
        );
    }

    #[tokio::test]
    async fn edit_of_unknown_message_is_a_noop() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2], 10, Arc::clone(&transport)).await;

        engine.on_edit(edit(1, 100, "never relayed")).await;

        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn editing_a_copy_updates_its_siblings_but_not_itself() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "draft")).await;
        let group = recorded_group(&engine, 1, 100).await.unwrap();
        let copy_in_2 = group.destinations[0];
        let copy_in_3 = group.destinations[1];
        transport.clear();

        engine
            .on_edit(edit(copy_in_2.channel.0, copy_in_2.id.0, "fixed"))
            .await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0],
            Call::Edit {
                channel: copy_in_3.channel,
                message: copy_in_3.id,
                content: "fixed".into(),
                attachments: Vec::new(),
            }
        );
    }

    #[tokio::test]
    async fn delete_removes_all_copies_and_forgets_the_group() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "oops")).await;
        let group = recorded_group(&engine, 1, 100).await.unwrap();
        transport.clear();

        engine.on_delete(delete(1, 100)).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        for dest in &group.destinations {
            assert!(calls.contains(&Call::Delete {
                channel: dest.channel,
                message: dest.id,
            }));
        }

        // Every id of the group is now a lookup miss.
        assert!(recorded_group(&engine, 1, 100).await.is_none());
        transport.clear();
        engine
            .on_edit(edit(group.destinations[0].channel.0, group.destinations[0].id.0, "x"))
            .await;
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn capacity_walkthrough_with_three_members() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 2, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "m1")).await;
        engine.on_message(message(2, 101, "m2")).await;
        assert_eq!(transport.calls().len(), 4);

        // Third insert evicts m1's group.
        engine.on_message(message(3, 102, "m3")).await;
        assert!(recorded_group(&engine, 1, 100).await.is_none());
        transport.clear();

        // Editing the evicted original is now a no-op.
        engine.on_edit(edit(1, 100, "too late")).await;
        assert!(transport.calls().is_empty());

        // Editing the survivors still propagates.
        engine.on_edit(edit(2, 101, "m2 v2")).await;
        assert_eq!(transport.calls().len(), 2);
        transport.clear();
        engine.on_edit(edit(3, 102, "m3 v2")).await;
        assert_eq!(transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn reply_links_each_channel_to_its_own_local_copy() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        engine.on_message(message(1, 100, "original")).await;
        let group = recorded_group(&engine, 1, 100).await.unwrap();
        let copy_in_2 = group.destinations[0];
        let copy_in_3 = group.destinations[1];
        transport.clear();

        // Bob replies in channel 2 to the copy that landed there.
        engine
            .on_message(reply(2, 101, "indeed", copy_in_2, "alice"))
            .await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        let mut by_channel: Vec<(ChannelRef, String)> = calls
            .into_iter()
            .map(|c| match c {
                Call::Send { channel, content, .. } => (channel, content),
                other => panic!("unexpected call: {other:?}"),
            })
            .collect();
        by_channel.sort_by_key(|(c, _)| *c);

        // Channel 1 links to the original; channel 3 links to its own copy.
        let (channel, content) = &by_channel[0];
        assert_eq!(*channel, ChannelRef(1));
        assert!(content.contains("replying to **alice**"));
        assert!(content.contains("https://discord.com/channels/7/1/100"));
        assert!(content.ends_with("indeed"));

        let (channel, content) = &by_channel[1];
        assert_eq!(*channel, ChannelRef(3));
        assert!(content.contains(&format!(
            "https://discord.com/channels/7/3/{}",
            copy_in_3.id
        )));

        // The reply itself was recorded as a group of its own.
        let reply_group = recorded_group(&engine, 2, 101).await.unwrap();
        assert_eq!(reply_group.destinations.len(), 2);
    }

    #[tokio::test]
    async fn reply_to_unknown_message_falls_back_to_plain_relay() {
        let transport = MockTransport::new();
        let engine = engine(&[1, 2, 3], 10, Arc::clone(&transport)).await;

        let target = MessageRef::new(ChannelRef(2), MessageIdent(999));
        engine.on_message(reply(2, 101, "hello?", target, "ghost")).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            match call {
                Call::Send { content, .. } => assert_eq!(content, "hello?"),
                other => panic!("unexpected call: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn portals_are_isolated_from_each_other() {
        let transport = MockTransport::new();
        let defs = [
            PortalDefinition {
                name: "a".into(),
                channels: vec![ChannelRef(1), ChannelRef(2)],
            },
            PortalDefinition {
                name: "b".into(),
                channels: vec![ChannelRef(3), ChannelRef(4)],
            },
        ];
        let registry = PortalRegistry::build(&defs, &StaticResolver, 10).await;
        let engine = RelayEngine::new(
            registry,
            Arc::clone(&transport) as Arc<dyn DeliveryTransport>,
        );

        engine.on_message(message(1, 100, "only for a")).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(
            calls[0],
            Call::Send { channel: ChannelRef(2), .. }
        ));
    }

    #[test]
    fn reply_header_with_and_without_author() {
        assert_eq!(
            reply_header(Some("alice"), "https://x/1"),
            "> replying to **alice**: https://x/1"
        );
        assert_eq!(reply_header(None, "https://x/1"), "> replying to https://x/1");
    }
}
