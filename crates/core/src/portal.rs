use std::collections::HashMap;

use {
    portal_common::{ChannelRef, Endpoint},
    tokio::sync::Mutex,
};

use crate::correlations::CorrelationStore;

/// Immutable map from a member channel to the endpoints of every *other*
/// member, in configuration order.
///
/// Built once at portal construction; `targets(c)` never contains the
/// endpoint for `c` itself.
#[derive(Debug, Default)]
pub struct FanoutMap {
    targets: HashMap<ChannelRef, Vec<Endpoint>>,
}

impl FanoutMap {
    #[must_use]
    pub fn build(members: &[Endpoint]) -> Self {
        let mut targets = HashMap::new();
        for member in members {
            let others: Vec<Endpoint> = members
                .iter()
                .filter(|e| e.channel != member.channel)
                .cloned()
                .collect();
            targets.insert(member.channel, others);
        }
        Self { targets }
    }

    /// Outbound endpoints for messages originating in `channel`.
    #[must_use]
    pub fn targets(&self, channel: ChannelRef) -> &[Endpoint] {
        self.targets
            .get(&channel)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A named group of channels whose messages are mirrored to one another.
///
/// Membership and fan-out are fixed at construction; only the correlation
/// store mutates afterwards. Portals are the unit of isolation: channels in
/// different portals never interact.
pub struct Portal {
    name: String,
    members: Vec<ChannelRef>,
    endpoints: HashMap<ChannelRef, Endpoint>,
    fanout: FanoutMap,
    pub(crate) correlations: Mutex<CorrelationStore>,
}

impl Portal {
    /// `members` must already be in configuration order; that order is the
    /// fan-out order for the portal's lifetime.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        members: Vec<Endpoint>,
        correlation_capacity: usize,
    ) -> Self {
        let fanout = FanoutMap::build(&members);
        let order: Vec<ChannelRef> = members.iter().map(|e| e.channel).collect();
        let endpoints = members.into_iter().map(|e| (e.channel, e)).collect();
        Self {
            name: name.into(),
            members: order,
            endpoints,
            fanout,
            correlations: Mutex::new(CorrelationStore::new(correlation_capacity)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Member channels in configuration order.
    #[must_use]
    pub fn members(&self) -> &[ChannelRef] {
        &self.members
    }

    #[must_use]
    pub fn is_member(&self, channel: ChannelRef) -> bool {
        self.endpoints.contains_key(&channel)
    }

    /// Endpoint for one member channel.
    #[must_use]
    pub fn endpoint(&self, channel: ChannelRef) -> Option<&Endpoint> {
        self.endpoints.get(&channel)
    }

    /// Endpoints of every member other than `channel`, in configuration
    /// order.
    #[must_use]
    pub fn fanout(&self, channel: ChannelRef) -> &[Endpoint] {
        self.fanout.targets(channel)
    }
}
