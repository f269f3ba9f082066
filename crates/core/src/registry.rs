use std::collections::HashMap;

use {
    async_trait::async_trait,
    portal_common::{ChannelRef, Endpoint, ResolveError},
    tracing::{info, warn},
};

use crate::portal::Portal;

/// Resolves a member channel to a usable delivery endpoint at startup.
///
/// Implementations may create a missing webhook as a side effect; creation
/// must be idempotent (an existing webhook with the expected name is reused
/// rather than duplicated).
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, channel: ChannelRef) -> Result<Endpoint, ResolveError>;
}

/// One configured portal: a name and its member channels in fan-out order.
#[derive(Debug, Clone)]
pub struct PortalDefinition {
    pub name: String,
    pub channels: Vec<ChannelRef>,
}

/// Owns every portal, indexed by member channel.
///
/// Built once at startup and immutable afterwards; passed explicitly to the
/// event entry points rather than living in a global.
pub struct PortalRegistry {
    portals: Vec<Portal>,
    by_channel: HashMap<ChannelRef, usize>,
}

impl PortalRegistry {
    /// Build all portals from configuration.
    ///
    /// A member that fails to resolve is dropped from its portal with a
    /// warning and construction continues; a single bad channel never
    /// aborts the rest. A portal left without any usable member is skipped
    /// entirely (it could relay to nobody anyway).
    pub async fn build(
        definitions: &[PortalDefinition],
        resolver: &dyn EndpointResolver,
        correlation_capacity: usize,
    ) -> Self {
        let mut portals: Vec<Portal> = Vec::new();
        let mut by_channel: HashMap<ChannelRef, usize> = HashMap::new();

        for def in definitions {
            let mut endpoints: Vec<Endpoint> = Vec::new();
            for &channel in &def.channels {
                if by_channel.contains_key(&channel)
                    || endpoints.iter().any(|e| e.channel == channel)
                {
                    warn!(
                        portal = %def.name,
                        %channel,
                        "channel already assigned to a portal, skipping duplicate"
                    );
                    continue;
                }
                match resolver.resolve(channel).await {
                    Ok(endpoint) => endpoints.push(endpoint),
                    Err(e) => {
                        warn!(
                            portal = %def.name,
                            %channel,
                            error = %e,
                            "dropping unresolvable portal member"
                        );
                    },
                }
            }

            if endpoints.is_empty() {
                warn!(portal = %def.name, "portal has no usable members, relaying disabled");
                continue;
            }

            let slot = portals.len();
            for endpoint in &endpoints {
                by_channel.insert(endpoint.channel, slot);
            }
            info!(
                portal = %def.name,
                members = endpoints.len(),
                "portal ready"
            );
            portals.push(Portal::new(&def.name, endpoints, correlation_capacity));
        }

        info!(portals = portals.len(), "portal registry built");
        Self {
            portals,
            by_channel,
        }
    }

    /// The owning portal for a member channel, if any. Unrecognized
    /// channels are not an error; downstream logic ignores them silently.
    #[must_use]
    pub fn resolve(&self, channel: ChannelRef) -> Option<&Portal> {
        self.by_channel
            .get(&channel)
            .and_then(|&slot| self.portals.get(slot))
    }

    #[must_use]
    pub fn portals(&self) -> &[Portal] {
        &self.portals
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.portals.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.portals.is_empty()
    }
}
