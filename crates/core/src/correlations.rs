use std::collections::{HashMap, VecDeque};

use portal_common::{MessageIdent, MessageRef};

/// Default bound on the number of correlation groups held per portal.
pub const DEFAULT_CAPACITY: usize = 100;

/// One source message and the relayed copies produced from it.
///
/// The destination list is fixed at relay time and only ever shrinks by
/// removal of the whole group; edit and delete propagation always work from
/// the recorded destinations, never from current portal membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationGroup {
    pub source: MessageRef,
    pub destinations: Vec<MessageRef>,
}

/// Bounded bidirectional map from message ids to correlation groups.
///
/// Groups are kept in insertion order. Inserting past capacity evicts the
/// oldest group together with every id it indexed (strict FIFO, independent
/// of access). Lookup works from any member id, source or destination.
#[derive(Debug)]
pub struct CorrelationStore {
    capacity: usize,
    order: VecDeque<u64>,
    groups: HashMap<u64, CorrelationGroup>,
    index: HashMap<MessageIdent, u64>,
    next_handle: u64,
}

impl CorrelationStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            groups: HashMap::new(),
            index: HashMap::new(),
            next_handle: 0,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Insert a fully-built group, evicting the oldest group first if the
    /// store is at capacity. The group's ids become visible all at once;
    /// there is no partially-indexed state.
    pub fn insert(&mut self, group: CorrelationGroup) {
        while self.order.len() >= self.capacity {
            if let Some(&oldest) = self.order.front() {
                self.remove_group(oldest);
            }
        }

        let handle = self.next_handle;
        self.next_handle += 1;

        self.index.insert(group.source.id, handle);
        for dest in &group.destinations {
            self.index.insert(dest.id, handle);
        }
        self.order.push_back(handle);
        self.groups.insert(handle, group);
    }

    /// The group containing `id` as source or destination, if any.
    #[must_use]
    pub fn lookup(&self, id: MessageIdent) -> Option<&CorrelationGroup> {
        let handle = self.index.get(&id)?;
        self.groups.get(handle)
    }

    /// Remove the entire group containing `id`, returning it.
    ///
    /// Used by delete propagation; the only removal path besides FIFO
    /// eviction, and both share [`Self::remove_group`].
    pub fn remove(&mut self, id: MessageIdent) -> Option<CorrelationGroup> {
        let handle = *self.index.get(&id)?;
        self.remove_group(handle)
    }

    // Single removal path: drops the group from the order queue and every
    // one of its ids from the index in one step.
    fn remove_group(&mut self, handle: u64) -> Option<CorrelationGroup> {
        let group = self.groups.remove(&handle)?;
        self.index.remove(&group.source.id);
        for dest in &group.destinations {
            self.index.remove(&dest.id);
        }
        self.order.retain(|h| *h != handle);
        Some(group)
    }
}
