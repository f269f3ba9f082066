//! Portal relay and correlation engine.
//!
//! A portal is a named group of channels whose messages are mirrored to one
//! another through webhook endpoints. The engine fans new messages out to
//! every other member channel, keeps edits and deletions synchronized across
//! the copies, and rewrites cross-channel reply references so each channel
//! links to its own local copy of the quoted message. Correlation state is
//! process-lifetime only and bounded per portal by FIFO eviction.

pub mod correlations;
pub mod engine;
pub mod portal;
pub mod registry;
pub mod transport;

pub use {
    correlations::{CorrelationGroup, CorrelationStore, DEFAULT_CAPACITY},
    engine::RelayEngine,
    portal::{FanoutMap, Portal},
    registry::{EndpointResolver, PortalDefinition, PortalRegistry},
    transport::DeliveryTransport,
};
