use std::error::Error as StdError;

/// Typed failure from endpoint resolution at portal construction time.
///
/// Any of these drops the member from its portal; none of them aborts
/// portal construction.
#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    /// The channel id does not exist or is not visible to the bot.
    #[error("channel not found")]
    NotFound,

    /// The channel exists but cannot host a webhook (thread, DM, voice).
    #[error("wrong channel kind: {kind}")]
    WrongChannelKind { kind: String },

    /// The bot lacks permission to inspect or provision the channel.
    #[error("access forbidden")]
    Forbidden,

    /// Wrapped source error from the platform client.
    #[error("resolution failed: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl ResolveError {
    #[must_use]
    pub fn wrong_kind(kind: impl Into<String>) -> Self {
        Self::WrongChannelKind { kind: kind.into() }
    }

    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}

/// Typed failure from an individual send/edit/delete delivery call.
///
/// Delivery failures are values the relay engine inspects and absorbs;
/// they never abort sibling deliveries.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The endpoint rejected the call for permission reasons.
    #[error("delivery forbidden")]
    Forbidden,

    /// The target message no longer exists on the platform.
    #[error("message gone")]
    Gone,

    /// The transport accepted the call but returned no created message.
    #[error("no message returned by endpoint")]
    NoMessageReturned,

    /// Wrapped source error from the platform client.
    #[error("delivery failed: {context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },
}

impl DeliveryError {
    #[must_use]
    pub fn transport(
        context: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            context: context.into(),
            source: Box::new(source),
        }
    }
}
