use std::fmt;

/// Status reported by a change feed subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedStatus {
	/// Handshake in progress.
	Connecting,
	/// Handshake completed; events will follow.
	Subscribed,
	/// The channel failed, with an optional backend reason.
	Error(Option<String>),
	/// The channel was closed by the backend.
	Closed,
}

/// Lifecycle state of the engine's subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
	#[default]
	Unsubscribed,
	Connecting,
	Subscribed,
	Error,
	Closed,
}

impl ConnectionStatus {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Unsubscribed => "unsubscribed",
			Self::Connecting => "connecting",
			Self::Subscribed => "subscribed",
			Self::Error => "error",
			Self::Closed => "closed",
		}
	}

	/// Returns true while a subscription is live or being established.
	pub const fn is_active(self) -> bool {
		matches!(self, Self::Connecting | Self::Subscribed)
	}
}

impl fmt::Display for ConnectionStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
