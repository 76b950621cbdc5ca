/// Execution classes used for task spawning and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskClass {
	/// Long-lived loops that own a subscription or a mirror.
	Driver,
	/// One-shot backend reads: full catalog loads and per-row re-fetches.
	Fetch,
	/// Delayed wake-ups such as subscription retries and fallback polls.
	Timer,
}

impl TaskClass {
	pub(crate) const fn as_str(self) -> &'static str {
		match self {
			Self::Driver => "driver",
			Self::Fetch => "fetch",
			Self::Timer => "timer",
		}
	}
}
