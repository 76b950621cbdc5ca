//! Realtime catalog synchronization.
//!
//! * [`RealtimeEngine`]: owns the in-memory mirror, applies change feed events and
//!   keeps one subscription alive with bounded fixed-delay retries
//! * [`CatalogService`]: serves the mirror while realtime is healthy and a one-shot
//!   fetched snapshot while it is not
//! * [`CatalogSource`] / [`ChangeFeed`]: the backend seams, implemented in-process by
//!   [`MemoryBackend`]
//!
//! The backend client is constructed once by the host and handed in as an
//! `Arc`; nothing here reaches for a global client.

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod fallback;
pub mod memory;
pub mod mirror;
pub mod source;

pub use engine::{EngineOptions, EngineSnapshot, RealtimeEngine};
pub use error::{CatalogError, SourceError};
pub use fallback::{CatalogService, CatalogView, FallbackLatch, FallbackOptions, LatchAction, ViewSource};
pub use memory::{MemoryBackend, MemorySubscription};
pub use mirror::{Applied, Mirror};
pub use source::{CatalogSource, ChangeFeed, FeedSink};
