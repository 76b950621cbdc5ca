//! Core types shared by the storefront state and realtime catalog crates.

/// Change feed events and payload shapes.
pub mod event;
/// Stable record keys.
pub mod key;
/// Boundary normalization of raw feed rows.
pub mod normalize;
/// The keyed record contract.
pub mod record;
/// Subscription connection status.
pub mod status;
/// Wine catalog records.
pub mod wine;

pub use event::{ChangeEvent, ChangeKind, PartialRecord, Payload};
pub use key::ItemKey;
pub use normalize::{NormalizeError, Normalizer};
pub use record::Record;
pub use status::{ConnectionStatus, FeedStatus};
pub use wine::{Wine, WineDetail};
