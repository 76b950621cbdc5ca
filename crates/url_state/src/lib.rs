//! Storefront state persisted in the address bar.
//!
//! Every mutation replaces the current history entry, so changing the cart or
//! a filter never grows the back-button stack. Without an address bar (for
//! example while rendering on a server) all operations quietly do nothing.

pub mod history;
pub mod params;
pub mod slot;
pub mod store;
pub mod view;

pub use history::{Detached, History, MemoryHistory};
pub use params::ParamNames;
pub use slot::{PersistedSlot, Restored, StorefrontSlots};
pub use store::UrlStateStore;
pub use view::{View, ViewSlot};
