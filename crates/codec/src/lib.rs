//! Encoding of storefront state into shareable URL tokens.
//!
//! Cart contents and filter selections are serialized to JSON, XOR-masked
//! with a fixed key and base64 encoded. The mask is obfuscation only: the key
//! ships with the code, so anyone holding a token can read it back.

pub mod cart;
pub mod codec;
pub mod filters;
pub mod persist;

pub use cart::{Cart, CartEntry};
pub use codec::{DEFAULT_KEY, DecodeError, StateCodec};
pub use filters::{Facet, FilterOptions, FilterState, PriceRange};
pub use persist::Persist;
