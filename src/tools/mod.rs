//! Static descriptors for the remote graph-query tools.
//!
//! These tools don't execute locally — they are names and parameter
//! schemas describing what the remote JSON-RPC tool server exposes. See
//! [`registry::ToolRegistry`] and `crate::toolclient` for the client that
//! actually dispatches calls.

/// Static catalog of registered remote tools.
pub mod registry;

pub use registry::{ToolCatalogDiff, ToolDescriptor, ToolRegistry};
