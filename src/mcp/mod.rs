//! JSON-RPC adapter.
//!
//! Exposes the monitor service over line-delimited JSON-RPC 2.0 on stdio,
//! using MCP-style method names for resources and tools.
//!
//! ## Usage
//!
//! ```bash
//! agentlog serve --watch
//! ```

mod dispatch;
mod params;
mod resources;
mod server;

pub use dispatch::RpcMethod;
pub use resources::{
    ResourceContent, ResourceDefinition, ResourceDocument, list_resources, parse_uri,
    resource_uri,
};
pub use server::{
    ADD_MEMORY_TOOL, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, MAX_REQUEST_BODY_SIZE,
    METHOD_NOT_FOUND, PARSE_ERROR, RpcServer,
};
