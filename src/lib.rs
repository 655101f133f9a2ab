//! `mcpbridge`: bridges a stdio MCP server onto SSE, Streamable-HTTP, and
//! WebSocket network transports, and back.

pub mod adapters;
pub mod binding;
pub mod child;
pub mod cli;
pub mod config;
pub mod error;
pub mod framing;
pub mod jsonrpc;
pub mod observability;
pub mod orchestrator;
pub mod router;
pub mod session;
