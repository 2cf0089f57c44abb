//! API server implementation
//!
//! Provides the record REST API, status endpoints and the WebSocket
//! session channel.

pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod websocket;

pub use server::ApiServer;
