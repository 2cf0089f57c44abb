//! Polyport - one record store, three front doors
//!
//! Serves a shared in-memory record store over:
//!
//! - a REST API (`/api/data`) with search and pagination
//! - a persistent WebSocket session channel (`/ws/connect`) with
//!   heartbeats, echo, and broadcast to every other session
//! - a JSON-RPC 2.0 endpoint on its own port (`/rpc`)

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod rpc;
pub mod session;

pub use config::Config;
pub use error::{PolyportError, Result};
