//! JSON-RPC 2.0 access to the record store
//!
//! Runs on its own port next to the HTTP API and shares the same
//! [`RecordRepository`](crate::repository::RecordRepository).

pub mod protocol;
pub mod server;
pub mod service;

pub use protocol::{RequestId, RpcError, RpcErrorCode, RpcRequest, RpcResponse};
pub use server::{handle_message, RpcServer};
pub use service::{DataRpcService, RpcHandler};
