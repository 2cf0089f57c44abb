//! Session layer for the persistent WebSocket channel
//!
//! - [`registry`]: who is connected, one entry per live session
//! - [`heartbeat`]: per-session keep-alive task owned by the registry entry
//! - [`dispatch`]: inbound frame handling and the receive loop
//! - [`delivery`]: unicast and broadcast sends with failure cleanup
//!
//! The layer knows nothing about sockets; connections plug in through the
//! [`Transport`] trait.

pub mod delivery;
pub mod dispatch;
pub mod heartbeat;
pub mod registry;
pub mod transport;

pub use delivery::{BroadcastReport, DeliveryOutcome};
pub use dispatch::{decode_frame, ProtocolError};
pub use heartbeat::HeartbeatHandle;
pub use registry::{ConnectionManager, SessionId};
pub use transport::{InboundEvent, Transport, TransportError};
