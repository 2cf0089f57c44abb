//! WebSocket handlers
//!
//! Bridges axum sockets onto the session layer's [`Transport`] seam.
//!
//! [`Transport`]: crate::session::Transport

pub mod session;

use std::time::Duration;

/// Upper bound for a single outbound frame write
pub const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);
