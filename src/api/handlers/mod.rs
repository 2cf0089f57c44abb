//! API request handlers

pub mod health;
pub mod record;
pub mod session;
