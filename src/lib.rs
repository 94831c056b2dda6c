//! Mailroute: address-based inbound email routing.

pub mod address;
pub mod config;
pub mod error;
pub mod forward;
pub mod message;
pub mod observe;
pub mod router;
pub mod rules;
pub mod server;

pub use error::{Error, Result};
