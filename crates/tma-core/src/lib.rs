//! Core of the Telegram Mini App test toolkit.
//!
//! Holds the initData signing/verification protocol, the validated
//! configuration record, and the ports the network adapters implement.
//! Telegram and HTTP transports live behind those ports so everything here
//! stays testable without a live session.

pub mod api;
pub mod config;
pub mod domain;
pub mod errors;
pub mod init_data;
pub mod launch;
pub mod logging;
pub mod ports;
pub mod testing;

pub use errors::{Error, Result};
