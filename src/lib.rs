#![deny(missing_docs)]
//! MetaMapa Telegram bot: routes chat commands to the MetaMapa REST services.

/// Backend REST services, retry policy and HTTP transport
pub mod backend;
/// Chat command routing, handlers and the Telegram runtime
pub mod bot;
/// Configuration and settings management
pub mod config;
/// Utility functions
pub mod utils;
