/// Splitting of long replies into Telegram-sized messages
pub mod chunker;
/// Transport-neutral inbound events and outbound messages
pub mod event;
/// Chat command handlers
pub mod handlers;
/// Pagination token codec and keyboard builder
pub mod pagination;
/// Handler trait and ordered registry
pub mod registry;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// Event routing with fallback replies
pub mod router;
/// Telegram dispatcher runtime
pub mod telegram;

pub use event::{InboundEvent, OutboundMessage};
pub use registry::{CommandHandler, HandlerRegistry};
pub use router::Router;
