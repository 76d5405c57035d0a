//! Routes one inbound event to exactly one handler, or to the fallback.

use super::event::{InboundEvent, OutboundMessage};
use super::registry::{CommandHandler, HandlerRegistry};
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, warn};

/// Reply to a text that no handler accepts
pub const UNRECOGNIZED_COMMAND: &str = "Comando no reconocido.";

/// Reply when a handler panicked
pub const UNEXPECTED_ERROR: &str = "Ocurrió un error inesperado al procesar tu solicitud.";

/// Dispatches events through a fixed [`HandlerRegistry`]
pub struct Router {
    registry: HandlerRegistry,
}

impl Router {
    /// Take ownership of the registry; its order is frozen from now on
    #[must_use]
    pub const fn new(registry: HandlerRegistry) -> Self {
        Self { registry }
    }

    /// The handler that would process `event`, if any
    #[must_use]
    pub fn select(&self, event: &InboundEvent) -> Option<&dyn CommandHandler> {
        self.registry.find(event.signal())
    }

    /// Handle `event` and return the messages to deliver.
    ///
    /// Unmatched text gets [`UNRECOGNIZED_COMMAND`]; unmatched callbacks are
    /// dropped. A panicking handler is contained here.
    pub async fn route(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let Some(handler) = self.select(event) else {
            return match event {
                InboundEvent::TextCommand { chat_id, text } => {
                    debug!(chat_id, text = %text, "No handler for text command");
                    vec![OutboundMessage::plain(*chat_id, UNRECOGNIZED_COMMAND)]
                }
                InboundEvent::CallbackAction { chat_id, token, .. } => {
                    warn!(chat_id, token = %token, "Dropping callback with no handler");
                    Vec::new()
                }
            };
        };

        debug!(handler = handler.name(), chat_id = event.chat_id(), "Routing event");

        match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
            Ok(messages) => messages,
            Err(_) => {
                error!(handler = handler.name(), "Handler panicked");
                match event {
                    InboundEvent::TextCommand { chat_id, .. } => {
                        vec![OutboundMessage::plain(*chat_id, UNEXPECTED_ERROR)]
                    }
                    InboundEvent::CallbackAction { .. } => Vec::new(),
                }
            }
        }
    }

    /// Number of registered handlers
    #[must_use]
    pub fn handler_count(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::event::CommandSignal;
    use crate::bot::registry::matches_command;

    struct Echo;

    #[async_trait::async_trait]
    impl CommandHandler for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
            matches!(signal, CommandSignal::Text(t) if matches_command(t, "/echo"))
        }

        async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
            vec![OutboundMessage::plain(event.chat_id(), "eco")]
        }
    }

    struct Exploding;

    #[async_trait::async_trait]
    impl CommandHandler for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
            matches!(signal, CommandSignal::Text(t) if matches_command(t, "/boom"))
                || matches!(signal, CommandSignal::Callback("BOOM"))
        }

        async fn handle(&self, _event: &InboundEvent) -> Vec<OutboundMessage> {
            panic!("handler bug")
        }
    }

    fn router() -> Router {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(Echo));
        registry.register(Box::new(Exploding));
        Router::new(registry)
    }

    #[tokio::test]
    async fn test_routes_to_matching_handler() {
        let out = router().route(&InboundEvent::text(5, "/echo hola")).await;
        assert_eq!(out, vec![OutboundMessage::plain(5, "eco")]);
    }

    #[tokio::test]
    async fn test_unknown_text_gets_fallback() {
        let out = router().route(&InboundEvent::text(5, "hola")).await;
        assert_eq!(out, vec![OutboundMessage::plain(5, UNRECOGNIZED_COMMAND)]);
    }

    #[tokio::test]
    async fn test_unknown_callback_is_dropped() {
        let out = router()
            .route(&InboundEvent::callback(5, 10, "OTRO|x|_|0"))
            .await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let r = router();
        let out = r.route(&InboundEvent::text(3, "/boom")).await;
        assert_eq!(out, vec![OutboundMessage::plain(3, UNEXPECTED_ERROR)]);

        let out = r.route(&InboundEvent::callback(3, 1, "BOOM|x|_|0")).await;
        assert!(out.is_empty());
    }
}
