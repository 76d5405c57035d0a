//! Command handler registry
//!
//! Provides the `CommandHandler` trait and `HandlerRegistry`, an ordered set
//! of handlers where the first one whose predicate accepts a signal wins.

use super::event::{CommandSignal, InboundEvent, OutboundMessage};
use tracing::{debug, info};

/// Trait for implementing chat command handlers
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// Name of the handler for logging and debugging
    fn name(&self) -> &'static str;

    /// Whether this handler answers `signal`. Must be cheap and side-effect free.
    fn can_handle(&self, signal: CommandSignal<'_>) -> bool;

    /// Produce the replies for `event`.
    ///
    /// Handlers convert their own failures into messages; an empty vector
    /// means "nothing to send".
    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage>;
}

/// Registry that keeps handlers in priority order
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn CommandHandler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Register a handler after every handler registered so far
    pub fn register(&mut self, handler: Box<dyn CommandHandler>) {
        info!(handler = handler.name(), "Registered command handler");
        self.handlers.push(handler);
    }

    /// First handler, in registration order, that accepts `signal`
    #[must_use]
    pub fn find(&self, signal: CommandSignal<'_>) -> Option<&dyn CommandHandler> {
        let found = self
            .handlers
            .iter()
            .find(|handler| handler.can_handle(signal))
            .map(|handler| &**handler);
        if let Some(handler) = found {
            debug!(handler = handler.name(), ?signal, "Handler matched");
        }
        found
    }

    /// Get the number of registered handlers
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in priority order
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.name())
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a command line into its command word and the rest.
///
/// A `@BotName` suffix on the command word is dropped, so `/hechos@MetaMapaBot x`
/// yields `("/hechos", "x")`. The rest keeps its inner whitespace.
#[must_use]
pub fn split_command(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let (first, rest) = text
        .split_once(char::is_whitespace)
        .unwrap_or((text, ""));
    let command = first.split_once('@').map_or(first, |(cmd, _)| cmd);
    (command, rest.trim())
}

/// Case-sensitive test of the command word against `command`
#[must_use]
pub fn matches_command(text: &str, command: &str) -> bool {
    split_command(text).0 == command
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Prefix(&'static str);

    #[async_trait::async_trait]
    impl CommandHandler for Prefix {
        fn name(&self) -> &'static str {
            self.0
        }

        fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
            matches!(signal, CommandSignal::Text(t) if t.starts_with(self.0))
        }

        async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
            vec![OutboundMessage::plain(event.chat_id(), self.0)]
        }
    }

    #[test]
    fn test_registration_order_wins() {
        let mut registry = HandlerRegistry::new();
        registry.register(Box::new(Prefix("/hechos")));
        registry.register(Box::new(Prefix("/hecho")));

        let found = registry.find(CommandSignal::Text("/hechos demo"));
        assert_eq!(found.map(|h| h.name()), Some("/hechos"));

        let found = registry.find(CommandSignal::Text("/hecho 5"));
        assert_eq!(found.map(|h| h.name()), Some("/hecho"));

        assert!(registry.find(CommandSignal::Text("/otro")).is_none());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["/hechos", "/hecho"]);
    }

    #[test]
    fn test_empty_registry() {
        let registry = HandlerRegistry::default();
        assert!(registry.is_empty());
        assert!(registry.find(CommandSignal::Callback("BUSCAR")).is_none());
    }

    #[test]
    fn test_split_command() {
        assert_eq!(split_command("/hecho 12"), ("/hecho", "12"));
        assert_eq!(split_command("/hecho@MetaMapaBot   12 "), ("/hecho", "12"));
        assert_eq!(split_command("/ayuda"), ("/ayuda", ""));
        assert_eq!(
            split_command("/solicitar_borrado 4  texto  largo"),
            ("/solicitar_borrado", "4  texto  largo")
        );
        assert_eq!(split_command(""), ("", ""));
    }

    #[test]
    fn test_matches_command_is_exact_and_case_sensitive() {
        assert!(matches_command("/hecho 1", "/hecho"));
        assert!(matches_command("/hecho@Bot 1", "/hecho"));
        assert!(!matches_command("/hechos demo", "/hecho"));
        assert!(!matches_command("/HECHO 1", "/hecho"));
    }
}
