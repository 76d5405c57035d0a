//! Transport-neutral inbound events and outbound messages.

use super::pagination::DELIMITER;

/// One chat interaction delivered by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A text message typed by the user
    TextCommand {
        /// Chat the message came from
        chat_id: i64,
        /// Raw message text
        text: String,
    },
    /// An inline keyboard button press
    CallbackAction {
        /// Chat of the message holding the keyboard
        chat_id: i64,
        /// Message holding the keyboard
        origin_message_id: i32,
        /// Raw callback data
        token: String,
    },
}

/// The part of an event that handlers match on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandSignal<'a> {
    /// Full raw text of a text command
    Text(&'a str),
    /// First field of a callback token
    Callback(&'a str),
}

impl InboundEvent {
    /// Build a text event
    #[must_use]
    pub fn text(chat_id: i64, text: impl Into<String>) -> Self {
        Self::TextCommand {
            chat_id,
            text: text.into(),
        }
    }

    /// Build a callback event
    #[must_use]
    pub fn callback(chat_id: i64, origin_message_id: i32, token: impl Into<String>) -> Self {
        Self::CallbackAction {
            chat_id,
            origin_message_id,
            token: token.into(),
        }
    }

    /// Chat the event belongs to
    #[must_use]
    pub const fn chat_id(&self) -> i64 {
        match self {
            Self::TextCommand { chat_id, .. } | Self::CallbackAction { chat_id, .. } => *chat_id,
        }
    }

    /// What the router hands to `can_handle`
    #[must_use]
    pub fn signal(&self) -> CommandSignal<'_> {
        match self {
            Self::TextCommand { text, .. } => CommandSignal::Text(text),
            Self::CallbackAction { token, .. } => {
                let discriminator = token.split(DELIMITER).next().unwrap_or_default();
                CommandSignal::Callback(discriminator)
            }
        }
    }
}

/// How Telegram should parse the message text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    /// Sent verbatim
    #[default]
    Plain,
    /// Telegram HTML subset; dynamic text must be escaped
    Html,
}

/// One inline button carrying opaque callback data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlButton {
    /// Visible label
    pub label: String,
    /// Callback data sent back when pressed
    pub data: String,
}

/// A single row of pagination buttons
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PaginationControls {
    /// Buttons, left to right
    pub buttons: Vec<ControlButton>,
}

impl PaginationControls {
    /// No buttons at all
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }

    /// Callback data of every button, left to right
    pub fn data(&self) -> impl Iterator<Item = &str> {
        self.buttons.iter().map(|b| b.data.as_str())
    }
}

/// A message the transport must send, or an edit it must apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Target chat
    pub chat_id: i64,
    /// Rendered text
    pub text: String,
    /// Parse mode
    pub format: TextFormat,
    /// Optional inline keyboard
    pub reply_markup: Option<PaginationControls>,
    /// When set, replace this message instead of sending a new one
    pub edit_target: Option<i32>,
}

impl OutboundMessage {
    /// A new plain-text message
    #[must_use]
    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            format: TextFormat::Plain,
            reply_markup: None,
            edit_target: None,
        }
    }

    /// A new HTML message
    #[must_use]
    pub fn html(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            format: TextFormat::Html,
            ..Self::plain(chat_id, text)
        }
    }

    /// Attach a keyboard; empty controls are dropped
    #[must_use]
    pub fn with_controls(mut self, controls: PaginationControls) -> Self {
        self.reply_markup = (!controls.is_empty()).then_some(controls);
        self
    }

    /// Turn the message into an in-place edit of `message_id`
    #[must_use]
    pub fn editing(mut self, message_id: i32) -> Self {
        self.edit_target = Some(message_id);
        self
    }
}
