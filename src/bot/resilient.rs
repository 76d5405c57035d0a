//! Resilient delivery of [`OutboundMessage`]s through the Telegram API.
//!
//! Sends and edits are retried on transient failures with
//! [`crate::utils::retry_telegram_operation`]. Edits that Telegram rejects
//! because nothing changed are treated as delivered.

use super::event::{OutboundMessage, PaginationControls, TextFormat};
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use tracing::{debug, warn};

const ERROR_NOT_MODIFIED: &str = "message is not modified";

/// Inline keyboard with one row holding every control button
#[must_use]
pub fn keyboard(controls: &PaginationControls) -> InlineKeyboardMarkup {
    let row = controls
        .buttons
        .iter()
        .map(|b| InlineKeyboardButton::callback(b.label.clone(), b.data.clone()))
        .collect::<Vec<_>>();
    InlineKeyboardMarkup::new(vec![row])
}

const fn parse_mode(format: TextFormat) -> Option<ParseMode> {
    match format {
        TextFormat::Plain => None,
        TextFormat::Html => Some(ParseMode::Html),
    }
}

/// Send a message with automatic retry on network failures.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn send_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    text: &str,
    parse_mode: Option<ParseMode>,
    markup: Option<&InlineKeyboardMarkup>,
) -> Result<Message> {
    crate::utils::retry_telegram_operation(|| async {
        let mut req = bot.send_message(chat_id, text);
        if let Some(pm) = parse_mode {
            req = req.parse_mode(pm);
        }
        if let Some(markup) = markup {
            req = req.reply_markup(markup.clone());
        }
        req.await
            .map_err(|e| anyhow::anyhow!("Telegram send error: {e}"))
    })
    .await
}

fn is_not_modified(error: &anyhow::Error) -> bool {
    error.to_string().contains(ERROR_NOT_MODIFIED)
}

/// Edit a message with automatic retry on network failures.
///
/// Without `markup` the existing inline keyboard is removed. A "message is
/// not modified" rejection is returned without retrying.
///
/// # Errors
///
/// Returns the last error after all retries are exhausted.
pub async fn edit_message_resilient(
    bot: &Bot,
    chat_id: ChatId,
    msg_id: MessageId,
    text: &str,
    parse_mode: Option<ParseMode>,
    markup: Option<&InlineKeyboardMarkup>,
) -> Result<Message> {
    crate::utils::retry_telegram_operation_if(
        || async {
            let mut req = bot.edit_message_text(chat_id, msg_id, text);
            if let Some(pm) = parse_mode {
                req = req.parse_mode(pm);
            }
            if let Some(markup) = markup {
                req = req.reply_markup(markup.clone());
            }
            req.await
                .map_err(|e| anyhow::anyhow!("Telegram edit error: {e}"))
        },
        |e| !is_not_modified(e),
    )
    .await
}

/// Deliver one outbound message: edit in place when it has an edit target,
/// send a new message otherwise.
///
/// # Errors
///
/// Returns the Telegram error after all retries are exhausted. A
/// "message is not modified" rejection is not an error.
pub async fn deliver(bot: &Bot, message: &OutboundMessage) -> Result<()> {
    let chat_id = ChatId(message.chat_id);
    let markup = message.reply_markup.as_ref().map(keyboard);
    let mode = parse_mode(message.format);

    match message.edit_target {
        Some(target) => {
            let edited = edit_message_resilient(
                bot,
                chat_id,
                MessageId(target),
                &message.text,
                mode,
                markup.as_ref(),
            )
            .await;
            match edited {
                Ok(_) => Ok(()),
                Err(e) if is_not_modified(&e) => {
                    debug!("Message update skipped: {e}");
                    Ok(())
                }
                Err(e) => {
                    warn!(chat_id = message.chat_id, "Failed to edit message after retries: {e}");
                    Err(e)
                }
            }
        }
        None => send_message_resilient(bot, chat_id, &message.text, mode, markup.as_ref())
            .await
            .map(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::event::ControlButton;
    use teloxide::types::InlineKeyboardButtonKind;

    #[test]
    fn test_keyboard_is_one_row_in_order() {
        let controls = PaginationControls {
            buttons: vec![
                ControlButton {
                    label: "◀ Anterior".to_string(),
                    data: "BUSCAR|x|_|0".to_string(),
                },
                ControlButton {
                    label: "▶ Siguiente".to_string(),
                    data: "BUSCAR|x|_|2".to_string(),
                },
            ],
        };

        let markup = keyboard(&controls);
        assert_eq!(markup.inline_keyboard.len(), 1);
        let row = &markup.inline_keyboard[0];
        assert_eq!(row.len(), 2);
        assert_eq!(row[0].text, "◀ Anterior");
        assert!(matches!(
            &row[1].kind,
            InlineKeyboardButtonKind::CallbackData(data) if data == "BUSCAR|x|_|2"
        ));
    }

    #[test]
    fn test_not_modified_is_recognised() {
        let unchanged = anyhow::anyhow!(
            "Telegram edit error: Bad Request: message is not modified: specified new message content and reply markup are exactly the same"
        );
        assert!(is_not_modified(&unchanged));
        assert!(!is_not_modified(&anyhow::anyhow!("Telegram edit error: timed out")));
    }

    #[test]
    fn test_parse_mode_mapping() {
        assert_eq!(parse_mode(TextFormat::Plain), None);
        assert_eq!(parse_mode(TextFormat::Html), Some(ParseMode::Html));
    }
}
