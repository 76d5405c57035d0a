//! Splits rendered output into Telegram-sized messages.
//!
//! Input is a sequence of units (one list entry, one PDI block...). Units are
//! never split; a message is flushed as soon as the next unit would not fit,
//! and every message after the first starts with a continuation marker.

use super::event::{OutboundMessage, TextFormat};
use crate::utils::truncate_graphemes;
use tracing::warn;

/// Maximum message length for Telegram with safety margin.
/// Telegram's official limit is 4096, but we use 4000 to account for
/// HTML tags and other formatting that may be added.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4000;

/// Budget for PDI listings, which carry long URLs and image text
pub const PDI_BUDGET: usize = 3500;

/// Prefix of every PDI message after the first
pub const PDI_CONTINUATION: &str = "(continuación PDIs...)\n\n";

/// Prefix of every list message after the first
pub const LIST_CONTINUATION: &str = "(continuación...)\n\n";

/// Character budget plus continuation marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    budget: usize,
    continuation: &'static str,
}

impl Chunker {
    /// Create a chunker. Lengths are measured in `char`s.
    #[must_use]
    pub const fn new(budget: usize, continuation: &'static str) -> Self {
        Self {
            budget,
            continuation,
        }
    }

    /// Chunker for `/hecho` PDI blocks
    #[must_use]
    pub const fn pdis() -> Self {
        Self::new(PDI_BUDGET, PDI_CONTINUATION)
    }

    /// Chunker for plain item lists
    #[must_use]
    pub const fn list() -> Self {
        Self::new(TELEGRAM_MESSAGE_LIMIT, LIST_CONTINUATION)
    }

    /// Maximum characters per message
    #[must_use]
    pub const fn budget(&self) -> usize {
        self.budget
    }

    /// Marker prepended to continuation messages
    #[must_use]
    pub const fn continuation(&self) -> &'static str {
        self.continuation
    }

    /// Largest unit guaranteed to fit in any message, marker included
    #[must_use]
    pub fn max_unit_len(&self) -> usize {
        self.budget.saturating_sub(self.continuation.chars().count())
    }

    /// Pack `units` into message texts.
    ///
    /// Empty units are skipped. A unit longer than the space left in a
    /// fresh message is emitted on its own and logged.
    pub fn chunk_text<I, S>(&self, units: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let marker_len = self.continuation.chars().count();
        let mut messages = Vec::new();
        let mut buffer = String::new();
        let mut buffer_len = 0;
        let mut has_content = false;

        for unit in units {
            let unit = unit.as_ref();
            if unit.is_empty() {
                continue;
            }
            let unit_len = unit.chars().count();

            if has_content && buffer_len + unit_len > self.budget {
                messages.push(std::mem::take(&mut buffer));
                buffer.push_str(self.continuation);
                buffer_len = marker_len;
                has_content = false;
            }

            if !has_content && buffer_len + unit_len > self.budget {
                warn!(
                    unit_len,
                    budget = self.budget,
                    "Unit exceeds message budget, sending it alone"
                );
            }

            buffer.push_str(unit);
            buffer_len += unit_len;
            has_content = true;
        }

        if has_content {
            messages.push(buffer);
        }
        messages
    }

    /// Pack `units` into messages for `chat_id`
    pub fn chunk<I, S>(&self, chat_id: i64, units: I, format: TextFormat) -> Vec<OutboundMessage>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.chunk_text(units)
            .into_iter()
            .map(|text| OutboundMessage {
                format,
                ..OutboundMessage::plain(chat_id, text)
            })
            .collect()
    }
}

/// Shrink a rendered unit to at most `max_chars`, ending it with `…` and a
/// blank line. Cuts on grapheme boundaries and never inside an HTML entity.
#[must_use]
pub fn fit_unit(unit: &str, max_chars: usize) -> String {
    const TAIL: &str = "…\n\n";
    if unit.chars().count() <= max_chars {
        return unit.to_string();
    }
    let mut kept = truncate_graphemes(unit, max_chars.saturating_sub(TAIL.chars().count()));
    if let Some(amp) = kept.rfind('&') {
        if !kept[amp..].contains(';') {
            kept.truncate(amp);
        }
    }
    kept.push_str(TAIL);
    kept
}
