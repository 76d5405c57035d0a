//! Utility functions for text truncation, HTML escaping and Telegram retries.

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Escapes `&`, `<` and `>` for Telegram's HTML parse mode.
///
/// # Examples
///
/// ```
/// use metamapa_bot::utils::escape_html;
/// assert_eq!(escape_html("a < b & c"), "a &lt; b &amp; c");
/// ```
#[must_use]
pub fn escape_html(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// This is UTF-8 safe and will not panic on multi-byte characters.
///
/// # Examples
///
/// ```
/// use metamapa_bot::utils::truncate_str;
/// let s = "Título de prueba";
/// assert_eq!(truncate_str(s, 6), "Título");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Truncates to at most `max_chars` characters without cutting a grapheme
/// cluster, so emoji sequences and combining marks stay intact.
///
/// # Examples
///
/// ```
/// use metamapa_bot::utils::truncate_graphemes;
/// // "🏷️" is two chars forming one grapheme
/// assert_eq!(truncate_graphemes("ab🏷️", 3), "ab");
/// assert_eq!(truncate_graphemes("ab🏷️", 4), "ab🏷️");
/// ```
#[must_use]
pub fn truncate_graphemes(s: &str, max_chars: usize) -> String {
    let mut used = 0;
    let mut out = String::with_capacity(s.len().min(max_chars * 4));
    for grapheme in s.graphemes(true) {
        let len = grapheme.chars().count();
        if used + len > max_chars {
            break;
        }
        used += len;
        out.push_str(grapheme);
    }
    out
}

/// Retry a Telegram API operation with exponential backoff.
///
/// The retry strategy uses exponential backoff with jitter:
/// - Initial delay: 500ms
/// - Max delay: 4s
/// - Max attempts: 3 (see constants in `config.rs`)
///
/// # Errors
///
/// Returns the last error if all attempts fail.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    retry_telegram_operation_if(operation, |_| true).await
}

/// Like [`retry_telegram_operation`], but an error for which `retryable`
/// returns `false` is returned at once.
///
/// # Errors
///
/// Returns the first non-retryable error, or the last error if all
/// attempts fail.
pub async fn retry_telegram_operation_if<F, Fut, T, C>(operation: F, retryable: C) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
    C: FnMut(&anyhow::Error) -> bool,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    RetryIf::spawn(retry_strategy, operation, retryable)
        .await
        .map_err(|e| {
            warn!(
                "Telegram API operation failed (up to {} attempts): {}",
                TELEGRAM_API_MAX_RETRIES, e
            );
            e
        })
}
