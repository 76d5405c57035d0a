use super::{call, decode, ErrorContext, HandlerError};
use crate::backend::dto::{display_value, HechoResumen, PageResponse};
use crate::backend::Backend;
use crate::bot::chunker::TELEGRAM_MESSAGE_LIMIT;
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::pagination::{PaginationKind, PaginationToken};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use crate::utils::{escape_html, truncate_graphemes};
use lazy_regex::{regex, regex_captures};
use reqwest::Method;

const COMMAND: &str = "/buscar";
const USAGE: &str = "Formato inválido. Ejemplos:\n/buscar \"incendio\"\n/buscar incendio\n/buscar incendio, tag: \"CABA\"";
const TITLE_MAX_CHARS: usize = 200;
const TAGS_MAX_CHARS: usize = 200;

/// Keyword and optional tag of a `/buscar` command.
///
/// The keyword is the first quoted value before `tag:`, else the bare text
/// before it without a trailing comma. The tag follows `tag:` (any case),
/// quoted or bare.
pub(crate) fn parse_query(args: &str) -> Option<(String, Option<String>)> {
    let (before, after) = match regex!(r"(?i)tag:").find(args) {
        Some(m) => (&args[..m.start()], Some(&args[m.end()..])),
        None => (args, None),
    };

    let keyword = match regex_captures!(r#""([^"]*)""#, before) {
        Some((_, quoted)) => quoted.trim().to_string(),
        None => before.trim().trim_end_matches(',').trim().to_string(),
    };
    if keyword.is_empty() {
        return None;
    }

    let tag = after.and_then(|rest| {
        let value = match regex_captures!(r#""([^"]*)""#, rest) {
            Some((_, quoted)) => quoted.trim(),
            None => rest.trim(),
        };
        (!value.is_empty()).then(|| value.to_string())
    });

    Some((keyword, tag))
}

/// `/buscar` and its pagination callbacks
pub struct BuscarHandler {
    busqueda: Backend,
}

impl BuscarHandler {
    /// Create the handler over the search index
    #[must_use]
    pub const fn new(busqueda: Backend) -> Self {
        Self { busqueda }
    }

    async fn search(
        &self,
        chat_id: i64,
        token: &PaginationToken,
        edit_target: Option<i32>,
    ) -> Result<Vec<OutboundMessage>, HandlerError> {
        let mut request = self
            .busqueda
            .request(Method::GET, &[])
            .query("keyword", token.keyword())
            .query("page", token.page());
        if let Some(tag) = token.filter() {
            request = request.query("tag", tag);
        }

        let response = call(&self.busqueda, &request).await?;
        let page: PageResponse<HechoResumen> = decode(&response)?;
        let keyword = escape_html(token.keyword());

        if page.content.is_empty() {
            let message = match edit_target {
                Some(message_id) => OutboundMessage::html(
                    chat_id,
                    format!("No hay más resultados para <b>{keyword}</b>"),
                )
                .with_controls(token.controls(token.page(), token.page()))
                .editing(message_id),
                None => OutboundMessage::plain(chat_id, "Sin resultados."),
            };
            return Ok(vec![message]);
        }

        let text = render_page(&keyword, token.filter(), &page);
        let mut message = OutboundMessage::html(chat_id, text)
            .with_controls(token.controls(page.number, page.total_pages));
        if let Some(message_id) = edit_target {
            message = message.editing(message_id);
        }
        Ok(vec![message])
    }

    async fn handle_text(&self, chat_id: i64, text: &str) -> Vec<OutboundMessage> {
        let ctx = context();
        let Some((keyword, tag)) = parse_query(split_command(text).1) else {
            return vec![OutboundMessage::plain(chat_id, USAGE)];
        };
        let token = match PaginationToken::new(PaginationKind::Buscar, keyword, tag, 0) {
            Ok(token) => token,
            Err(e) => {
                return vec![OutboundMessage::plain(chat_id, format!("❗ {e}\n\n{USAGE}"))];
            }
        };
        self.search(chat_id, &token, None)
            .await
            .unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }

    async fn handle_callback(
        &self,
        chat_id: i64,
        origin_message_id: i32,
        raw: &str,
    ) -> Vec<OutboundMessage> {
        let ctx = context();
        let result = match PaginationToken::decode(raw) {
            Ok(token) => self.search(chat_id, &token, Some(origin_message_id)).await,
            Err(e) => Err(e.into()),
        };
        result.unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}

fn context() -> ErrorContext {
    ErrorContext::new(
        "búsqueda",
        "No se encontró el servicio de búsqueda.",
        "Error al buscar",
    )
}

/// Results page as Telegram HTML, cut to fit in one message
fn render_page(keyword: &str, tag: Option<&str>, page: &PageResponse<HechoResumen>) -> String {
    let mut text = format!("Resultados para <b>{keyword}</b>");
    if let Some(tag) = tag {
        text.push_str(&format!(" (tag: <i>{}</i>)", escape_html(tag)));
    }
    text.push_str(&format!(
        "\nPágina {} de {}\n\n",
        page.number.saturating_add(1),
        page.total_pages.max(1)
    ));

    let mut used = text.chars().count();
    for hecho in &page.content {
        let titulo = hecho.titulo.as_deref().unwrap_or("(sin título)");
        let mut entry = format!("• {}\n", escape_html(&truncate_graphemes(titulo, TITLE_MAX_CHARS)));
        if !hecho.etiquetas.is_empty() {
            let tags = hecho
                .etiquetas
                .iter()
                .map(display_value)
                .collect::<Vec<_>>()
                .join(", ");
            entry.push_str(&format!(
                "  Tags: {}\n",
                escape_html(&truncate_graphemes(&tags, TAGS_MAX_CHARS))
            ));
        }
        entry.push('\n');

        let entry_len = entry.chars().count();
        if used + entry_len + 1 > TELEGRAM_MESSAGE_LIMIT {
            text.push('…');
            break;
        }
        used += entry_len;
        text.push_str(&entry);
    }
    text
}

#[async_trait::async_trait]
impl CommandHandler for BuscarHandler {
    fn name(&self) -> &'static str {
        "buscar"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        match signal {
            CommandSignal::Text(text) => matches_command(text, COMMAND),
            CommandSignal::Callback(kind) => PaginationKind::Buscar.matches(kind),
        }
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        match event {
            InboundEvent::TextCommand { chat_id, text } => self.handle_text(*chat_id, text).await,
            InboundEvent::CallbackAction {
                chat_id,
                origin_message_id,
                token,
            } => {
                self.handle_callback(*chat_id, *origin_message_id, token)
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn query(args: &str) -> Option<(String, Option<String>)> {
        parse_query(args)
    }

    #[test]
    fn test_parse_quoted_and_bare_keywords() {
        assert_eq!(query("\"incendio\""), Some(("incendio".into(), None)));
        assert_eq!(query("incendio"), Some(("incendio".into(), None)));
        assert_eq!(
            query("incendio forestal"),
            Some(("incendio forestal".into(), None))
        );
    }

    #[test]
    fn test_parse_tag() {
        assert_eq!(
            query("incendio, tag: \"CABA\""),
            Some(("incendio".into(), Some("CABA".into())))
        );
        assert_eq!(
            query("\"incendio\", TAG: \"Zona Sur\""),
            Some(("incendio".into(), Some("Zona Sur".into())))
        );
        assert_eq!(
            query("lluvia tag: norte"),
            Some(("lluvia".into(), Some("norte".into())))
        );
        assert_eq!(query("lluvia, tag:"), Some(("lluvia".into(), None)));
    }

    #[test]
    fn test_parse_rejects_missing_keyword() {
        assert_eq!(query(""), None);
        assert_eq!(query("\"\""), None);
        assert_eq!(query("tag: \"CABA\""), None);
    }

    #[test]
    fn test_render_page() {
        let page: PageResponse<HechoResumen> = serde_json::from_value(json!({
            "content": [
                {"id": 1, "titulo": "Incendio <grande>", "etiquetas": ["CABA", "fuego"]},
                {"id": 2, "titulo": "Humo"}
            ],
            "number": 0,
            "totalPages": 2
        }))
        .expect("valid page");

        let text = render_page("incendio", Some("CABA"), &page);
        assert!(text.starts_with(
            "Resultados para <b>incendio</b> (tag: <i>CABA</i>)\nPágina 1 de 2\n\n"
        ));
        assert!(text.contains("• Incendio &lt;grande&gt;\n  Tags: CABA, fuego\n\n"));
        assert!(text.ends_with("• Humo\n\n"));
    }

    #[test]
    fn test_render_page_respects_message_limit() {
        let content: Vec<_> = (0..200)
            .map(|i| json!({"id": i, "titulo": "x".repeat(150)}))
            .collect();
        let page: PageResponse<HechoResumen> =
            serde_json::from_value(json!({"content": content, "number": 0, "totalPages": 1}))
                .expect("valid page");
        let text = render_page("x", None, &page);
        assert!(text.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        assert!(text.ends_with('…'));
    }
}
