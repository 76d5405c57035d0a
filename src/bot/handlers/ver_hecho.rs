use super::{call, decode, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, display_value, HechoDetalle, Pdi};
use crate::backend::{Backend, NetworkError};
use crate::bot::chunker::{fit_unit, Chunker};
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage, TextFormat};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use crate::utils::{escape_html, truncate_graphemes};
use chrono::NaiveDate;
use reqwest::Method;
use serde_json::Value;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

const COMMAND: &str = "/hecho";
const USAGE: &str = "Uso: /hecho <id>";
const FIELD_MAX_CHARS: usize = 1000;

const PDIS_UNAVAILABLE: &str =
    "⚠️ No se pudieron cargar los puntos de interés (Información no disponible).";
const PDIS_SLOW: &str = "⚠️ El servicio de PDIs está tardando demasiado en responder.";
const PDIS_FAILED: &str = "⚠️ Ocurrió un problema al consultar los detalles adicionales.";

/// `/hecho <id>`: detail of one hecho plus its PDIs
pub struct VerHechoHandler {
    fuentes: Backend,
}

impl VerHechoHandler {
    /// Create the handler over the source service
    #[must_use]
    pub const fn new(fuentes: Backend) -> Self {
        Self { fuentes }
    }

    async fn show(&self, chat_id: i64, id: &str) -> Result<Vec<OutboundMessage>, HandlerError> {
        let request = self.fuentes.request(Method::GET, &["hecho", id]);
        let response = call(&self.fuentes, &request).await?;
        let hecho: Option<HechoDetalle> = if response.body.trim().is_empty() {
            None
        } else {
            decode(&response)?
        };
        let Some(hecho) = hecho.filter(|h| !h.is_empty()) else {
            return Ok(vec![OutboundMessage::plain(chat_id, not_found(id))]);
        };

        let mut messages =
            Chunker::list().chunk(chat_id, render_header(&hecho, id), TextFormat::Html);
        messages.extend(self.pdis(chat_id, id).await);
        Ok(messages)
    }

    /// PDI messages; failures degrade to a notice since the header is already useful
    async fn pdis(&self, chat_id: i64, id: &str) -> Vec<OutboundMessage> {
        let request = self.fuentes.request(Method::GET, &["hecho", id, "pdis"]);
        let fetched = match call(&self.fuentes, &request).await {
            Ok(response) if response.body.trim().is_empty() => Ok(None),
            Ok(response) => decode::<Option<Vec<Pdi>>>(&response),
            Err(e) => Err(e),
        };

        let pdis = match fetched {
            Ok(pdis) => pdis.unwrap_or_default(),
            Err(e) => {
                warn!(chat_id, hecho = id, "Could not load PDIs: {e}");
                let notice = match e {
                    HandlerError::Status { .. } => PDIS_UNAVAILABLE,
                    HandlerError::Network(NetworkError::Timeout(_)) => PDIS_SLOW,
                    _ => PDIS_FAILED,
                };
                return vec![OutboundMessage::plain(chat_id, notice)];
            }
        };

        if pdis.is_empty() {
            return vec![OutboundMessage::html(chat_id, "<b>PDIs:</b> (no hay)")];
        }

        let chunker = Chunker::pdis();
        let header = format!("<b>PDIs ({}):</b>\n", pdis.len());
        let units = std::iter::once(header).chain(
            pdis.iter()
                .enumerate()
                .map(|(i, pdi)| fit_unit(&render_pdi(i + 1, pdi), chunker.max_unit_len())),
        );
        chunker.chunk(chat_id, units, TextFormat::Html)
    }
}

fn not_found(id: &str) -> String {
    format!("No encontré el hecho {id}.")
}

fn text_field(value: Option<&Value>) -> Option<String> {
    value
        .map(display_value)
        .filter(|s| !s.trim().is_empty())
        .map(|s| escape_bounded(&s, FIELD_MAX_CHARS))
}

/// HTML-escape `s`, keeping at most `max_chars` of escaped output.
/// Whole graphemes only, so no entity or emoji is cut.
fn escape_bounded(s: &str, max_chars: usize) -> String {
    let mut out = String::new();
    let mut used = 0;
    for grapheme in s.graphemes(true) {
        let escaped = escape_html(grapheme);
        let len = escaped.chars().count();
        if used + len > max_chars {
            break;
        }
        used += len;
        out.push_str(&escaped);
    }
    out
}

/// Header lines: title and id first, then one line per present field.
/// Each line is bounded, so the chunker never has to split one.
fn render_header(hecho: &HechoDetalle, id: &str) -> Vec<String> {
    let titulo = hecho.titulo.as_deref().unwrap_or("(sin título)");
    let mut lines = vec![format!(
        "<b>{}</b>\nID: {}\n",
        escape_bounded(titulo, FIELD_MAX_CHARS),
        escape_bounded(&display_id(hecho.id.as_ref(), id), FIELD_MAX_CHARS),
    )];

    let fields = [
        ("Colección", &hecho.nombre_coleccion),
        ("Categoría", &hecho.categoria),
        ("Ubicación", &hecho.ubicacion),
        ("Fecha", &hecho.fecha),
        ("Origen", &hecho.origen),
    ];
    lines.extend(fields.into_iter().filter_map(|(label, value)| {
        text_field(value.as_ref()).map(|value| format!("{label}: {value}\n"))
    }));
    lines
}

/// `[y, m, d, h, min, ...]` as `yyyy-MM-dd HH:mm`; anything else verbatim
fn format_momento(momento: &Value) -> String {
    let as_parts = momento.as_array().and_then(|parts| {
        let nums: Vec<u32> = parts
            .iter()
            .take(5)
            .map(|p| p.as_u64().and_then(|n| u32::try_from(n).ok()))
            .collect::<Option<_>>()?;
        let [year, month, day, hour, minute] = nums.as_slice() else {
            return None;
        };
        NaiveDate::from_ymd_opt(i32::try_from(*year).ok()?, *month, *day)?
            .and_hms_opt(*hour, *minute, 0)
    });

    as_parts.map_or_else(
        || display_value(momento),
        |dt| dt.format("%Y-%m-%d %H:%M").to_string(),
    )
}

fn looks_like_url(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn render_pdi(n: usize, pdi: &Pdi) -> String {
    let descripcion = pdi.descripcion.as_deref().unwrap_or("(sin descripción)");
    let mut unit = format!(
        "{n}. {}\n   ID: {}\n",
        escape_html(&truncate_graphemes(descripcion, FIELD_MAX_CHARS)),
        escape_html(&display_id(pdi.id.as_ref(), "-")),
    );

    if let Some(lugar) = pdi.lugar.as_deref().filter(|s| !s.trim().is_empty()) {
        unit.push_str(&format!("   Lugar: {}\n", escape_html(lugar)));
    }
    if let Some(momento) = pdi.momento.as_ref().filter(|m| !m.is_null()) {
        unit.push_str(&format!("   Momento: {}\n", escape_html(&format_momento(momento))));
    }
    if let Some(texto) = pdi.texto_imagen.as_deref().filter(|s| !s.trim().is_empty()) {
        unit.push_str(&format!(
            "   📝 {}\n",
            escape_html(&truncate_graphemes(texto, FIELD_MAX_CHARS))
        ));
    }
    if !pdi.etiquetas.is_empty() {
        let tags = pdi
            .etiquetas
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", ");
        unit.push_str(&format!("   🏷️ Etiquetas: {}\n", escape_html(&tags)));
    }
    if let Some(url) = pdi.url_imagen.as_deref().filter(|u| looks_like_url(u)) {
        unit.push_str(&escape_html(url.trim()));
        unit.push('\n');
    }
    unit.push('\n');
    unit
}

#[async_trait::async_trait]
impl CommandHandler for VerHechoHandler {
    fn name(&self) -> &'static str {
        "ver_hecho"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text) if matches_command(text, COMMAND))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let Some(id) = split_command(text).1.split_whitespace().next() else {
            return vec![OutboundMessage::plain(chat_id, USAGE)];
        };

        let ctx = ErrorContext::new("hechos", not_found(id), "Error al obtener el hecho");
        self.show(chat_id, id)
            .await
            .unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::chunker::TELEGRAM_MESSAGE_LIMIT;
    use serde_json::json;

    #[test]
    fn test_format_momento() {
        assert_eq!(format_momento(&json!([2024, 3, 7, 9, 5])), "2024-03-07 09:05");
        assert_eq!(
            format_momento(&json!([2024, 3, 7, 9, 5, 30, 0])),
            "2024-03-07 09:05"
        );
        assert_eq!(format_momento(&json!("2024-03-07T09:05")), "2024-03-07T09:05");
        assert_eq!(format_momento(&json!([2024, 13, 1, 0, 0])), "[2024,13,1,0,0]");
        assert_eq!(format_momento(&json!([2024, 3])), "[2024,3]");
    }

    #[test]
    fn test_render_header_escapes_and_skips_missing() {
        let hecho: HechoDetalle = serde_json::from_value(json!({
            "id": 12,
            "titulo": "Corte <ruta> & piquete",
            "nombreColeccion": "demo",
            "categoria": null,
            "fecha": "2024-01-02"
        }))
        .expect("valid hecho");

        let header = render_header(&hecho, "12").concat();
        assert_eq!(
            header,
            "<b>Corte &lt;ruta&gt; &amp; piquete</b>\nID: 12\nColección: demo\nFecha: 2024-01-02\n"
        );
    }

    #[test]
    fn test_long_header_is_split_across_messages() {
        let long = "x".repeat(2000);
        let hecho: HechoDetalle = serde_json::from_value(json!({
            "id": long,
            "titulo": long,
            "nombreColeccion": long,
            "categoria": "&".repeat(2000),
            "ubicacion": "<".repeat(2000),
            "fecha": long,
            "origen": long
        }))
        .expect("valid hecho");

        let lines = render_header(&hecho, "1");
        let messages = Chunker::list().chunk_text(&lines);
        assert!(messages.len() >= 2);
        for message in &messages {
            assert!(message.chars().count() <= TELEGRAM_MESSAGE_LIMIT);
        }
        assert!(lines[1..].iter().all(|l| l.chars().count() <= FIELD_MAX_CHARS + 30));
        for label in ["Colección", "Categoría", "Ubicación", "Fecha", "Origen"] {
            assert_eq!(
                messages.iter().filter(|m| m.contains(&format!("{label}: "))).count(),
                1,
                "{label} must appear exactly once"
            );
        }
    }

    #[test]
    fn test_render_pdi() {
        let pdi: Pdi = serde_json::from_value(json!({
            "id": "p1",
            "descripcion": "Foto del lugar",
            "lugar": "Plaza",
            "momento": [2023, 12, 31, 23, 59],
            "texto_imagen": "cartel",
            "etiquetas": ["a", "b"],
            "url_imagen": "https://img.test/x.png?a=1&b=2"
        }))
        .expect("valid pdi");

        assert_eq!(
            render_pdi(3, &pdi),
            "3. Foto del lugar\n   ID: p1\n   Lugar: Plaza\n   Momento: 2023-12-31 23:59\n   📝 cartel\n   🏷️ Etiquetas: a, b\nhttps://img.test/x.png?a=1&amp;b=2\n\n"
        );
    }

    #[test]
    fn test_escape_bounded_never_cuts_an_entity() {
        assert_eq!(escape_bounded("a&b", 6), "a&amp;");
        assert_eq!(escape_bounded("a&b", 5), "a");
        assert_eq!(escape_bounded("<>", 100), "&lt;&gt;");
    }

    #[test]
    fn test_non_http_image_is_hidden() {
        let pdi = Pdi {
            url_imagen: Some("ftp://x".to_string()),
            ..Pdi::default()
        };
        assert_eq!(render_pdi(1, &pdi), "1. (sin descripción)\n   ID: -\n\n");
    }
}
