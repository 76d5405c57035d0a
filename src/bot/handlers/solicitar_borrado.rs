use super::{call, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, NuevaSolicitud, Solicitud};
use crate::backend::Backend;
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use reqwest::Method;

const COMMANDS: [&str; 2] = ["/solicitar_borrado", "/solicitud_borrado"];
const USAGE: &str = "Uso: /solicitar_borrado <hechoId> <descripcion (≥500 caracteres)>";
const TOO_SHORT: &str = "❗ La descripción debe tener al menos 500 caracteres.";
/// Minimum justification length, in characters
pub const MIN_DESCRIPTION_CHARS: usize = 500;
const INITIAL_STATUS: &str = "CREADA";

/// `/solicitar_borrado <hechoId> <descripcion>`: files a deletion request
pub struct SolicitarBorradoHandler {
    solicitudes: Backend,
}

impl SolicitarBorradoHandler {
    /// Create the handler over the moderation service
    #[must_use]
    pub const fn new(solicitudes: Backend) -> Self {
        Self { solicitudes }
    }

    async fn submit(
        &self,
        chat_id: i64,
        solicitud: NuevaSolicitud,
    ) -> Result<Vec<OutboundMessage>, HandlerError> {
        let body = serde_json::to_value(&solicitud)?;
        let request = self.solicitudes.request(Method::POST, &[]).json(body);
        let response = call(&self.solicitudes, &request).await?;
        let created: Solicitud = response.json().unwrap_or_default();

        let text = format!(
            "📨 Solicitud creada con éxito.\n\n📝 ID: {}\n🔗 Hecho: {}\n📌 Estado inicial: {}\n\nTu solicitud quedó registrada correctamente.",
            display_id(created.id.as_ref(), "¿sin id?"),
            display_id(created.hecho_id.as_ref(), &solicitud.hecho_id),
            created.estado.as_deref().unwrap_or("DESCONOCIDO"),
        );
        Ok(vec![OutboundMessage::plain(chat_id, text)])
    }
}

/// Split `<hechoId> <descripcion...>` and enforce the minimum length.
pub(crate) fn parse_args(args: &str) -> Result<NuevaSolicitud, HandlerError> {
    let Some((hecho_id, descripcion)) = args.split_once(char::is_whitespace) else {
        return Err(HandlerError::Usage(USAGE.to_string()));
    };
    let descripcion = descripcion.trim();
    if hecho_id.is_empty() || descripcion.is_empty() {
        return Err(HandlerError::Usage(USAGE.to_string()));
    }
    if descripcion.chars().count() < MIN_DESCRIPTION_CHARS {
        return Err(HandlerError::Usage(TOO_SHORT.to_string()));
    }

    Ok(NuevaSolicitud {
        descripcion: descripcion.to_string(),
        estado: INITIAL_STATUS.to_string(),
        hecho_id: hecho_id.to_string(),
    })
}

#[async_trait::async_trait]
impl CommandHandler for SolicitarBorradoHandler {
    fn name(&self) -> &'static str {
        "solicitar_borrado"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text)
            if COMMANDS.iter().any(|command| matches_command(text, command)))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let args = split_command(text).1;
        let hecho_id = args.split_whitespace().next().unwrap_or_default();
        let ctx = ErrorContext::new(
            "solicitudes",
            format!("❗ No se encontró el hecho {hecho_id}."),
            "No se pudo crear la solicitud",
        );

        let result = match parse_args(args) {
            Ok(solicitud) => self.submit(chat_id, solicitud).await,
            Err(e) => Err(e),
        };
        result.unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_description_is_rejected() {
        let err = parse_args("42 too-short-text").err();
        assert!(matches!(err, Some(HandlerError::Usage(msg)) if msg == TOO_SHORT));
    }

    #[test]
    fn test_missing_description_is_usage() {
        assert!(matches!(parse_args("42"), Err(HandlerError::Usage(msg)) if msg == USAGE));
        assert!(matches!(parse_args(""), Err(HandlerError::Usage(msg)) if msg == USAGE));
    }

    #[test]
    fn test_length_counts_characters() {
        // 499 two-byte chars are still too short
        let short = format!("42 {}", "ñ".repeat(MIN_DESCRIPTION_CHARS - 1));
        assert!(parse_args(&short).is_err());

        let long = format!("42   {}  ", "ñ".repeat(MIN_DESCRIPTION_CHARS));
        let solicitud = parse_args(&long).expect("long enough");
        assert_eq!(solicitud.hecho_id, "42");
        assert_eq!(solicitud.estado, "CREADA");
        assert_eq!(solicitud.descripcion.chars().count(), MIN_DESCRIPTION_CHARS);
    }
}
