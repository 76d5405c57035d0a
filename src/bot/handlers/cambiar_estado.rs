use super::{call, ErrorContext, HandlerError};
use crate::backend::dto::{display_id, Solicitud};
use crate::backend::Backend;
use crate::bot::event::{CommandSignal, InboundEvent, OutboundMessage};
use crate::bot::registry::{matches_command, split_command, CommandHandler};
use reqwest::Method;
use serde_json::json;

const COMMAND: &str = "/cambiar_estado";
const USAGE: &str = "Uso: /cambiar_estado <solicitudId> <ACEPTADA|RECHAZADA|CREADA>";
const ACCEPTED: &str = "ACEPTADA";

/// `/cambiar_estado <id> <ESTADO>`: moves a deletion request to a new status
pub struct CambiarEstadoHandler {
    solicitudes: Backend,
}

impl CambiarEstadoHandler {
    /// Create the handler over the moderation service
    #[must_use]
    pub const fn new(solicitudes: Backend) -> Self {
        Self { solicitudes }
    }

    async fn change(
        &self,
        chat_id: i64,
        solicitud_id: &str,
        estado: &str,
    ) -> Result<Vec<OutboundMessage>, HandlerError> {
        let request = self
            .solicitudes
            .request(Method::PATCH, &[solicitud_id, "estado"])
            .query("estado", estado)
            .json(json!({}));
        let response = call(&self.solicitudes, &request).await?;
        let updated: Solicitud = response.json().unwrap_or_default();

        let id = display_id(updated.id.as_ref(), solicitud_id);
        let hecho = display_id(updated.hecho_id.as_ref(), "desconocido");
        let nuevo_estado = updated.estado.unwrap_or_else(|| estado.to_string());

        let mut text = format!(
            "✅ Estado actualizado correctamente.\n\n📝 Solicitud: {id}\n🔗 Hecho: {hecho}\n📌 Nuevo estado: {nuevo_estado}\n"
        );
        if nuevo_estado.eq_ignore_ascii_case(ACCEPTED) {
            text.push_str("\nEl buscador será actualizado en breve para ocultar este hecho.");
        }
        Ok(vec![OutboundMessage::plain(chat_id, text)])
    }
}

#[async_trait::async_trait]
impl CommandHandler for CambiarEstadoHandler {
    fn name(&self) -> &'static str {
        "cambiar_estado"
    }

    fn can_handle(&self, signal: CommandSignal<'_>) -> bool {
        matches!(signal, CommandSignal::Text(text) if matches_command(text, COMMAND))
    }

    async fn handle(&self, event: &InboundEvent) -> Vec<OutboundMessage> {
        let InboundEvent::TextCommand { chat_id, text } = event else {
            return Vec::new();
        };
        let chat_id = *chat_id;
        let mut args = split_command(text).1.split_whitespace();
        let (Some(solicitud_id), Some(estado)) = (args.next(), args.next()) else {
            return vec![OutboundMessage::plain(chat_id, USAGE)];
        };
        let estado = estado.to_uppercase();

        let ctx = ErrorContext::new(
            "solicitudes",
            format!("❗ No se encontró la solicitud {solicitud_id}."),
            "No se pudo cambiar el estado",
        );
        self.change(chat_id, solicitud_id, &estado)
            .await
            .unwrap_or_else(|e| e.into_messages(chat_id, &ctx))
    }
}
